mod common;

use common::*;
use ndarray::{ArrayD, IxDyn};
use rescaled_exp::{Bootstrap, Optimizer, RescaledExp, RescaledExpConfig, SlotName, Variable};

fn optimizer() -> RescaledExp {
    RescaledExp::new(RescaledExpConfig::default()).unwrap()
}

fn step(opt: &mut RescaledExp, var: &Variable, g: f32) -> f32 {
    opt.apply_gradients(&[dense(scalar(&[g]), var)], None)
        .unwrap();
    var.value()[[0]]
}

#[test]
fn gsq_never_drops_below_epsilon() {
    let mut opt = optimizer();
    let mut rng = rng(7);
    let var = Variable::new("w", ArrayD::zeros(IxDyn(&[4, 5])));

    for t in 0..200 {
        // Occasional large gradients trigger resets.
        let scale = if t % 37 == 0 { 50. } else { 1. };
        let grad = random_grad(&mut rng, &[4, 5], scale);
        opt.apply_gradients(&[dense(grad, &var)], None).unwrap();

        let gsq = opt.slot(&var, SlotName::Gsq).unwrap();
        assert!(gsq.iter().all(|&x| x >= EPS), "Gsq below epsilon at step {t}");
        assert!(var.value().iter().all(|x| x.is_finite()));
    }
}

#[test]
fn bootstrap_happens_once() {
    let mut opt = optimizer();
    let var = Variable::new("w", scalar(&[2.]));
    assert_eq!(opt.bootstrap(&var), Bootstrap::Uninitialized);

    step(&mut opt, &var, 0.5);
    assert_eq!(opt.bootstrap(&var), Bootstrap::Active);
    assert_eq!(slot_value(&opt, &var, SlotName::Center), 2.);

    for g in [0.1, 10., -30., 0.2, 100.] {
        step(&mut opt, &var, g);
        assert_eq!(opt.bootstrap(&var), Bootstrap::Active);
        assert_eq!(slot_value(&opt, &var, SlotName::Initialized), 1.);
    }
}

#[test]
fn reset_recenters_on_the_value_two_steps_back() {
    let mut opt = optimizer();
    let var = Variable::new("w", scalar(&[1.]));

    let v1 = step(&mut opt, &var, 0.1);
    let v2 = step(&mut opt, &var, 0.1);
    let v3 = step(&mut opt, &var, 0.1);
    assert_eq!(v1, 1.);
    assert_ne!(v2, v1);
    assert_ne!(v3, v2);

    // |5| > 2·0.1 resets the coordinate.
    let v4 = step(&mut opt, &var, 5.);

    assert_eq!(slot_value(&opt, &var, SlotName::Gsq), EPS);
    assert_eq!(slot_value(&opt, &var, SlotName::Gsum), 0.);
    assert_eq!(slot_value(&opt, &var, SlotName::M), 0.);
    assert_eq!(slot_value(&opt, &var, SlotName::L), 5.);
    assert_eq!(slot_value(&opt, &var, SlotName::Center), v2);
    assert_eq!(slot_value(&opt, &var, SlotName::OldVar), v3);
    assert_eq!(v4, v2);
}

#[test]
fn single_scalar_scenario() {
    let mut opt = optimizer();
    let var = Variable::new("w", scalar(&[1.]));

    // L starts at 0, so the first gradient resets while the bootstrap seeds the center.
    assert_eq!(step(&mut opt, &var, 0.1), 1.);
    assert_eq!(slot_value(&opt, &var, SlotName::L), 0.1);

    let v = step(&mut opt, &var, 0.1);
    assert_close(v, 1. - (0.5f32.exp() - 1.));
    assert_close(slot_value(&opt, &var, SlotName::Gsq), EPS + 0.01);
    assert_close(slot_value(&opt, &var, SlotName::Gsum), 0.1);
}

#[test]
fn zero_gradient_step_is_idempotent() {
    let mut opt = optimizer();
    let mut rng = rng(11);
    let var = Variable::new("w", random_grad(&mut rng, &[3, 3], 1.));

    for _ in 0..5 {
        let grad = random_grad(&mut rng, &[3, 3], 0.5);
        opt.apply_gradients(&[dense(grad, &var)], None).unwrap();
    }

    let before = var.value();
    let slots_before: Vec<_> = opt
        .slot_names()
        .iter()
        .map(|&name| opt.slot(&var, name).unwrap())
        .collect();

    for _ in 0..3 {
        let report = opt
            .apply_gradients(&[dense(ArrayD::zeros(IxDyn(&[3, 3])), &var)], None)
            .unwrap();
        assert_eq!(report.resets, 0);
        assert_eq!(var.value(), before);
    }

    for (&name, before) in opt.slot_names().iter().zip(slots_before) {
        if matches!(name, SlotName::OldVar) {
            continue;
        }
        assert_eq!(opt.slot(&var, name).unwrap(), before, "slot {name} changed");
    }
    assert_eq!(opt.slot(&var, SlotName::OldVar).unwrap(), before);
}

#[test]
fn minimizes_a_quadratic() {
    let mut opt = optimizer();
    let target = scalar(&[3., -2., 0.5]);
    let var = Variable::new("w", ArrayD::zeros(IxDyn(&[3])));

    for _ in 0..500 {
        let grad = &var.value() - &target;
        opt.apply_gradients(&[dense(grad, &var)], None).unwrap();
    }

    let err = (&var.value() - &target).mapv(f32::abs);
    assert!(err.iter().all(|&e| e < 0.5), "still far from target: {err}");
}
