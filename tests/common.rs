#![allow(dead_code)]

use ndarray::{ArrayD, IxDyn};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rescaled_exp::{GradAndVar, Optimizer, SlotName, Variable};

pub const EPS: f32 = 1e-8;

pub fn assert_close(got: f32, expected: f32) {
    assert!(
        (got - expected).abs() <= 1e-5 * expected.abs().max(1.),
        "got {got}, expected {expected}"
    );
}

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A gradient with entries uniform in `[-scale, scale]`.
pub fn random_grad(rng: &mut StdRng, shape: &[usize], scale: f32) -> ArrayD<f32> {
    let len = shape.iter().product();
    let data = (0..len).map(|_| rng.random_range(-scale..=scale)).collect();
    ArrayD::from_shape_vec(IxDyn(shape), data).unwrap()
}

pub fn dense(grad: ArrayD<f32>, var: &Variable) -> GradAndVar {
    (Some(grad.into()), var.clone())
}

pub fn scalar(values: &[f32]) -> ArrayD<f32> {
    ArrayD::from_shape_vec(IxDyn(&[values.len()]), values.to_vec()).unwrap()
}

/// Reads a slot that holds a single value.
pub fn slot_value(opt: &dyn Optimizer, var: &Variable, name: SlotName) -> f32 {
    let slot = opt.slot(var, name).unwrap();
    assert_eq!(slot.len(), 1, "slot {name} is not a single value");
    slot.iter().copied().next().unwrap()
}
