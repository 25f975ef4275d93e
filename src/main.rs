use std::{env, fs, process::ExitCode};

use log::{error, info};
use ndarray::{ArrayD, arr1, arr2};
use rescaled_exp::{GlobalStep, GradAndVar, Optimizer, OptimizerSpec, Result, Variable};

const STEPS: u64 = 200;
const LOG_EVERY: u64 = 20;

/// Minimizes `½‖x − target‖²` over two variables.
fn run(spec: OptimizerSpec) -> Result<()> {
    info!("building {:?} optimizer: {:?}", spec.kind, spec.config);
    let mut optimizer = spec.build()?;

    let targets: [ArrayD<f32>; 2] = [
        arr1(&[3.0, -2.0, 0.5]).into_dyn(),
        arr2(&[[1.0, -1.0], [0.25, 4.0]]).into_dyn(),
    ];
    let vars = [
        Variable::new("bias", ArrayD::zeros(targets[0].raw_dim())),
        Variable::new("weights", ArrayD::zeros(targets[1].raw_dim())),
    ];
    let global_step = GlobalStep::default();

    for _ in 0..STEPS {
        let mut loss = 0.;
        let grads_and_vars: Vec<GradAndVar> = vars
            .iter()
            .zip(&targets)
            .map(|(var, target)| {
                let diff = &*var.read() - target;
                loss += 0.5 * diff.iter().map(|d| d * d).sum::<f32>();
                (Some(diff.into()), var.clone())
            })
            .collect();

        let report = optimizer.apply_gradients(&grads_and_vars, Some(&global_step))?;

        if let Some(step) = report.global_step.filter(|s| s % LOG_EVERY == 0) {
            info!(step = step, loss = loss, resets = report.resets; "training");
        }
    }

    for var in &vars {
        info!("{} = {}", var.name(), var.value());
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let spec = match env::args().nth(1) {
        Some(path) => match fs::read_to_string(&path) {
            Ok(content) => OptimizerSpec::from_json(&content),
            Err(e) => {
                error!("cannot read '{path}': {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Ok(OptimizerSpec::default()),
    };

    match spec.and_then(run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
