//! Rescaled exponential optimizers.
//!
//! Two variants of an adaptive, regret-minimizing first-order update rule
//! meant to be driven by an external training loop:
//!
//! - [`RescaledExp`] keeps independent accumulators for every scalar entry.
//! - [`RescaledExpSphere`] derives its scale and reset signal from the norm of
//!   the whole concatenated gradient.
//!
//! ```
//! use ndarray::arr1;
//! use rescaled_exp::{Gradient, Optimizer, RescaledExp, RescaledExpConfig, Variable};
//!
//! let w = Variable::new("w", arr1(&[1.0f32, -1.0]).into_dyn());
//! let mut opt = RescaledExp::new(RescaledExpConfig::default()).unwrap();
//!
//! let grad = Gradient::Dense(arr1(&[0.1, -0.2]).into_dyn());
//! opt.apply_gradients(&[(Some(grad), w.clone())], None).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod numeric;
pub mod optimization;
pub mod telemetry;
pub mod tensor;

pub use config::{OptimizerKind, OptimizerSpec, RescaledExpConfig, build_optimizer};
pub use error::{OptimErr, Result};
pub use optimization::{
    ApplyReport, Bootstrap, GlobalScale, Optimizer, RescaledExp, RescaledExpSphere, SlotName,
};
pub use telemetry::{LogTelemetry, RecordingTelemetry, ScaleSummary, Telemetry};
pub use tensor::{GlobalStep, GradAndVar, Gradient, IndexedSlices, Variable, VariableId};
