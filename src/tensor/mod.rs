mod gradient;
mod step;
mod variable;

pub use gradient::{GradAndVar, Gradient, IndexedSlices};
pub use step::GlobalStep;
pub(crate) use variable::VariableAccess;
pub use variable::{Variable, VariableId};
