mod batch;
mod optimizer;
mod rescaled_exp;
mod rescaled_exp_sphere;
mod slots;

pub use optimizer::{ApplyReport, Optimizer, SlotName};
pub use rescaled_exp::RescaledExp;
pub use rescaled_exp_sphere::{GlobalScale, RescaledExpSphere};
pub use slots::Bootstrap;
