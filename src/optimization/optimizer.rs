use std::fmt::{self, Display};

use ndarray::ArrayD;

use crate::{
    Result,
    tensor::{GlobalStep, GradAndVar, Variable},
};

/// Defines how a batch of gradients turns into new variable values.
pub trait Optimizer: Send {
    /// Applies one optimization step to every variable that has a gradient.
    ///
    /// The batch is validated as a whole before any state is created or
    /// mutated, so an error leaves every variable and slot as it was.
    ///
    /// # Arguments
    /// * `grads_and_vars` - The `(gradient, variable)` pairs of this step.
    /// * `global_step` - An optional counter, incremented once after every write landed.
    ///
    /// # Returns
    /// What the step did, or an error if the batch is malformed.
    fn apply_gradients(
        &mut self,
        grads_and_vars: &[GradAndVar],
        global_step: Option<&GlobalStep>,
    ) -> Result<ApplyReport>;

    /// The instance name.
    fn name(&self) -> &str;

    fn learning_rate(&self) -> f32;

    /// Sets a new learning rate, used from the next step on.
    fn set_learning_rate(&mut self, lr: f32) -> Result<()>;

    /// The slots this optimizer keeps for every variable.
    fn slot_names(&self) -> &'static [SlotName];

    /// Returns a copy of `var`'s slot, `None` if the variable hasn't been
    /// stepped yet or the slot isn't kept by this optimizer.
    ///
    /// Scalar slots are returned as 0-d arrays.
    fn slot(&self, var: &Variable, name: SlotName) -> Option<ArrayD<f32>>;
}

/// The outcome of a successful `apply_gradients` call.
///
/// Getting one back means every variable and slot write has landed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Variables written.
    pub updated: usize,
    /// Pairs skipped for lacking a gradient.
    pub skipped: usize,
    /// Reset events: coordinates for `RescaledExp`, `0` or `1` for `RescaledExpSphere`.
    pub resets: usize,
    /// The external step counter after the increment, if one was given.
    pub global_step: Option<u64>,
}

/// Names of the per-variable state slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotName {
    Gsq,
    Gsum,
    L,
    M,
    Center,
    Initialized,
    OldVar,
    StepAccum,
    StepCount,
}

impl SlotName {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotName::Gsq => "Gsq",
            SlotName::Gsum => "Gsum",
            SlotName::L => "L",
            SlotName::M => "M",
            SlotName::Center => "center",
            SlotName::Initialized => "initialized",
            SlotName::OldVar => "old_var",
            SlotName::StepAccum => "step_accum",
            SlotName::StepCount => "step_count",
        }
    }
}

impl Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
