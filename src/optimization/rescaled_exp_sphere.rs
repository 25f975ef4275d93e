use log::debug;
use ndarray::{ArrayD, IxDyn, Zip};
use rayon::prelude::*;

use super::{
    ApplyReport, Bootstrap, Optimizer, SlotName,
    batch::{self, Entry},
    slots::SlotTable,
};
use crate::{
    Result,
    config::{RescaledExpConfig, check_positive},
    numeric::{norm_sq, safe_div, step_size, sum_norm_sq},
    telemetry::{LogTelemetry, ScaleSummary, Telemetry},
    tensor::{GlobalStep, GradAndVar, Variable, VariableAccess},
};

const OPTIMIZER: &str = "RescaledExpSphere";

const SLOT_NAMES: &[SlotName] = &[
    SlotName::Gsq,
    SlotName::Gsum,
    SlotName::L,
    SlotName::M,
    SlotName::Center,
    SlotName::Initialized,
    SlotName::StepAccum,
    SlotName::OldVar,
    SlotName::StepCount,
];

/// The scale state shared by every variable of a `RescaledExpSphere`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalScale {
    /// Largest global gradient norm seen since the last reset.
    pub l: f32,
    /// Steps since the last reset, starting at `1`.
    pub step_count: u64,
}

impl Default for GlobalScale {
    fn default() -> Self {
        Self { l: 0., step_count: 1 }
    }
}

impl GlobalScale {
    /// Feeds this step's gradient norm into the scale.
    ///
    /// # Returns
    /// Whether the norm exceeded twice the scale, resetting it.
    fn advance(&mut self, grad_norm: f32) -> bool {
        let reset = grad_norm > 2. * self.l;

        if reset {
            self.l = grad_norm;
            self.step_count = 1;
        } else {
            self.step_count += 1;
        }

        reset
    }
}

/// Cross-variable statistics of one step, computed before any write.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Aggregates {
    /// `Σ‖g‖²`
    grad_norm_sq: f32,
    /// `Σ‖Gsum + g‖²`
    gsum_sq: f32,
    /// `Σ(Gsq + ‖g‖²)`
    gsq_sum: f32,
}

impl Aggregates {
    fn collect(entries: &[Entry<'_>], slots: &[&mut SphereSlots]) -> Self {
        entries
            .par_iter()
            .zip(slots.par_iter())
            .map(|(entry, slots)| {
                let g_sq = norm_sq(entry.grad);
                Self {
                    grad_norm_sq: g_sq,
                    gsum_sq: sum_norm_sq(&slots.gsum, entry.grad),
                    gsq_sum: slots.gsq + g_sq,
                }
            })
            .reduce(Self::zero, Self::add)
    }

    fn zero() -> Self {
        Self {
            grad_norm_sq: 0.,
            gsum_sq: 0.,
            gsq_sum: 0.,
        }
    }

    fn add(self, other: Self) -> Self {
        Self {
            grad_norm_sq: self.grad_norm_sq + other.grad_norm_sq,
            gsum_sq: self.gsum_sq + other.gsum_sq,
            gsq_sum: self.gsq_sum + other.gsq_sum,
        }
    }
}

/// What every variable's update reads from the global phase of a step.
#[derive(Debug, Clone, Copy)]
struct StepContext {
    lr: f32,
    eps: f32,
    agg: Aggregates,
    l: f32,
    reset: bool,
}

/// Slots of one variable. Only `Gsum`, `center` and `old_var` are tensors.
#[derive(Debug)]
struct SphereSlots {
    bootstrap: Bootstrap,
    gsq: f32,
    gsum: ArrayD<f32>,
    m: f32,
    center: ArrayD<f32>,
    old_var: ArrayD<f32>,
    step_accum: f32,
    step_count: u64,
}

impl SphereSlots {
    fn new(shape: &[usize], eps: f32) -> Self {
        Self {
            bootstrap: Bootstrap::Uninitialized,
            gsq: eps,
            gsum: ArrayD::zeros(IxDyn(shape)),
            m: 0.,
            center: ArrayD::zeros(IxDyn(shape)),
            old_var: ArrayD::zeros(IxDyn(shape)),
            step_accum: eps,
            step_count: 1,
        }
    }

    /// Applies a dense gradient to `value` in place.
    fn apply_dense(&mut self, ctx: &StepContext, grad: &ArrayD<f32>, value: &mut ArrayD<f32>) {
        let StepContext {
            lr,
            eps,
            agg,
            l,
            reset,
        } = *ctx;

        let center = match (self.bootstrap, reset) {
            (Bootstrap::Uninitialized, _) => value.clone(),
            (Bootstrap::Active, true) => self.old_var.clone(),
            (Bootstrap::Active, false) => self.center.clone(),
        };

        self.old_var.assign(&*value);
        self.center = center;
        self.bootstrap = Bootstrap::Active;

        if reset {
            self.gsq = eps;
            self.gsum.fill(0.);
            self.m = 0.;
            self.step_accum = eps;
            self.step_count = 1;
            value.assign(&self.center);
            return;
        }

        let gsum_norm = agg.gsum_sq.sqrt();

        self.gsq += agg.grad_norm_sq;
        self.gsum += grad;
        self.m = self.m.max(gsum_norm * l - self.gsq);
        self.step_accum = (l * gsum_norm).min(self.step_accum + agg.gsq_sum);
        self.step_count += 1;

        let eta = step_size(lr, self.step_accum, eps);
        let coef = -safe_div((eta * gsum_norm).exp_m1(), gsum_norm, eps);

        Zip::from(value)
            .and(&self.center)
            .and(&self.gsum)
            .for_each(|v, &c, &s| *v = c + coef * s);
    }

    fn view(&self, name: SlotName, scale: &GlobalScale) -> Option<ArrayD<f32>> {
        let scalar = |x: f32| Some(ArrayD::from_elem(IxDyn(&[]), x));

        match name {
            SlotName::Gsq => scalar(self.gsq),
            SlotName::Gsum => Some(self.gsum.clone()),
            SlotName::L => scalar(scale.l),
            SlotName::M => scalar(self.m),
            SlotName::Center => Some(self.center.clone()),
            SlotName::Initialized => scalar(self.bootstrap.as_f32()),
            SlotName::OldVar => Some(self.old_var.clone()),
            SlotName::StepAccum => scalar(self.step_accum),
            SlotName::StepCount => scalar(self.step_count as f32),
        }
    }
}

/// The rescaled exponential optimizer on the sphere.
///
/// The reset signal and scale `L` come from the L2 norm of the whole
/// concatenated gradient, while center, old value and gradient sum are kept
/// per variable. The offset from the center points against the global
/// gradient sum, normalized by its norm.
pub struct RescaledExpSphere {
    config: RescaledExpConfig,
    scale: GlobalScale,
    slots: SlotTable<SphereSlots>,
    telemetry: Box<dyn Telemetry>,
    last_summary: Option<ScaleSummary>,
}

impl RescaledExpSphere {
    /// Creates a new `RescaledExpSphere` optimizer reporting to the log.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters.
    ///
    /// # Returns
    /// A new `RescaledExpSphere` instance or `InvalidConfig`.
    pub fn new(config: RescaledExpConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            scale: GlobalScale::default(),
            slots: SlotTable::default(),
            telemetry: Box::new(LogTelemetry),
            last_summary: None,
        })
    }

    /// Replaces the telemetry sink.
    pub fn with_telemetry(mut self, telemetry: impl Telemetry + 'static) -> Self {
        self.telemetry = Box::new(telemetry);
        self
    }

    /// The shared scale state.
    pub fn scale(&self) -> GlobalScale {
        self.scale
    }

    /// The signals emitted by the latest successful step.
    pub fn last_summary(&self) -> Option<ScaleSummary> {
        self.last_summary
    }

    /// Whether `var` has been bootstrapped by this optimizer.
    pub fn bootstrap(&self, var: &Variable) -> Bootstrap {
        self.slots
            .get(var.id())
            .map(|s| s.bootstrap)
            .unwrap_or_default()
    }

    fn create_slots(&mut self, entries: &[Entry<'_>]) {
        let eps = self.config.epsilon;

        for Entry { var, .. } in entries {
            if self
                .slots
                .ensure(var.id(), || SphereSlots::new(var.shape(), eps))
            {
                debug!(
                    optimizer = self.config.name.as_str(),
                    variable = var.name();
                    "created slots"
                );
            }
        }
    }
}

impl Optimizer for RescaledExpSphere {
    fn apply_gradients(
        &mut self,
        grads_and_vars: &[GradAndVar],
        global_step: Option<&GlobalStep>,
    ) -> Result<ApplyReport> {
        let batch = batch::validate(OPTIMIZER, grads_and_vars)?;
        self.create_slots(&batch.entries);

        let RescaledExpConfig {
            learning_rate: lr,
            epsilon: eps,
            use_locking,
            ..
        } = self.config;

        let vars = batch.vars();
        let mut access = VariableAccess::open_all(&vars, use_locking);
        let mut slots = self.slots.get_many_mut(&batch.ids());

        let agg = Aggregates::collect(&batch.entries, &slots);
        let reset = self.scale.advance(agg.grad_norm_sq.sqrt());

        let summary = ScaleSummary {
            scale: self.scale.l,
            rms_gradient: (agg.gsq_sum / self.scale.step_count as f32).sqrt(),
            gradient_norm: agg.grad_norm_sq.sqrt(),
            step_count: self.scale.step_count,
        };
        self.telemetry.record(&self.config.name, &summary);
        self.last_summary = Some(summary);

        if reset {
            debug!(optimizer = self.config.name.as_str(), scale = self.scale.l; "scale reset");
        }

        let ctx = StepContext {
            lr,
            eps,
            agg,
            l: self.scale.l,
            reset,
        };

        {
            let mut values: Vec<_> = access.iter_mut().map(VariableAccess::value_mut).collect();

            values
                .par_iter_mut()
                .zip(slots.par_iter_mut())
                .zip(batch.entries.par_iter())
                .for_each(|((value, slots), entry)| slots.apply_dense(&ctx, entry.grad, value));
        }

        access.into_iter().for_each(VariableAccess::commit);

        Ok(ApplyReport {
            updated: batch.entries.len(),
            skipped: batch.skipped,
            resets: reset as usize,
            global_step: global_step.map(GlobalStep::increment),
        })
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn learning_rate(&self) -> f32 {
        self.config.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) -> Result<()> {
        check_positive("learning_rate", lr)?;
        self.config.learning_rate = lr;
        Ok(())
    }

    fn slot_names(&self) -> &'static [SlotName] {
        SLOT_NAMES
    }

    fn slot(&self, var: &Variable, name: SlotName) -> Option<ArrayD<f32>> {
        self.slots.get(var.id())?.view(name, &self.scale)
    }
}
