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
    numeric::{select, sign, step_size},
    tensor::{GlobalStep, GradAndVar, Variable, VariableAccess},
};

const OPTIMIZER: &str = "RescaledExp";

const SLOT_NAMES: &[SlotName] = &[
    SlotName::Gsq,
    SlotName::Gsum,
    SlotName::L,
    SlotName::M,
    SlotName::Center,
    SlotName::Initialized,
    SlotName::OldVar,
];

/// Accumulators of a single scalar entry.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CoordinateState {
    gsq: f32,
    gsum: f32,
    l: f32,
    m: f32,
    center: f32,
    old_var: f32,
}

impl CoordinateState {
    fn new(eps: f32) -> Self {
        Self {
            gsq: eps,
            gsum: 0.,
            l: 0.,
            m: 0.,
            center: 0.,
            old_var: 0.,
        }
    }

    /// Advances this entry by one step.
    ///
    /// # Arguments
    /// * `g` - The entry's gradient.
    /// * `v` - The entry's current value.
    /// * `active` - Whether the variable has been bootstrapped.
    ///
    /// # Returns
    /// The entry's new value and whether it was reset.
    fn step(&mut self, lr: f32, eps: f32, g: f32, v: f32, active: bool) -> (f32, bool) {
        let reset = g.abs() > 2. * self.l;
        let center = if active {
            select(reset, self.old_var, self.center)
        } else {
            v
        };

        let gsq = self.gsq + g * g;
        let gsum = self.gsum + g;
        let m = self.m.max(gsum.abs() * self.l - gsq);

        let eta = step_size(lr, m + gsq, eps);
        let w = -sign(gsum) * (eta * gsum.abs()).exp_m1();

        *self = Self {
            gsq: select(reset, eps, gsq),
            gsum: select(reset, 0., gsum),
            l: select(reset, g.abs(), self.l),
            m: select(reset, 0., m),
            center,
            old_var: v,
        };

        (select(reset, 0., w) + center, reset)
    }
}

/// Slots of one variable, one `CoordinateState` per entry.
#[derive(Debug)]
struct CoordinateSlots {
    bootstrap: Bootstrap,
    coords: ArrayD<CoordinateState>,
}

impl CoordinateSlots {
    fn new(shape: &[usize], eps: f32) -> Self {
        Self {
            bootstrap: Bootstrap::Uninitialized,
            coords: ArrayD::from_elem(IxDyn(shape), CoordinateState::new(eps)),
        }
    }

    /// Applies a dense gradient to `value` in place.
    ///
    /// # Returns
    /// The amount of entries that were reset.
    fn apply_dense(
        &mut self,
        lr: f32,
        eps: f32,
        grad: &ArrayD<f32>,
        value: &mut ArrayD<f32>,
    ) -> usize {
        let active = self.bootstrap.is_active();
        let mut resets = 0;

        Zip::from(value)
            .and(grad)
            .and(&mut self.coords)
            .for_each(|v, &g, state| {
                let (next, reset) = state.step(lr, eps, g, *v, active);
                *v = next;
                resets += reset as usize;
            });

        self.bootstrap = Bootstrap::Active;
        resets
    }

    fn view(&self, name: SlotName) -> Option<ArrayD<f32>> {
        let field: fn(&CoordinateState) -> f32 = match name {
            SlotName::Gsq => |c| c.gsq,
            SlotName::Gsum => |c| c.gsum,
            SlotName::L => |c| c.l,
            SlotName::M => |c| c.m,
            SlotName::Center => |c| c.center,
            SlotName::OldVar => |c| c.old_var,
            SlotName::Initialized => {
                return Some(ArrayD::from_elem(IxDyn(&[]), self.bootstrap.as_f32()));
            }
            SlotName::StepAccum | SlotName::StepCount => return None,
        };

        Some(self.coords.map(field))
    }
}

/// The coordinate-wise rescaled exponential optimizer.
///
/// Every scalar entry of every variable keeps its own scale estimate `L`,
/// gradient sums and center. An entry whose gradient exceeds twice its scale
/// is reset: its sums restart and its center moves to the value it had one
/// step earlier.
#[derive(Debug)]
pub struct RescaledExp {
    config: RescaledExpConfig,
    slots: SlotTable<CoordinateSlots>,
}

impl RescaledExp {
    /// Creates a new `RescaledExp` optimizer.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters.
    ///
    /// # Returns
    /// A new `RescaledExp` instance or `InvalidConfig`.
    pub fn new(config: RescaledExpConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            slots: SlotTable::default(),
        })
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
                .ensure(var.id(), || CoordinateSlots::new(var.shape(), eps))
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

impl Optimizer for RescaledExp {
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

        let resets: usize = {
            let mut values: Vec<_> = access.iter_mut().map(VariableAccess::value_mut).collect();

            values
                .par_iter_mut()
                .zip(slots.par_iter_mut())
                .zip(batch.entries.par_iter())
                .map(|((value, slots), entry)| slots.apply_dense(lr, eps, entry.grad, value))
                .sum()
        };

        access.into_iter().for_each(VariableAccess::commit);

        if resets > 0 {
            debug!(optimizer = self.config.name.as_str(), resets = resets; "coordinates reset");
        }

        Ok(ApplyReport {
            updated: batch.entries.len(),
            skipped: batch.skipped,
            resets,
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
        self.slots.get(var.id())?.view(name)
    }
}
