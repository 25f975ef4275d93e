use std::collections::HashSet;

use log::warn;
use ndarray::ArrayD;

use crate::{
    OptimErr, Result,
    tensor::{GradAndVar, Variable, VariableId},
};

/// A variable paired with its dense gradient.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Entry<'a> {
    pub grad: &'a ArrayD<f32>,
    pub var: &'a Variable,
}

/// A validated batch: every entry has a dense gradient shaped like its
/// trainable variable, and no variable repeats.
#[derive(Debug)]
pub(crate) struct Batch<'a> {
    pub entries: Vec<Entry<'a>>,
    pub skipped: usize,
}

impl<'a> Batch<'a> {
    pub fn ids(&self) -> Vec<VariableId> {
        self.entries.iter().map(|e| e.var.id()).collect()
    }

    pub fn vars(&self) -> Vec<&'a Variable> {
        self.entries.iter().map(|e| e.var).collect()
    }
}

/// Validates `grads_and_vars` before anything is touched.
///
/// # Arguments
/// * `optimizer` - The optimizer's name, used in errors.
/// * `grads_and_vars` - The pairs to validate.
///
/// # Returns
/// The batch of pairs that carry a gradient, or the first problem found.
pub(crate) fn validate<'a>(
    optimizer: &'static str,
    grads_and_vars: &'a [GradAndVar],
) -> Result<Batch<'a>> {
    check(optimizer, grads_and_vars)
        .inspect_err(|e| warn!(optimizer = optimizer; "rejected batch: {e}"))
}

fn check<'a>(optimizer: &'static str, grads_and_vars: &'a [GradAndVar]) -> Result<Batch<'a>> {
    let mut seen = HashSet::with_capacity(grads_and_vars.len());
    let mut entries = Vec::with_capacity(grads_and_vars.len());

    for (grad, var) in grads_and_vars {
        if !var.is_trainable() {
            return Err(OptimErr::NotTrainable {
                variable: var.name().to_string(),
            });
        }

        let Some(grad) = grad else {
            continue;
        };
        let grad = grad
            .as_dense()
            .ok_or_else(|| OptimErr::SparseUnsupported {
                optimizer,
                variable: var.name().to_string(),
            })?;

        var.check_shape(grad.shape())?;

        if !seen.insert(var.id()) {
            return Err(OptimErr::DuplicateVariable {
                variable: var.name().to_string(),
            });
        }

        entries.push(Entry { grad, var });
    }

    if entries.is_empty() {
        return Err(OptimErr::NoGradients {
            pairs: grads_and_vars.len(),
        });
    }

    let skipped = grads_and_vars.len() - entries.len();
    Ok(Batch { entries, skipped })
}
