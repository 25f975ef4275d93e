use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use ndarray::ArrayD;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{OptimErr, Result};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a `Variable`, stable across clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId(u64);

#[derive(Debug)]
struct Inner {
    id: VariableId,
    name: String,
    shape: Vec<usize>,
    trainable: bool,
    value: RwLock<ArrayD<f32>>,
}

/// A shared handle to a named parameter tensor.
///
/// Cloning is cheap and every clone refers to the same storage. The shape is
/// fixed at construction.
#[derive(Clone)]
pub struct Variable(Arc<Inner>);

impl Variable {
    /// Creates a new trainable `Variable`.
    ///
    /// # Arguments
    /// * `name` - A human readable name, used in errors and logs.
    /// * `value` - The initial value, its shape becomes the variable's shape.
    ///
    /// # Returns
    /// A new `Variable` instance.
    pub fn new(name: impl Into<String>, value: ArrayD<f32>) -> Self {
        Self::with_trainable(name.into(), value, true)
    }

    /// Creates a new `Variable` that optimizers refuse to update.
    pub fn non_trainable(name: impl Into<String>, value: ArrayD<f32>) -> Self {
        Self::with_trainable(name.into(), value, false)
    }

    fn with_trainable(name: String, value: ArrayD<f32>, trainable: bool) -> Self {
        let id = VariableId(NEXT_ID.fetch_add(1, Ordering::Relaxed));

        Self(Arc::new(Inner {
            id,
            name,
            shape: value.shape().to_vec(),
            trainable,
            value: RwLock::new(value),
        }))
    }

    pub fn id(&self) -> VariableId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.0.shape
    }

    /// The amount of scalar entries in this variable.
    pub fn len(&self) -> usize {
        self.0.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_trainable(&self) -> bool {
        self.0.trainable
    }

    /// Returns a copy of the current value.
    pub fn value(&self) -> ArrayD<f32> {
        self.0.value.read().clone()
    }

    /// Locks the value for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, ArrayD<f32>> {
        self.0.value.read()
    }

    /// Overwrites the value from the host side.
    ///
    /// # Returns
    /// A `ShapeMismatch` error if `value` doesn't have this variable's shape.
    pub fn assign(&self, value: ArrayD<f32>) -> Result<()> {
        self.check_shape(value.shape())?;
        *self.0.value.write() = value;
        Ok(())
    }

    /// Checks that `shape` matches this variable's shape.
    pub(crate) fn check_shape(&self, shape: &[usize]) -> Result<()> {
        if shape != self.shape() {
            return Err(OptimErr::ShapeMismatch {
                variable: self.name().to_string(),
                got: shape.to_vec(),
                expected: self.shape().to_vec(),
            });
        }

        Ok(())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ArrayD<f32>> {
        self.0.value.write()
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("shape", &self.0.shape)
            .field("trainable", &self.0.trainable)
            .finish()
    }
}

/// Write access to a variable for the duration of one apply call.
///
/// `Locked` holds the write lock until committed, `Staged` works on a copy and
/// stores it back under a short write lock on commit.
pub(crate) enum VariableAccess<'a> {
    Locked(RwLockWriteGuard<'a, ArrayD<f32>>),
    Staged {
        var: &'a Variable,
        value: ArrayD<f32>,
    },
}

impl<'a> VariableAccess<'a> {
    /// Opens every variable in `vars`, keeping the input order in the output.
    ///
    /// With `use_locking` the write locks are taken in ascending id order so two
    /// concurrent batches over overlapping variables can't deadlock.
    pub fn open_all(vars: &[&'a Variable], use_locking: bool) -> Vec<Self> {
        if !use_locking {
            return vars
                .iter()
                .map(|&var| VariableAccess::Staged {
                    var,
                    value: var.value(),
                })
                .collect();
        }

        let mut order: Vec<usize> = (0..vars.len()).collect();
        order.sort_by_key(|&i| vars[i].id());

        let mut guards: Vec<Option<RwLockWriteGuard<'a, ArrayD<f32>>>> =
            (0..vars.len()).map(|_| None).collect();

        for i in order {
            guards[i] = Some(vars[i].write());
        }

        guards
            .into_iter()
            .flatten()
            .map(VariableAccess::Locked)
            .collect()
    }

    pub fn value_mut(&mut self) -> &mut ArrayD<f32> {
        match self {
            VariableAccess::Locked(guard) => &mut **guard,
            VariableAccess::Staged { value, .. } => value,
        }
    }

    /// Publishes the new value.
    pub fn commit(self) {
        match self {
            VariableAccess::Locked(guard) => drop(guard),
            VariableAccess::Staged { var, value } => *var.write() = value,
        }
    }
}
