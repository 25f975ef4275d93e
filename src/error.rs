use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used across the crate.
pub type Result<T> = std::result::Result<T, OptimErr>;

/// The optimizer's error type.
///
/// Every variant is raised before any slot or variable is touched.
#[derive(Debug)]
pub enum OptimErr {
    ShapeMismatch {
        variable: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    NotTrainable {
        variable: String,
    },
    DuplicateVariable {
        variable: String,
    },
    NoGradients {
        pairs: usize,
    },
    SparseUnsupported {
        optimizer: &'static str,
        variable: String,
    },
    InvalidConfig {
        field: &'static str,
        value: f32,
    },
    Json(serde_json::Error),
}

impl Display for OptimErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimErr::ShapeMismatch {
                variable,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for variable '{variable}': got {got:?}, expected {expected:?}"
            ),
            OptimErr::NotTrainable { variable } => {
                write!(f, "variable '{variable}' is not trainable")
            }
            OptimErr::DuplicateVariable { variable } => write!(
                f,
                "variable '{variable}' appears more than once with a gradient in the same batch"
            ),
            OptimErr::NoGradients { pairs } => write!(
                f,
                "no gradients provided for any variable ({pairs} pairs given)"
            ),
            OptimErr::SparseUnsupported {
                optimizer,
                variable,
            } => write!(
                f,
                "{optimizer} does not support sparse gradients (variable '{variable}'), \
                 densify the gradient first"
            ),
            OptimErr::InvalidConfig { field, value } => {
                write!(
                    f,
                    "invalid configuration: {field} = {value}, expected a finite positive value"
                )
            }
            OptimErr::Json(e) => write!(f, "invalid JSON configuration: {e}"),
        }
    }
}

impl Error for OptimErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OptimErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for OptimErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
