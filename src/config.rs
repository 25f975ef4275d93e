use serde::Deserialize;

use crate::{
    OptimErr, Result,
    optimization::{Optimizer, RescaledExp, RescaledExpSphere},
};

/// Construction-time configuration shared by both engines.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RescaledExpConfig {
    /// Scale of the FTRL regularizer, `1.0` gives the low-regret guarantee in
    /// unconstrained problems.
    pub learning_rate: f32,
    /// Smoothing constant, also the floor of every denominator.
    pub epsilon: f32,
    /// Whether a step holds the variables' write locks from its first read
    /// to its last write.
    pub use_locking: bool,
    /// Instance name, used as the telemetry namespace.
    pub name: String,
}

impl Default for RescaledExpConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1.0,
            epsilon: 1e-8,
            use_locking: false,
            name: "RescaledExp".to_string(),
        }
    }
}

impl RescaledExpConfig {
    pub fn learning_rate(mut self, lr: f32) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn epsilon(mut self, eps: f32) -> Self {
        self.epsilon = eps;
        self
    }

    pub fn use_locking(mut self, use_locking: bool) -> Self {
        self.use_locking = use_locking;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Checks that the numeric hyperparameters are finite and positive.
    pub fn validate(&self) -> Result<()> {
        check_positive("learning_rate", self.learning_rate)?;
        check_positive("epsilon", self.epsilon)
    }

    /// Parses and validates a configuration from JSON, missing fields take
    /// their default value.
    pub fn from_json(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

pub(crate) fn check_positive(field: &'static str, value: f32) -> Result<()> {
    if !value.is_finite() || value <= 0. {
        return Err(OptimErr::InvalidConfig { field, value });
    }

    Ok(())
}

/// Which of the two update engines to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    /// Independent accumulators per scalar entry.
    #[default]
    RescaledExp,
    /// Scale and reset driven by the global gradient norm.
    RescaledExpSphere,
}

/// An engine kind together with its configuration, as read from JSON.
///
/// ```json
/// { "kind": "rescaled_exp_sphere", "learning_rate": 0.5 }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct OptimizerSpec {
    #[serde(default)]
    pub kind: OptimizerKind,
    #[serde(flatten)]
    pub config: RescaledExpConfig,
}

impl OptimizerSpec {
    pub fn from_json(s: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(s)?;
        spec.config.validate()?;
        Ok(spec)
    }

    /// Builds the engine described by this spec.
    pub fn build(self) -> Result<Box<dyn Optimizer>> {
        build_optimizer(self.kind, self.config)
    }
}

/// Builds an engine of the given `kind`.
///
/// # Returns
/// The engine behind a trait object, or `InvalidConfig` if `config` doesn't validate.
pub fn build_optimizer(
    kind: OptimizerKind,
    config: RescaledExpConfig,
) -> Result<Box<dyn Optimizer>> {
    Ok(match kind {
        OptimizerKind::RescaledExp => Box::new(RescaledExp::new(config)?),
        OptimizerKind::RescaledExpSphere => Box::new(RescaledExpSphere::new(config)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RescaledExpConfig::default();
        assert_eq!(config.learning_rate, 1.0);
        assert_eq!(config.epsilon, 1e-8);
        assert!(!config.use_locking);
        assert_eq!(config.name, "RescaledExp");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RescaledExpConfig::from_json(r#"{ "learning_rate": 0.5 }"#).unwrap();
        assert_eq!(config, RescaledExpConfig::default().learning_rate(0.5));
    }

    #[test]
    fn rejects_non_positive_values() {
        for lr in [0., -1., f32::NAN, f32::INFINITY] {
            let err = RescaledExpConfig::default()
                .learning_rate(lr)
                .validate()
                .unwrap_err();
            assert!(matches!(
                err,
                OptimErr::InvalidConfig {
                    field: "learning_rate",
                    ..
                }
            ));
        }

        let err = RescaledExpConfig::from_json(r#"{ "epsilon": 0.0 }"#).unwrap_err();
        assert!(matches!(err, OptimErr::InvalidConfig { field: "epsilon", .. }));
    }

    #[test]
    fn malformed_json() {
        let err = RescaledExpConfig::from_json("{ learning_rate: }").unwrap_err();
        assert!(matches!(err, OptimErr::Json(_)));
    }

    #[test]
    fn spec_selects_kind() {
        let spec = OptimizerSpec::from_json(
            r#"{ "kind": "rescaled_exp_sphere", "use_locking": true, "name": "sphere" }"#,
        )
        .unwrap();

        assert_eq!(spec.kind, OptimizerKind::RescaledExpSphere);
        assert!(spec.config.use_locking);

        let optimizer = spec.build().unwrap();
        assert_eq!(optimizer.name(), "sphere");
    }

    #[test]
    fn spec_kind_defaults_to_per_coordinate() {
        let spec = OptimizerSpec::from_json("{}").unwrap();
        assert_eq!(spec.kind, OptimizerKind::RescaledExp);
        assert_eq!(spec.config, RescaledExpConfig::default());
    }
}
