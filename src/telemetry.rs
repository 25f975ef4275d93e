//! Per-step observability signals of the spherical engine.

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

/// The four scalar signals emitted after the global phase of a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleSummary {
    /// The scale `L` after this step's update.
    pub scale: f32,
    /// `√(Gsq_sum / step_count)`
    pub rms_gradient: f32,
    /// L2 norm of this step's concatenated gradient.
    pub gradient_norm: f32,
    /// Steps since the last reset.
    pub step_count: u64,
}

impl ScaleSummary {
    /// The signals as `(name, value)` pairs.
    pub fn signals(&self) -> [(&'static str, f32); 4] {
        [
            ("L", self.scale),
            ("rms_gradient", self.rms_gradient),
            ("gradient_norm", self.gradient_norm),
            ("step_count", self.step_count as f32),
        ]
    }
}

/// A consumer of per-step scale summaries.
pub trait Telemetry: Send {
    /// Records one step's summary.
    ///
    /// # Arguments
    /// * `namespace` - The optimizer instance's name.
    /// * `summary` - The signals of the step.
    fn record(&mut self, namespace: &str, summary: &ScaleSummary);
}

/// Writes every summary to the log at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn record(&mut self, namespace: &str, summary: &ScaleSummary) {
        debug!(
            optimizer = namespace,
            scale = summary.scale,
            rms_gradient = summary.rms_gradient,
            gradient_norm = summary.gradient_norm,
            step_count = summary.step_count;
            "scale summary"
        );
    }
}

/// Keeps every summary in memory, clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetry(Arc<Mutex<Vec<(String, ScaleSummary)>>>);

impl RecordingTelemetry {
    /// The recorded summaries, oldest first.
    pub fn summaries(&self) -> Vec<ScaleSummary> {
        self.0.lock().iter().map(|(_, s)| *s).collect()
    }

    /// The namespace of every recorded summary, oldest first.
    pub fn namespaces(&self) -> Vec<String> {
        self.0.lock().iter().map(|(ns, _)| ns.clone()).collect()
    }

    /// Every recorded signal as `"<namespace>/<signal>"` and its value.
    pub fn signals(&self) -> Vec<(String, f32)> {
        self.0
            .lock()
            .iter()
            .flat_map(|(ns, s)| {
                s.signals()
                    .into_iter()
                    .map(move |(name, value)| (format!("{ns}/{name}"), value))
            })
            .collect()
    }
}

impl Telemetry for RecordingTelemetry {
    fn record(&mut self, namespace: &str, summary: &ScaleSummary) {
        self.0.lock().push((namespace.to_string(), *summary));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_is_shared_between_clones() {
        let recorder = RecordingTelemetry::default();
        let mut sink = recorder.clone();

        let summary = ScaleSummary {
            scale: 2.,
            rms_gradient: 1.5,
            gradient_norm: 2.,
            step_count: 3,
        };
        sink.record("opt", &summary);

        assert_eq!(recorder.summaries(), vec![summary]);
        assert_eq!(
            recorder.signals(),
            vec![
                ("opt/L".to_string(), 2.),
                ("opt/rms_gradient".to_string(), 1.5),
                ("opt/gradient_norm".to_string(), 2.),
                ("opt/step_count".to_string(), 3.),
            ]
        );
    }
}
