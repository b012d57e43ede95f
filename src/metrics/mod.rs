//! Scoring modules over shared frame features.
//!
//! Every module is a pure function of the frame sequence and the decoded
//! buffer. Modules never see each other's output, so they can be fanned out
//! across threads and joined before the report is assembled.

pub mod clarity;
pub mod dynamics;
pub mod frequency;
pub mod stereo;
pub mod transients;

use crate::audio::{FrameFeatures, SampleBuffer};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{guard, AnalysisError, Result};

pub use clarity::Clarity;
pub use dynamics::DynamicRange;
pub use frequency::FrequencyBalance;
pub use stereo::StereoField;
pub use transients::Transients;

/// Score, ordered statistics and notes produced by one module.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricResult {
    pub score: f32,
    pub stats: Vec<(&'static str, f32)>,
    pub notes: Vec<String>,
}

impl MetricResult {
    pub fn new(score: f32) -> Self {
        Self {
            score: clamp_score(score),
            stats: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_stat(mut self, name: &'static str, value: f32) -> Self {
        self.stats.push((name, if value.is_finite() { value } else { 0.0 }));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Statistic by name, 0.0 when absent.
    pub fn stat(&self, name: &str) -> f32 {
        self.stats
            .iter()
            .find(|(key, _)| *key == name)
            .map_or(0.0, |(_, value)| *value)
    }

    /// Zero-score result used when a module cannot produce a measurement.
    pub fn zeroed(module: &dyn MetricModule, note: String) -> Self {
        module
            .stat_names()
            .iter()
            .fold(MetricResult::new(0.0), |r, name| r.with_stat(name, 0.0))
            .with_note(note)
    }
}

pub fn clamp_score(score: f32) -> f32 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

pub trait MetricModule: Sync {
    fn name(&self) -> &'static str;

    /// Statistic names the module reports, in output order.
    fn stat_names(&self) -> &'static [&'static str];

    fn compute(&self, frames: &[FrameFeatures], buffer: &SampleBuffer, config: &Config) -> Result<MetricResult>;
}

/// The five metric modules in report order.
pub fn all_modules() -> [&'static dyn MetricModule; 5] {
    [&FrequencyBalance, &DynamicRange, &StereoField, &Clarity, &Transients]
}

/// Every module needs at least one full analysis window of audio.
pub fn ensure_duration(buffer: &SampleBuffer, config: &Config) -> Result<()> {
    let required = config.analysis.window_size;
    if buffer.frames() < required {
        return Err(AnalysisError::InsufficientDuration {
            frames: buffer.frames(),
            required,
        });
    }
    Ok(())
}

/// Run one module, downgrading module-local failures to a zero score.
///
/// Fatal errors such as cancellation escape and fail the whole run.
pub fn run_module(
    module: &dyn MetricModule,
    frames: &[FrameFeatures],
    buffer: &SampleBuffer,
    config: &Config,
    cancel: &CancelToken,
) -> Result<MetricResult> {
    cancel.check(module.name())?;

    let outcome = guard(module.name(), || module.compute(frames, buffer, config));

    match outcome {
        Ok(result) => {
            log::debug!("{}: score {:.1}", module.name(), result.score);
            Ok(result)
        }
        Err(AnalysisError::InsufficientDuration { frames, required }) => {
            let secs = frames as f32 / buffer.sample_rate() as f32;
            log::warn!("{}: track too short ({} of {} samples)", module.name(), frames, required);
            Ok(MetricResult::zeroed(
                module,
                format!(
                    "Insufficient duration for {} analysis: {:.3}s of audio is shorter than one analysis window",
                    module.name(),
                    secs
                ),
            ))
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            log::error!("{} analysis failed: {}", module.name(), e);
            Ok(MetricResult::zeroed(
                module,
                format!("{} analysis failed: {}", module.name(), e),
            ))
        }
    }
}

pub(crate) fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}
