use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::{self, SampleBuffer};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::enrich::{Enricher, NoopEnricher};
use crate::error::{guard, AnalysisError, Result};
use crate::harmony;
use crate::metrics::{self, MetricResult};
use crate::report::{self, AnalysisReport, ModuleResults};

/// Per-invocation switches.
#[derive(Clone, Debug, Default)]
pub struct AnalysisOptions {
    /// Keep all notes, the transients block and key candidates
    pub detailed: bool,
    /// Run the enrichment stage after assembly
    pub include_ai: bool,
    /// Also write the rendered report here
    pub output_path: Option<PathBuf>,
    /// Wall-clock budget for the whole run
    pub deadline: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Decoding,
    Analyzing,
    Assembling,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Decoding => "decoding",
            Stage::Analyzing => "analyzing",
            Stage::Assembling => "assembling",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the run's stage and mirrors it on the progress bar.
struct StageTracker<'p> {
    stage: Stage,
    progress: &'p ProgressBar,
}

impl<'p> StageTracker<'p> {
    fn new(progress: &'p ProgressBar, stages: u64) -> Self {
        progress.set_length(stages);
        progress.set_position(0);
        Self {
            stage: Stage::Idle,
            progress,
        }
    }

    fn advance(&mut self, next: Stage) {
        log::debug!("Stage {} -> {}", self.stage, next);
        if next != Stage::Failed {
            self.progress.inc(1);
        }
        self.progress.set_message(next.to_string());
        self.stage = next;
    }
}

/// Decode → frame → fan-out analysis → assemble.
///
/// Holds only configuration; every call is independent.
pub struct Pipeline {
    config: Config,
    enricher: Box<dyn Enricher>,
    progress: ProgressBar,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            enricher: Box::new(NoopEnricher),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_enricher(mut self, enricher: Box<dyn Enricher>) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Analyze a file. Failures are folded into a `success: false` report.
    pub fn analyze_file(&self, path: &Path, options: &AnalysisOptions) -> AnalysisReport {
        let cancel = options.deadline.map_or_else(CancelToken::new, CancelToken::with_timeout);
        self.analyze_file_with_cancel(path, options, &cancel)
    }

    pub fn analyze_file_with_cancel(
        &self,
        path: &Path,
        options: &AnalysisOptions,
        cancel: &CancelToken,
    ) -> AnalysisReport {
        let mut tracker = StageTracker::new(&self.progress, 4);
        let outcome = self.run_file(path, options, cancel, &mut tracker);
        self.finish(outcome, &mut tracker)
    }

    /// Analyze an already-decoded buffer.
    pub fn analyze_buffer(
        &self,
        buffer: &SampleBuffer,
        options: &AnalysisOptions,
        cancel: &CancelToken,
    ) -> AnalysisReport {
        let mut tracker = StageTracker::new(&self.progress, 3);
        let outcome = self.run_buffer(buffer, options, cancel, &mut tracker);
        self.finish(outcome, &mut tracker)
    }

    fn finish(&self, outcome: Result<AnalysisReport>, tracker: &mut StageTracker<'_>) -> AnalysisReport {
        match outcome {
            Ok(report) => {
                tracker.advance(Stage::Done);
                self.progress.finish_and_clear();
                report
            }
            Err(e) => {
                log::error!("Analysis failed during {}: {}", tracker.stage, e);
                tracker.advance(Stage::Failed);
                self.progress.abandon();
                AnalysisReport::failure(e.to_string())
            }
        }
    }

    fn run_file(
        &self,
        path: &Path,
        options: &AnalysisOptions,
        cancel: &CancelToken,
        tracker: &mut StageTracker<'_>,
    ) -> Result<AnalysisReport> {
        tracker.advance(Stage::Decoding);
        cancel.check("decoding")?;
        log::info!("Decoding {}", path.display());
        let buffer = guard("decoder", || audio::decode(path))?;
        self.run_buffer(&buffer, options, cancel, tracker)
    }

    fn run_buffer(
        &self,
        buffer: &SampleBuffer,
        options: &AnalysisOptions,
        cancel: &CancelToken,
        tracker: &mut StageTracker<'_>,
    ) -> Result<AnalysisReport> {
        let config = &self.config;
        config.validate()?;

        tracker.advance(Stage::Analyzing);
        cancel.check("framing")?;
        let analyzer = audio::analyze(buffer, config.analysis.window_size, config.analysis.hop_size)?;
        let frames = guard("frame analyzer", || Ok(analyzer.collect_parallel()))?;
        log::info!(
            "Framed {:.1}s of audio into {} windows ({} / {} hop)",
            buffer.duration_secs(),
            frames.len(),
            analyzer.window_size(),
            analyzer.hop_size()
        );

        cancel.check("analysis")?;
        let (metric_results, harmonic) = rayon::join(
            || {
                metrics::all_modules()
                    .par_iter()
                    .map(|module| metrics::run_module(*module, &frames, buffer, config, cancel))
                    .collect::<Result<Vec<MetricResult>>>()
            },
            || harmony::run_harmony(&frames, buffer, config, cancel),
        );
        let harmony = harmonic?;
        let [frequency_balance, dynamic_range, stereo_field, clarity, transients]: [MetricResult; 5] = metric_results?
            .try_into()
            .map_err(|_| AnalysisError::Internal("metric module count mismatch".into()))?;

        tracker.advance(Stage::Assembling);
        cancel.check("assembling")?;
        let results = ModuleResults {
            frequency_balance,
            dynamic_range,
            stereo_field,
            clarity,
            transients,
            harmony,
        };
        let report = report::assemble(&results, options, config);

        if !options.include_ai {
            return Ok(report);
        }
        match self.enricher.enrich(report.clone()) {
            Ok(enriched) => Ok(enriched),
            Err(e) => {
                log::warn!("Enricher '{}' failed, keeping core report: {}", self.enricher.name(), e);
                Ok(report)
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagging;

    impl Enricher for Tagging {
        fn name(&self) -> &'static str {
            "tagging"
        }

        fn enrich(&self, mut report: AnalysisReport) -> Result<AnalysisReport> {
            report.error = Some("tagged".into());
            Ok(report)
        }
    }

    struct Broken;

    impl Enricher for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn enrich(&self, _: AnalysisReport) -> Result<AnalysisReport> {
            Err(AnalysisError::Internal("provider offline".into()))
        }
    }

    fn tone_buffer(secs: f32) -> SampleBuffer {
        let len = (secs * 44100.0) as usize;
        let left: Vec<f32> = (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 330.0 * i as f32 / 44100.0).sin())
            .collect();
        let right: Vec<f32> = left.iter().map(|s| s * 0.8).collect();
        SampleBuffer::new(vec![left, right], 44100).unwrap()
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::Analyzing.to_string(), "analyzing");
        assert_eq!(Stage::Failed.to_string(), "failed");
    }

    #[test]
    fn buffer_analysis_produces_all_sections() {
        let report = Pipeline::default().analyze_buffer(
            &tone_buffer(2.0),
            &AnalysisOptions::default(),
            &CancelToken::new(),
        );
        assert!(report.success, "{:?}", report.error);
        assert!(report.frequency_balance.is_some());
        assert!(report.dynamic_range.is_some());
        assert!(report.stereo_field.is_some());
        assert!(report.clarity.is_some());
        assert!(report.harmonic_content.is_some());
        assert!(report.scores().iter().all(|s| (0.0..=100.0).contains(s)));
    }

    #[test]
    fn cancelled_run_is_a_failure() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = Pipeline::default().analyze_buffer(&tone_buffer(1.0), &AnalysisOptions::default(), &cancel);
        assert!(!report.success);
        assert!(report.error.unwrap().contains("cancelled"));
        assert!(report.frequency_balance.is_none());
    }

    #[test]
    fn invalid_config_fails_the_run() {
        let mut config = Config::default();
        config.analysis.hop_size = 0;
        let report = Pipeline::new(config).analyze_buffer(
            &tone_buffer(1.0),
            &AnalysisOptions::default(),
            &CancelToken::new(),
        );
        assert!(!report.success);
        assert!(report.error.unwrap().starts_with("Invalid configuration"));
    }

    #[test]
    fn enricher_runs_only_when_requested() {
        let pipeline = Pipeline::default().with_enricher(Box::new(Tagging));
        let buffer = tone_buffer(1.0);
        let plain = pipeline.analyze_buffer(&buffer, &AnalysisOptions::default(), &CancelToken::new());
        assert!(plain.error.is_none());

        let options = AnalysisOptions {
            include_ai: true,
            ..Default::default()
        };
        let enriched = pipeline.analyze_buffer(&buffer, &options, &CancelToken::new());
        assert_eq!(enriched.error.as_deref(), Some("tagged"));
    }

    #[test]
    fn enricher_failure_keeps_core_report() {
        let pipeline = Pipeline::default().with_enricher(Box::new(Broken));
        let options = AnalysisOptions {
            include_ai: true,
            ..Default::default()
        };
        let report = pipeline.analyze_buffer(&tone_buffer(1.0), &options, &CancelToken::new());
        assert!(report.success);
        assert!(report.error.is_none());
    }
}
