use crate::error::Result;
use crate::report::AnalysisReport;

/// Optional post-assembly stage enabled by `--include-ai`.
///
/// Implementations receive the finished report and return the report to
/// emit. They must not touch scores computed by the core pipeline.
pub trait Enricher: Send + Sync {
    fn name(&self) -> &'static str;

    fn enrich(&self, report: AnalysisReport) -> Result<AnalysisReport>;
}

/// Default enricher: no insight provider is bundled, so the report passes through.
pub struct NoopEnricher;

impl Enricher for NoopEnricher {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn enrich(&self, report: AnalysisReport) -> Result<AnalysisReport> {
        log::info!("--include-ai requested but no insight provider is configured; report unchanged");
        Ok(report)
    }
}
