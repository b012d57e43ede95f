//! Offline mix analysis: decode an audio file, extract frame features and
//! score frequency balance, dynamics, stereo image, clarity, transients and
//! harmonic content into a JSON report.

pub mod audio;
pub mod cancel;
pub mod config;
pub mod enrich;
pub mod error;
pub mod harmony;
pub mod metrics;
pub mod pipeline;
pub mod report;

pub use cancel::CancelToken;
pub use config::Config;
pub use error::{AnalysisError, Result};
pub use pipeline::{AnalysisOptions, Pipeline, Stage};
pub use report::AnalysisReport;
