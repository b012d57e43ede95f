use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use mixscope::AnalysisOptions;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "analyze_mix", version, about = "Analyze a mixdown and report mix quality metrics as JSON")]
pub struct Cli {
    /// Input audio file (MP3, WAV, FLAC, AAC, OGG, M4A)
    pub input: Option<PathBuf>,

    /// Include transients, full notes and key candidates
    #[arg(long)]
    pub detailed: bool,

    /// Run the optional insight enrichment stage
    #[arg(long)]
    pub include_ai: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Also write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Analysis config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Abort the analysis after this many seconds
    #[arg(long, value_parser = parse_timeout)]
    pub timeout: Option<f64>,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn options(&self) -> AnalysisOptions {
        AnalysisOptions {
            detailed: self.detailed,
            include_ai: self.include_ai,
            output_path: self.output.clone(),
            // Timeouts beyond what a Duration can hold mean no deadline
            deadline: self.timeout.and_then(|t| Duration::try_from_secs_f64(t).ok()),
        }
    }
}

fn parse_timeout(raw: &str) -> Result<f64, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("`{}` is not a number of seconds", raw))?;
    if secs.is_nan() || secs < 0.0 {
        return Err(format!("timeout must be a non-negative number of seconds, got {}", raw));
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapper_invocation() {
        let cli = Cli::try_parse_from([
            "analyze_mix",
            "/tmp/mix.wav",
            "--detailed",
            "--include-ai",
            "--format",
            "json",
            "--output",
            "/tmp/report.json",
        ])
        .unwrap();
        assert_eq!(cli.input.as_deref(), Some(std::path::Path::new("/tmp/mix.wav")));
        assert_eq!(cli.format, OutputFormat::Json);

        let options = cli.options();
        assert!(options.detailed);
        assert!(options.include_ai);
        assert_eq!(options.output_path, Some(PathBuf::from("/tmp/report.json")));
        assert!(options.deadline.is_none());
    }

    #[test]
    fn defaults_are_brief_json() {
        let cli = Cli::try_parse_from(["analyze_mix", "song.mp3"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(!cli.options().detailed);
    }

    #[test]
    fn timeout_becomes_deadline() {
        let cli = Cli::try_parse_from(["analyze_mix", "a.wav", "--timeout", "1.5"]).unwrap();
        assert_eq!(cli.options().deadline, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn huge_timeout_means_no_deadline() {
        let cli = Cli::try_parse_from(["analyze_mix", "a.wav", "--timeout", "1e30"]).unwrap();
        assert_eq!(cli.options().deadline, None);
        let cli = Cli::try_parse_from(["analyze_mix", "a.wav", "--timeout", "inf"]).unwrap();
        assert_eq!(cli.options().deadline, None);
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["analyze_mix", "a.wav", "--timeout=-1"]).is_err());
        assert!(Cli::try_parse_from(["analyze_mix", "a.wav", "--timeout", "NaN"]).is_err());
        assert!(Cli::try_parse_from(["analyze_mix", "a.wav", "--timeout", "soon"]).is_err());
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(Cli::try_parse_from(["analyze_mix", "a.wav", "--format", "xml"]).is_err());
    }
}
