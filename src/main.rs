mod cli;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::process::ExitCode;

use cli::Cli;
use mixscope::config;
use mixscope::{AnalysisReport, Pipeline};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Callers parse stdout as JSON, so argument errors are reported there too
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let message = e.to_string();
            emit_failure(message.trim());
            return ExitCode::from(2);
        }
    };

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            emit_failure(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let Some(input) = cli.input.as_ref() else {
        emit_failure("Input audio file is required");
        return Ok(ExitCode::from(2));
    };

    let config = match config::find_config(cli.config.as_deref()) {
        Some(path) => {
            let cfg = config::load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => config::Config::default(),
    };

    let options = cli.options();

    log::info!("analyze_mix - offline mix analysis");
    log::info!("Input: {}", input.display());
    if let Some(ref output) = options.output_path {
        log::info!("Output: {}", output.display());
    }

    let pipeline = Pipeline::new(config).with_progress(progress_bar(cli.quiet));
    let report = pipeline.analyze_file(input, &options);
    let rendered = report.render().context("Failed to serialize report")?;

    if report.success {
        if let Some(ref output) = options.output_path {
            std::fs::write(output, &rendered)
                .with_context(|| format!("Failed to write report to {}", output.display()))?;
        }
    }

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .and_then(|_| stdout.flush())
        .context("Failed to write report to stdout")?;

    if report.success {
        log::info!("Done!");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(4);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

fn emit_failure(message: &str) {
    let report = AnalysisReport::failure(message);
    let rendered = report
        .render()
        .unwrap_or_else(|_| "{\"success\":false,\"error\":\"internal serialization failure\"}\n".into());
    // Nothing left to report to if stdout is gone
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(rendered.as_bytes()).and_then(|_| stdout.flush());
}
