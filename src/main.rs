//! Hepatorisk: liver disease risk scoring
//!
//! Main entry point for the command-line tool.

use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hepatorisk::adapters::ModelRegistry;
use hepatorisk::application::{render_text, to_json, AssessmentService};
use hepatorisk::config::{LogMode, Settings};
use hepatorisk::domain::ocr::map_ocr_fields;
use hepatorisk::domain::{validation_bounds, LabRecord, RawLabRecord, SamplePatient};
use hepatorisk::HepatoriskError;

/// Exit code for input the user can correct.
const EXIT_INVALID_INPUT: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "hepatorisk", version, about = "Liver disease risk scoring from lab values")]
struct Cli {
    /// Model artifact directory (overrides HEPATORISK_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assess a lab record read from a JSON file, or `-` for stdin
    Assess {
        input: String,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Input holds report labels as extracted from a scanned lab sheet
        #[arg(long)]
        ocr: bool,
    },
    /// Print a built-in sample record as JSON
    Sample {
        #[arg(value_parser = clap::value_parser!(SamplePatient))]
        patient: SamplePatient,
    },
    /// Print the validation bounds of every lab field as JSON
    Bounds,
    /// List loaded and unavailable models
    Models {
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut settings = Settings::from_env();
    if let Some(dir) = cli.model_dir {
        settings.model_dir = dir;
    }

    let _guard = init_logging(&settings)?;
    tracing::debug!("Model directory: {:?}", settings.model_dir);

    match cli.command {
        Command::Assess { input, format, ocr } => assess(&settings, &input, format, ocr),
        Command::Sample { patient } => {
            let record = patient.record()?;
            println!("{}", serde_json::to_string_pretty(&record.to_raw())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Bounds => {
            println!("{}", serde_json::to_string_pretty(validation_bounds())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Models { format } => {
            let registry = load_registry(&settings)?;
            let status = registry.status();
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&status)?),
                Format::Text => {
                    for s in status {
                        match (s.available, s.version, s.reason) {
                            (true, Some(version), _) => println!("{:<10} loaded  {version}", s.model),
                            (_, _, reason) => println!(
                                "{:<10} unavailable  {}",
                                s.model,
                                reason.unwrap_or_default()
                            ),
                        }
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

// Logs never go to stdout: reports and JSON are printed there.
fn init_logging(settings: &Settings) -> Result<WorkerGuard> {
    let (writer, guard) = if settings.log_mode == LogMode::File {
        if let Some(parent) = settings.log_file.parent() {
            // Best-effort: the open below reports the real failure.
            let _ = fs::create_dir_all(parent);
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&settings.log_file)
            .with_context(|| format!("cannot open log file {:?}", settings.log_file))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Ok(guard)
}

fn load_registry(settings: &Settings) -> hepatorisk::Result<ModelRegistry> {
    let policy = settings.artifact_policy()?;
    Ok(ModelRegistry::load_from_dir(&settings.model_dir, &policy))
}

fn read_record(input: &str, ocr: bool) -> hepatorisk::Result<RawLabRecord> {
    let text = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(input)?
    };

    if !ocr {
        return Ok(serde_json::from_str(&text)?);
    }
    let extracted: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text)?;
    let (raw, unmapped) = map_ocr_fields(&extracted)?;
    if !unmapped.is_empty() {
        tracing::info!("Ignored {} unrecognized report labels", unmapped.len());
    }
    Ok(raw)
}

fn assess(settings: &Settings, input: &str, format: Format, ocr: bool) -> Result<ExitCode> {
    let raw = match read_record(input, ocr) {
        Ok(raw) => raw,
        Err(HepatoriskError::Validation(e)) => {
            eprintln!("error: {e}");
            return Ok(ExitCode::from(EXIT_INVALID_INPUT));
        }
        Err(e) => return Err(e).with_context(|| format!("cannot read lab record from {input}")),
    };

    let problems = LabRecord::check_raw(&raw);
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("error: {problem}");
        }
        return Ok(ExitCode::from(EXIT_INVALID_INPUT));
    }

    let service = AssessmentService::new(Arc::new(load_registry(settings)?));
    let report = match service.assess_raw(&raw).map_err(HepatoriskError::from) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(ExitCode::from(EXIT_INVALID_INPUT));
        }
    };

    match format {
        Format::Text => print!("{}", render_text(&report)),
        Format::Json => println!("{}", to_json(&report)?),
    }
    Ok(ExitCode::SUCCESS)
}
