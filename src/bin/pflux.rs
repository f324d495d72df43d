//! pflux CLI - Command-line interface for Posture Flux
//!
//! Commands:
//! - run: Process streaming sample records from stdin (streaming mode)
//! - replay: Replay a recorded session file (batch mode)
//! - validate: Validate sample records
//! - doctor: Diagnose configuration and state files
//! - config: Print the effective tracker configuration

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use posture_flux::pipeline::{replay, StreamProcessor};
use posture_flux::schema::{SampleAdapter, SampleRecord, SCHEMA_VERSION};
use posture_flux::{TrackerConfig, TrackerError, FLUX_VERSION, PRODUCER_NAME};

/// pflux - Stable posture and gaze state from noisy per-frame classification
#[derive(Parser)]
#[command(name = "pflux")]
#[command(version = FLUX_VERSION)]
#[command(about = "Smooth posture classifier output into status updates", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Tracker settings shared by the processing commands
#[derive(Args, Clone)]
struct TrackerArgs {
    /// Load tracker configuration from a JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Majority-vote window size (overrides config)
    #[arg(long)]
    history_size: Option<usize>,

    /// Dwell time before a warning fires, in ms (overrides config)
    #[arg(long)]
    threshold_ms: Option<u64>,

    /// Contact label (overrides config)
    #[arg(long)]
    contact_label: Option<String>,
}

impl TrackerArgs {
    fn has_overrides(&self) -> bool {
        self.config.is_some()
            || self.history_size.is_some()
            || self.threshold_ms.is_some()
            || self.contact_label.is_some()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Process streaming sample records from stdin (streaming mode)
    Run {
        #[command(flatten)]
        tracker: TrackerArgs,

        /// Load tracker state from file
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save tracker state to file on exit
        #[arg(long)]
        save_state: Option<PathBuf>,

        /// Emit the session summary as the last output line
        #[arg(long)]
        summary: bool,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Replay a recorded session (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// What to emit
        #[arg(long, default_value = "summary")]
        emit: EmitKind,

        #[command(flatten)]
        tracker: TrackerArgs,
    },

    /// Validate sample records
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and state files
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a saved state file
        #[arg(long)]
        state: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective tracker configuration as JSON
    Config {
        #[command(flatten)]
        tracker: TrackerArgs,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum EmitKind {
    /// Session summary only
    Summary,
    /// One status update per record (NDJSON)
    Updates,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), PfluxCliError> {
    match cli.command {
        Commands::Run {
            tracker,
            load_state,
            save_state,
            summary,
            flush,
        } => cmd_run(
            &tracker,
            load_state.as_deref(),
            save_state.as_deref(),
            summary,
            flush,
        ),

        Commands::Replay {
            input,
            output,
            input_format,
            emit,
            tracker,
        } => cmd_replay(&input, &output, input_format, emit, &tracker),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor {
            config,
            state,
            json,
        } => cmd_doctor(config.as_deref(), state.as_deref(), json),

        Commands::Config { tracker } => {
            let config = resolve_config(&tracker)?;
            println!("{}", config.to_json()?);
            Ok(())
        }
    }
}

fn cmd_run(
    tracker: &TrackerArgs,
    load_state: Option<&Path>,
    save_state: Option<&Path>,
    summary: bool,
    flush: bool,
) -> Result<(), PfluxCliError> {
    let mut stream = open_stream(tracker, load_state)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let record: SampleRecord = serde_json::from_str(trimmed).map_err(|e| {
            PfluxCliError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;

        // A bad frame is skipped; the stream keeps going
        let update = match stream.process_record(&record) {
            Ok(update) => update,
            Err(e) => {
                log::warn!("skipping line {}: {}", line_num + 1, e);
                continue;
            }
        };

        writeln!(stdout, "{}", serde_json::to_string(&update)?)?;
        if flush {
            stdout.flush()?;
        }
    }

    if summary {
        match stream.summary() {
            Some(summary) => {
                writeln!(stdout, "{}", serde_json::to_string(&summary)?)?;
                stdout.flush()?;
            }
            None => log::warn!("no records processed, no summary to emit"),
        }
    }

    // Save state if requested
    if let Some(state_path) = save_state {
        match stream.processor() {
            Some(processor) => {
                fs::write(state_path, processor.save_state()?)?;
                log::info!("saved tracker state to {}", state_path.display());
            }
            None => log::warn!("no records processed, state not saved"),
        }
    }

    Ok(())
}

/// Start a fresh stream or resume one from saved state
fn open_stream(
    tracker: &TrackerArgs,
    load_state: Option<&Path>,
) -> Result<StreamProcessor, PfluxCliError> {
    let Some(state_path) = load_state else {
        return Ok(StreamProcessor::new(resolve_config(tracker)?)?);
    };

    // Saved state carries its own configuration
    if tracker.has_overrides() {
        return Err(PfluxCliError::ConflictingOptions(
            "--load-state restores the saved configuration and cannot be combined with \
             --config, --history-size, --threshold-ms or --contact-label"
                .to_string(),
        ));
    }

    let stream = StreamProcessor::resume(&fs::read_to_string(state_path)?)?;
    log::info!("loaded tracker state from {}", state_path.display());
    Ok(stream)
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    emit: EmitKind,
    tracker: &TrackerArgs,
) -> Result<(), PfluxCliError> {
    let config = resolve_config(tracker)?;
    let records = read_records(input, &input_format)?;

    if records.is_empty() {
        return Err(PfluxCliError::NoRecords);
    }

    let result = replay(&records, config)?;
    log::info!(
        "replayed {} records, final status '{}'",
        result.updates.len(),
        result
            .updates
            .last()
            .map(|u| u.snapshot.status.as_str())
            .unwrap_or("none")
    );

    let output_data = match emit {
        EmitKind::Summary => serde_json::to_string_pretty(&result.summary)? + "\n",
        EmitKind::Updates => {
            let mut lines: Vec<String> = Vec::with_capacity(result.updates.len());
            for update in &result.updates {
                lines.push(serde_json::to_string(update)?);
            }
            lines.join("\n") + "\n"
        }
    };

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), PfluxCliError> {
    let records = read_records(input, &input_format)?;
    let results = SampleAdapter::validate_records(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - results.len(),
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                sample_id: r.sample_id.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Record {} (index {}): {}",
                    err.sample_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(PfluxCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, state: Option<&Path>, json: bool) -> Result<(), PfluxCliError> {
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck {
            name: "flux_version".to_string(),
            status: CheckStatus::Ok,
            message: format!("Flux version {}", FLUX_VERSION),
        },
        DoctorCheck {
            name: "schema_version".to_string(),
            status: CheckStatus::Ok,
            message: format!("Input schema: {}", SCHEMA_VERSION),
        },
    ];

    if let Some(config_path) = config {
        checks.push(check_file(config_path, "config", |content| {
            TrackerConfig::from_json(content).map(|c| {
                format!(
                    "Config valid (historySize {}, threshold {}ms, {} labels)",
                    c.history_size,
                    c.not_contact_threshold_ms,
                    c.label_set.len()
                )
            })
        }));
    }

    if let Some(state_path) = state {
        checks.push(check_file(state_path, "state", |content| {
            posture_flux::PostureStateTracker::from_json(content).map(|t| {
                format!(
                    "State valid (status '{}', {}ms elapsed)",
                    t.current_status(),
                    t.ledger().total_elapsed_ms()
                )
            })
        }));
    }

    // Check stdin is available (for streaming mode)
    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (streaming mode ready)"
    };
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: stdin_message.to_string(),
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Flux Doctor Report");
        println!("==================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PfluxCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn resolve_config(args: &TrackerArgs) -> Result<TrackerConfig, PfluxCliError> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };

    if let Some(history_size) = args.history_size {
        config = config.with_history_size(history_size);
    }
    if let Some(threshold_ms) = args.threshold_ms {
        config = config.with_not_contact_threshold_ms(threshold_ms);
    }
    if let Some(label) = &args.contact_label {
        config = config.with_contact_label(label.as_str());
    }

    config.validate()?;
    Ok(config)
}

fn read_input(input: &Path) -> Result<String, PfluxCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_records(input: &Path, format: &InputFormat) -> Result<Vec<SampleRecord>, PfluxCliError> {
    let data = read_input(input)?;
    let records = match format {
        InputFormat::Ndjson => SampleAdapter::parse_ndjson(&data)?,
        InputFormat::Json => SampleAdapter::parse_array(&data)?,
    };
    Ok(records)
}

fn check_file<F>(path: &Path, name: &str, check: F) -> DoctorCheck
where
    F: FnOnce(&str) -> Result<String, TrackerError>,
{
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist", path.display()),
        };
    }

    match fs::read_to_string(path) {
        Ok(content) => match check(&content) {
            Ok(message) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Ok,
                message,
            },
            Err(e) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid {}: {}", name, e),
            },
        },
        Err(e) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read {} file: {}", name, e),
        },
    }
}

// Error types

#[derive(Debug)]
enum PfluxCliError {
    Io(io::Error),
    Tracker(TrackerError),
    Json(serde_json::Error),
    NoRecords,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
    ConflictingOptions(String),
}

impl From<io::Error> for PfluxCliError {
    fn from(e: io::Error) -> Self {
        PfluxCliError::Io(e)
    }
}

impl From<TrackerError> for PfluxCliError {
    fn from(e: TrackerError) -> Self {
        PfluxCliError::Tracker(e)
    }
}

impl From<serde_json::Error> for PfluxCliError {
    fn from(e: serde_json::Error) -> Self {
        PfluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PfluxCliError> for CliError {
    fn from(e: PfluxCliError) -> Self {
        match e {
            PfluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PfluxCliError::Tracker(TrackerError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'pflux config' to see the effective configuration".to_string()),
            },
            PfluxCliError::Tracker(e) => CliError {
                code: "TRACKER_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input matches the posture.sample.v1 schema".to_string()),
            },
            PfluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PfluxCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No sample records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PfluxCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            PfluxCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            PfluxCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
            PfluxCliError::ConflictingOptions(msg) => CliError {
                code: "CONFLICTING_OPTIONS".to_string(),
                message: msg,
                hint: Some("Start a new session to change tracker settings".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    sample_id: Option<String>,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_overrides() -> TrackerArgs {
        TrackerArgs {
            config: None,
            history_size: None,
            threshold_ms: None,
            contact_label: None,
        }
    }

    #[test]
    fn test_load_state_rejects_tracker_overrides() {
        let args = TrackerArgs {
            history_size: Some(3),
            ..no_overrides()
        };
        let result = open_stream(&args, Some(Path::new("state.json")));
        assert!(matches!(result, Err(PfluxCliError::ConflictingOptions(_))));

        let args = TrackerArgs {
            contact_label: Some("looking_down".to_string()),
            ..no_overrides()
        };
        let result = open_stream(&args, Some(Path::new("state.json")));
        assert!(matches!(result, Err(PfluxCliError::ConflictingOptions(_))));
    }

    #[test]
    fn test_fresh_stream_applies_overrides() {
        let args = TrackerArgs {
            history_size: Some(3),
            threshold_ms: Some(500),
            ..no_overrides()
        };
        let stream = open_stream(&args, None).unwrap();
        // nothing processed yet, so the session has not started
        assert!(stream.processor().is_none());
        assert!(stream.summary().is_none());
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = TrackerArgs {
            history_size: Some(0),
            ..no_overrides()
        };
        assert!(matches!(
            open_stream(&args, None),
            Err(PfluxCliError::Tracker(TrackerError::InvalidConfig(_)))
        ));
    }
}
