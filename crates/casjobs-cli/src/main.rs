// crates/casjobs-cli/src/main.rs
// ============================================================================
// Module: CasJobs CLI Entry Point
// Description: Command dispatcher for CasJobs queries, jobs, and tables.
// Purpose: Expose every client operation as a subcommand of `casjobs`.
// Dependencies: casjobs-client, casjobs-config, clap, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The `casjobs` binary loads `casjobs.toml`, builds a client from it, and
//! runs one operation per invocation. Results go to stdout; errors go to
//! stderr with a failure exit code.
//! Security posture: tokens passed with `--token` are only sent to the
//! configured service and never echoed.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use casjobs_client::CasJobsClient;
use casjobs_client::CasJobsError;
use casjobs_client::ConsoleProgress;
use casjobs_client::JobId;
use casjobs_client::NoProgress;
use casjobs_client::QueryOutput;
use casjobs_client::ResultFormat;
use casjobs_client::StaticToken;
use casjobs_config::ClientConfig;
use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a CSV file accepted by `upload`.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "casjobs", version, about = "Command-line client for CasJobs")]
struct Cli {
    /// Optional config file path (defaults to casjobs.toml or `CASJOBS_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Auth token, taking precedence over configured token sources.
    #[arg(long, value_name = "TOKEN", global = true)]
    token: Option<String>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the caller's schema name in the scratch database.
    Schema,
    /// List the tables of a database context.
    Tables(ContextArgs),
    /// Run a synchronous query.
    Query(QueryCommand),
    /// Submit an asynchronous job and print its id.
    Submit(SubmitCommand),
    /// Print the status record of a job.
    Status(JobCommand),
    /// Print the status records of previous jobs.
    History,
    /// Wait for a job to finish and print its final record.
    Wait(WaitCommand),
    /// Upload a CSV file as a new table.
    Upload(UploadCommand),
}

/// Database context selection.
#[derive(Args, Debug)]
struct ContextArgs {
    /// Database context (defaults to `jobs.default_context`).
    #[arg(long, value_name = "CONTEXT")]
    context: Option<String>,
}

/// Arguments for `query`.
#[derive(Args, Debug)]
struct QueryCommand {
    /// SQL text.
    #[arg(value_name = "SQL")]
    sql: String,
    /// Database context.
    #[command(flatten)]
    context: ContextArgs,
    /// Result format: pandas, csv, readable, fits, or json.
    #[arg(long, value_name = "FORMAT", default_value = "csv")]
    format: String,
    /// Write the result to this file instead of stdout (required for fits).
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

/// Arguments for `submit`.
#[derive(Args, Debug)]
struct SubmitCommand {
    /// SQL text.
    #[arg(value_name = "SQL")]
    sql: String,
    /// Database context.
    #[command(flatten)]
    context: ContextArgs,
}

/// Arguments for `status`.
#[derive(Args, Debug)]
struct JobCommand {
    /// Job id returned by `submit`.
    #[arg(value_name = "JOB_ID")]
    job_id: i64,
}

/// Arguments for `wait`.
#[derive(Args, Debug)]
struct WaitCommand {
    /// Job id returned by `submit`.
    #[arg(value_name = "JOB_ID")]
    job_id: i64,
    /// Suppress the progress indicator on stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    quiet: bool,
    /// Give up after this many milliseconds (overrides `jobs.max_wait_ms`).
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,
}

/// Arguments for `upload`.
#[derive(Args, Debug)]
struct UploadCommand {
    /// Name of the table to create.
    #[arg(value_name = "TABLE")]
    table: String,
    /// CSV file with a header row.
    #[arg(long, value_name = "PATH")]
    file: PathBuf,
    /// Database context.
    #[command(flatten)]
    context: ContextArgs,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl From<CasJobsError> for CliError {
    fn from(err: CasJobsError) -> Self {
        Self::new(err.to_string())
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let session = Session::open(cli.config.as_deref(), cli.token)?;
    match cli.command {
        Commands::Schema => command_schema(&session),
        Commands::Tables(args) => command_tables(&session, &args),
        Commands::Query(command) => command_query(&session, command),
        Commands::Submit(command) => command_submit(&session, &command),
        Commands::Status(command) => command_status(&session, &command),
        Commands::History => command_history(&session),
        Commands::Wait(command) => command_wait(&session, &command),
        Commands::Upload(command) => command_upload(&session, &command),
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Loaded configuration and the client built from it.
struct Session {
    /// Validated configuration.
    config: ClientConfig,
    /// Configured client.
    client: CasJobsClient,
}

impl Session {
    /// Loads configuration and builds the client.
    fn open(config_path: Option<&Path>, token: Option<String>) -> CliResult<Self> {
        let config = ClientConfig::load(config_path)
            .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
        let mut builder = config.client_builder().map_err(|err| CliError::new(err.to_string()))?;
        if let Some(token) = token {
            builder = builder.token_provider(Arc::new(StaticToken::new(token)));
        }
        let client = builder.build()?;
        Ok(Self {
            config,
            client,
        })
    }

    /// Returns the requested context or the configured default.
    fn context(&self, args: &ContextArgs) -> String {
        args.context.clone().unwrap_or_else(|| self.config.jobs.default_context.clone())
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes the `schema` command.
fn command_schema(session: &Session) -> CliResult<ExitCode> {
    let schema = session.client.schema_name()?;
    write_stdout_line(&schema).map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `tables` command.
fn command_tables(session: &Session, args: &ContextArgs) -> CliResult<ExitCode> {
    let tables = session.client.tables(&session.context(args))?;
    let value = serde_json::to_value(&tables)
        .map_err(|err| CliError::new(format!("failed to render tables: {err}")))?;
    write_json_value(&value)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `query` command.
fn command_query(session: &Session, command: QueryCommand) -> CliResult<ExitCode> {
    let format: ResultFormat = command.format.parse()?;
    let context = session.context(&command.context);
    if format == ResultFormat::Fits {
        let path = require_fits_output(command.output.as_deref())?;
        session.client.fits_file_from_query(path, &command.sql, &context)?;
        write_stdout_line(&path.display().to_string())
            .map_err(|err| output_error("stdout", &err))?;
        return Ok(ExitCode::SUCCESS);
    }
    let output = session.client.execute_query(&command.sql, &context, format)?;
    let bytes = render_output(output)?;
    match command.output {
        Some(path) => fs::write(&path, &bytes).map_err(|err| {
            CliError::new(format!("failed to write {}: {err}", path.display()))
        })?,
        None => write_stdout_bytes(&bytes).map_err(|err| output_error("stdout", &err))?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes the `submit` command.
fn command_submit(session: &Session, command: &SubmitCommand) -> CliResult<ExitCode> {
    let job_id = session.client.submit_job(&command.sql, &session.context(&command.context))?;
    write_stdout_line(&job_id.to_string()).map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `status` command.
fn command_status(session: &Session, command: &JobCommand) -> CliResult<ExitCode> {
    let status = session.client.job_status(JobId::new(command.job_id))?;
    write_json_value(status.record())?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `history` command.
fn command_history(session: &Session) -> CliResult<ExitCode> {
    let history = session.client.job_history()?;
    write_json_value(&history)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `wait` command.
fn command_wait(session: &Session, command: &WaitCommand) -> CliResult<ExitCode> {
    let mut options = session.config.wait_options();
    if let Some(timeout_ms) = command.timeout_ms {
        options = options.with_timeout(Duration::from_millis(timeout_ms));
    }
    let job_id = JobId::new(command.job_id);
    let status = if command.quiet {
        session.client.wait_for_job(job_id, &options, &mut NoProgress)?
    } else {
        let mut progress = ConsoleProgress::new(std::io::stderr());
        session.client.wait_for_job(job_id, &options, &mut progress)?
    };
    write_json_value(status.record())?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `upload` command.
fn command_upload(session: &Session, command: &UploadCommand) -> CliResult<ExitCode> {
    let bytes = read_bytes_with_limit(&command.file, MAX_UPLOAD_BYTES).map_err(|err| match err {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read {}: {err}", command.file.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{} is too large to upload ({size} > {limit} bytes)",
            command.file.display()
        )),
    })?;
    session.client.upload_csv(bytes, &command.table, &session.context(&command.context))?;
    write_stdout_line(&format!("uploaded {}", command.table))
        .map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Returns the output path that a FITS query requires.
fn require_fits_output(output: Option<&Path>) -> CliResult<&Path> {
    output.ok_or_else(|| CliError::new("--format fits requires --output PATH".to_string()))
}

/// Renders a query result as the bytes written to stdout or a file.
fn render_output(output: QueryOutput) -> CliResult<Vec<u8>> {
    match output {
        QueryOutput::Readable(text) => Ok(text.into_string().into_bytes()),
        QueryOutput::Csv(text) => Ok(text.into_bytes()),
        QueryOutput::Frame(frame) => json_bytes(&frame.to_split_json()),
        QueryOutput::Json(value) => json_bytes(&value),
        QueryOutput::Fits(blob) => Ok(blob.into_bytes()),
    }
}

/// Serializes JSON with a trailing newline.
fn json_bytes(value: &Value) -> CliResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render json: {err}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors raised while reading bounded input files.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)?;
    stdout.flush()
}

/// Writes a JSON value to stdout.
fn write_json_value(value: &Value) -> CliResult<()> {
    let bytes = json_bytes(value)?;
    write_stdout_bytes(&bytes).map_err(|err| output_error("stdout", &err))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output failure.
fn output_error(stream: &str, error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write to {stream}: {error}"))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
