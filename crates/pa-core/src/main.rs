//! pa-core - foreign-process argument and environment extraction
//!
//! The main entry point for pa-core, handling:
//! - Extraction of one process's argv/envp from its address space
//! - Pointer geometry checks without touching the target
//! - Configuration inspection

use clap::{Args, Parser, Subcommand};
use pa_common::{OutputFormat, ProcessId, StructuredError, SCHEMA_VERSION};
use pa_core::config::{load_config, ConfigError, ConfigOptions, ResolvedConfig};
use pa_core::exit_codes::ExitCode;
use pa_core::log_event;
use pa_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    LogLevel, Stage,
};
use pa_core::procmem::{
    validate_geometry, ExtractionReport, ProcessArgsEnvReader, ProcessSummary, ProcfsOpener,
    DEFAULT_MEMORY_FILE, DEFAULT_PROC_ROOT,
};
use serde::Serialize;
use std::path::PathBuf;

/// Read another process's arguments and environment from its memory
#[derive(Parser)]
#[command(name = "pa-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (overrides PA_CONFIG and the XDG location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Log format on stderr
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract arguments and environment of one process
    Extract(ExtractArgs),
    /// Check summary geometry without opening the process
    CheckGeometry(SummaryArgs),
    /// Configuration commands
    Config(ConfigArgs),
    /// Print version information
    Version,
}

/// The summary record describing the target's tables
#[derive(Args, Debug, Clone)]
struct SummaryArgs {
    /// Argument count
    #[arg(long, allow_negative_numbers = true)]
    argc: i32,

    /// Address of argv[0] (0x-prefixed hex or decimal)
    #[arg(long, value_parser = parse_address)]
    argv: u64,

    /// Address of envp[0] (0x-prefixed hex or decimal)
    #[arg(long, value_parser = parse_address)]
    envp: u64,

    /// Claimed pointer width of the target (32 or 64)
    #[arg(long)]
    pointer_bits: u32,
}

impl SummaryArgs {
    fn summary(&self) -> ProcessSummary {
        ProcessSummary::new(self.argc, self.argv, self.envp, self.pointer_bits)
    }
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Target process ID
    #[arg(long)]
    pid: u32,

    #[command(flatten)]
    summary: SummaryArgs,

    /// procfs mount point
    #[arg(long, default_value = DEFAULT_PROC_ROOT)]
    proc_root: PathBuf,

    /// Address-space file under <proc-root>/<pid>/
    #[arg(long, default_value = DEFAULT_MEMORY_FILE)]
    file_name: String,

    /// Override the configured cache page size
    #[arg(long)]
    page_size: Option<usize>,

    /// Override the configured environment cap
    #[arg(long)]
    env_cap: Option<usize>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show,
}

fn main() {
    let cli = Cli::parse();

    let cli_level = (cli.global.verbose > 0 || cli.global.quiet > 0)
        .then(|| LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet));
    let log_config = LogConfig::from_env(cli_level, cli.global.log_format);
    init_logging(&log_config);

    let ctx = LogContext::new(generate_run_id(), get_host_id());
    let span = tracing::info_span!("run", run_id = %ctx.run_id, host_id = %ctx.host_id);
    let _guard = span.enter();

    let exit_code = match &cli.command {
        Commands::Extract(args) => run_extract(&cli.global, &ctx, args),
        Commands::CheckGeometry(args) => run_check_geometry(&cli.global, &ctx, args),
        Commands::Config(args) => match args.command {
            ConfigCommands::Show => run_config_show(&cli.global, &ctx),
        },
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    log_event!(
        ctx,
        DEBUG,
        event_names::RUN_FINISHED,
        Stage::Report,
        "run finished",
        exit_code = exit_code.as_i32()
    );

    drop(_guard);
    std::process::exit(exit_code.as_i32());
}

/// Parse `0x`-prefixed hex or decimal.
fn parse_address(raw: &str) -> Result<u64, String> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => raw.replace('_', "").parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid address {:?}: {}", raw, e))
}

// ============================================================================
// Command implementations
// ============================================================================

fn resolve_config(global: &GlobalOpts, ctx: &LogContext) -> Result<ResolvedConfig, ConfigError> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
    };
    let resolved = load_config(&options)?;
    if resolved.path.is_some() {
        log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "configuration loaded",
            source = tracing::field::display(resolved.source)
        );
    } else {
        log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "no config file, using defaults"
        );
    }
    Ok(resolved)
}

fn run_extract(global: &GlobalOpts, ctx: &LogContext, args: &ExtractArgs) -> ExitCode {
    let resolved = match resolve_config(global, ctx) {
        Ok(resolved) => resolved,
        Err(e) => return output_config_error(global, ctx, &e),
    };

    let mut config = resolved.config;
    if let Some(page_size) = args.page_size {
        config.page_size = Some(page_size);
    }
    if let Some(env_cap) = args.env_cap {
        config.env_cap = env_cap;
    }
    if let Err(e) = config.validate() {
        return output_config_error(global, ctx, &e);
    }

    let pid = ProcessId(args.pid);
    let opener = ProcfsOpener::with_root(&args.proc_root, &args.file_name);
    let reader = ProcessArgsEnvReader::new(opener, config);

    log_event!(
        ctx,
        INFO,
        event_names::RUN_STARTED,
        Stage::Init,
        "starting extraction",
        pid = pid.as_u32(),
        page_size = reader.page_size(),
        env_cap = config.env_cap
    );

    let report = reader.extract_with_report(pid, &args.summary.summary());
    let exit_code = ExitCode::from_outcome(report.outcome);
    output_report(global, ctx, &report);
    exit_code
}

fn output_report(global: &GlobalOpts, ctx: &LogContext, report: &ExtractionReport) {
    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            emit_document(global, &envelope(ctx, "extract", report));
        }
        OutputFormat::Summary => {
            println!(
                "pid {}: {} ({} arguments, {} environment variables, {} page reads)",
                report.pid,
                report.outcome,
                report.result.arguments.len(),
                report.result.environment.len(),
                report.stats.page_reads
            );
            if !report.result.arguments.is_empty() {
                println!("{}", report.result.command_line());
            }
        }
    }
}

#[derive(Serialize)]
struct GeometryCheck {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stride: Option<pa_core::procmem::PointerStride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<StructuredError>,
}

fn run_check_geometry(global: &GlobalOpts, ctx: &LogContext, args: &SummaryArgs) -> ExitCode {
    let (check, exit_code) = match validate_geometry(&args.summary()) {
        Ok(stride) => (
            GeometryCheck {
                valid: true,
                stride: Some(stride),
                error: None,
            },
            ExitCode::Clean,
        ),
        Err(e) => (
            GeometryCheck {
                valid: false,
                stride: None,
                error: Some(StructuredError::from(&e)),
            },
            ExitCode::from_error(&e),
        ),
    };

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            emit_document(global, &envelope(ctx, "check-geometry", &check));
        }
        OutputFormat::Summary => match (&check.stride, &check.error) {
            (Some(stride), _) => println!("geometry consistent: {}", stride),
            (_, Some(error)) => println!("geometry inconsistent: {}", error.message),
            _ => {}
        },
    }
    exit_code
}

fn run_config_show(global: &GlobalOpts, ctx: &LogContext) -> ExitCode {
    let resolved = match resolve_config(global, ctx) {
        Ok(resolved) => resolved,
        Err(e) => return output_config_error(global, ctx, &e),
    };

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            emit_document(global, &envelope(ctx, "config show", &resolved));
        }
        OutputFormat::Summary => {
            println!(
                "source: {} ({})",
                resolved.source,
                resolved
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "built-in".to_string())
            );
            println!("page_size: {}", resolved.effective_page_size);
            println!("env_cap: {}", resolved.config.env_cap);
        }
    }
    ExitCode::Clean
}

fn output_config_error(global: &GlobalOpts, ctx: &LogContext, error: &ConfigError) -> ExitCode {
    log_event!(
        ctx,
        ERROR,
        event_names::CONFIG_ERROR,
        Stage::Init,
        "configuration rejected",
        error = tracing::field::display(error)
    );

    let exit_code = match error {
        ConfigError::IoError { .. } => ExitCode::IoError,
        _ => ExitCode::ConfigError,
    };
    let structured = StructuredError::from(&pa_common::Error::Config(error.to_string()));

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": "error",
                "error": structured,
            });
            let rendered = if global.format == OutputFormat::Json {
                serde_json::to_string_pretty(&response)
            } else {
                serde_json::to_string(&response)
            };
            match rendered {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("config error: {}", error),
            }
        }
        OutputFormat::Summary => {
            eprintln!("config error: {}", error);
        }
    }

    exit_code
}

fn envelope<T: Serialize>(ctx: &LogContext, command: &str, payload: &T) -> serde_json::Value {
    serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "run_id": ctx.run_id,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "command": command,
        "data": payload,
    })
}

fn emit_document(global: &GlobalOpts, doc: &serde_json::Value) {
    let rendered = if global.format == OutputFormat::Jsonl {
        serde_json::to_string(doc)
    } else {
        serde_json::to_string_pretty(doc)
    };
    match rendered {
        Ok(text) => println!("{}", text),
        Err(e) => tracing::error!(target: "internal_error", error = %e, "failed to render output"),
    }
}

fn print_version(global: &GlobalOpts) {
    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let version_info = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "pa_core_version": env!("CARGO_PKG_VERSION"),
                "rust_version": env!("CARGO_PKG_RUST_VERSION"),
            });
            emit_document(global, &version_info);
        }
        OutputFormat::Summary => {
            println!("pa-core {}", env!("CARGO_PKG_VERSION"));
            println!("schema version: {}", SCHEMA_VERSION);
        }
    }
}
