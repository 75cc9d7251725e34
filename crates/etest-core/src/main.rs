//! etest - two-sample Poisson E-test
//!
//! Entry point for the `etest` binary:
//! - `pvalue`: E-test p-value for two observed counts
//! - `calibrate`: empirical false-positive rate by simulation
//! - `walk`: inspect the truncated mode-centered Poisson walk

use clap::{Args, Parser, Subcommand};
use etest_core::calibrate::run_calibration;
use etest_core::config::{load_config, ConfigError, ConfigOptions, CONFIG_ENV_VAR};
use etest_core::etest::{EtestInput, Sidedness};
use etest_core::exit_codes::ExitCode;
use etest_core::log_event;
use etest_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use etest_core::output::{
    error_envelope, render_calibration, render_pvalue, render_walk, OutputFormat, WalkListing,
    SCHEMA_VERSION,
};
use etest_math::{ModeCenteredWalk, DEFAULT_TRUNCATION};
use std::path::PathBuf;

/// Unconditional E-test for comparing two Poisson rates
#[derive(Parser)]
#[command(name = "etest")]
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
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all log output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the E-test p-value for two observed counts
    Pvalue(PvalueArgs),

    /// Estimate the test's false-positive rate by simulation
    Calibrate(CalibrateArgs),

    /// List the retained terms of the mode-centered Poisson walk
    Walk(WalkArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct PvalueArgs {
    /// Count observed in sample 1
    k1: u64,

    /// Count observed in sample 2
    k2: u64,

    /// Exposure of sample 1
    #[arg(long, default_value_t = 1.0)]
    n1: f64,

    /// Exposure of sample 2
    #[arg(long, default_value_t = 1.0)]
    n2: f64,

    /// Hypothesized difference of rates (rate1 - d = rate2 under H0)
    #[arg(short = 'd', long = "difference", default_value_t = 0.0, allow_negative_numbers = true)]
    difference: f64,

    /// Test sidedness
    #[arg(long, value_enum, default_value_t = Sidedness::TwoTail)]
    side: Sidedness,

    /// Probability floor at which each Poisson walk stops
    #[arg(long, default_value_t = DEFAULT_TRUNCATION)]
    truncation: f64,

    /// Significance level; exit 1 when p < alpha
    #[arg(long)]
    alpha: Option<f64>,

    /// Fail instead of clamping when the summed mass leaves [0, 1]
    #[arg(long)]
    strict: bool,
}

#[derive(Args, Debug)]
struct CalibrateArgs {
    /// Calibration config file (TOML)
    #[arg(long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Smallest candidate true rate
    #[arg(long)]
    mu_lower: Option<f64>,

    /// Largest candidate true rate (inclusive)
    #[arg(long)]
    mu_upper: Option<f64>,

    /// Spacing between candidate rates
    #[arg(long)]
    step: Option<f64>,

    /// Simulated experiments per candidate rate
    #[arg(long)]
    trials: Option<u64>,

    /// Significance level counted as a false positive
    #[arg(long)]
    alpha: Option<f64>,

    /// Exposure of sample 1
    #[arg(long)]
    n1: Option<f64>,

    /// Exposure of sample 2
    #[arg(long)]
    n2: Option<f64>,

    /// Base RNG seed (entropy when absent)
    #[arg(long)]
    seed: Option<u64>,

    /// Evaluate candidate rates on the current thread only
    #[arg(long)]
    serial: bool,

    /// Plot width in columns (Markdown output)
    #[arg(long, default_value_t = 50)]
    plot_width: usize,

    /// Plot height in rows (Markdown output)
    #[arg(long, default_value_t = 12)]
    plot_height: usize,
}

#[derive(Args, Debug)]
struct WalkArgs {
    /// Poisson rate
    lambda: f64,

    /// Probability floor at which the walk stops
    #[arg(long, default_value_t = DEFAULT_TRUNCATION)]
    truncation: f64,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = if e.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            std::process::exit(code.as_i32());
        }
    };

    let cli_level = (cli.global.verbose > 0 || cli.global.quiet)
        .then(|| LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet));
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let ctx = LogContext::new(generate_run_id());
    log_event!(ctx, DEBUG, event_names::RUN_STARTED, Stage::Init, "etest started");

    let exit_code = match &cli.command {
        Commands::Pvalue(args) => run_pvalue(&cli.global, &ctx, args),
        Commands::Calibrate(args) => run_calibrate(&cli.global, &ctx, args),
        Commands::Walk(args) => run_walk(&cli.global, &ctx, args),
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
        "etest finished",
        exit_code = exit_code.code_name()
    );
    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_pvalue(global: &GlobalOpts, ctx: &LogContext, args: &PvalueArgs) -> ExitCode {
    if let Some(alpha) = args.alpha {
        if !(alpha > 0.0 && alpha < 1.0) {
            return output_error(
                global,
                ctx,
                "pvalue",
                ExitCode::ArgsError,
                &format!("alpha must lie strictly between 0 and 1, got {}", alpha),
            );
        }
    }

    let mut input = EtestInput::new(args.k1, args.k2)
        .with_exposures(args.n1, args.n2)
        .with_difference(args.difference)
        .with_sidedness(args.side)
        .with_truncation(args.truncation);
    if args.strict {
        input = input.strict();
    }

    match input.evaluate() {
        Ok(report) => {
            log_event!(
                ctx,
                INFO,
                event_names::PVALUE_COMPUTED,
                Stage::Compute,
                "p-value computed",
                p_value = report.p_value,
                cells_visited = report.cells_visited
            );
            print!(
                "{}",
                render_pvalue(&report, args.alpha, global.format, &ctx.run_id)
            );
            match args.alpha {
                Some(alpha) if report.is_significant(alpha) => ExitCode::Significant,
                _ => ExitCode::Clean,
            }
        }
        Err(e) => output_error(global, ctx, "pvalue", ExitCode::from(&e), &e.to_string()),
    }
}

fn run_calibrate(global: &GlobalOpts, ctx: &LogContext, args: &CalibrateArgs) -> ExitCode {
    let options = ConfigOptions {
        config_path: args.config.clone(),
        config_dir: None,
    };
    let resolved = match load_config(&options) {
        Ok(resolved) => resolved,
        Err(e) => return output_config_error(global, ctx, &e),
    };

    if resolved.source.is_default() {
        log_event!(
            ctx,
            INFO,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Config,
            "no config file; using defaults"
        );
    } else {
        log_event!(
            ctx,
            INFO,
            event_names::CONFIG_LOADED,
            Stage::Config,
            "calibration config loaded",
            sha256 = resolved.source.sha256.as_deref().unwrap_or_default()
        );
    }

    let mut config = resolved.calibration;
    if let Some(v) = args.mu_lower {
        config.mu_lower = v;
    }
    if let Some(v) = args.mu_upper {
        config.mu_upper = v;
    }
    if let Some(v) = args.step {
        config.step = v;
    }
    if let Some(v) = args.trials {
        config.trials = v;
    }
    if let Some(v) = args.alpha {
        config.alpha = v;
    }
    if let Some(v) = args.n1 {
        config.n1 = v;
    }
    if let Some(v) = args.n2 {
        config.n2 = v;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.serial {
        config.parallel = false;
    }

    let span = tracing::info_span!("calibrate", run_id = %ctx.run_id, stage = %Stage::Sample);
    let result = span.in_scope(|| run_calibration(&config));

    match result {
        Ok(report) => {
            let report = report.with_source(resolved.source);
            print!(
                "{}",
                render_calibration(
                    &report,
                    global.format,
                    &ctx.run_id,
                    (args.plot_width, args.plot_height)
                )
            );
            ExitCode::Clean
        }
        Err(e) => output_error(global, ctx, "calibrate", ExitCode::from(&e), &e.to_string()),
    }
}

fn run_walk(global: &GlobalOpts, ctx: &LogContext, args: &WalkArgs) -> ExitCode {
    match ModeCenteredWalk::with_truncation(args.lambda, args.truncation) {
        Some(walk) => {
            let listing = WalkListing::from_walk(walk, args.truncation);
            print!("{}", render_walk(&listing, global.format, &ctx.run_id));
            ExitCode::Clean
        }
        None => output_error(
            global,
            ctx,
            "walk",
            ExitCode::ArgsError,
            &format!(
                "walk needs a finite non-negative rate and a truncation floor in (0, 1), got rate {} and floor {}",
                args.lambda, args.truncation
            ),
        ),
    }
}

fn output_config_error(global: &GlobalOpts, ctx: &LogContext, error: &ConfigError) -> ExitCode {
    log_event!(
        ctx,
        WARN,
        event_names::CONFIG_ERROR,
        Stage::Config,
        "calibration config rejected"
    );
    output_error(global, ctx, "calibrate", ExitCode::from(error), &error.to_string())
}

/// Report an error on stderr in the requested format.
fn output_error(
    global: &GlobalOpts,
    ctx: &LogContext,
    command: &str,
    exit_code: ExitCode,
    message: &str,
) -> ExitCode {
    if exit_code.is_internal_error() {
        log_event!(
            ctx,
            ERROR,
            event_names::INTERNAL_ERROR,
            Stage::Report,
            "command failed internally",
            command = command,
            code = exit_code.code_name()
        );
    }
    match global.format {
        OutputFormat::Json => {
            let response = error_envelope(&ctx.run_id, command, exit_code.code_name(), message);
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&response).unwrap_or_else(|_| message.to_string())
            );
        }
        OutputFormat::Summary => {
            eprintln!("[{}] {} error: {}", ctx.run_id, command, message);
        }
        OutputFormat::Md => {
            eprintln!("# Error");
            eprintln!();
            eprintln!("Error: {}", message);
        }
    }
    exit_code
}

fn print_version(global: &GlobalOpts) {
    match global.format {
        OutputFormat::Json => {
            let version_info = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "etest_version": env!("CARGO_PKG_VERSION"),
                "rust_version": env!("CARGO_PKG_RUST_VERSION"),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&version_info).unwrap_or_default()
            );
        }
        _ => {
            println!("etest {}", env!("CARGO_PKG_VERSION"));
            println!("schema version: {}", SCHEMA_VERSION);
        }
    }
}
