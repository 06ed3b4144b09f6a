use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use strand_core::layout::RuntimeLayout;
use strand_core::platform::ImageDebugger;
use strand_core::{snapshot, Session};
use strand_utils::{debug, info, init_logging, init_logging_for_shell, init_logging_with_level, LogFormat, LogLevel, LoggingGuard};

mod render;
mod shell;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Backtrace and impersonate suspended cooperative threads of a halted process.
#[derive(Parser, Debug)]
#[command(name = "strand")]
#[command(version)]
#[command(about = "Backtrace and impersonate suspended cooperative threads of a halted process", long_about = None)]
struct Cli
{
    /// Process image to inspect (JSON)
    #[arg(long, env = "STRAND_IMAGE")]
    image: PathBuf,
    /// Runtime layout overriding the image's and the Arachne default (JSON)
    #[arg(long, env = "STRAND_LAYOUT")]
    layout: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace); RUST_LOG is used when absent
    #[arg(long)]
    log_level: Option<LogLevel>,
    /// Log format (pretty, json)
    #[arg(long)]
    log_format: Option<LogFormat>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Backtrace a suspended thread context, or every occupied slot when no context is given
    #[command(visible_alias = "bta")]
    BacktraceThread
    {
        /// Expression evaluating to a thread context pointer
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        context: Vec<String>,
    },
    /// Show the register view of a thread context
    #[command(visible_alias = "ta")]
    SwitchThread
    {
        /// Expression evaluating to a thread context pointer
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        context: Vec<String>,
    },
    /// Print the stack bytes in use by each slot of the core
    DiffStack,
    /// Start an interactive session where switch state persists between commands
    Shell,
}

fn main()
{
    let cli = Cli::parse();

    let _guard = match start_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn start_logging(cli: &Cli) -> CliResult<LoggingGuard>
{
    if matches!(cli.command, Commands::Shell) {
        let (path, guard) = init_logging_for_shell(cli.log_level)?;
        eprintln!("Logging to {}", path.display());
        return Ok(guard);
    }
    let guard = match cli.log_level {
        Some(level) => init_logging_with_level(level, cli.log_format.unwrap_or(LogFormat::Pretty))?,
        None => init_logging()?,
    };
    Ok(guard)
}

fn load_layout(path: Option<&Path>, debugger: &ImageDebugger) -> CliResult<RuntimeLayout>
{
    if let Some(path) = path {
        let text = std::fs::read_to_string(path)?;
        let layout: RuntimeLayout = serde_json::from_str(&text)?;
        debug!(path = %path.display(), runtime = %layout.runtime_name, "loaded layout file");
        return Ok(layout);
    }
    Ok(debugger.layout().cloned().unwrap_or_else(RuntimeLayout::arachne))
}

fn argument(words: &[String]) -> Option<String>
{
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn run_command(cli: Cli) -> CliResult<()>
{
    let debugger = ImageDebugger::from_file(&cli.image)?;
    let layout = load_layout(cli.layout.as_deref(), &debugger)?;
    info!(runtime = %layout.runtime_name, image = %cli.image.display(), "session ready");
    let mut session = Session::new(debugger, layout)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::BacktraceThread { context } => {
            let report = session.backtrace_thread(argument(&context).as_deref())?;
            render::backtrace_report(&mut out, &report)?;
        }
        Commands::SwitchThread { context } => {
            let outcome = session.switch_thread(argument(&context).as_deref())?;
            render::switch_outcome(&mut out, &outcome)?;
            writeln!(out, "{}", snapshot::capture(session.debugger())?)?;
        }
        Commands::DiffStack => {
            let report = session.diff_stack()?;
            render::stack_usage(&mut out, &report)?;
        }
        Commands::Shell => {
            let stdin = io::stdin();
            shell::Shell::new(session).run(stdin.lock(), &mut out)?;
        }
    }

    Ok(())
}
