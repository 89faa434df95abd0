// calcdesk command line entry point
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use engine::config::settings::EngineSettings;
use engine::render::{self, OutputFormat};
use engine::services::CalculatorService;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// calcdesk - personal finance, planning and utility calculators
#[derive(Parser, Debug)]
#[command(name = "calcdesk")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON settings file overriding calculator defaults
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the available calculators
    List,

    /// Run one calculator and print its report
    Run {
        /// Calculator name, e.g. mortgage-repayment
        name: String,

        /// Parameters as an inline JSON object
        #[arg(short, long, conflicts_with = "input")]
        params: Option<String>,

        /// File holding the parameters as JSON ("-" reads stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output format (defaults to the settings file, then text)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },
}

fn init_tracing(verbose: u8, configured: &str) {
    // RUST_LOG wins; otherwise -v raises the configured level
    let level = match verbose {
        0 => configured,
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_params(params: Option<String>, input: Option<&Path>) -> Result<Value> {
    let raw = match (params, input) {
        (Some(inline), _) => inline,
        (None, Some(path)) if path == Path::new("-") => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read parameters from stdin")?;
            buf
        }
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameter file {}", path.display()))?,
        (None, None) => return Ok(Value::Null),
    };
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    let value: Value = serde_json::from_str(&raw).context("Parameters are not valid JSON")?;
    if !(value.is_object() || value.is_null()) {
        bail!("Parameters must be a JSON object");
    }
    Ok(value)
}

fn cmd_list(service: &CalculatorService) -> Result<ExitCode> {
    let infos = service.list();
    let width = infos.iter().map(|i| i.name.len()).max().unwrap_or(0);
    for info in infos {
        println!("{:<width$}  {}", info.name, info.description, width = width);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_run(
    service: &CalculatorService,
    name: &str,
    params: Option<String>,
    input: Option<PathBuf>,
    format: Option<OutputFormat>,
) -> Result<ExitCode> {
    let params = read_params(params, input.as_deref())?;
    let format = format.unwrap_or(service.settings().output_format);

    let report = service
        .run(name, &params)
        .with_context(|| format!("Could not run calculator '{}'", name))?;
    let rendered = render::render(&report, format).context("Failed to render report")?;
    print!("{}", rendered);

    info!(calculator = %report.calculator, success = report.is_success(), "Run finished");
    Ok(if report.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn run_cli(cli: Cli) -> Result<ExitCode> {
    let settings = EngineSettings::load_or_default(cli.settings.as_deref())
        .context("Failed to load settings")?;
    init_tracing(cli.verbose, &settings.log_level);
    info!("Starting calcdesk");

    let service = CalculatorService::new(settings);
    match cli.command {
        Commands::List => cmd_list(&service),
        Commands::Run { name, params, input, format } => cmd_run(&service, &name, params, input, format),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_cli(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
