//! tsblender CLI
//!
//! Runs a control file, or lists the commands the interpreter understands.
//!
//! Usage:
//!   tsblender run tsproc.in --context calibration
//!   tsblender run tsproc.in --config run.yaml --debug --format json
//!   tsblender commands
//!
//! Settings layer as: defaults, `--config` YAML, `TSBLENDER_CONTEXT` /
//! `TSBLENDER_DEBUG` (a `.env` file is honored), then flags.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use tsblender::registry::DefaultValue;
use tsblender::{RunConfig, RunReport, COMMAND_REGISTRY};

/// Time-series control file interpreter
#[derive(Parser, Debug)]
#[command(name = "tsblender")]
#[command(about = "Run TSPROC-style time-series control files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Execute a control file
    Run {
        /// Control file to execute
        control_file: PathBuf,

        /// Run context (overrides the SETTINGS block)
        #[arg(long, short = 'c', env = "TSBLENDER_CONTEXT")]
        context: Option<String>,

        /// YAML run configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log parameter maps and report the entity store at the end
        #[arg(long, short = 'd', env = "TSBLENDER_DEBUG",
              value_parser = clap::builder::FalseyValueParser::new())]
        debug: bool,

        /// Output format for the run summary
        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List every command with its required and optional keywords
    Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command {
        CliCommand::Run {
            control_file,
            context,
            config,
            debug,
            format,
        } => run(control_file, context, config, debug, format),
        CliCommand::Commands => {
            init_tracing(&RunConfig::default());
            list_commands();
            Ok(())
        }
    };

    if let Err(err) = result {
        print_error_chain(&err);
        std::process::exit(1);
    }
}

fn init_tracing(config: &RunConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new(tsblender::config::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(
    control_file: PathBuf,
    context: Option<String>,
    config: Option<PathBuf>,
    debug: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = RunConfig::load(config.as_deref())
        .context("Failed to load run configuration")?
        .with_overrides(context, debug);
    init_tracing(&config);

    let base_dir = control_file
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();
    let mut engine = config.engine(base_dir);

    let start = Instant::now();
    let report = engine
        .run_file(&control_file)
        .with_context(|| format!("Run of {} failed", control_file.display()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_summary(&report, start.elapsed().as_millis()),
    }
    Ok(())
}

fn print_summary(report: &RunReport, elapsed_ms: u128) {
    println!();
    println!("{}", "RUN SUMMARY".cyan().bold());
    println!("{}", "═".repeat(60));
    println!("  Context:  {}", report.context.bold());
    println!("  Executed: {}", report.executed.len().to_string().green());
    println!("  Skipped:  {}", report.skipped.len().to_string().yellow());
    println!("  Time:     {}ms", elapsed_ms);

    if !report.notices.is_empty() {
        println!();
        println!("{}", "NOTICES".yellow().bold());
        for notice in &report.notices {
            println!("  {}", notice);
        }
    }

    if let Some(store) = &report.store {
        println!();
        println!("{}", "ENTITY STORE".magenta().bold());
        for s in &store.series {
            println!("  series   {:<20} {:>6}  {} .. {}", s.name, s.frequency, s.start, s.end);
        }
        let tables = [
            ("c_table", &store.c_tables),
            ("s_table", &store.s_tables),
            ("v_table", &store.v_tables),
            ("e_table", &store.e_tables),
            ("g_table", &store.g_tables),
        ];
        for (kind, names) in tables {
            for name in names {
                println!("  {:<8} {}", kind, name);
            }
        }
    }
    println!("{}", "═".repeat(60));
}

fn list_commands() {
    for def in COMMAND_REGISTRY.iter() {
        let mut title = def.name.bold().to_string();
        if def.deprecated.is_some() {
            title = format!("{} {}", title, "(deprecated)".yellow());
        }
        println!("{}", title);
        if !def.description.is_empty() {
            println!("    {}", def.description.dimmed());
        }
        println!("    {} {}", "required:".green(), def.args.join(", "));
        if !def.kwds.is_empty() {
            let optional: Vec<String> = def
                .kwds
                .iter()
                .map(|k| match k.default {
                    DefaultValue::Unset => k.name.to_string(),
                    DefaultValue::Scalar(v) => format!("{}={}", k.name, v),
                    DefaultValue::List(vs) => format!("{}=[{}]", k.name, vs.join(" ")),
                })
                .collect();
            println!("    {} {}", "optional:".cyan(), optional.join(", "));
        }
        if !def.patterns.is_empty() {
            let patterns: Vec<String> = def.patterns.iter().map(|p| format!("{}<n>", p)).collect();
            println!("    {} {}", "patterns:".cyan(), patterns.join(", "));
        }
        if let Some(hint) = def.deprecated {
            println!("    {}", hint.yellow());
        }
    }
    println!();
    println!("{} commands", COMMAND_REGISTRY.len());
}

/// Top-level message followed by each cause not already spelled out above it
fn print_error_chain(err: &anyhow::Error) {
    let mut shown = err.to_string();
    eprintln!("{} {}", "error:".red().bold(), shown);
    for cause in err.chain().skip(1) {
        let text = cause.to_string();
        if shown.contains(&text) {
            continue;
        }
        eprintln!("  {} {}", "caused by:".red(), text);
        shown = text;
    }
}
