//! reg-convert: converts registry data between hives, `.reg` exports and
//! policy files.

use anyhow::Context;
use clap::Parser;
use reg_convert::format::{self, ConvertOptions, Format, DEFAULT_ROOT_NAME};
use reg_convert::regfile::DEFAULT_MAX_DEPTH;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "reg-convert", version, about = "Convert registry data between formats")]
struct Cli {
    /// Input format: hive, reg, reg+ or pol
    #[arg(long)]
    from: Format,

    /// Output format: reg, reg+ or pol
    #[arg(long)]
    to: Format,

    /// Root key name for hive and pol input
    #[arg(long, default_value = DEFAULT_ROOT_NAME)]
    root_name: String,

    /// Maximum key nesting depth, at most 512
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH, value_parser = parse_max_depth)]
    max_depth: usize,

    /// Increase log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// File to read
    input: PathBuf,

    /// File to write
    output: PathBuf,
}

fn parse_max_depth(src: &str) -> Result<usize, String> {
    let depth = src.parse::<usize>().map_err(|err| err.to_string())?;
    if depth > DEFAULT_MAX_DEPTH {
        return Err(format!("must be at most {}", DEFAULT_MAX_DEPTH));
    }
    Ok(depth)
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let options = ConvertOptions {
        root_name: cli.root_name.clone(),
        max_depth: cli.max_depth,
    };
    format::convert(cli.from, cli.to, &cli.input, &cli.output, &options).with_context(|| {
        format!(
            "converting {} ({}) to {} ({})",
            cli.input.display(),
            cli.from,
            cli.output.display(),
            cli.to
        )
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
