//! dmarc2logger - DMARC aggregate report flattener
//!
//! Reads a DMARC aggregate report (plain XML, ZIP or GZIP) and prints one line
//! per record to stdout, each carrying the report metadata and published
//! policy, as `;`-separated CSV or as JSON lines. Diagnostics go to stderr.

use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;

use dmarc2logger::models::OutputFormat;
use dmarc2logger::{convert_report, Config, DmarcError, Options};

/// CLI arguments for dmarc2logger.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Flattens DMARC aggregate reports into log-friendly records",
    long_about = "dmarc2logger converts a DMARC aggregate report (XML, optionally ZIP or GZIP \
                  compressed) into one output line per record, each line carrying the report \
                  metadata and published policy.\n\n\
                  A plain XML input is rewritten in place when it contains known malformed \
                  sequences. It is only deleted when --remove-input is given.",
    after_help = "Example: dmarc2logger report.xml.zip 1> outfile.log"
)]
struct Cli {
    /// Path to the DMARC report (.xml, .zip or .gz)
    #[arg(value_parser)]
    file: PathBuf,

    /// Output format: csv, json
    #[arg(short, long, default_value = "csv")]
    format: OutputFormat,

    /// Delete the input file after it was processed successfully
    #[arg(long)]
    remove_input: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Level forced over the environment: `--verbose` always wins, otherwise
/// `RUST_LOG` is left in charge when it is set.
fn log_level(verbose: bool, rust_log_set: bool) -> Option<log::LevelFilter> {
    if verbose {
        Some(log::LevelFilter::Debug)
    } else if rust_log_set {
        None
    } else {
        Some(log::LevelFilter::Info)
    }
}

fn run(cli: &Cli) -> Result<usize> {
    let config = Config::new().context("Failed to load configuration")?;
    let options = Options {
        format: cli.format,
        remove_input: cli.remove_input,
    };

    let stdout = io::stdout();
    let out = BufWriter::new(stdout.lock());
    let count = convert_report(&cli.file, &options, &config, out)?;
    Ok(count)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity.
    let mut logger = env_logger::Builder::from_env(env_logger::Env::default());
    if let Some(level) = log_level(cli.verbose, std::env::var_os("RUST_LOG").is_some()) {
        logger.filter_level(level);
    }
    logger.init();

    log::debug!("Processing file: {}", cli.file.display());
    match run(&cli) {
        Ok(count) => {
            log::debug!("Converted {} record(s) from {}", count, cli.file.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            match err.downcast_ref::<DmarcError>() {
                Some(e) if e.is_missing_metadata() => eprintln!("{} {}", "Error:".red().bold(), e),
                _ => eprintln!("{} {:#}", "Error:".red().bold(), err),
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["dmarc2logger", "report.xml"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Csv);
        assert!(!cli.remove_input);

        let cli = Cli::try_parse_from(["dmarc2logger", "-f", "JSON", "--remove-input", "r.zip"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.remove_input);

        assert!(Cli::try_parse_from(["dmarc2logger", "-f", "table", "r.xml"]).is_err());
        assert!(Cli::try_parse_from(["dmarc2logger"]).is_err());
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(false, false), Some(log::LevelFilter::Info));
        assert_eq!(log_level(false, true), None);
        assert_eq!(log_level(true, false), Some(log::LevelFilter::Debug));
        assert_eq!(log_level(true, true), Some(log::LevelFilter::Debug));
    }
}
