//! `avro-explorer` command-line tool: inspect, convert and integrity-check
//! Avro Object Container Files.
//!
//! ```text
//! avro-explorer <FILE> (--inspect | --to-json | --to-csv | --integrity) [OPTIONS]
//! ```
//!
//! # Exit codes
//!
//! | Code | Meaning                                   |
//! |------|-------------------------------------------|
//! | 0    | Success                                   |
//! | 1    | Error (I/O failure, unreadable file, ...) |
//! | 2    | `--integrity` found the file invalid      |
//!
//! Reports and converted records go to stdout unless `--output` is given;
//! diagnostics go to stderr.

use std::path::PathBuf;
use std::process;

use clap::{ArgGroup, Parser};
use tracing::debug;

use avro_explorer::{
    check_integrity_file, convert_to_csv_file, convert_to_json_file, inspect_file,
    ConvertOptions, DecodeStatus, FlattenConfig, IntegrityOptions, ReaderError,
};

/// Explore Avro Object Container Files.
#[derive(Parser, Debug)]
#[command(name = "avro-explorer", version, about)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["inspect", "to_json", "to_csv", "integrity"]),
))]
struct Args {
    /// Avro container file to read
    file: PathBuf,

    /// Print schema, codec, metadata keys, counts and the first record
    #[arg(long)]
    inspect: bool,

    /// Convert records to a JSON array
    #[arg(long)]
    to_json: bool,

    /// Convert records to CSV
    #[arg(long)]
    to_csv: bool,

    /// Scan every block and report structural errors
    #[arg(long)]
    integrity: bool,

    /// Maximum records to convert, or to count during an integrity scan
    #[arg(long, value_name = "N")]
    max_records: Option<usize>,

    /// Write output to this file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Keep nesting in JSON output instead of flattening
    #[arg(long, requires = "to_json")]
    nested: bool,

    /// Arrays with at least this many elements become one JSON-text cell
    #[arg(long, value_name = "N", default_value_t = avro_explorer::flatten::DEFAULT_ARRAY_INLINE_THRESHOLD)]
    array_threshold: usize,

    /// Cap on errors collected by --integrity
    #[arg(long, value_name = "N", default_value_t = avro_explorer::integrity::DEFAULT_MAX_ERRORS)]
    max_errors: usize,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<i32, ReaderError> {
    debug!(file = %args.file.display(), "starting");

    if args.inspect {
        let inspection = inspect_file(&args.file)?;
        emit(args, &to_pretty(&inspection)?)?;
        return Ok(0);
    }

    if args.integrity {
        let mut options = IntegrityOptions::new().with_max_errors(args.max_errors);
        if let Some(n) = args.max_records {
            options = options.with_max_records(n);
        }
        let report = check_integrity_file(&args.file, &options);
        emit(args, &to_pretty(&report)?)?;
        return Ok(if report.valid { 0 } else { 2 });
    }

    let mut options = ConvertOptions::new()
        .with_nested(args.nested)
        .with_flatten(FlattenConfig::new().with_array_inline_threshold(args.array_threshold));
    if let Some(n) = args.max_records {
        options = options.with_max_records(n);
    }

    let conversion = if args.to_csv {
        convert_to_csv_file(&args.file, &options)?
    } else {
        convert_to_json_file(&args.file, &options)?
    };

    emit(args, &conversion.output)?;
    if conversion.status == DecodeStatus::LimitReached {
        eprintln!(
            "note: stopped after {} records; use --max-records to read more",
            conversion.record_count
        );
    }
    if let Some(path) = &args.output {
        let kind = if args.to_csv { "CSV" } else { "JSON" };
        eprintln!("{} file saved to {}", kind, path.display());
    }
    Ok(0)
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String, ReaderError> {
    serde_json::to_string_pretty(value).map_err(|e| ReaderError::Export(e.to_string()))
}

fn emit(args: &Args, text: &str) -> Result<(), ReaderError> {
    match &args.output {
        Some(path) => std::fs::write(path, text)?,
        None => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}
