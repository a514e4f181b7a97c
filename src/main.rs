//! Command-line front end: build and query frozen double-array dictionaries.

use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use base64::Engine;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use frozendict::{
    BuildError, BuildOptions, Dictionary, DictionaryBuilder, FormatError, Normalization,
    DEFAULT_MAX_PROBE,
};

/// Build and query compact read-only dictionaries backed by a double-array trie.
#[derive(Parser, Debug)]
#[command(name = "frozendict", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a dictionary from a JSON object of key/value pairs.
    Build {
        /// JSON input file, or `-` for stdin.
        input: String,

        /// Output path for the frozen dictionary.
        #[arg(short, long)]
        output: PathBuf,

        /// NFC-normalise keys on insertion and lookup.
        #[arg(long)]
        nfc: bool,

        /// Candidate bases tried per state before giving up.
        #[arg(long, default_value_t = DEFAULT_MAX_PROBE)]
        max_probe: usize,

        /// Write the blob as base64 text.
        #[arg(long)]
        base64: bool,
    },
    /// Look up keys; reads keys from stdin, one per line, when none are given.
    Get {
        dict: PathBuf,
        keys: Vec<String>,
    },
    /// Print layout statistics for a dictionary.
    Info { dict: PathBuf },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),
    #[error("input must be a JSON object of key/value pairs")]
    NotAnObject,
    #[error("build failed: {0}")]
    Build(#[from] BuildError),
    #[error("cannot read dictionary: {0}")]
    Format(#[from] FormatError),
    #[error("dictionary is neither a frozen blob nor base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

type Result<T> = std::result::Result<T, CliError>;

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CliError + '_ {
    move |source| CliError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(io_err(Path::new("stdin")))?;
        return Ok(buf);
    }
    let path = Path::new(input);
    fs::read_to_string(path).map_err(io_err(path))
}

/// Accepts a raw frozen blob or its base64 text.
fn load_dict(path: &Path) -> Result<Dictionary<Value>> {
    let data = fs::read(path).map_err(io_err(path))?;
    let blob = if data.starts_with(&frozendict::frozen::MAGIC) {
        data
    } else {
        let text = String::from_utf8_lossy(&data);
        base64::engine::general_purpose::STANDARD.decode(text.trim())?
    };
    debug!(path = %path.display(), bytes = blob.len(), "loading dictionary");
    Ok(Dictionary::from_bytes(&blob)?)
}

fn format_line(count: &str, label: &str) -> String {
    format!("{:>8} {}\n", count, label)
}

fn run_build(
    input: &str,
    output: &Path,
    nfc: bool,
    max_probe: usize,
    as_base64: bool,
) -> Result<()> {
    let text = read_input(input)?;
    let object = match serde_json::from_str::<Value>(&text)? {
        Value::Object(map) => map,
        _ => return Err(CliError::NotAnObject),
    };

    let options = BuildOptions {
        max_probe,
        normalization: if nfc {
            Normalization::Nfc
        } else {
            Normalization::None
        },
    };
    let mut builder = DictionaryBuilder::with_options(options);
    for (key, value) in object {
        builder.add(key, value);
    }
    let (dict, stats) = builder.build_with_stats()?;

    let blob = dict.to_bytes()?;
    let bytes = if as_base64 {
        let mut text = base64::engine::general_purpose::STANDARD.encode(&blob);
        text.push('\n');
        text.into_bytes()
    } else {
        blob
    };
    fs::write(output, &bytes).map_err(io_err(output))?;

    info!(
        keys = stats.keys,
        slots = stats.slots,
        relocations = stats.relocations,
        output = %output.display(),
        "dictionary written"
    );
    eprint!("{}", format_line(&stats.keys.to_string(), "keys"));
    eprint!("{}", format_line(&stats.trie_nodes.to_string(), "trie nodes"));
    eprint!("{}", format_line(&stats.slots.to_string(), "slots"));
    eprint!("{}", format_line(&stats.used_slots.to_string(), "used slots"));
    eprint!("{}", format_line(&bytes.len().to_string(), "bytes"));
    Ok(())
}

/// Returns whether every key was found.
fn run_get(dict_path: &Path, keys: Vec<String>) -> Result<bool> {
    let dict = load_dict(dict_path)?;
    let keys = if keys.is_empty() {
        io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<Vec<_>>>()
            .map_err(io_err(Path::new("stdin")))?
    } else {
        keys
    };

    let use_parallel = keys.len() > 1;
    let resolve = |key: &String| dict.get(key).map(Value::to_string);
    let results: Vec<Option<String>> = if use_parallel {
        keys.par_iter().map(resolve).collect()
    } else {
        keys.iter().map(resolve).collect()
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut all_found = true;
    for (key, result) in keys.iter().zip(results) {
        let line = match result {
            Some(value) => format!("{key}\t{value}"),
            None => {
                all_found = false;
                format!("{key}\t(not found)")
            }
        };
        writeln!(out, "{line}").map_err(io_err(Path::new("stdout")))?;
    }
    Ok(all_found)
}

fn run_info(dict_path: &Path) -> Result<()> {
    let dict = load_dict(dict_path)?;
    let array = dict.automaton();
    let nfc = dict.normalization() == Normalization::Nfc;
    print!("{}", format_line(&dict.len().to_string(), "entries"));
    print!("{}", format_line(&array.len().to_string(), "slots"));
    print!("{}", format_line(&array.used_slots().to_string(), "used slots"));
    print!(
        "{}",
        format_line(&format!("{:#06x}", array.codes().always_one()), "always-one mask")
    );
    print!(
        "{}",
        format_line(&format!("{:#06x}", array.codes().always_zero()), "always-zero mask")
    );
    print!("{}", format_line(if nfc { "nfc" } else { "none" }, "normalization"));
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("frozendict=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Build {
            input,
            output,
            nfc,
            max_probe,
            base64,
        } => run_build(&input, &output, nfc, max_probe, base64).map(|_| true),
        Command::Get { dict, keys } => run_get(&dict, keys),
        Command::Info { dict } => run_info(&dict).map(|_| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
