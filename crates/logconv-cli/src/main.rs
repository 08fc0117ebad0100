//! logconv - Convert decoded event payloads into log-ready JSON
//!
//! This tool reads JSON event streams, or protobuf payloads paired with a
//! descriptor set, rewrites raw buffers and split 64-bit integers into
//! readable values, and prints one JSON document per event.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use logconv_core::convert::DEFAULT_MAX_DEPTH;
use logconv_core::{
    decode_message, load_descriptor_pool, BinaryKeyPolicy, Converter, ConverterConfig,
    PrintableRatio, Value, MAX_NON_PRINTABLE_RATIO,
};
use prost_reflect::DescriptorPool;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Convert decoded event payloads into readable, log-ready JSON lines
#[derive(Parser, Debug)]
#[command(name = "logconv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Serialized FileDescriptorSet used to decode protobuf payloads
    #[arg(long, requires = "message", conflicts_with = "hex")]
    descriptor_set: Option<PathBuf>,

    /// Fully qualified message type of each protobuf payload
    #[arg(long, requires = "descriptor_set")]
    message: Option<String>,

    /// Pretty-print each converted event
    #[arg(long)]
    pretty: bool,

    /// Maximum nesting depth of arrays and objects in an event
    #[arg(long, env = "LOGCONV_MAX_DEPTH", default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Placement of binary object properties
    #[arg(long, env = "LOGCONV_BINARY_KEYS", value_enum, default_value = "annotate")]
    binary_keys: BinaryKeys,

    /// Share of non-printable bytes at which a buffer is treated as binary
    #[arg(long, default_value_t = MAX_NON_PRINTABLE_RATIO)]
    max_non_printable_ratio: f64,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single event file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of event files to process
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Hex-encoded byte sequence to convert
    #[arg(long)]
    hex: Option<String>,
}

/// Placement of binary object properties
#[derive(Debug, Clone, Copy, ValueEnum)]
enum BinaryKeys {
    /// Keep the key: payload: {"hex": "..."}
    Annotate,
    /// Re-key with a suffix: payload_hex: "..."
    Suffix,
}

impl From<BinaryKeys> for BinaryKeyPolicy {
    fn from(keys: BinaryKeys) -> Self {
        match keys {
            BinaryKeys::Annotate => BinaryKeyPolicy::Annotate,
            BinaryKeys::Suffix => BinaryKeyPolicy::Suffix,
        }
    }
}

/// How input files are turned into values
enum Decoder {
    /// Stream of JSON documents, Node `Buffer` objects lifted to bytes
    Json,
    /// One encoded protobuf message per file
    Protobuf {
        pool: DescriptorPool,
        message: String,
    },
}

impl Decoder {
    /// Extensions picked up in directory mode
    fn extensions(&self) -> &'static [&'static str] {
        match self {
            Decoder::Json => &["json", "jsonl"],
            Decoder::Protobuf { .. } => &["bin", "pb"],
        }
    }
}

/// Converter plus output settings shared by every input
struct App {
    converter: Converter,
    decoder: Decoder,
    pretty: bool,
}

impl App {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let detector = PrintableRatio::with_ratio(cli.max_non_printable_ratio)
            .context("Invalid --max-non-printable-ratio")?;
        let config = ConverterConfig::new()
            .max_depth(cli.max_depth)
            .binary_keys(cli.binary_keys.into());

        let decoder = match (&cli.descriptor_set, &cli.message) {
            (Some(path), Some(message)) => {
                let data = fs::read(path).with_context(|| {
                    format!("Failed to read descriptor set: {}", path.display())
                })?;
                let pool = load_descriptor_pool(&data).with_context(|| {
                    format!("Failed to load descriptor set: {}", path.display())
                })?;
                if pool.get_message_by_name(message).is_none() {
                    bail!(
                        "Message type '{}' not found in {}",
                        message,
                        path.display()
                    );
                }
                Decoder::Protobuf {
                    pool,
                    message: message.clone(),
                }
            }
            _ => Decoder::Json,
        };

        Ok(Self {
            converter: Converter::with_detector(config, detector),
            decoder,
            pretty: cli.pretty,
        })
    }

    /// Converts every event in `data`, returning the number written
    fn convert_bytes<W: Write>(&self, data: &[u8], out: &mut W) -> Result<usize> {
        match &self.decoder {
            Decoder::Json => {
                let mut count = 0;
                let stream = serde_json::Deserializer::from_slice(data)
                    .into_iter::<serde_json::Value>();
                for (i, document) in stream.enumerate() {
                    let document =
                        document.with_context(|| format!("Invalid JSON in event {}", i + 1))?;
                    self.emit(&Value::from_json(document), out)
                        .with_context(|| format!("Failed to convert event {}", i + 1))?;
                    count += 1;
                }
                Ok(count)
            }
            Decoder::Protobuf { pool, message } => {
                let value = decode_message(pool, message, data)?;
                self.emit(&value, out)?;
                Ok(1)
            }
        }
    }

    /// Converts a hex-encoded byte sequence given on the command line
    fn convert_hex<W: Write>(&self, hex: &str, out: &mut W) -> Result<()> {
        let data = hex::decode(hex.trim()).context("Invalid --hex input")?;
        self.emit(&Value::bytes(data), out)
    }

    fn emit<W: Write>(&self, value: &Value, out: &mut W) -> Result<()> {
        let converted = self.converter.convert(value)?;
        if self.pretty {
            serde_json::to_writer_pretty(&mut *out, &converted)?;
        } else {
            serde_json::to_writer(&mut *out, &converted)?;
        }
        writeln!(out)?;
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let app = App::from_cli(&cli)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(&app, file, &mut out)?;
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&app, directory, &mut out)?;
    } else if let Some(ref hex) = cli.input.hex {
        app.convert_hex(hex, &mut out)?;
    } else {
        bail!("One of --file, --directory or --hex must be specified")
    }

    out.flush().context("Failed to flush output")?;
    Ok(())
}

/// Process a single event file
fn process_single_file<W: Write>(app: &App, file: &Path, out: &mut W) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let count = process_file(app, file, out)?;
    info!("Converted {} event(s) from {}", count, file.display());
    Ok(())
}

/// Process a directory of event files recursively
fn process_directory<W: Write>(app: &App, directory: &Path, out: &mut W) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut files_processed = 0;
    let mut events = 0;

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        // Skip directories
        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            continue;
        }

        if !has_extension(path, app.decoder.extensions()) {
            trace!("Skipping non-event file: {}", path.display());
            continue;
        }

        debug!("Processing event file: {}", path.display());
        match process_file(app, path, out) {
            Ok(count) => events += count,
            // Log error but continue with other files
            Err(e) => warn!("Error processing {}: {:#}", path.display(), e),
        }
        files_processed += 1;
    }

    info!(
        "Processed {} file(s), converted {} event(s)",
        files_processed, events
    );
    Ok(())
}

fn process_file<W: Write>(app: &App, path: &Path, out: &mut W) -> Result<usize> {
    trace!("Reading {}", path.display());
    let data =
        fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))?;

    // Output is held back until every event in the file converts
    let mut buffer = Vec::new();
    let count = app
        .convert_bytes(&data, &mut buffer)
        .with_context(|| format!("Failed to convert: {}", path.display()))?;
    out.write_all(&buffer)
        .with_context(|| format!("Failed to write output for: {}", path.display()))?;
    Ok(count)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
