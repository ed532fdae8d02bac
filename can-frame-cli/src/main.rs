//! CAN Frame Store CLI Application
//!
//! Replays a candump capture through the frame store and prints the
//! resulting view. It uses the can-frame-store library and adds:
//! - Capture file parsing
//! - TOML configuration, including message layouts for signal decoding
//! - Text table and JSON lines output

use anyhow::{bail, Context, Result};
use can_frame_store::{
    decode_frame, Column, ConnectionId, DecodedMessage, Frame, FrameStore, ProtocolClass,
    StoreConfig,
};
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

mod capture;
mod config;
mod display;

use config::AppConfig;
use display::{DisplayConfig, TimeMode};

/// CAN Frame Store - Replay, filter and sort CAN captures
#[derive(Parser, Debug)]
#[command(name = "can-frame-cli")]
#[command(about = "Replay a candump capture through the CAN frame store", long_about = None)]
#[command(version)]
struct Args {
    /// candump log file to replay
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Filter definition to apply before replay
    #[arg(long, value_name = "FILE")]
    filters: Option<PathBuf>,

    /// Write the resulting filter table to this file
    #[arg(long, value_name = "FILE")]
    save_filters: Option<PathBuf>,

    /// Collapse repeated frames into one row per ID and bus
    #[arg(long)]
    dedup: bool,

    /// Sort by column (time, id, ext, rtr, dir, bus, len, ascii, data, func, node)
    #[arg(short, long, value_name = "COLUMN")]
    sort: Option<Column>,

    /// Print the full store instead of the filtered view
    #[arg(long)]
    all: bool,

    /// Hide a protocol class (nmt, sync, emcy, time, heartbeat); can be repeated
    #[arg(long, value_name = "CLASS")]
    hide: Vec<String>,

    /// Maximum number of rows to print
    #[arg(short = 'n', long, value_name = "COUNT")]
    limit: Option<usize>,

    /// Shift timestamps so the first frame is at zero
    #[arg(long)]
    normalize: bool,

    /// Print IDs and payloads in decimal
    #[arg(long)]
    decimal: bool,

    /// How to render timestamps
    #[arg(long, value_enum)]
    time_mode: Option<TimeMode>,

    /// Emit one JSON object per row
    #[arg(long)]
    json: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CAN Frame Store CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using store library v{}", can_frame_store::VERSION);

    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };
    apply_overrides(&mut config, &args);

    let Some(capture_path) = config.input.capture.clone() else {
        println!("CAN Frame Store - No input specified");
        println!("\nQuick Start:");
        println!("  can-frame-cli --input candump.log");
        println!("  can-frame-cli --input candump.log --dedup --sort id");
        println!("  can-frame-cli --config config.toml");
        println!("\nUse --help for more options");
        return Ok(());
    };

    let text = fs::read_to_string(&capture_path)
        .with_context(|| format!("Failed to read capture file: {:?}", capture_path))?;
    let capture = capture::parse_capture(&text);

    let store_config = config
        .store
        .clone()
        .unwrap_or_else(|| StoreConfig::new().with_capacity(capture.frames.len().max(1)));
    let dedup = args.dedup || config.store_dedup();
    let store = FrameStore::with_config(store_config.with_dedup(dedup));

    for name in &config.view.hide_classes {
        store.set_class_filter(parse_class(name)?, false);
    }
    if let Some(path) = &config.input.filters {
        let report = store
            .load_filters(path)
            .with_context(|| format!("Failed to load filters: {:?}", path))?;
        if report.skipped > 0 {
            log::warn!("{} filter lines skipped", report.skipped);
        }
    }

    store.ingest_batch(ConnectionId(0), &capture.frames);
    log::info!("Replayed {} frames", store.take_bulk_refresh());
    if store.needs_filter_refresh() {
        log::debug!("New filter keys seen during replay");
    }

    if config.input.normalize_timing {
        store.normalize_timing();
    }
    if let Some(name) = &config.view.sort {
        let column: Column = name.parse()?;
        let direction = store.sort_by_column(column);
        log::info!("Sorted by {} ({:?})", column, direction);
    }

    if let Some(path) = &args.save_filters {
        store
            .save_filters(path)
            .with_context(|| format!("Failed to save filters: {:?}", path))?;
    }

    let rows = if config.view.filtered {
        store.filtered_frames()
    } else {
        store.frames()
    };
    let limit = config.view.limit.unwrap_or(rows.len()).min(rows.len());
    let rows = &rows[..limit];

    let catalog = config.catalog();
    let decoded: Vec<Option<DecodedMessage>> =
        rows.par_iter().map(|frame| decode_frame(frame, &catalog)).collect();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.json {
        write_json(&mut out, rows, &decoded, &config.display, store.is_dedup())?;
    } else {
        write_table(&mut out, rows, &decoded, &config.display, store.is_dedup())?;
    }
    out.flush()?;

    log::info!(
        "Printed {} of {} rows ({} frames stored)",
        rows.len(),
        store.filtered_count(),
        store.total_count()
    );
    Ok(())
}

/// Command-line flags take precedence over the config file
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if args.input.is_some() {
        config.input.capture = args.input.clone();
    }
    if args.filters.is_some() {
        config.input.filters = args.filters.clone();
    }
    if args.normalize {
        config.input.normalize_timing = true;
    }
    if let Some(column) = args.sort {
        config.view.sort = Some(column.to_string());
    }
    if args.all {
        config.view.filtered = false;
    }
    if args.limit.is_some() {
        config.view.limit = args.limit;
    }
    config.view.hide_classes.extend(args.hide.iter().cloned());
    if args.decimal {
        config.display.hex = false;
    }
    if let Some(mode) = args.time_mode {
        config.display.time_mode = mode;
    }
}

fn parse_class(name: &str) -> Result<ProtocolClass> {
    let class = match name.to_ascii_lowercase().as_str() {
        "nmt" => ProtocolClass::Nmt,
        "sync" => ProtocolClass::Sync,
        "emcy" => ProtocolClass::Emcy,
        "time" => ProtocolClass::Time,
        "heartbeat" | "hbeat" => ProtocolClass::Heartbeat,
        other => bail!("Protocol class {:?} cannot be hidden", other),
    };
    Ok(class)
}

fn write_table(
    out: &mut impl Write,
    rows: &[Frame],
    decoded: &[Option<DecodedMessage>],
    settings: &DisplayConfig,
    dedup: bool,
) -> Result<()> {
    writeln!(
        out,
        "{:>18} {:>10} {:>3} {:>5} {:>3} {:>3} {:>3}  {:<23}  {:<8}  {:<7}  {}",
        if dedup { "Delta" } else { "Time" },
        "ID",
        "Ext",
        if dedup { "Count" } else { "RTR" },
        "Dir",
        "Bus",
        "Len",
        "Data",
        "ASCII",
        "Func",
        "Signals"
    )?;

    for (frame, message) in rows.iter().zip(decoded) {
        let time = if dedup { frame.inter_arrival_us } else { frame.timestamp_us };
        let remote_or_count = if dedup {
            frame.sequence_count.to_string()
        } else {
            flag(frame.remote).to_string()
        };
        writeln!(
            out,
            "{:>18} {:>10} {:>3} {:>5} {:>3} {:>3} {:>3}  {:<23}  {:<8}  {:<7}  {}",
            display::format_timestamp(time, settings),
            display::format_id(frame.identifier, frame.extended, settings),
            flag(frame.extended),
            remote_or_count,
            frame.direction.to_string(),
            frame.bus,
            frame.dlc(),
            display::format_payload(frame, settings),
            display::format_ascii(frame),
            display::format_function(frame.identifier),
            message
                .as_ref()
                .map(|m| format!("{}: {}", m.name, display::format_signals(m, settings)))
                .unwrap_or_default()
        )?;
    }
    Ok(())
}

fn flag(value: bool) -> &'static str {
    if value {
        "Y"
    } else {
        "N"
    }
}

#[derive(Serialize)]
struct JsonRow<'a> {
    time: String,
    id: String,
    extended: bool,
    remote: bool,
    direction: String,
    bus: u8,
    data: String,
    function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a DecodedMessage>,
}

fn write_json(
    out: &mut impl Write,
    rows: &[Frame],
    decoded: &[Option<DecodedMessage>],
    settings: &DisplayConfig,
    dedup: bool,
) -> Result<()> {
    for (frame, message) in rows.iter().zip(decoded) {
        let time = if dedup { frame.inter_arrival_us } else { frame.timestamp_us };
        let row = JsonRow {
            time: display::format_timestamp(time, settings),
            id: display::format_id(frame.identifier, frame.extended, settings),
            extended: frame.extended,
            remote: frame.remote,
            direction: frame.direction.to_string(),
            bus: frame.bus,
            data: display::format_payload(frame, settings),
            function: display::format_function(frame.identifier),
            count: dedup.then_some(frame.sequence_count),
            message: message.as_ref(),
        };
        serde_json::to_writer(&mut *out, &row)?;
        writeln!(out)?;
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
