//! Display formatting
//!
//! Every formatter takes the [`DisplayConfig`] explicitly, so two views with
//! different settings can be rendered side by side.

use can_frame_store::{DecodedMessage, Frame, ProtocolClass};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the time column is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeMode {
    /// Microseconds as stored
    #[default]
    Raw,
    /// Seconds with five decimals
    Seconds,
    /// Wall-clock time (timestamps read as microseconds since the Unix epoch, UTC)
    System,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    /// Hexadecimal identifiers and payload bytes
    #[serde(default = "default_hex")]
    pub hex: bool,
    #[serde(default)]
    pub time_mode: TimeMode,
    /// chrono format string used by [`TimeMode::System`]
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

fn default_hex() -> bool {
    true
}

fn default_time_format() -> String {
    "%H:%M:%S%.6f".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            hex: default_hex(),
            time_mode: TimeMode::default(),
            time_format: default_time_format(),
        }
    }
}

pub fn format_id(id: u32, extended: bool, config: &DisplayConfig) -> String {
    if !config.hex {
        return id.to_string();
    }
    if extended {
        format!("0x{:08X}", id)
    } else {
        format!("0x{:03X}", id & 0x7FF)
    }
}

pub fn format_number(value: u64, config: &DisplayConfig) -> String {
    if config.hex {
        format!("0x{:X}", value)
    } else {
        value.to_string()
    }
}

/// Payload bytes separated by spaces; remote frames show `RTR`
pub fn format_payload(frame: &Frame, config: &DisplayConfig) -> String {
    if frame.remote {
        return "RTR".to_string();
    }
    frame
        .payload()
        .iter()
        .map(|b| {
            if config.hex {
                format!("{:02X}", b)
            } else {
                b.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Printable ASCII of the payload, `.` for everything else
pub fn format_ascii(frame: &Frame) -> String {
    frame
        .payload()
        .iter()
        .map(|b| if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '.' })
        .collect()
}

pub fn format_timestamp(timestamp_us: u64, config: &DisplayConfig) -> String {
    match config.time_mode {
        TimeMode::Raw => timestamp_us.to_string(),
        TimeMode::Seconds => format!("{:.5}", timestamp_us as f64 / 1_000_000.0),
        TimeMode::System => match i64::try_from(timestamp_us)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_micros)
        {
            Some(time) => time.format(&config.time_format).to_string(),
            None => timestamp_us.to_string(),
        },
    }
}

/// CANopen class name of an identifier
pub fn format_function(id: u32) -> String {
    ProtocolClass::from_identifier(id).to_string()
}

/// `name=value` pairs of the signals present in a decoded message
pub fn format_signals(message: &DecodedMessage, config: &DisplayConfig) -> String {
    message
        .signals
        .iter()
        .filter(|s| s.present)
        .map(|s| {
            let value = if config.hex && s.raw_value >= 0 {
                format_number(s.raw_value as u64, config)
            } else {
                s.raw_value.to_string()
            };
            format!("{}={}", s.name, value)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
