//! candump log replay
//!
//! Reads the `candump -l` text format:
//!
//! ```text
//! (1436509052.249713) vcan0 044#2A366C2BBA
//! (1436509052.449847) vcan0 1F334455#R
//! (1436509052.650004) can1 123#DEADBEEF T
//! ```
//!
//! Identifiers with more than three hex digits are extended; three-digit
//! identifiers must fit in 11 bits. A trailing `T` marks a transmitted frame.
//! Each interface name gets the next bus index in order of first appearance,
//! up to [`MAX_INTERFACES`]. Lines are parsed in parallel; bus assignment
//! happens afterwards in file order.

use anyhow::{anyhow, bail, Context, Result};
use can_frame_store::{Direction, Frame};
use rayon::prelude::*;

/// Bus indices are `u8`; lines on further interfaces are skipped
pub const MAX_INTERFACES: usize = u8::MAX as usize + 1;

/// Largest 11-bit identifier
const MAX_STANDARD_ID: u32 = 0x7FF;

/// Frames read from a capture, in file order
#[derive(Debug, Default)]
pub struct Capture {
    pub frames: Vec<Frame>,
    /// Interface names; position is the bus index
    pub interfaces: Vec<String>,
    /// Lines that could not be parsed
    pub skipped: usize,
}

struct Record<'a> {
    interface: &'a str,
    frame: Frame,
}

pub fn parse_capture(text: &str) -> Capture {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .collect();

    let parsed: Vec<Result<Record<'_>>> = lines
        .par_iter()
        .map(|(n, line)| parse_line(line).with_context(|| format!("line {}", n)))
        .collect();

    let mut capture = Capture::default();
    let mut overflow_warned = false;
    for record in parsed {
        match record {
            Ok(Record { interface, frame }) => {
                let bus = match capture.interfaces.iter().position(|i| i == interface) {
                    Some(bus) => bus,
                    None if capture.interfaces.len() < MAX_INTERFACES => {
                        capture.interfaces.push(interface.to_string());
                        capture.interfaces.len() - 1
                    }
                    None => {
                        if !overflow_warned {
                            log::warn!(
                                "More than {} interfaces; skipping frames on {:?} and later ones",
                                MAX_INTERFACES,
                                interface
                            );
                            overflow_warned = true;
                        }
                        capture.skipped += 1;
                        continue;
                    }
                };
                capture.frames.push(frame.with_bus(bus as u8));
            }
            Err(e) => {
                log::warn!("Skipping capture {:#}", e);
                capture.skipped += 1;
            }
        }
    }

    log::info!(
        "Parsed {} frames on {} interfaces ({} lines skipped)",
        capture.frames.len(),
        capture.interfaces.len(),
        capture.skipped
    );
    capture
}

fn parse_line(line: &str) -> Result<Record<'_>> {
    let mut fields = line.split_whitespace();
    let stamp = fields.next().ok_or_else(|| anyhow!("empty line"))?;
    let interface = fields.next().ok_or_else(|| anyhow!("missing interface"))?;
    let body = fields.next().ok_or_else(|| anyhow!("missing frame"))?;
    let direction = match fields.next() {
        None | Some("R") => Direction::Received,
        Some("T") => Direction::Transmitted,
        Some(other) => bail!("unknown direction flag {:?}", other),
    };

    let timestamp_us = parse_timestamp(stamp)?;
    let frame = parse_frame(body)?
        .with_timestamp(timestamp_us)
        .with_direction(direction);
    Ok(Record { interface, frame })
}

/// `(seconds.fraction)` to microseconds
fn parse_timestamp(stamp: &str) -> Result<u64> {
    let inner = stamp
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| anyhow!("malformed timestamp {:?}", stamp))?;
    let (secs, fraction) = inner.split_once('.').unwrap_or((inner, "0"));

    let secs: u64 = secs.parse().with_context(|| format!("bad seconds in {:?}", stamp))?;
    if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        bail!("bad fraction in {:?}", stamp);
    }
    let digits = &fraction[..fraction.len().min(6)];
    let micros = digits.parse::<u64>()? * 10u64.pow(6 - digits.len() as u32);

    secs.checked_mul(1_000_000)
        .and_then(|us| us.checked_add(micros))
        .ok_or_else(|| anyhow!("timestamp {:?} out of range", stamp))
}

/// `ID#DATA`, `ID#R` or `ID#R<len>`
fn parse_frame(body: &str) -> Result<Frame> {
    let (id, data) = body
        .split_once('#')
        .ok_or_else(|| anyhow!("missing '#' in {:?}", body))?;
    if data.starts_with('#') {
        bail!("CAN FD frames are not supported");
    }

    let identifier = u32::from_str_radix(id, 16).with_context(|| format!("bad identifier {:?}", id))?;
    let extended = id.len() > 3;
    if !extended && identifier > MAX_STANDARD_ID {
        bail!("standard identifier {:?} exceeds 11 bits", id);
    }

    if let Some(len) = data.strip_prefix('R') {
        let requested = if len.is_empty() {
            0
        } else {
            len.parse::<u8>().with_context(|| format!("bad remote length {:?}", len))?
        };
        return Ok(Frame::remote(identifier, requested).with_extended(extended));
    }

    let payload = decode_hex(data)?;
    Ok(Frame::try_new(identifier, &payload)?.with_extended(extended))
}

fn decode_hex(data: &str) -> Result<Vec<u8>> {
    let data: String = data.chars().filter(|c| *c != '.').collect();
    if !data.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("bad payload {:?}", data);
    }
    if data.len() % 2 != 0 {
        bail!("odd number of hex digits in {:?}", data);
    }
    (0..data.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&data[i..i + 2], 16).with_context(|| format!("bad payload {:?}", data))
        })
        .collect()
}
