//! Core types for the CAN frame store
//!
//! This module defines the frame model shared by every other module: the
//! store keeps these by value, the sort engine derives keys from them and the
//! signal decoder reads their payload.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Maximum payload length of a classic CAN frame
pub const MAX_PAYLOAD: usize = 8;

/// Direction of a frame as seen by the capturing interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Frame was received from the bus
    #[default]
    Received,
    /// Frame was transmitted by this node
    Transmitted,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Received => write!(f, "Rx"),
            Direction::Transmitted => write!(f, "Tx"),
        }
    }
}

/// Identity of the connection a batch of frames arrived on.
///
/// The store accepts it on the bulk ingestion path but does not act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConnectionId(pub u32);

/// A single observed CAN bus event
///
/// The payload is held inline so that a frame never owns heap memory; a
/// preallocated store therefore never allocates while frames are appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// CAN identifier (11-bit or 29-bit)
    pub identifier: u32,
    /// True if this is an extended (29-bit) identifier
    pub extended: bool,
    /// Index of the originating interface
    pub bus: u8,
    /// Received or transmitted
    pub direction: Direction,
    /// True if this is a remote request frame
    pub remote: bool,
    /// Source-supplied monotonic timestamp in microseconds
    pub timestamp_us: u64,
    data: [u8; MAX_PAYLOAD],
    len: u8,
    /// Occurrences collapsed into this row (dedup mode), 1 otherwise
    pub sequence_count: u32,
    /// Microseconds since the previous occurrence of the same (identifier, bus)
    pub inter_arrival_us: u64,
}

impl Frame {
    /// Create a received, standard-identifier data frame on bus 0.
    ///
    /// Payloads longer than 8 bytes are truncated.
    pub fn new(identifier: u32, payload: &[u8]) -> Self {
        let mut frame = Self {
            identifier,
            extended: identifier > 0x7FF,
            bus: 0,
            direction: Direction::Received,
            remote: false,
            timestamp_us: 0,
            data: [0; MAX_PAYLOAD],
            len: 0,
            sequence_count: 1,
            inter_arrival_us: 0,
        };
        frame.set_payload(payload);
        frame
    }

    /// Like [`new`](Self::new), but rejects payloads longer than 8 bytes and
    /// identifiers wider than 29 bits.
    pub fn try_new(identifier: u32, payload: &[u8]) -> Result<Self> {
        if identifier > 0x1FFF_FFFF {
            return Err(StoreError::InvalidFrame(format!(
                "identifier 0x{:X} exceeds 29 bits",
                identifier
            )));
        }
        if payload.len() > MAX_PAYLOAD {
            return Err(StoreError::InvalidFrame(format!(
                "payload of {} bytes for ID 0x{:X}",
                payload.len(),
                identifier
            )));
        }
        Ok(Self::new(identifier, payload))
    }

    /// Create a remote request frame with the given requested length.
    pub fn remote(identifier: u32, requested_len: u8) -> Self {
        let mut frame = Self::new(identifier, &[]);
        frame.remote = true;
        frame.len = requested_len.min(MAX_PAYLOAD as u8);
        frame
    }

    /// Builder method: set the timestamp
    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    /// Builder method: set the bus index
    pub fn with_bus(mut self, bus: u8) -> Self {
        self.bus = bus;
        self
    }

    /// Builder method: set the identifier format explicitly
    pub fn with_extended(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }

    /// Builder method: set the direction
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Replace the payload, truncating to 8 bytes.
    pub fn set_payload(&mut self, payload: &[u8]) {
        if payload.len() > MAX_PAYLOAD {
            log::warn!(
                "Payload of {} bytes for ID 0x{:X} truncated to {}",
                payload.len(),
                self.identifier,
                MAX_PAYLOAD
            );
        }
        let len = payload.len().min(MAX_PAYLOAD);
        self.data = [0; MAX_PAYLOAD];
        self.data[..len].copy_from_slice(&payload[..len]);
        self.len = len as u8;
    }

    /// Payload bytes. Remote frames report their requested length but carry
    /// zeroed bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.len as usize
    }

    /// True for received frames
    pub fn is_received(&self) -> bool {
        self.direction == Direction::Received
    }

    /// Key used by dedup mode: identifier plus bus
    pub fn dedup_key(&self) -> (u32, u8) {
        (self.identifier, self.bus)
    }
}

/// Errors that can occur in the fallible parts of the store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Unknown column: {0}")]
    InvalidColumn(String),
}
