//! Catalog-driven frame decoding
//!
//! Looks a frame up in a [`MessageCatalog`] and extracts every signal of the
//! matching message as a raw integer. The catalog only decides whether a
//! frame is decoded; it never influences what the store keeps.

use super::catalog::{MessageCatalog, MessageDefinition, SignalSpec};
use super::extract::try_extract_signal;
use crate::types::Frame;
use serde::Serialize;

/// A decoded message with all its signals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedMessage {
    /// CAN identifier
    pub id: u32,
    /// Message name from the catalog
    pub name: String,
    /// Active multiplexor value (if the message is multiplexed)
    pub multiplexer_value: Option<u64>,
    /// One entry per catalog signal, in catalog order
    pub signals: Vec<DecodedSignal>,
}

impl DecodedMessage {
    /// Look up a decoded signal by name
    pub fn signal(&self, name: &str) -> Option<&DecodedSignal> {
        self.signals.iter().find(|s| s.name == name)
    }
}

/// A single decoded signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedSignal {
    /// Signal name from the catalog
    pub name: String,
    /// Raw integer value; 0 when the signal is absent
    pub raw_value: i64,
    /// False if the frame does not carry this signal (short payload or
    /// inactive multiplexor branch)
    pub present: bool,
}

/// Decode `frame` against `catalog`.
///
/// Returns `None` for remote frames and for identifiers the catalog does not
/// know.
pub fn decode_frame<C: MessageCatalog + ?Sized>(frame: &Frame, catalog: &C) -> Option<DecodedMessage> {
    if frame.remote {
        return None;
    }
    let message = catalog.find_message(frame)?;
    Some(decode_message(frame, message))
}

/// Decode `frame` with an already-resolved message definition.
pub fn decode_message(frame: &Frame, message: &MessageDefinition) -> DecodedMessage {
    let data = frame.payload();

    let multiplexer_value = message.multiplexor.as_ref().and_then(|mux_name| {
        message
            .signals
            .iter()
            .find(|s| s.name == *mux_name)
            .and_then(|mux| try_extract_signal(data, mux))
            .map(|value| value as u64)
    });

    let signals = message
        .signals
        .iter()
        .map(|signal| {
            let value = if is_active(signal, multiplexer_value) {
                try_extract_signal(data, signal)
            } else {
                None
            };
            DecodedSignal {
                name: signal.name.clone(),
                raw_value: value.unwrap_or(0),
                present: value.is_some(),
            }
        })
        .collect();

    log::trace!("Decoded 0x{:X} as {}", frame.identifier, message.name);

    DecodedMessage {
        id: message.id,
        name: message.name.clone(),
        multiplexer_value,
        signals,
    }
}

fn is_active(signal: &SignalSpec, multiplexer_value: Option<u64>) -> bool {
    match (&signal.multiplex_values, multiplexer_value) {
        (None, _) => true,
        (Some(values), Some(current)) => values.contains(&current),
        (Some(_), None) => false,
    }
}
