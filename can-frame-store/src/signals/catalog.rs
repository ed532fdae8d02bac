//! Message catalog boundary
//!
//! The store never parses catalog files. It consumes message definitions
//! through [`MessageCatalog`], and ships [`SignalCatalog`], an in-memory
//! implementation that callers can fill from whatever loader they use.

use crate::types::Frame;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// Bit layout of one signal inside a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSpec {
    /// Signal name
    pub name: String,
    /// 0-based start bit (LSB for Intel, MSB for Motorola)
    pub start_bit: u16,
    /// Length in bits, 1 to 64
    pub bit_length: u16,
    /// Byte order
    pub byte_order: ByteOrder,
    /// Signed or unsigned
    pub value_type: ValueType,
    /// Multiplexor values for which this signal is present (None = always)
    #[serde(default)]
    pub multiplex_values: Option<Vec<u64>>,
}

impl SignalSpec {
    /// Create a non-multiplexed signal layout
    pub fn new(
        name: impl Into<String>,
        start_bit: u16,
        bit_length: u16,
        byte_order: ByteOrder,
        value_type: ValueType,
    ) -> Self {
        Self {
            name: name.into(),
            start_bit,
            bit_length,
            byte_order,
            value_type,
            multiplex_values: None,
        }
    }

    /// Builder method: only present when the multiplexor equals one of `values`
    pub fn multiplexed_on(mut self, values: Vec<u64>) -> Self {
        self.multiplex_values = Some(values);
        self
    }
}

/// A message definition as provided by the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDefinition {
    /// CAN identifier
    pub id: u32,
    /// Message name
    pub name: String,
    /// Free-text comment
    #[serde(default)]
    pub comment: Option<String>,
    /// Ordered signal layouts
    pub signals: Vec<SignalSpec>,
    /// Name of the multiplexor signal, if the message is multiplexed
    #[serde(default)]
    pub multiplexor: Option<String>,
}

impl MessageDefinition {
    /// Create a message definition without signals
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            comment: None,
            signals: Vec::new(),
            multiplexor: None,
        }
    }

    /// Builder method: append a signal
    pub fn with_signal(mut self, signal: SignalSpec) -> Self {
        self.signals.push(signal);
        self
    }

    /// Builder method: mark `name` as the multiplexor signal
    pub fn with_multiplexor(mut self, name: impl Into<String>) -> Self {
        self.multiplexor = Some(name.into());
        self
    }

    /// Builder method: attach a comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// True if this message has a multiplexor signal
    pub fn is_multiplexed(&self) -> bool {
        self.multiplexor.is_some()
    }
}

/// Source of message definitions consumed by the decoder
pub trait MessageCatalog {
    /// Find the definition matching this frame, if any
    fn find_message(&self, frame: &Frame) -> Option<&MessageDefinition>;
}

/// In-memory catalog keyed by CAN identifier
#[derive(Debug, Default)]
pub struct SignalCatalog {
    messages: HashMap<u32, MessageDefinition>,
}

impl SignalCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message definition, replacing any previous one with the same ID
    pub fn add_message(&mut self, message: MessageDefinition) {
        if let Some(previous) = self.messages.insert(message.id, message) {
            log::debug!("Replaced catalog entry for 0x{:X} ({})", previous.id, previous.name);
        }
    }

    /// Look up a definition by identifier
    pub fn get_message(&self, id: u32) -> Option<&MessageDefinition> {
        self.messages.get(&id)
    }

    /// Get catalog statistics
    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.values().map(|m| m.signals.len()).sum(),
        }
    }
}

impl MessageCatalog for SignalCatalog {
    fn find_message(&self, frame: &Frame) -> Option<&MessageDefinition> {
        self.messages.get(&frame.identifier)
    }
}

/// Catalog statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogStats {
    /// Number of message definitions
    pub num_messages: usize,
    /// Number of signal layouts across all messages
    pub num_signals: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_catalog() {
        let catalog = SignalCatalog::new();
        let stats = catalog.stats();
        assert_eq!(stats.num_messages, 0);
        assert_eq!(stats.num_signals, 0);
    }

    #[test]
    fn test_add_and_find_message() {
        let mut catalog = SignalCatalog::new();
        catalog.add_message(
            MessageDefinition::new(0x123, "EngineData")
                .with_signal(SignalSpec::new(
                    "EngineSpeed",
                    0,
                    16,
                    ByteOrder::LittleEndian,
                    ValueType::Unsigned,
                ))
                .with_comment("Engine status"),
        );

        assert_eq!(catalog.stats().num_signals, 1);
        let frame = Frame::new(0x123, &[0, 0]);
        let msg = catalog.find_message(&frame).unwrap();
        assert_eq!(msg.name, "EngineData");
        assert!(catalog.find_message(&Frame::new(0x124, &[])).is_none());
    }
}
