//! Signal layouts, the catalog boundary, and bit-level decoding
//!
//! This module contains the pure bit extractor and the decoder that applies
//! it to every signal of a catalog message.

pub mod catalog;
pub mod decode;
pub mod extract;

// Re-export key types for convenience
pub use catalog::{
    ByteOrder, CatalogStats, MessageCatalog, MessageDefinition, SignalCatalog, SignalSpec,
    ValueType,
};
pub use decode::{decode_frame, decode_message, DecodedMessage, DecodedSignal};
pub use extract::{extract, extract_signal, fits, insert, try_extract, try_extract_signal};
