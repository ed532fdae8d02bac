//! CAN Frame Store Library
//!
//! A thread-safe store for captured CAN frames with filtering, column sorting
//! and signal extraction.
//!
//! # Architecture
//!
//! - [`FrameStore`] keeps every ingested frame plus a filtered view of it,
//!   optionally collapsing repeats of the same `(identifier, bus)` pair
//! - [`FilterTable`] decides visibility per node address and per CANopen
//!   protocol class, and reads/writes the `<hex>,<T|F>` filter file format
//! - [`sort`] orders the store by any display column
//! - [`signals`] extracts little- and big-endian integer signals from a
//!   payload and decodes whole messages against a [`MessageCatalog`]
//!
//! The library does NOT:
//! - Read log files or talk to CAN hardware
//! - Parse DBC or other signal database formats
//! - Render anything
//!
//! A UI layer attaches a [`ViewObserver`] to be told when rows are appended to
//! or replaced in the filtered view.
//!
//! # Example Usage
//!
//! ```
//! use can_frame_store::{Column, Frame, FrameStore, SortDirection};
//!
//! let store = FrameStore::with_capacity(1024);
//! store.ingest(Frame::new(0x181, &[0x01, 0x02]).with_timestamp(2_000), false);
//! store.ingest(Frame::new(0x701, &[0x05]).with_timestamp(1_000), false);
//!
//! assert_eq!(store.sort_by_column(Column::Timestamp), SortDirection::Ascending);
//! store.with_filtered(|frames| {
//!     assert_eq!(frames[0].identifier, 0x701);
//! });
//! ```

// Public modules
pub mod config;
pub mod filter;
pub mod signals;
pub mod sort;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use config::StoreConfig;
pub use filter::{FilterTable, LoadReport, ProtocolClass};
pub use signals::{
    decode_frame, ByteOrder, DecodedMessage, DecodedSignal, MessageCatalog, MessageDefinition,
    SignalCatalog, SignalSpec, ValueType,
};
pub use sort::{Column, SortDirection};
pub use store::{FrameStore, ViewObserver};
pub use types::{ConnectionId, Direction, Frame, Result, StoreError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
