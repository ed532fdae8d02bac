//! Column sort engine
//!
//! Every sortable column maps a frame to a single `u64` key, and frames are
//! ordered with an in-place Hoare partition sort on that key. The sort is not
//! stable: rows with equal keys may change relative order.

use crate::types::{Frame, StoreError};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use std::str::FromStr;

/// Sortable columns of the frame view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Timestamp, or inter-arrival delta in dedup mode
    Timestamp,
    Identifier,
    Extended,
    /// Remote flag, or sequence count in dedup mode
    Remote,
    Direction,
    Bus,
    Length,
    Ascii,
    Data,
    /// CANopen function code (`identifier >> 7`)
    CanOpenFunction,
    /// CANopen node address (`identifier & 0x7F`)
    CanOpenNode,
}

impl Column {
    /// All columns in display order
    pub const ALL: [Column; 11] = [
        Column::Timestamp,
        Column::Identifier,
        Column::Extended,
        Column::Remote,
        Column::Direction,
        Column::Bus,
        Column::Length,
        Column::Ascii,
        Column::Data,
        Column::CanOpenFunction,
        Column::CanOpenNode,
    ];

    fn name(&self) -> &'static str {
        match self {
            Column::Timestamp => "timestamp",
            Column::Identifier => "id",
            Column::Extended => "ext",
            Column::Remote => "rtr",
            Column::Direction => "dir",
            Column::Bus => "bus",
            Column::Length => "len",
            Column::Ascii => "ascii",
            Column::Data => "data",
            Column::CanOpenFunction => "func",
            Column::CanOpenNode => "node",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let column = match lower.as_str() {
            "time" | "delta" => Column::Timestamp,
            "identifier" | "cob-id" => Column::Identifier,
            "extended" => Column::Extended,
            "remote" | "count" | "cnt" => Column::Remote,
            "direction" => Column::Direction,
            "length" => Column::Length,
            "function" => Column::CanOpenFunction,
            other => Column::ALL
                .iter()
                .copied()
                .find(|c| c.name() == other)
                .ok_or_else(|| StoreError::InvalidColumn(s.to_string()))?,
        };
        Ok(column)
    }
}

/// Direction of the last column sort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Derive the sort key of `frame` for `column`.
///
/// `dedup` selects the dedup-mode meaning of the timestamp and remote columns.
pub fn column_key(frame: &Frame, column: Column, dedup: bool) -> u64 {
    match column {
        Column::Timestamp if dedup => frame.inter_arrival_us,
        Column::Timestamp => frame.timestamp_us,
        Column::Identifier => frame.identifier as u64,
        Column::Extended => frame.extended as u64,
        Column::Remote if dedup => frame.sequence_count as u64,
        Column::Remote => frame.remote as u64,
        Column::Direction => frame.is_received() as u64,
        Column::Bus => frame.bus as u64,
        Column::Length => frame.dlc() as u64,
        Column::Ascii | Column::Data => {
            let mut word = [0u8; 8];
            let payload = frame.payload();
            word[..payload.len()].copy_from_slice(payload);
            BigEndian::read_u64(&word)
        }
        Column::CanOpenFunction => (frame.identifier >> 7) as u64,
        Column::CanOpenNode => (frame.identifier & 0x7F) as u64,
    }
}

/// Sort the whole slice by `column` in the given direction.
pub fn sort_frames(frames: &mut [Frame], column: Column, dedup: bool, direction: SortDirection) {
    if frames.len() < 2 {
        return;
    }
    let upper = frames.len() - 1;
    match direction {
        SortDirection::Ascending => sort_ascending(frames, column, dedup, 0, upper),
        SortDirection::Descending => sort_descending(frames, column, dedup, 0, upper),
    }
}

/// Sort `frames[lower..=upper]` so keys never decrease.
pub fn sort_ascending(frames: &mut [Frame], column: Column, dedup: bool, lower: usize, upper: usize) {
    quick_sort(frames, lower, upper, &|frame| column_key(frame, column, dedup), &|a, b| a < b);
}

/// Sort `frames[lower..=upper]` so keys never increase.
pub fn sort_descending(frames: &mut [Frame], column: Column, dedup: bool, lower: usize, upper: usize) {
    quick_sort(frames, lower, upper, &|frame| column_key(frame, column, dedup), &|a, b| a > b);
}

/// Quicksort over the inclusive range, recursing into the smaller partition
/// and looping on the larger one so stack depth stays logarithmic.
fn quick_sort(
    frames: &mut [Frame],
    mut lower: usize,
    mut upper: usize,
    key: &dyn Fn(&Frame) -> u64,
    before: &dyn Fn(u64, u64) -> bool,
) {
    if frames.is_empty() {
        return;
    }
    upper = upper.min(frames.len() - 1);

    while lower < upper {
        let split = partition(frames, lower, upper, key, before);
        if split - lower < upper - split {
            quick_sort(frames, lower, split, key, before);
            lower = split + 1;
        } else {
            quick_sort(frames, split + 1, upper, key, before);
            upper = split;
        }
    }
}

/// Hoare partition with the middle element as pivot.
///
/// Returns `p` such that every key in `lower..=p` is not after the pivot and
/// every key in `p + 1..=upper` is not before it.
fn partition(
    frames: &mut [Frame],
    lower: usize,
    upper: usize,
    key: &dyn Fn(&Frame) -> u64,
    before: &dyn Fn(u64, u64) -> bool,
) -> usize {
    let pivot = key(&frames[lower + (upper - lower) / 2]);
    let mut i = lower;
    let mut j = upper;

    loop {
        while i < upper && before(key(&frames[i]), pivot) {
            i += 1;
        }
        while j > lower && before(pivot, key(&frames[j])) {
            j -= 1;
        }
        if i >= j {
            return j;
        }
        frames.swap(i, j);
        i += 1;
        j -= 1;
    }
}
