//! Thread-guarded frame store
//!
//! The store owns two sequences: the full store (every ingested frame in
//! arrival order, or one row per `(identifier, bus)` in dedup mode) and the
//! filtered view (the subset the filter table currently lets through). Both
//! are reserved to a fixed capacity at construction so that a capture session
//! never reallocates them.
//!
//! One mutex guards all state. Every operation runs to completion while
//! holding it, including [`FrameStore::sort_by_column`], so a sort can never
//! interleave with ingestion.
//!
//! The filtered view is kept up to date incrementally on ingest, but filter
//! edits do not propagate on their own: call
//! [`FrameStore::refresh_filtered_view`] after changing filters.

use crate::config::StoreConfig;
use crate::filter::{FilterTable, LoadReport, ProtocolClass};
use crate::sort::{sort_frames, Column, SortDirection};
use crate::types::{ConnectionId, Frame, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Receives begin/end brackets around view mutations.
///
/// Callbacks run while the store lock is held; implementations must not call
/// back into the store.
pub trait ViewObserver: Send + Sync {
    /// Rows `first..=last` of the filtered view are about to be appended
    fn begin_insert(&self, _first: usize, _last: usize) {}
    /// The announced rows have been appended
    fn end_insert(&self) {}
    /// The filtered view is about to change wholesale
    fn begin_reset(&self) {}
    /// The wholesale change is complete
    fn end_reset(&self) {}
}

struct StoreState {
    frames: Vec<Frame>,
    filtered: Vec<Frame>,
    filters: FilterTable,
    capacity: usize,
    dedup: bool,
    /// Row of each (identifier, bus) in `frames`; only maintained in dedup mode
    dedup_index: HashMap<(u32, u8), usize>,
    time_offset: u64,
    pending_updates: usize,
    needs_filter_refresh: bool,
    sort_ascending: bool,
    capacity_warned: bool,
    observer: Option<Arc<dyn ViewObserver>>,
}

impl StoreState {
    fn emit(&self, event: impl FnOnce(&dyn ViewObserver)) {
        if let Some(observer) = self.observer.as_deref() {
            event(observer);
        }
    }

    fn ingest(&mut self, mut frame: Frame, notify: bool) {
        frame.timestamp_us = frame.timestamp_us.saturating_sub(self.time_offset);
        self.pending_updates += 1;
        if self.filters.register(frame.identifier) {
            self.needs_filter_refresh = true;
        }
        self.store(frame, notify);
    }

    /// Place an already-normalized frame whose filter key is registered.
    fn store(&mut self, mut frame: Frame, notify: bool) {
        let visible = self.filters.allows(frame.identifier);

        if !self.dedup {
            frame.sequence_count = 1;
            frame.inter_arrival_us = 0;
            self.push_frame(frame);
            if visible {
                self.push_filtered(frame, notify);
            }
            return;
        }

        let key = frame.dedup_key();
        match self.dedup_index.get(&key).copied() {
            Some(row) => {
                let previous = self.frames[row];
                frame.sequence_count = previous.sequence_count.saturating_add(1);
                frame.inter_arrival_us = frame.timestamp_us.saturating_sub(previous.timestamp_us);
                self.frames[row] = frame;

                if let Some(pos) = self.filtered.iter().position(|f| f.dedup_key() == key) {
                    if notify {
                        self.emit(|o| o.begin_reset());
                    }
                    self.filtered[pos] = frame;
                    if notify {
                        self.emit(|o| o.end_reset());
                    }
                }
            }
            None => {
                frame.sequence_count = 1;
                frame.inter_arrival_us = 0;
                self.dedup_index.insert(key, self.frames.len());
                self.push_frame(frame);
                if visible {
                    self.push_filtered(frame, notify);
                }
            }
        }
    }

    fn push_frame(&mut self, frame: Frame) {
        if self.frames.len() == self.capacity && !self.capacity_warned {
            log::warn!(
                "Frame store exceeded its preallocated capacity of {} frames",
                self.capacity
            );
            self.capacity_warned = true;
        }
        self.frames.push(frame);
    }

    fn push_filtered(&mut self, frame: Frame, notify: bool) {
        let row = self.filtered.len();
        if notify {
            self.emit(|o| o.begin_insert(row, row));
        }
        self.filtered.push(frame);
        if notify {
            self.emit(|o| o.end_insert());
        }
    }

    /// Recompute the filtered view from the full store without notifying.
    fn rebuild_filtered(&mut self) {
        let Self {
            frames,
            filtered,
            filters,
            capacity,
            ..
        } = self;
        filtered.clear();
        filtered.reserve(capacity.saturating_sub(filtered.len()));
        filtered.extend(frames.iter().filter(|f| filters.allows(f.identifier)).copied());
    }

    fn refresh(&mut self) {
        log::debug!("Refreshing filtered view over {} frames", self.frames.len());
        self.emit(|o| o.begin_reset());
        self.rebuild_filtered();
        self.pending_updates = 0;
        self.emit(|o| o.end_reset());
    }

    fn rebuild_dedup_index(&mut self) {
        self.dedup_index.clear();
        if self.dedup {
            for (row, frame) in self.frames.iter().enumerate() {
                self.dedup_index.insert(frame.dedup_key(), row);
            }
        }
    }

    /// Collapse the full store to one row per (identifier, bus), in order of
    /// first appearance.
    fn collapse_duplicates(&mut self) {
        let mut index: HashMap<(u32, u8), usize> = HashMap::new();
        let mut collapsed: Vec<Frame> = Vec::with_capacity(self.capacity.max(self.frames.len()));

        for frame in &self.frames {
            let mut frame = *frame;
            match index.get(&frame.dedup_key()).copied() {
                Some(row) => {
                    let previous = collapsed[row];
                    frame.sequence_count = previous.sequence_count.saturating_add(1);
                    frame.inter_arrival_us = frame.timestamp_us.saturating_sub(previous.timestamp_us);
                    collapsed[row] = frame;
                }
                None => {
                    frame.sequence_count = 1;
                    frame.inter_arrival_us = 0;
                    index.insert(frame.dedup_key(), collapsed.len());
                    collapsed.push(frame);
                }
            }
        }

        log::debug!(
            "Collapsed {} frames into {} unique rows",
            self.frames.len(),
            collapsed.len()
        );
        self.frames = collapsed;
        self.dedup_index = index;
    }
}

/// The frame store: full store, filtered view and filter table behind one lock
pub struct FrameStore {
    state: Mutex<StoreState>,
}

impl FrameStore {
    /// Create a store with the platform default capacity
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a store that preallocates room for `capacity` frames
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(StoreConfig::new().with_capacity(capacity))
    }

    /// Create a store from a configuration
    pub fn with_config(config: StoreConfig) -> Self {
        log::debug!(
            "Preallocating frame store for {} frames (dedup: {})",
            config.capacity,
            config.dedup
        );
        Self {
            state: Mutex::new(StoreState {
                frames: Vec::with_capacity(config.capacity),
                filtered: Vec::with_capacity(config.capacity),
                filters: FilterTable::new(),
                capacity: config.capacity,
                dedup: config.dedup,
                dedup_index: HashMap::new(),
                time_offset: 0,
                pending_updates: 0,
                needs_filter_refresh: false,
                sort_ascending: false,
                capacity_warned: false,
                observer: None,
            }),
        }
    }

    // Every mutation leaves both vectors structurally valid, so a panic in
    // another thread does not make the state unusable.
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach the observer that receives view brackets
    pub fn set_observer(&self, observer: Arc<dyn ViewObserver>) {
        self.lock().observer = Some(observer);
    }

    /// Detach the observer
    pub fn clear_observer(&self) {
        self.lock().observer = None;
    }

    /// Ingest one frame.
    ///
    /// The timestamp is shifted by the session offset established by
    /// [`normalize_timing`](Self::normalize_timing). With `auto_notify` the
    /// observer sees an insert bracket around a filtered-view append, or a
    /// reset bracket around an in-place dedup replacement.
    pub fn ingest(&self, frame: Frame, auto_notify: bool) {
        log::trace!("Ingest 0x{:X} on bus {}", frame.identifier, frame.bus);
        self.lock().ingest(frame, auto_notify);
    }

    /// Ingest a sequence of frames without per-frame notification.
    ///
    /// The number of frames added accumulates until
    /// [`take_bulk_refresh`](Self::take_bulk_refresh) is called. `source`
    /// identifies the originating connection and is not used by the store.
    pub fn ingest_batch(&self, source: ConnectionId, frames: &[Frame]) {
        let mut state = self.lock();
        for frame in frames {
            state.ingest(*frame, false);
        }
        if state.dedup {
            state.emit(|o| o.begin_reset());
            state.emit(|o| o.end_reset());
        }
        log::trace!("Batch of {} frames from connection {}", frames.len(), source.0);
    }

    /// Import frames whose timestamps are already normalized, e.g. a loaded
    /// capture. New filter keys are always registered enabled.
    pub fn import_frames(&self, frames: &[Frame]) {
        let mut state = self.lock();
        for frame in frames {
            if state.filters.register_enabled(frame.identifier) {
                state.needs_filter_refresh = true;
            }
            state.store(*frame, false);
        }
        state.pending_updates = frames.len();
        log::debug!("Imported {} frames", frames.len());
    }

    /// Number of frames ingested since the last bulk or wholesale refresh,
    /// resetting the counter.
    ///
    /// Returns 0 (keeping the counter) while the filtered view is empty.
    /// Otherwise the observer receives one reset bracket.
    pub fn take_bulk_refresh(&self) -> usize {
        let mut state = self.lock();
        if state.pending_updates == 0 || state.filtered.is_empty() {
            return 0;
        }
        log::debug!("Bulk refresh of {} frames", state.pending_updates);
        state.emit(|o| o.begin_reset());
        state.emit(|o| o.end_reset());
        std::mem::take(&mut state.pending_updates)
    }

    /// Recompute the filtered view from the full store and current filters
    pub fn refresh_filtered_view(&self) {
        self.lock().refresh();
    }

    /// Shift all timestamps so the earliest stored frame reads as zero.
    ///
    /// The shift is remembered and applied to frames ingested afterwards.
    pub fn normalize_timing(&self) {
        let mut state = self.lock();
        let Some(min) = state.frames.iter().map(|f| f.timestamp_us).min() else {
            return;
        };

        for frame in state.frames.iter_mut() {
            frame.timestamp_us -= min;
        }

        state.emit(|o| o.begin_reset());
        for frame in state.filtered.iter_mut() {
            frame.timestamp_us = frame.timestamp_us.saturating_sub(min);
        }
        state.emit(|o| o.end_reset());

        state.time_offset = state.time_offset.saturating_add(min);
        log::debug!("Normalized timing, session offset is now {} us", state.time_offset);
    }

    /// Empty both sequences. Filter definitions and the time offset are kept.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.emit(|o| o.begin_reset());
        let capacity = state.capacity;
        state.frames = Vec::with_capacity(capacity);
        state.filtered = Vec::with_capacity(capacity);
        state.dedup_index.clear();
        state.pending_updates = 0;
        state.capacity_warned = false;
        state.emit(|o| o.end_reset());
    }

    /// Switch dedup mode. Entering it collapses the existing full store.
    pub fn set_dedup_mode(&self, enabled: bool) {
        let mut state = self.lock();
        if state.dedup == enabled {
            return;
        }
        state.emit(|o| o.begin_reset());
        state.dedup = enabled;
        if enabled {
            state.collapse_duplicates();
            state.rebuild_filtered();
        } else {
            state.dedup_index.clear();
        }
        state.emit(|o| o.end_reset());
    }

    /// True while dedup mode is active
    pub fn is_dedup(&self) -> bool {
        self.lock().dedup
    }

    /// Sort the full store by `column`, flipping direction on every call,
    /// then refresh the filtered view. The first call sorts ascending.
    pub fn sort_by_column(&self, column: Column) -> SortDirection {
        let mut state = self.lock();
        state.sort_ascending = !state.sort_ascending;
        let direction = if state.sort_ascending {
            SortDirection::Ascending
        } else {
            SortDirection::Descending
        };

        log::debug!("Sorting {} frames by {} ({:?})", state.frames.len(), column, direction);
        let dedup = state.dedup;
        sort_frames(&mut state.frames, column, dedup, direction);
        state.rebuild_dedup_index();
        state.refresh();
        direction
    }

    /// Enable or disable a known filter key. Call
    /// [`refresh_filtered_view`](Self::refresh_filtered_view) to apply.
    pub fn set_filter_enabled(&self, key: u32, enabled: bool) {
        self.lock().filters.set_enabled(key, enabled);
    }

    /// Enable or disable every known filter key
    pub fn set_all_filters(&self, enabled: bool) {
        self.lock().filters.set_all_enabled(enabled);
    }

    /// Set a protocol-class switch
    pub fn set_class_filter(&self, class: ProtocolClass, enabled: bool) {
        self.lock().filters.set_class_filter(class, enabled);
    }

    /// Current state of a protocol-class switch
    pub fn class_filter_enabled(&self, class: ProtocolClass) -> bool {
        self.lock().filters.class_filter_enabled(class)
    }

    /// Copy of the filter table
    pub fn filter_snapshot(&self) -> FilterTable {
        self.lock().filters.clone()
    }

    /// Replace the filter table from definition text and refresh the view
    pub fn load_filter_definition(&self, definition: &str) -> LoadReport {
        let mut state = self.lock();
        let report = state.filters.load_definition(definition);
        state.needs_filter_refresh = true;
        state.refresh();
        report
    }

    /// Replace the filter table from a file and refresh the view.
    ///
    /// If the file cannot be read the table and view are left unchanged.
    pub fn load_filters(&self, path: &Path) -> Result<LoadReport> {
        let mut state = self.lock();
        let report = state.filters.load_file(path)?;
        state.needs_filter_refresh = true;
        state.refresh();
        Ok(report)
    }

    /// Write every known filter key to a file
    pub fn save_filters(&self, path: &Path) -> Result<()> {
        self.lock().filters.save_file(path)
    }

    /// True if filter keys were added since the last call
    pub fn needs_filter_refresh(&self) -> bool {
        std::mem::take(&mut self.lock().needs_filter_refresh)
    }

    /// Number of rows in the full store
    pub fn total_count(&self) -> usize {
        self.lock().frames.len()
    }

    /// Number of rows in the filtered view
    pub fn filtered_count(&self) -> usize {
        self.lock().filtered.len()
    }

    /// Run `f` over the full store while holding the lock
    pub fn with_frames<R>(&self, f: impl FnOnce(&[Frame]) -> R) -> R {
        f(self.lock().frames.as_slice())
    }

    /// Run `f` over the filtered view while holding the lock
    pub fn with_filtered<R>(&self, f: impl FnOnce(&[Frame]) -> R) -> R {
        f(self.lock().filtered.as_slice())
    }

    /// Copy of the full store
    pub fn frames(&self) -> Vec<Frame> {
        self.with_frames(<[Frame]>::to_vec)
    }

    /// Copy of the filtered view
    pub fn filtered_frames(&self) -> Vec<Frame> {
        self.with_filtered(<[Frame]>::to_vec)
    }

    /// Offset currently subtracted from ingested timestamps
    pub fn time_offset(&self) -> u64 {
        self.lock().time_offset
    }

    /// Preallocated capacity of each sequence
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Row of the last frame with `identifier` at or before `timestamp_us`,
    /// scanning the full store in order and stopping at the first later one.
    pub fn index_at_or_before(&self, identifier: u32, timestamp_us: u64) -> Option<usize> {
        self.with_frames(|frames| {
            let mut best = None;
            for (row, frame) in frames.iter().enumerate() {
                if frame.identifier != identifier {
                    continue;
                }
                if frame.timestamp_us <= timestamp_us {
                    best = Some(row);
                } else {
                    break;
                }
            }
            best
        })
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::column_key;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> FrameStore {
        FrameStore::with_capacity(256)
    }

    fn frame(id: u32, ts: u64) -> Frame {
        Frame::new(id, &[id as u8]).with_timestamp(ts)
    }

    #[derive(Default)]
    struct CountingObserver {
        inserts: AtomicUsize,
        resets: AtomicUsize,
    }

    impl ViewObserver for CountingObserver {
        fn begin_insert(&self, first: usize, last: usize) {
            assert_eq!(first, last);
        }
        fn end_insert(&self) {
            self.inserts.fetch_add(1, Ordering::SeqCst);
        }
        fn end_reset(&self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_preallocates_both_sequences() {
        let store = store();
        assert_eq!(store.capacity(), 256);
        store.with_frames(|frames| assert!(frames.is_empty()));
        assert!(store.lock().frames.capacity() >= 256);
        assert!(store.lock().filtered.capacity() >= 256);
    }

    #[test]
    fn test_ingest_appends_to_both_views() {
        let store = store();
        store.ingest(frame(0x181, 10), false);
        store.ingest(frame(0x182, 20), false);

        assert_eq!(store.total_count(), 2);
        assert_eq!(store.filtered_count(), 2);
        assert!(store.needs_filter_refresh());
        assert!(!store.needs_filter_refresh());
    }

    #[test]
    fn test_hidden_key_only_reaches_full_store() {
        let store = store();
        store.ingest(frame(0x181, 10), false);
        store.set_filter_enabled(0x181, false);
        store.ingest(frame(0x182, 20), false);

        // 0x182 is new while a key is disabled, so it starts hidden
        assert_eq!(store.filter_snapshot().is_enabled(0x02), Some(false));
        assert_eq!(store.total_count(), 2);
        // 0x181 was already in the view; edits need an explicit refresh
        assert_eq!(store.filtered_count(), 1);
        store.refresh_filtered_view();
        assert_eq!(store.filtered_count(), 0);
    }

    #[test]
    fn test_auto_notify_brackets_inserts() {
        let store = store();
        let observer = Arc::new(CountingObserver::default());
        store.set_observer(observer.clone());

        store.ingest(frame(0x181, 1), true);
        store.ingest(frame(0x181, 2), false);
        assert_eq!(observer.inserts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dedup_replaces_in_place() {
        let store = FrameStore::with_config(StoreConfig::new().with_capacity(64).with_dedup(true));
        store.ingest(frame(0x100, 1_000), false);
        store.ingest(frame(0x200, 1_500), false);
        store.ingest(frame(0x100, 1_800), false);
        store.ingest(frame(0x100, 2_000).with_bus(1), false);

        let frames = store.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].sequence_count, 2);
        assert_eq!(frames[0].inter_arrival_us, 800);
        assert_eq!(frames[0].timestamp_us, 1_800);
        assert_eq!(frames[2].sequence_count, 1);
        assert_eq!(frames[2].inter_arrival_us, 0);

        let filtered = store.filtered_frames();
        assert_eq!(filtered[0], frames[0]);
    }

    #[test]
    fn test_dedup_replacement_notifies_reset() {
        let store = FrameStore::with_config(StoreConfig::new().with_capacity(64).with_dedup(true));
        let observer = Arc::new(CountingObserver::default());
        store.set_observer(observer.clone());

        store.ingest(frame(0x100, 1), true);
        store.ingest(frame(0x100, 2), true);
        assert_eq!(observer.inserts.load(Ordering::SeqCst), 1);
        assert_eq!(observer.resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_entering_dedup_mode_collapses_history() {
        let store = store();
        for (i, id) in [0x10, 0x20, 0x10, 0x10, 0x20].iter().enumerate() {
            store.ingest(frame(*id, i as u64 * 100), false);
        }
        store.set_dedup_mode(true);

        let frames = store.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].identifier, 0x10);
        assert_eq!(frames[0].sequence_count, 3);
        assert_eq!(frames[0].inter_arrival_us, 100);
        assert_eq!(frames[1].sequence_count, 2);
        assert_eq!(frames[1].inter_arrival_us, 300);
        assert_eq!(store.filtered_count(), 2);

        // Later ingests keep collapsing
        store.ingest(frame(0x20, 1_000), false);
        assert_eq!(store.total_count(), 2);
        assert_eq!(store.frames()[1].sequence_count, 3);
    }

    #[test]
    fn test_batch_counts_pending_updates() {
        let store = store();
        let frames: Vec<Frame> = (0..10).map(|i| frame(0x181, i)).collect();
        store.ingest_batch(ConnectionId(1), &frames);

        assert_eq!(store.total_count(), 10);
        assert_eq!(store.take_bulk_refresh(), 10);
        assert_eq!(store.take_bulk_refresh(), 0);
    }

    #[test]
    fn test_bulk_refresh_waits_for_visible_rows() {
        let store = store();
        store.ingest(frame(0x181, 0), false);
        store.set_filter_enabled(0x181, false);
        store.refresh_filtered_view();

        store.ingest(frame(0x181, 1), false);
        assert_eq!(store.take_bulk_refresh(), 0);
        store.set_filter_enabled(0x181, true);
        store.ingest(frame(0x181, 2), false);
        assert_eq!(store.take_bulk_refresh(), 2);
    }

    #[test]
    fn test_import_registers_keys_enabled() {
        let store = store();
        store.ingest(frame(0x181, 0), false);
        store.set_filter_enabled(0x181, false);

        store.import_frames(&[frame(0x182, 5), frame(0x183, 6)]);
        let table = store.filter_snapshot();
        assert_eq!(table.is_enabled(0x02), Some(true));
        assert_eq!(table.is_enabled(0x03), Some(true));
        assert_eq!(store.take_bulk_refresh(), 2);
    }

    #[test]
    fn test_normalize_timing() {
        let store = store();
        store.ingest(frame(0x181, 5_000), false);
        store.ingest(frame(0x182, 3_000), false);
        store.ingest(frame(0x183, 9_000), false);
        store.normalize_timing();

        let stamps: Vec<u64> = store.frames().iter().map(|f| f.timestamp_us).collect();
        assert_eq!(stamps, vec![2_000, 0, 6_000]);
        let filtered: Vec<u64> = store.filtered_frames().iter().map(|f| f.timestamp_us).collect();
        assert_eq!(filtered, stamps);

        store.ingest(frame(0x181, 10_000), false);
        assert_eq!(store.frames()[3].timestamp_us, 7_000);
    }

    #[test]
    fn test_normalize_timing_empty_store_is_noop() {
        let store = store();
        store.normalize_timing();
        assert_eq!(store.time_offset(), 0);
    }

    #[test]
    fn test_clear_keeps_filters() {
        let store = store();
        store.ingest(frame(0x181, 0), false);
        store.set_filter_enabled(0x181, false);
        store.clear();

        assert_eq!(store.total_count(), 0);
        assert_eq!(store.filtered_count(), 0);
        assert_eq!(store.take_bulk_refresh(), 0);
        assert_eq!(store.filter_snapshot().is_enabled(0x01), Some(false));
        assert!(store.lock().frames.capacity() >= 256);
    }

    #[test]
    fn test_sort_by_column_toggles_direction() {
        let store = store();
        for (i, id) in [0x30, 0x10, 0x50, 0x20, 0x40].iter().enumerate() {
            store.ingest(frame(*id, i as u64), false);
        }

        assert_eq!(store.sort_by_column(Column::Identifier), SortDirection::Ascending);
        let ids: Vec<u32> = store.frames().iter().map(|f| f.identifier).collect();
        assert_eq!(ids, vec![0x10, 0x20, 0x30, 0x40, 0x50]);
        assert_eq!(
            store.filtered_frames().iter().map(|f| f.identifier).collect::<Vec<_>>(),
            ids
        );

        assert_eq!(store.sort_by_column(Column::Identifier), SortDirection::Descending);
        let keys: Vec<u64> = store
            .frames()
            .iter()
            .map(|f| column_key(f, Column::Identifier, false))
            .collect();
        assert!(keys.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_sort_in_dedup_mode_keeps_index_valid() {
        let store = FrameStore::with_config(StoreConfig::new().with_capacity(64).with_dedup(true));
        store.ingest(frame(0x300, 0), false);
        store.ingest(frame(0x100, 1), false);
        store.sort_by_column(Column::Identifier);

        store.ingest(frame(0x300, 10), false);
        let frames = store.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].identifier, 0x300);
        assert_eq!(frames[1].sequence_count, 2);
    }

    #[test]
    fn test_sort_empty_store_is_noop() {
        let store = store();
        store.sort_by_column(Column::Data);
        assert_eq!(store.total_count(), 0);
    }

    #[test]
    fn test_index_at_or_before() {
        let store = store();
        store.ingest(frame(0x100, 10), false);
        store.ingest(frame(0x200, 15), false);
        store.ingest(frame(0x100, 20), false);
        store.ingest(frame(0x100, 30), false);

        assert_eq!(store.index_at_or_before(0x100, 25), Some(2));
        assert_eq!(store.index_at_or_before(0x100, 5), None);
        assert_eq!(store.index_at_or_before(0x300, 100), None);
    }

    #[test]
    fn test_load_filter_definition_refreshes_view() {
        let store = store();
        store.ingest(frame(0x123, 0), false);
        store.ingest(frame(0x456, 1), false);

        let report = store.load_filter_definition("123,T\n456,F\n");
        assert_eq!(report.loaded, 2);
        let ids: Vec<u32> = store.filtered_frames().iter().map(|f| f.identifier).collect();
        assert_eq!(ids, vec![0x123]);
    }

    #[test]
    fn test_class_filter_applies_on_refresh() {
        let store = store();
        store.ingest(frame(0x705, 0), false);
        store.ingest(frame(0x185, 1), false);
        store.set_class_filter(ProtocolClass::Heartbeat, false);
        assert!(!store.class_filter_enabled(ProtocolClass::Heartbeat));

        store.refresh_filtered_view();
        let ids: Vec<u32> = store.filtered_frames().iter().map(|f| f.identifier).collect();
        assert_eq!(ids, vec![0x185]);
    }
}
