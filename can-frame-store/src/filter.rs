//! Per-node and per-protocol-class frame filtering
//!
//! Two independent dimensions decide whether a frame is visible:
//!
//! - the filter table, keyed by the 7-bit node address (`identifier & 0x7F`),
//!   populated lazily as traffic appears;
//! - the CANopen class override, keyed by the function code
//!   `(identifier & 0x7FF) >> 7`, with a switch for NMT, SYNC, EMCY, TIME and
//!   HEARTBEAT. Every other class always passes.
//!
//! A frame is included only if both dimensions allow it.

use crate::types::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Mask selecting the node address from an identifier
pub const KEY_MASK: u32 = 0x7F;

/// Filter key of an identifier
#[inline]
pub fn filter_key(identifier: u32) -> u8 {
    (identifier & KEY_MASK) as u8
}

/// CANopen message class derived from an identifier's function code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolClass {
    Nmt,
    Sync,
    Emcy,
    Time,
    /// Transmit PDO 1 to 4
    TxPdo(u8),
    /// Receive PDO 1 to 4
    RxPdo(u8),
    TxSdo,
    RxSdo,
    /// Function code 13 has no assignment
    Unassigned,
    Heartbeat,
    Lss,
}

impl ProtocolClass {
    /// Classify an identifier. Only the low 11 bits are considered.
    pub fn from_identifier(identifier: u32) -> Self {
        let function = (identifier & 0x7FF) >> 7;
        match function {
            0 => ProtocolClass::Nmt,
            1 if identifier & KEY_MASK == 0 => ProtocolClass::Sync,
            1 => ProtocolClass::Emcy,
            2 => ProtocolClass::Time,
            3 | 5 | 7 | 9 => ProtocolClass::TxPdo(((function - 3) / 2 + 1) as u8),
            4 | 6 | 8 | 10 => ProtocolClass::RxPdo(((function - 4) / 2 + 1) as u8),
            11 => ProtocolClass::TxSdo,
            12 => ProtocolClass::RxSdo,
            13 => ProtocolClass::Unassigned,
            14 => ProtocolClass::Heartbeat,
            _ => ProtocolClass::Lss,
        }
    }
}

impl fmt::Display for ProtocolClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolClass::Nmt => write!(f, "NMT"),
            ProtocolClass::Sync => write!(f, "SYNC"),
            ProtocolClass::Emcy => write!(f, "EMCY"),
            ProtocolClass::Time => write!(f, "TIME"),
            ProtocolClass::TxPdo(n) => write!(f, "T PDO{}", n),
            ProtocolClass::RxPdo(n) => write!(f, "R PDO{}", n),
            ProtocolClass::TxSdo => write!(f, "T SDO"),
            ProtocolClass::RxSdo => write!(f, "R SDO"),
            ProtocolClass::Unassigned => write!(f, "???"),
            ProtocolClass::Heartbeat => write!(f, "HBEAT"),
            ProtocolClass::Lss => write!(f, "LSS"),
        }
    }
}

/// Visibility switches for the classes that can be hidden
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClassFilter {
    nmt: bool,
    sync: bool,
    emcy: bool,
    time: bool,
    heartbeat: bool,
}

impl Default for ClassFilter {
    fn default() -> Self {
        Self {
            nmt: true,
            sync: true,
            emcy: true,
            time: true,
            heartbeat: true,
        }
    }
}

impl ClassFilter {
    fn slot(&mut self, class: ProtocolClass) -> Option<&mut bool> {
        match class {
            ProtocolClass::Nmt => Some(&mut self.nmt),
            ProtocolClass::Sync => Some(&mut self.sync),
            ProtocolClass::Emcy => Some(&mut self.emcy),
            ProtocolClass::Time => Some(&mut self.time),
            ProtocolClass::Heartbeat => Some(&mut self.heartbeat),
            _ => None,
        }
    }

    fn allows(&self, class: ProtocolClass) -> bool {
        match class {
            ProtocolClass::Nmt => self.nmt,
            ProtocolClass::Sync => self.sync,
            ProtocolClass::Emcy => self.emcy,
            ProtocolClass::Time => self.time,
            ProtocolClass::Heartbeat => self.heartbeat,
            _ => true,
        }
    }
}

/// Outcome of loading a filter definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    /// Lines turned into table entries
    pub loaded: usize,
    /// Non-empty lines that could not be parsed
    pub skipped: usize,
}

/// Node-address filter table plus protocol-class overrides
#[derive(Debug, Clone, Default)]
pub struct FilterTable {
    filters: BTreeMap<u8, bool>,
    classes: ClassFilter,
}

impl FilterTable {
    /// Create an empty table with every class enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a frame with this identifier is visible.
    ///
    /// An unseen key is registered first (see [`register`](Self::register)).
    pub fn should_include(&mut self, identifier: u32) -> bool {
        self.register(identifier);
        self.allows(identifier)
    }

    /// Visibility check without registering unseen keys; unknown keys are
    /// treated as hidden.
    pub fn allows(&self, identifier: u32) -> bool {
        let key_enabled = self
            .filters
            .get(&filter_key(identifier))
            .copied()
            .unwrap_or(false);
        key_enabled && self.classes.allows(ProtocolClass::from_identifier(identifier))
    }

    /// Register the key of `identifier` if it is new. Returns true if it was
    /// inserted.
    ///
    /// New keys start enabled, unless the user has already started curating
    /// (some known key is disabled), in which case they start disabled.
    pub fn register(&mut self, identifier: u32) -> bool {
        let key = filter_key(identifier);
        if self.filters.contains_key(&key) {
            return false;
        }
        let enabled = !self.any_configured();
        self.filters.insert(key, enabled);
        log::debug!("New filter key 0x{:02X} registered ({})", key, if enabled { "shown" } else { "hidden" });
        true
    }

    /// Register the key of `identifier` as enabled regardless of curation.
    /// Returns true if it was inserted.
    pub fn register_enabled(&mut self, identifier: u32) -> bool {
        let key = filter_key(identifier);
        if self.filters.contains_key(&key) {
            return false;
        }
        self.filters.insert(key, true);
        true
    }

    /// True if at least one known key is disabled
    pub fn any_configured(&self) -> bool {
        self.filters.values().any(|enabled| !enabled)
    }

    /// True if the key is known
    pub fn contains(&self, key: u32) -> bool {
        self.filters.contains_key(&filter_key(key))
    }

    /// State of a known key
    pub fn is_enabled(&self, key: u32) -> Option<bool> {
        self.filters.get(&filter_key(key)).copied()
    }

    /// Enable or disable a known key. Unknown keys are ignored.
    pub fn set_enabled(&mut self, key: u32, enabled: bool) {
        if let Some(state) = self.filters.get_mut(&filter_key(key)) {
            *state = enabled;
        }
    }

    /// Overwrite every known key
    pub fn set_all_enabled(&mut self, enabled: bool) {
        for state in self.filters.values_mut() {
            *state = enabled;
        }
    }

    /// Switch state for a class; classes without a switch always report true
    pub fn class_filter_enabled(&self, class: ProtocolClass) -> bool {
        self.classes.allows(class)
    }

    /// Set the switch for a class. Classes without a switch are ignored.
    pub fn set_class_filter(&mut self, class: ProtocolClass, enabled: bool) {
        match self.classes.slot(class) {
            Some(slot) => *slot = enabled,
            None => log::debug!("Class {} cannot be filtered", class),
        }
    }

    /// Known keys and their state, in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = (u8, bool)> + '_ {
        self.filters.iter().map(|(k, v)| (*k, *v))
    }

    /// Known keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = u8> + '_ {
        self.filters.keys().copied()
    }

    /// Number of known keys
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// True if no key is known
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Forget every key. Class switches are kept.
    pub fn clear(&mut self) {
        self.filters.clear();
    }

    /// Serialize as `<hex-key>,<T|F>` lines
    pub fn to_definition(&self) -> String {
        self.filters
            .iter()
            .map(|(key, enabled)| format!("{:x},{}\n", key, if *enabled { 'T' } else { 'F' }))
            .collect()
    }

    /// Replace the table with the entries of a definition.
    ///
    /// Malformed lines are skipped. Keys are masked to 7 bits.
    pub fn load_definition(&mut self, definition: &str) -> LoadReport {
        self.filters.clear();
        let mut report = LoadReport::default();

        for line in definition.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Some((id, enabled)) => {
                    self.filters.insert(filter_key(id), enabled);
                    report.loaded += 1;
                }
                None => {
                    log::warn!("Skipping malformed filter line: {:?}", line);
                    report.skipped += 1;
                }
            }
        }

        report
    }

    /// Load a definition file. A read failure leaves the table unchanged.
    pub fn load_file(&mut self, path: &Path) -> Result<LoadReport> {
        let definition = fs::read_to_string(path)?;
        let report = self.load_definition(&definition);
        log::info!(
            "Loaded {} filters from {:?} ({} skipped)",
            report.loaded,
            path,
            report.skipped
        );
        Ok(report)
    }

    /// Write every known key to a definition file
    pub fn save_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_definition())?;
        log::info!("Saved {} filters to {:?}", self.filters.len(), path);
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<(u32, bool)> {
    if line.len() <= 2 {
        return None;
    }
    let (key, flag) = line.split_once(',')?;
    let key = key.trim();
    let key = key
        .strip_prefix("0x")
        .or_else(|| key.strip_prefix("0X"))
        .unwrap_or(key);
    let id = u32::from_str_radix(key, 16).ok()?;
    let enabled = match flag.trim() {
        f if f.eq_ignore_ascii_case("t") => true,
        f if f.eq_ignore_ascii_case("f") => false,
        _ => return None,
    };
    Some((id, enabled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_key_defaults_enabled() {
        let mut table = FilterTable::new();
        assert!(table.should_include(0x181));
        assert_eq!(table.is_enabled(0x01), Some(true));
    }

    #[test]
    fn test_new_key_hidden_once_curating() {
        let mut table = FilterTable::new();
        table.should_include(0x181);
        table.should_include(0x182);
        // Every key enabled: nothing is configured yet
        assert!(table.should_include(0x183));

        table.set_enabled(0x02, false);
        assert!(table.any_configured());
        assert!(!table.should_include(0x184));
        assert_eq!(table.is_enabled(0x04), Some(false));
    }

    #[test]
    fn test_set_enabled_ignores_unknown_key() {
        let mut table = FilterTable::new();
        table.set_enabled(0x10, false);
        assert!(table.is_empty());
        assert_eq!(table.is_enabled(0x10), None);
    }

    #[test]
    fn test_set_enabled_masks_identifier() {
        let mut table = FilterTable::new();
        table.register(0x185);
        table.set_enabled(0x285, false);
        assert_eq!(table.is_enabled(0x05), Some(false));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_set_all_enabled() {
        let mut table = FilterTable::new();
        table.register(0x181);
        table.register(0x182);
        table.set_all_enabled(false);
        assert!(table.iter().all(|(_, enabled)| !enabled));
        assert_eq!(table.keys().collect::<Vec<_>>(), vec![0x01, 0x02]);
    }

    #[test]
    fn test_protocol_classes() {
        assert_eq!(ProtocolClass::from_identifier(0x000), ProtocolClass::Nmt);
        assert_eq!(ProtocolClass::from_identifier(0x080), ProtocolClass::Sync);
        assert_eq!(ProtocolClass::from_identifier(0x081), ProtocolClass::Emcy);
        assert_eq!(ProtocolClass::from_identifier(0x100), ProtocolClass::Time);
        assert_eq!(ProtocolClass::from_identifier(0x181), ProtocolClass::TxPdo(1));
        assert_eq!(ProtocolClass::from_identifier(0x201), ProtocolClass::RxPdo(1));
        assert_eq!(ProtocolClass::from_identifier(0x481), ProtocolClass::TxPdo(4));
        assert_eq!(ProtocolClass::from_identifier(0x501), ProtocolClass::RxPdo(4));
        assert_eq!(ProtocolClass::from_identifier(0x581), ProtocolClass::TxSdo);
        assert_eq!(ProtocolClass::from_identifier(0x601), ProtocolClass::RxSdo);
        assert_eq!(ProtocolClass::from_identifier(0x681), ProtocolClass::Unassigned);
        assert_eq!(ProtocolClass::from_identifier(0x701), ProtocolClass::Heartbeat);
        assert_eq!(ProtocolClass::from_identifier(0x7E5), ProtocolClass::Lss);
        assert_eq!(ProtocolClass::from_identifier(0x701).to_string(), "HBEAT");
    }

    #[test]
    fn test_class_filter_hides_only_its_class() {
        let mut table = FilterTable::new();
        table.set_class_filter(ProtocolClass::Heartbeat, false);

        assert!(!table.should_include(0x705));
        // Same node key, different class
        assert!(table.should_include(0x185));
        assert!(!table.class_filter_enabled(ProtocolClass::Heartbeat));
    }

    #[test]
    fn test_sync_and_emcy_are_separate() {
        let mut table = FilterTable::new();
        table.set_class_filter(ProtocolClass::Sync, false);
        assert!(!table.should_include(0x080));
        assert!(table.should_include(0x081));
    }

    #[test]
    fn test_unlisted_classes_always_pass() {
        let mut table = FilterTable::new();
        table.set_class_filter(ProtocolClass::TxSdo, false);
        assert!(table.class_filter_enabled(ProtocolClass::TxSdo));
        assert!(table.should_include(0x581));
    }

    #[test]
    fn test_load_definition() {
        let mut table = FilterTable::new();
        table.register(0x7F);

        let report = table.load_definition("123,T\n456,F\n");
        assert_eq!(report, LoadReport { loaded: 2, skipped: 0 });
        assert_eq!(table.len(), 2);
        assert_eq!(table.is_enabled(0x123 & 0x7F), Some(true));
        assert_eq!(table.is_enabled(0x456 & 0x7F), Some(false));
        assert!(!table.contains(0x7F));
    }

    #[test]
    fn test_load_definition_skips_malformed_lines() {
        let mut table = FilterTable::new();
        let report = table.load_definition("1,t\nzz,T\n12\n5,X\n\n 7 , F \n");
        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped, 3);
        assert_eq!(table.is_enabled(0x01), Some(true));
        assert_eq!(table.is_enabled(0x07), Some(false));
    }

    #[test]
    fn test_definition_round_trip() {
        let mut table = FilterTable::new();
        table.register(0x1A);
        table.register(0x05);
        table.set_enabled(0x1A, false);

        assert_eq!(table.to_definition(), "5,T\n1a,F\n");

        let mut reloaded = FilterTable::new();
        reloaded.load_definition(&table.to_definition());
        assert_eq!(reloaded.iter().collect::<Vec<_>>(), table.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filters.txt");

        let mut table = FilterTable::new();
        table.register(0x181);
        table.register(0x182);
        table.set_enabled(0x182, false);
        table.save_file(&path).unwrap();

        let mut loaded = FilterTable::new();
        loaded.load_file(&path).unwrap();
        assert_eq!(loaded.is_enabled(0x01), Some(true));
        assert_eq!(loaded.is_enabled(0x02), Some(false));
    }

    #[test]
    fn test_missing_file_leaves_table_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = FilterTable::new();
        table.register(0x181);

        assert!(table.load_file(&dir.path().join("missing.txt")).is_err());
        assert_eq!(table.is_enabled(0x01), Some(true));
    }
}
