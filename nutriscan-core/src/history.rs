//! Per-session scan history.

use crate::models::{MacroRecord, ScanResult};

/// Append-only list of successful scans for one session.
///
/// Insertion order is chronological; [`SessionHistory::all`] hands entries
/// back most-recent-first.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    entries: Vec<ScanResult>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, result: ScanResult) {
        self.entries.push(result);
    }

    /// Most-recent-first view. Each call starts a fresh iterator.
    pub fn all(&self) -> impl DoubleEndedIterator<Item = &ScanResult> + ExactSizeIterator + '_ {
        self.entries.iter().rev()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of macros across every scan in the session.
    pub fn totals(&self) -> MacroRecord {
        self.entries
            .iter()
            .fold(MacroRecord::ZERO, |acc, r| acc.add(&r.macros))
    }
}
