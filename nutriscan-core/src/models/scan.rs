use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::labels::Label;
use crate::models::MacroRecord;

/// Outcome of one successful classify-and-lookup cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub label: Label,
    pub macros: MacroRecord,
    pub timestamp: DateTime<FixedOffset>,
}

impl ScanResult {
    /// `HH:MM` in the offset the timestamp was captured in.
    pub fn time_label(&self) -> String {
        self.timestamp.format("%H:%M").to_string()
    }
}
