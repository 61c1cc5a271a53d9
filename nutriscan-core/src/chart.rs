//! Macro proportion chart data for the presentation layer.

use serde::Serialize;

use crate::models::MacroRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroSlice {
    pub label: &'static str,
    pub grams: f64,
    /// Share of total macro grams, 0–100.
    pub percent: f64,
    pub color: &'static str,
}

/// Donut-chart slices in display order: carbs, fat, protein.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroChart {
    pub title: &'static str,
    pub slices: Vec<MacroSlice>,
}

impl From<&MacroRecord> for MacroChart {
    fn from(macros: &MacroRecord) -> Self {
        let parts = [
            ("Carbs", macros.carbs, "#60a5fa"),
            ("Fat", macros.fat, "#f87171"),
            ("Protein", macros.protein, "#4ade80"),
        ];
        let total: f64 = parts.iter().map(|(_, g, _)| g).sum();

        let slices = parts
            .into_iter()
            .map(|(label, grams, color)| MacroSlice {
                label,
                grams,
                percent: if total > 0.0 { grams / total * 100.0 } else { 0.0 },
                color,
            })
            .collect();

        Self {
            title: "Macro Ratio",
            slices,
        }
    }
}
