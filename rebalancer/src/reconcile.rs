//! Deviation report: current weights against targets.

use driftbook::AllocationSnapshot;
use serde::Serialize;

/// Per-symbol comparison of current and target weights.
#[derive(Debug, Clone, Serialize)]
pub struct DeviationReport {
    pub entries: Vec<DeviationEntry>,
    /// Root-mean-square drift over priced allocations (percentage points).
    pub tracking_error_pct: f64,
    /// Mean absolute drift over priced allocations (percentage points).
    pub mean_abs_drift: f64,
    pub total_value_cents: i64,
}

/// One allocation's row.
#[derive(Debug, Clone, Serialize)]
pub struct DeviationEntry {
    pub symbol: String,
    pub target_percent: f64,
    pub current_percent: f64,
    /// `None` when the symbol had no market data.
    pub drift: Option<f64>,
    pub quantity: f64,
    pub value_cents: i64,
}

/// Build a deviation report from an analysis snapshot.
pub fn deviation_report(snapshot: &AllocationSnapshot) -> DeviationReport {
    let mut entries: Vec<DeviationEntry> = snapshot
        .portfolio
        .allocations
        .iter()
        .map(|a| DeviationEntry {
            symbol: a.symbol.as_str().to_string(),
            target_percent: a.target_percent,
            current_percent: a.current_percent,
            drift: a.drift,
            quantity: a.quantity,
            value_cents: a.current_value_cents,
        })
        .collect();
    entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let drifts: Vec<f64> = entries.iter().filter_map(|e| e.drift).collect();
    let n = drifts.len().max(1) as f64;
    let sum_sq: f64 = drifts.iter().map(|d| d * d).sum();
    let sum_abs: f64 = drifts.iter().map(|d| d.abs()).sum();

    DeviationReport {
        entries,
        tracking_error_pct: (sum_sq / n).sqrt(),
        mean_abs_drift: sum_abs / n,
        total_value_cents: snapshot.total_value_cents(),
    }
}

impl std::fmt::Display for DeviationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ALLOCATION DRIFT:")?;
        writeln!(
            f,
            "  {:8} {:>10} {:>10} {:>10} {:>12} {:>14}",
            "Symbol", "Target%", "Current%", "Drift", "Quantity", "Value"
        )?;
        for e in &self.entries {
            let drift = match e.drift {
                Some(d) => format!("{d:+.2}"),
                None => "n/a".to_string(),
            };
            writeln!(
                f,
                "  {:8} {:>9.2}% {:>9.2}% {:>10} {:>12.4} {:>14}",
                e.symbol,
                e.target_percent,
                e.current_percent,
                drift,
                e.quantity,
                driftbook::format_cents(e.value_cents),
            )?;
        }
        writeln!(
            f,
            "\n  Total: {}  Tracking error: {:.3}pp  Mean |drift|: {:.3}pp",
            driftbook::format_cents(self.total_value_cents),
            self.tracking_error_pct,
            self.mean_abs_drift
        )?;
        Ok(())
    }
}
