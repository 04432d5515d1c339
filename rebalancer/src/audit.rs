//! JSONL audit trail logging.
//!
//! Every analysis and execution appends events to an audit file, one JSON
//! object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use driftbook::RebalanceRecommendation;
use serde::Serialize;

use crate::error::Result;
use crate::execution::{RebalanceExecution, TradeExecution};

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Append: earlier runs stay in the trail
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")?;
        // Flush each event to disk before returning
        self.writer.flush()?;
        Ok(())
    }

    /// Log a simple event with no additional data.
    pub fn log_simple(&mut self, event: &'static str) -> Result<()> {
        self.log(event, serde_json::json!({}))
    }
}

/// Log the recommendations produced by one analysis.
pub fn log_analysis_completed(
    audit: &mut AuditLog,
    portfolio_id: &str,
    recommendations: &[RebalanceRecommendation],
) -> Result<()> {
    // Amounts are written in dollars; cents stay internal
    let recs: Vec<_> = recommendations
        .iter()
        .map(|r| {
            serde_json::json!({
                "strategy": r.strategy_id,
                "urgency": r.urgency.to_string(),
                "trades": r.trades.len(),
                "trade_value": r.total_trade_value_cents as f64 / 100.0,
                "reason": r.reason,
            })
        })
        .collect();

    audit.log(
        "analysis_completed",
        serde_json::json!({
            "portfolio": portfolio_id,
            "recommendations": recs,
        }),
    )
}

/// Log the start of an execution, before any order is placed.
pub fn log_execution_started(
    audit: &mut AuditLog,
    execution_id: &str,
    recommendation: &RebalanceRecommendation,
    dry_run: bool,
) -> Result<()> {
    audit.log(
        "execution_started",
        serde_json::json!({
            "execution": execution_id,
            "portfolio": recommendation.portfolio_id,
            "strategy": recommendation.strategy_id,
            "trades": recommendation.trades.len(),
            "dry_run": dry_run,
        }),
    )
}

/// Log one trade's outcome.
pub fn log_trade_attempted(
    audit: &mut AuditLog,
    execution_id: &str,
    trade: &TradeExecution,
) -> Result<()> {
    audit.log(
        "trade_attempted",
        serde_json::json!({
            "execution": execution_id,
            "symbol": trade.symbol.as_str(),
            "action": trade.action.to_string(),
            "order_id": trade.order_id,
            "status": trade.status,
            "requested": trade.requested_shares,
            "filled": trade.filled_shares,
            "avg_price": trade.avg_fill_price_cents.map(|c| c as f64 / 100.0),
            "cost": trade.total_cost_cents as f64 / 100.0,
            "error": trade.error,
        }),
    )
}

pub fn log_execution_finished(audit: &mut AuditLog, execution: &RebalanceExecution) -> Result<()> {
    audit.log(
        "execution_finished",
        serde_json::json!({
            "execution": execution.id,
            "portfolio": execution.portfolio_id,
            "status": execution.status,
            "dry_run": execution.dry_run,
            "executed": execution.results.trades_executed,
            "failed": execution.results.trades_failed,
            "improvement_score": execution.results.improvement_score,
            "errors": execution.errors,
        }),
    )
}
