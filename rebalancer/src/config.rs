//! TOML configuration loading and validation.
//!
//! Every key has a default, so an empty file (or no file) is a valid
//! configuration: market orders, zero costs, no tax, US equity hours.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use driftbook::{CostModel, TradePricing};
use driftbook_broker::TimeInForce;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub execution: ExecutionConfig,
    pub cost: CostConfig,
    pub tax: TaxConfig,
    pub dry_run: DryRunConfig,
    pub market_hours: MarketHoursConfig,
    pub logging: LoggingConfig,
}

/// How orders are sent to the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderTypeSetting {
    #[default]
    Market,
    Limit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub order_type: OrderTypeSetting,
    /// Limit price offset from the reference price (buy above, sell below).
    #[serde(default = "default_offset")]
    pub limit_offset_bps: u32,
    #[serde(default)]
    pub time_in_force: TimeInForce,
    /// Pause between consecutive orders.
    #[serde(default = "default_interval")]
    pub order_interval_ms: u64,
    /// Pause between status polls of a working order.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            order_type: OrderTypeSetting::default(),
            limit_offset_bps: default_offset(),
            time_in_force: TimeInForce::default(),
            order_interval_ms: default_interval(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_offset() -> u32 {
    5
}
fn default_interval() -> u64 {
    100
}
fn default_poll_interval() -> u64 {
    250
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub commission_bps: u32,
    pub slippage_bps: u32,
    pub min_trade_fee_cents: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaxConfig {
    /// Tax rate on realised gains, as a fraction (0.15 = 15%).
    pub rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DryRunConfig {
    /// Improvement score reported by simulated executions.
    #[serde(default = "default_improvement_score")]
    pub improvement_score: f64,
}

impl Default for DryRunConfig {
    fn default() -> Self {
        Self {
            improvement_score: default_improvement_score(),
        }
    }
}

fn default_improvement_score() -> f64 {
    95.0
}

/// Trading session, weekdays only, in UTC (`HH:MM`).
#[derive(Debug, Clone, Deserialize)]
pub struct MarketHoursConfig {
    #[serde(default = "default_open")]
    pub open_utc: String,
    #[serde(default = "default_close")]
    pub close_utc: String,
}

impl Default for MarketHoursConfig {
    fn default() -> Self {
        Self {
            open_utc: default_open(),
            close_utc: default_close(),
        }
    }
}

fn default_open() -> String {
    "14:30".into()
}
fn default_close() -> String {
    "21:00".into()
}

impl MarketHoursConfig {
    /// Parsed `(open, close)` times.
    pub fn window(&self) -> Result<(NaiveTime, NaiveTime)> {
        let parse = |key: &str, value: &str| {
            NaiveTime::parse_from_str(value, "%H:%M")
                .map_err(|e| Error::Config(format!("market_hours.{key} '{value}': {e}")))
        };
        Ok((parse("open_utc", &self.open_utc)?, parse("close_utc", &self.close_utc)?))
    }

    /// The parsed trading session.
    pub fn session(&self) -> Result<MarketSession> {
        let (open, close) = self.window()?;
        Ok(MarketSession { open, close })
    }

    /// Whether `now` falls inside the session on a weekday.
    pub fn is_open(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.session()?.contains(now))
    }
}

/// A weekday trading session in UTC, already parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketSession {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl MarketSession {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let t = now.time();
        t >= self.open && t < self.close
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

impl EngineConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    pub fn validate(&self) -> Result<()> {
        if self.execution.limit_offset_bps >= 10_000 {
            return Err(Error::Config("limit_offset_bps must be < 10000".into()));
        }
        if self.cost.min_trade_fee_cents < 0 {
            return Err(Error::Config("min_trade_fee_cents must be >= 0".into()));
        }
        if !(0.0..=1.0).contains(&self.tax.rate) {
            return Err(Error::Config("tax rate must be in [0.0, 1.0]".into()));
        }
        if !(0.0..=100.0).contains(&self.dry_run.improvement_score) {
            return Err(Error::Config(
                "dry_run improvement_score must be in [0, 100]".into(),
            ));
        }
        let (open, close) = self.market_hours.window()?;
        if open >= close {
            return Err(Error::Config(
                "market_hours open_utc must be before close_utc".into(),
            ));
        }
        Ok(())
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel {
            commission_bps: self.cost.commission_bps,
            slippage_bps: self.cost.slippage_bps,
            min_trade_fee: self.cost.min_trade_fee_cents,
        }
    }

    /// Cost and tax settings for trade sizing.
    pub fn pricing(&self) -> TradePricing {
        TradePricing {
            cost_model: self.cost_model(),
            tax_rate: self.tax.rate,
        }
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }
}
