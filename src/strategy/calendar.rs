//! Calendar strategy: rebalance everything to target on a fixed schedule.

use chrono::{DateTime, Duration, Months, Utc};

use crate::recommendation::Urgency;
use crate::types::DRIFT_EPSILON;

use super::sizing::size_trade;
use super::{Evaluation, EvaluationContext, StrategyEvaluator};

/// Days past due after which a calendar rebalance becomes urgent.
const OVERDUE_DAYS: i64 = 7;

/// Rebalancing cadence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Frequency {
    Monthly,
    #[default]
    Quarterly,
    Annual,
}

impl Frequency {
    pub fn months(self) -> u32 {
        match self {
            Frequency::Monthly => 1,
            Frequency::Quarterly => 3,
            Frequency::Annual => 12,
        }
    }

    /// The first due date after `last_run`, clamped to month end
    /// (Jan 31 + 1 month = Feb 28/29).
    pub fn next_after(self, last_run: DateTime<Utc>) -> Option<DateTime<Utc>> {
        last_run.checked_add_months(Months::new(self.months()))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CalendarParams {
    pub frequency: Frequency,
}

impl StrategyEvaluator for CalendarParams {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Evaluation {
        let urgency = match ctx.strategy.last_run {
            None => Urgency::Medium,
            Some(last_run) => match self.frequency.next_after(last_run) {
                Some(due) if ctx.now < due => {
                    return Evaluation::idle(format!(
                        "next {:?} rebalance due {}",
                        self.frequency,
                        due.format("%Y-%m-%d")
                    ));
                }
                Some(due) if ctx.now - due > Duration::days(OVERDUE_DAYS) => Urgency::High,
                Some(_) => Urgency::Medium,
                // Date overflow: treat as never due.
                None => return Evaluation::idle("next rebalance date out of range"),
            },
        };

        let min_trade = ctx.strategy.params.min_trade_cents;
        let trades: Vec<_> = ctx
            .snapshot
            .priced()
            .filter(|(a, _)| a.drift.is_some_and(|d| d.abs() > DRIFT_EPSILON))
            .filter_map(|(allocation, quote)| {
                let reason = format!(
                    "scheduled {:?} rebalance of {} to {:.2}%",
                    self.frequency, allocation.symbol, allocation.target_percent
                );
                size_trade(
                    ctx,
                    allocation,
                    quote,
                    allocation.target_percent,
                    min_trade,
                    reason,
                )
            })
            .collect();

        Evaluation {
            reason: format!(
                "{:?} rebalance due; {} position(s) off target",
                self.frequency,
                trades.len()
            ),
            trades,
            urgency,
        }
    }
}
