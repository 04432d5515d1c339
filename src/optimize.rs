//! Trade list optimization.
//!
//! Turns an evaluator's provisional trades into the final, executable list:
//! excluded symbols are removed, trades on the same symbol are netted, small
//! trades are dropped, and the rest is ordered by priority and truncated.
//!
//! The pass is deterministic and idempotent: running it on its own output
//! returns the same list.

use rustc_hash::FxHashMap;

use crate::portfolio::TradePricing;
use crate::recommendation::{TaxImplication, TradeAction, TradeRecommendation};
use crate::strategy::RebalancingStrategy;
use crate::types::Symbol;

/// Filter, net, and order `trades` under `strategy`'s constraints.
pub fn optimize_trades(
    trades: Vec<TradeRecommendation>,
    strategy: &RebalancingStrategy,
    pricing: &TradePricing,
) -> Vec<TradeRecommendation> {
    let constraints = &strategy.constraints;
    let min_trade = strategy.params.min_trade_cents;

    let kept = trades
        .into_iter()
        .filter(|t| !constraints.is_excluded(&t.symbol));
    let mut out: Vec<TradeRecommendation> = merge_by_symbol(kept, pricing)
        .into_iter()
        .filter(|t| t.shares > 0.0 && t.notional_cents >= min_trade)
        .collect();

    out.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    out.truncate(constraints.max_daily_trades);
    out
}

/// Net trades sharing a symbol, keeping first-seen order.
fn merge_by_symbol(
    trades: impl Iterator<Item = TradeRecommendation>,
    pricing: &TradePricing,
) -> Vec<TradeRecommendation> {
    let mut index: FxHashMap<Symbol, usize> = FxHashMap::default();
    let mut groups: Vec<Vec<TradeRecommendation>> = Vec::new();
    for trade in trades {
        match index.get(&trade.symbol) {
            Some(&i) => groups[i].push(trade),
            None => {
                index.insert(trade.symbol, groups.len());
                groups.push(vec![trade]);
            }
        }
    }

    groups
        .into_iter()
        .filter_map(|mut group| {
            if group.len() == 1 {
                return group.pop();
            }
            net(group, pricing)
        })
        .collect()
}

/// Combine several trades on one symbol into a single net trade.
fn net(group: Vec<TradeRecommendation>, pricing: &TradePricing) -> Option<TradeRecommendation> {
    let signed: f64 = group.iter().map(|t| t.action.sign() * t.shares).sum();
    let shares = signed.abs();
    if shares <= 0.0 {
        return None;
    }
    let action = if signed > 0.0 {
        TradeAction::Buy
    } else {
        TradeAction::Sell
    };

    // The last trade in a group carries the most recent target.
    let last = group.last()?.clone();
    let price = last.price_cents;
    let notional = (shares * price as f64).round() as i64;
    let priority = group.iter().map(|t| t.priority).max().unwrap_or(0);

    // Scale a known per-share gain to the netted sell size.
    let tax_implication = match action {
        TradeAction::Buy => None,
        TradeAction::Sell => group
            .iter()
            .find(|t| t.action == TradeAction::Sell && t.tax_implication.is_some())
            .and_then(|t| {
                let tax = t.tax_implication?;
                let per_share = tax.realized_gain_cents as f64 / t.shares;
                let realized_gain_cents = (per_share * shares).round() as i64;
                let estimated_tax_cents = if realized_gain_cents > 0 {
                    (realized_gain_cents as f64 * pricing.tax_rate).round() as i64
                } else {
                    0
                };
                Some(TaxImplication {
                    realized_gain_cents,
                    estimated_tax_cents,
                })
            }),
    };

    let reason = group
        .iter()
        .map(|t| t.reason.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    Some(TradeRecommendation {
        action,
        shares,
        notional_cents: notional,
        reason,
        priority,
        estimated_cost_cents: pricing.cost_model.compute_cost(notional),
        tax_implication,
        ..last
    })
}
