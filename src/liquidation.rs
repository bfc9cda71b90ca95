//! Liquidation throttling and keeper rewards.
//!
//! Liquidations are capacity-limited: each market caps the size liquidatable
//! inside a rolling window to throttle cascades, so oversized positions close
//! in partial steps. Keeper rewards are gas-anchored with a
//! percentage-of-collateral bonus for the flagger, all bounded by the global
//! keeper-fee cap. Margin-only liquidation handles the closed-position,
//! debt-exceeds-collateral case in one unthrottled step.

use crate::config::GlobalConfig;
use crate::oracle::GasSnapshot;
use crate::pricing::keeper_fee_base;
use crate::types::{Timestamp, Usd};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Rolling record of liquidated size. Entries older than the window fall out
/// of the capacity sum; staleness is derived at read time, never by a timer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiquidationWindow {
    entries: Vec<(Timestamp, Decimal)>,
}

impl LiquidationWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size liquidated inside the window ending at `now`.
    pub fn used(&self, now: Timestamp, window_ms: i64) -> Decimal {
        let cutoff = now.as_millis() - window_ms;
        self.entries
            .iter()
            .filter(|(t, _)| t.as_millis() > cutoff)
            .map(|(_, size)| *size)
            .sum()
    }

    pub fn record(&mut self, now: Timestamp, size: Decimal, window_ms: i64) {
        let cutoff = now.as_millis() - window_ms;
        self.entries.retain(|(t, _)| t.as_millis() > cutoff);
        self.entries.push((now, size));
    }
}

/// Capacity left in the current window, floored at zero.
pub fn remaining_capacity(
    window: &LiquidationWindow,
    capacity: Decimal,
    now: Timestamp,
    window_ms: i64,
) -> Decimal {
    (capacity - window.used(now, window_ms)).max(Decimal::ZERO)
}

/// Number of keeper transactions needed to work through `size_abs` at the
/// per-window capacity. An empty window capacity still counts as one pass.
pub fn liquidation_iterations(size_abs: Decimal, window_capacity: Decimal) -> Decimal {
    if window_capacity <= Decimal::ZERO || size_abs <= window_capacity {
        return Decimal::ONE;
    }
    let ratio = size_abs / window_capacity;
    let ceil = ratio.ceil();
    // guard against pathological decimals that cannot round-trip
    Decimal::from(ceil.to_u64().unwrap_or(1).max(1))
}

/// Fee paid to the keeper executing one liquidation call, scaled by how many
/// passes the position needs, then bounded.
pub fn liquidation_keeper_fee(
    size_abs: Decimal,
    window_capacity: Decimal,
    gas: &GasSnapshot,
    cfg: &GlobalConfig,
) -> Usd {
    let iterations = liquidation_iterations(size_abs, window_capacity);
    let cost = gas.gas_cost_usd(cfg.liquidation_gas_units) * iterations;
    let fee = keeper_fee_base(cost, cfg)
        .max(cfg.min_keeper_fee_usd.value())
        .min(cfg.max_keeper_fee_usd.value());
    Usd::new(fee)
}

/// Reward paid to the keeper that flags an unhealthy position: bounded gas
/// compensation plus a collateral bonus, all capped.
pub fn flag_reward(collateral_usd: Usd, gas: &GasSnapshot, cfg: &GlobalConfig) -> Usd {
    let cost = gas.gas_cost_usd(cfg.flag_gas_units);
    let base = keeper_fee_base(cost, cfg)
        .max(cfg.min_keeper_fee_usd.value())
        .min(cfg.max_keeper_fee_usd.value());
    let bonus = collateral_usd.value() * cfg.flag_reward_percent;
    Usd::new((base + bonus).min(cfg.max_keeper_fee_usd.value()))
}

/// Margin-only liquidation applies to a closed position whose residual
/// collateral no longer covers its debt.
pub fn can_liquidate_margin_only(position_size_is_zero: bool, collateral: Usd, debt: Usd) -> bool {
    position_size_is_zero && debt > Usd::zero() && collateral < debt
}
