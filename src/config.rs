// 7.0: global engine parameters. everything that applies across markets lives
// here: order age windows, oracle publish-time windows, keeper fee economics
// and the utilization interest curve. per-market parameters are in market.rs.

use crate::types::Usd;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Price-delay window: an order younger than this cannot settle.
    pub min_order_age_ms: i64,
    /// Settlement window end: an order older than this is stale.
    pub max_order_age_ms: i64,
    /// Oracle publish time must be at least this far past commitment.
    pub pyth_publish_time_min_ms: i64,
    /// Oracle publish time must be at most this far past commitment.
    pub pyth_publish_time_max_ms: i64,

    // gas unit estimates per keeper operation, priced via the gas snapshot
    pub settlement_gas_units: Decimal,
    pub cancellation_gas_units: Decimal,
    pub flag_gas_units: Decimal,
    pub liquidation_gas_units: Decimal,

    /// Multiplicative keeper profit margin (0.2 = 20% over gas cost).
    pub keeper_profit_margin_percent: Decimal,
    /// Flat keeper profit margin, alternative to the percentage.
    pub keeper_profit_margin_usd: Usd,
    pub min_keeper_fee_usd: Usd,
    pub max_keeper_fee_usd: Usd,
    /// Percentage-of-collateral bonus paid to the flagging keeper.
    pub flag_reward_percent: Decimal,

    // utilization interest curve, two linear segments around the breakpoint
    pub utilization_breakpoint_percent: Decimal,
    pub low_utilization_slope_percent: Decimal,
    pub high_utilization_slope_percent: Decimal,

    /// Fraction of open interest notional the pool must keep as credit.
    pub min_credit_percent: Decimal,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            min_order_age_ms: 12_000,
            max_order_age_ms: 60_000,
            pyth_publish_time_min_ms: 6_000,
            pyth_publish_time_max_ms: 60_000,
            settlement_gas_units: dec!(1_600_000),
            cancellation_gas_units: dec!(600_000),
            flag_gas_units: dec!(900_000),
            liquidation_gas_units: dec!(1_200_000),
            keeper_profit_margin_percent: dec!(0.2),
            keeper_profit_margin_usd: Usd::new(dec!(2)),
            min_keeper_fee_usd: Usd::new(dec!(1)),
            max_keeper_fee_usd: Usd::new(dec!(50)),
            flag_reward_percent: dec!(0.0001),
            utilization_breakpoint_percent: dec!(0.75),
            low_utilization_slope_percent: dec!(0.0025),
            high_utilization_slope_percent: dec!(0.08),
            min_credit_percent: dec!(1),
        }
    }
}

impl GlobalConfig {
    /// Zero-delay preset: orders settle immediately and never go stale within
    /// an hour. Used by tests that exercise accounting rather than timing.
    pub fn instant_settlement() -> Self {
        Self {
            min_order_age_ms: 0,
            max_order_age_ms: 3_600_000,
            pyth_publish_time_min_ms: 0,
            ..Self::default()
        }
    }
}
