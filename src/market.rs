//! Market configuration and state.
//!
//! A market is one perp pair backed by the shared pool: its fee curve, margin
//! ratio curve, funding constants and liquidation throttle, plus the running
//! aggregates (skew, side open interest, trader debt and collateral totals)
//! every settlement and liquidation keeps in step with the per-account ledger.

use crate::funding::AccrualState;
use crate::liquidation::LiquidationWindow;
use crate::types::{MarketId, Price, SignedSize, Timestamp, Usd};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Per-market parameters, immutable between authorized configuration updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub id: MarketId,
    /// Human-readable name (e.g., "ETH-PERP")
    pub name: String,
    /// Fee fraction charged on skew-reducing notional
    pub maker_fee: Decimal,
    /// Fee fraction charged on skew-expanding notional
    pub taker_fee: Decimal,
    /// Normalizer for skew: price impact, funding and margin all scale by it
    pub skew_scale: Decimal,
    /// Cap on open interest per side, in size units
    pub max_market_size: Decimal,
    /// Margin ratio floor
    pub min_margin_ratio: Decimal,
    /// Margin ratio growth per unit of |size|/skewScale
    pub incremental_margin_scalar: Decimal,
    /// Margin ratio ceiling
    pub max_initial_margin_ratio: Decimal,
    /// MM ratio as a fraction of the IM ratio
    pub maintenance_margin_scalar: Decimal,
    /// Flat USD margin floor added to both IM and MM
    pub min_margin_usd: Usd,
    /// Max drift of the funding rate per day at saturated skew
    pub max_funding_velocity: Decimal,
    /// Proportional skew at which funding velocity saturates
    pub funding_velocity_clamp: Decimal,
    /// Rolling window over which liquidation capacity is measured
    pub liquidation_window_ms: i64,
    /// Scales the fee-weighted skew scale into per-window liquidatable size
    pub liquidation_limit_scalar: Decimal,
}

impl MarketConfig {
    /// Default ETH-PERP parameters.
    pub fn eth_perp() -> Self {
        Self {
            id: MarketId(1),
            name: "ETH-PERP".to_string(),
            maker_fee: dec!(0.0002),
            taker_fee: dec!(0.0006),
            skew_scale: dec!(100_000),
            max_market_size: dec!(10_000),
            min_margin_ratio: dec!(0.02),
            incremental_margin_scalar: dec!(1),
            max_initial_margin_ratio: dec!(0.9),
            maintenance_margin_scalar: dec!(0.5),
            min_margin_usd: Usd::new(dec!(50)),
            max_funding_velocity: dec!(0.09),
            funding_velocity_clamp: dec!(1),
            liquidation_window_ms: 30_000,
            liquidation_limit_scalar: dec!(0.5),
        }
    }
}

/// Dynamic market state: aggregates mutated by every settlement, liquidation
/// and debt payment, reconcilable with the sum of per-account digests.
#[derive(Debug, Clone)]
pub struct MarketState {
    pub config: MarketConfig,
    /// Net trader size: sum of all signed position sizes.
    pub skew: Decimal,
    /// Open interest per side, in size units.
    pub long_oi: Decimal,
    pub short_oi: Decimal,
    /// Sum of per-account debt in this market.
    pub total_debt_usd: Usd,
    /// Sum of per-account collateral in this market.
    pub total_collateral_usd: Usd,
    /// Funding and utilization accumulators.
    pub accruals: AccrualState,
    /// Rolling liquidation capacity usage.
    pub liquidation_window: LiquidationWindow,
    /// Pool collateral delegated to this market, pushed by the pool system.
    pub delegated_collateral_usd: Usd,
    pub last_updated: Timestamp,
}

impl MarketState {
    pub fn new(config: MarketConfig, timestamp: Timestamp) -> Self {
        Self {
            config,
            skew: Decimal::ZERO,
            long_oi: Decimal::ZERO,
            short_oi: Decimal::ZERO,
            total_debt_usd: Usd::zero(),
            total_collateral_usd: Usd::zero(),
            accruals: AccrualState::new(timestamp),
            liquidation_window: LiquidationWindow::new(),
            delegated_collateral_usd: Usd::zero(),
            last_updated: timestamp,
        }
    }

    /// Total open interest in size units.
    pub fn open_interest(&self) -> Decimal {
        self.long_oi + self.short_oi
    }

    /// Total open interest in USD at `price`.
    pub fn open_interest_notional(&self, price: Price) -> Decimal {
        self.open_interest() * price.value()
    }

    /// Move skew and side open interest for a position going from `old` to
    /// `new` size. Called exactly once per ledger mutation so the aggregates
    /// never drift from the account sums.
    pub fn apply_position_delta(&mut self, old: SignedSize, new: SignedSize, now: Timestamp) {
        self.skew += new.value() - old.value();

        if old.is_long() {
            self.long_oi -= old.abs();
        } else if old.is_short() {
            self.short_oi -= old.abs();
        }
        if new.is_long() {
            self.long_oi += new.abs();
        } else if new.is_short() {
            self.short_oi += new.abs();
        }

        // rounding guards
        if self.long_oi < Decimal::ZERO {
            self.long_oi = Decimal::ZERO;
        }
        if self.short_oi < Decimal::ZERO {
            self.short_oi = Decimal::ZERO;
        }
        self.last_updated = now;
    }

    /// Side size cap check for a resulting position set.
    pub fn side_within_max_size(&self, old: SignedSize, new: SignedSize) -> bool {
        let mut long = self.long_oi;
        let mut short = self.short_oi;
        if old.is_long() {
            long -= old.abs();
        } else if old.is_short() {
            short -= old.abs();
        }
        if new.is_long() {
            long += new.abs();
        } else if new.is_short() {
            short += new.abs();
        }
        long <= self.config.max_market_size && short <= self.config.max_market_size
    }

    /// Max liquidatable size per rolling window. Anchored to the fee-weighted
    /// skew scale rather than live open interest, so a close-out always
    /// terminates in ceil(size/capacity) passes even when the flagged
    /// position is the whole market.
    pub fn liquidation_capacity(&self) -> Decimal {
        (self.config.maker_fee + self.config.taker_fee)
            * self.config.skew_scale
            * self.config.liquidation_limit_scalar
    }

    /// Pool credit the market must retain: a fraction of open notional.
    pub fn minimum_credit(&self, price: Price, min_credit_percent: Decimal) -> Usd {
        Usd::new(self.open_interest_notional(price) * min_credit_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn state() -> MarketState {
        MarketState::new(MarketConfig::eth_perp(), Timestamp::from_millis(0))
    }

    #[test]
    fn position_delta_moves_skew_and_oi() {
        let mut s = state();
        let t = Timestamp::from_millis(1);

        s.apply_position_delta(SignedSize::zero(), SignedSize::new(dec!(10)), t);
        assert_eq!(s.skew, dec!(10));
        assert_eq!(s.long_oi, dec!(10));

        s.apply_position_delta(SignedSize::zero(), SignedSize::new(dec!(-4)), t);
        assert_eq!(s.skew, dec!(6));
        assert_eq!(s.short_oi, dec!(4));
        assert_eq!(s.open_interest(), dec!(14));

        // long shrinks from 10 to 3
        s.apply_position_delta(SignedSize::new(dec!(10)), SignedSize::new(dec!(3)), t);
        assert_eq!(s.skew, dec!(-1));
        assert_eq!(s.long_oi, dec!(3));
    }

    #[test]
    fn side_flip_rebalances_oi() {
        let mut s = state();
        let t = Timestamp::from_millis(1);
        s.apply_position_delta(SignedSize::zero(), SignedSize::new(dec!(5)), t);
        s.apply_position_delta(SignedSize::new(dec!(5)), SignedSize::new(dec!(-2)), t);
        assert_eq!(s.long_oi, Decimal::ZERO);
        assert_eq!(s.short_oi, dec!(2));
        assert_eq!(s.skew, dec!(-2));
    }

    #[test]
    fn max_size_is_per_side() {
        let mut s = state();
        s.config.max_market_size = dec!(10);
        let t = Timestamp::from_millis(1);
        s.apply_position_delta(SignedSize::zero(), SignedSize::new(dec!(8)), t);

        assert!(s.side_within_max_size(SignedSize::zero(), SignedSize::new(dec!(2))));
        assert!(!s.side_within_max_size(SignedSize::zero(), SignedSize::new(dec!(3))));
        // the short side is still empty
        assert!(s.side_within_max_size(SignedSize::zero(), SignedSize::new(dec!(-10))));
    }

    #[test]
    fn liquidation_capacity_independent_of_open_interest() {
        let mut s = state();
        // (0.0002 + 0.0006) * 100_000 * 0.5
        assert_eq!(s.liquidation_capacity(), dec!(40));

        let t = Timestamp::from_millis(1);
        s.apply_position_delta(SignedSize::zero(), SignedSize::new(dec!(500)), t);
        assert_eq!(s.liquidation_capacity(), dec!(40));
    }

    #[test]
    fn minimum_credit_scales_with_notional() {
        let mut s = state();
        let t = Timestamp::from_millis(1);
        s.apply_position_delta(SignedSize::zero(), SignedSize::new(dec!(10)), t);

        let credit = s.minimum_credit(Price::new_unchecked(dec!(2000)), dec!(1));
        assert_eq!(credit.value(), dec!(20000));
    }
}
