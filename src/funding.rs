// 5.0: continuous funding and utilization interest.
//
// funding follows a velocity model: the rate drifts at a velocity proportional
// to skew, and positions settle against a cumulative accumulator (USD per unit
// of size) rather than per-block payments. utilization interest charges open
// notional for the pool credit it consumes, on a two-segment linear curve.
// 5.1 has the pure rate math, 5.2 the accrual state machine.

use crate::config::GlobalConfig;
use crate::types::{Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// 5.1: rate math

/// Skew normalized by skewScale. The sign says which side is crowded.
pub fn proportional_skew(skew: Decimal, skew_scale: Decimal) -> Decimal {
    if skew_scale.is_zero() {
        return Decimal::ZERO;
    }
    skew / skew_scale
}

/// Rate-of-change of the funding rate, in rate units per day. Proportional
/// skew is renormalized by the velocity clamp and bounded to [-1, 1] before
/// scaling by the max velocity.
pub fn funding_velocity(
    p_skew: Decimal,
    max_funding_velocity: Decimal,
    funding_velocity_clamp: Decimal,
) -> Decimal {
    let normalized = if funding_velocity_clamp.is_zero() {
        p_skew
    } else {
        p_skew / funding_velocity_clamp
    };
    let bounded = normalized.max(Decimal::NEGATIVE_ONE).min(Decimal::ONE);
    max_funding_velocity * bounded
}

pub fn next_funding_rate(last_rate: Decimal, velocity: Decimal, elapsed_days: Decimal) -> Decimal {
    last_rate + velocity * elapsed_days
}

/// Funding accrued since the last checkpoint, in USD per unit of size.
/// Trapezoidal: the rate moved linearly from `last_rate` to `new_rate`.
pub fn unrecorded_funding(
    last_rate: Decimal,
    new_rate: Decimal,
    elapsed_days: Decimal,
    price: Price,
) -> Decimal {
    let two = Decimal::TWO;
    (last_rate + new_rate) / two * elapsed_days * price.value()
}

/// Open interest notional over delegated pool collateral, clamped to [0, 1].
/// An undercollateralized pool reads as 100% utilized instead of reverting.
pub fn utilization(oi_notional: Decimal, delegated_collateral_usd: Decimal) -> Decimal {
    if oi_notional <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if delegated_collateral_usd <= Decimal::ZERO {
        return Decimal::ONE;
    }
    (oi_notional / delegated_collateral_usd).min(Decimal::ONE)
}

/// Annualized utilization interest rate. Below the breakpoint only the low
/// slope applies; above it, the high slope applies to the excess on top of
/// the full low-segment contribution.
pub fn utilization_rate(u: Decimal, cfg: &GlobalConfig) -> Decimal {
    let breakpoint = cfg.utilization_breakpoint_percent;
    if u <= breakpoint {
        cfg.low_utilization_slope_percent * u
    } else {
        cfg.low_utilization_slope_percent * breakpoint
            + cfg.high_utilization_slope_percent * (u - breakpoint)
    }
}

/// Utilization interest accrued since the last checkpoint, USD per unit of size.
pub fn unrecorded_utilization(rate: Decimal, elapsed_years: Decimal, price: Price) -> Decimal {
    rate * elapsed_years * price.value()
}

// 5.2: per-market accrual state. accumulators only move here, never on reads.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualState {
    /// Current funding rate (per day). Longs pay shorts when positive.
    pub funding_rate: Decimal,
    /// Cumulative funding, USD per unit of signed size.
    pub funding_acc: Decimal,
    /// Current utilization interest rate (per year). Recomputed only at
    /// checkpoints; stale in between by design.
    pub utilization_rate: Decimal,
    /// Cumulative utilization interest, USD per unit of absolute size.
    pub utilization_acc: Decimal,
    pub last_update: Timestamp,
}

impl AccrualState {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            funding_rate: Decimal::ZERO,
            funding_acc: Decimal::ZERO,
            utilization_rate: Decimal::ZERO,
            utilization_acc: Decimal::ZERO,
            last_update: timestamp,
        }
    }

    /// Roll both accumulators forward to `now` using the current skew and the
    /// utilization rate stored at the previous checkpoint.
    pub fn checkpoint(
        &mut self,
        skew: Decimal,
        skew_scale: Decimal,
        max_funding_velocity: Decimal,
        funding_velocity_clamp: Decimal,
        price: Price,
        now: Timestamp,
    ) {
        let elapsed_days = self.last_update.elapsed_days(&now);
        let elapsed_years = self.last_update.elapsed_years(&now);

        let p_skew = proportional_skew(skew, skew_scale);
        let velocity = funding_velocity(p_skew, max_funding_velocity, funding_velocity_clamp);
        let new_rate = next_funding_rate(self.funding_rate, velocity, elapsed_days);

        self.funding_acc += unrecorded_funding(self.funding_rate, new_rate, elapsed_days, price);
        self.funding_rate = new_rate;

        self.utilization_acc +=
            unrecorded_utilization(self.utilization_rate, elapsed_years, price);
        self.last_update = now;
    }

    /// Re-derive the utilization rate from live pool figures. Called on
    /// settlement, liquidation and the explicit recompute entry point.
    pub fn recompute_utilization_rate(
        &mut self,
        oi_notional: Decimal,
        delegated_collateral_usd: Decimal,
        cfg: &GlobalConfig,
    ) -> Decimal {
        let u = utilization(oi_notional, delegated_collateral_usd);
        self.utilization_rate = utilization_rate(u, cfg);
        self.utilization_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cfg() -> GlobalConfig {
        GlobalConfig::default()
    }

    #[test]
    fn proportional_skew_signs() {
        assert_eq!(proportional_skew(dec!(50), dec!(1000)), dec!(0.05));
        assert_eq!(proportional_skew(dec!(-50), dec!(1000)), dec!(-0.05));
        assert_eq!(proportional_skew(dec!(10), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn velocity_is_clamped() {
        // p_skew 0.5 over a 0.1 clamp saturates at max velocity
        assert_eq!(funding_velocity(dec!(0.5), dec!(0.03), dec!(0.1)), dec!(0.03));
        assert_eq!(
            funding_velocity(dec!(-0.5), dec!(0.03), dec!(0.1)),
            dec!(-0.03)
        );
        // inside the clamp it scales linearly
        assert_eq!(
            funding_velocity(dec!(0.05), dec!(0.03), dec!(0.1)),
            dec!(0.015)
        );
    }

    #[test]
    fn funding_accrues_trapezoidally() {
        let price = Price::new_unchecked(dec!(2000));
        // rate moves 0 -> 0.01 over one day: average 0.005 * 1d * $2000 = $10/unit
        let accrued = unrecorded_funding(dec!(0), dec!(0.01), dec!(1), price);
        assert_eq!(accrued, dec!(10));
    }

    #[test]
    fn utilization_clamps_at_full() {
        assert_eq!(utilization(dec!(500), dec!(1000)), dec!(0.5));
        assert_eq!(utilization(dec!(2000), dec!(1000)), dec!(1));
        // undercollateralized pool: fully utilized, no revert
        assert_eq!(utilization(dec!(2000), dec!(0)), dec!(1));
        assert_eq!(utilization(dec!(0), dec!(1000)), dec!(0));
    }

    #[test]
    fn utilization_rate_two_segments() {
        let cfg = cfg();
        // below breakpoint: low slope only
        let low = utilization_rate(dec!(0.5), &cfg);
        assert_eq!(low, dec!(0.0025) * dec!(0.5));

        // above breakpoint: low segment up to breakpoint plus high slope excess
        let high = utilization_rate(dec!(0.9), &cfg);
        let expected = dec!(0.0025) * dec!(0.75) + dec!(0.08) * dec!(0.15);
        assert_eq!(high, expected);
    }

    #[test]
    fn checkpoint_rolls_accumulators() {
        let mut state = AccrualState::new(Timestamp::from_millis(0));
        state.utilization_rate = dec!(0.365); // per year

        let price = Price::new_unchecked(dec!(1000));
        let one_day = Timestamp::from_millis(86_400_000);
        state.checkpoint(dec!(100), dec!(10_000), dec!(0.09), dec!(1), price, one_day);

        // p_skew = 0.01, velocity = 0.0009/day, rate goes 0 -> 0.0009
        assert_eq!(state.funding_rate, dec!(0.0009));
        // trapezoid: 0.00045 * 1d * $1000 = 0.45 USD/unit
        assert_eq!(state.funding_acc, dec!(0.45));
        // utilization: 0.365/yr * (1/365)yr * $1000 = $1/unit
        assert_eq!(state.utilization_acc, dec!(1));
        assert_eq!(state.last_update, one_day);
    }

    #[test]
    fn recompute_is_idempotent_without_state_change() {
        let mut state = AccrualState::new(Timestamp::from_millis(0));
        let cfg = cfg();
        let first = state.recompute_utilization_rate(dec!(900), dec!(1000), &cfg);
        let second = state.recompute_utilization_rate(dec!(900), dec!(1000), &cfg);
        assert_eq!(first, second);
    }
}
