// 2.0: skew-aware pricing and fees.
//
// fill price moves the oracle price by the average premium/discount before and
// after the trade. order fees split maker/taker exactly at the zero-skew
// crossing: the portion that shrinks skew toward zero pays makerFee, anything
// past zero pays takerFee. keeper fees are gas-anchored and bounded.

use crate::config::GlobalConfig;
use crate::market::MarketConfig;
use crate::oracle::GasSnapshot;
use crate::types::{Price, Usd};
use rust_decimal::prelude::Signed;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Execution price for `size_delta` against the current skew. Linear impact:
/// the premium/discount is skew/skewScale sampled before and after the trade
/// and averaged, so larger trades pay their own impact.
pub fn fill_price(
    oracle_price: Price,
    skew: Decimal,
    skew_scale: Decimal,
    size_delta: Decimal,
) -> Price {
    if skew_scale.is_zero() {
        return oracle_price;
    }
    let pd_before = skew / skew_scale;
    let pd_after = (skew + size_delta) / skew_scale;
    let premium = (pd_before + pd_after) / Decimal::TWO;
    Price::new_unchecked(oracle_price.value() * (Decimal::ONE + premium))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderFees {
    pub order_fee: Usd,
    pub keeper_fee: Usd,
}

/// Maker/taker order fee for `size_delta` at `price`, given pre-trade `skew`.
///
/// The zero-skew crossing point is computed exactly: a trade that first
/// reduces skew and then expands it on the other side is charged makerFee on
/// the reducing size and takerFee on the remainder, both at the same price.
pub fn order_fee(size_delta: Decimal, price: Price, skew: Decimal, config: &MarketConfig) -> Usd {
    let notional = |size: Decimal| size * price.value();

    // same sign or flat skew: the whole trade expands skew
    if skew.is_zero() || skew.signum() == size_delta.signum() {
        return Usd::new(notional(size_delta.abs()) * config.taker_fee);
    }

    let reducing = size_delta.abs().min(skew.abs());
    let expanding = size_delta.abs() - reducing;

    let maker_part = notional(reducing) * config.maker_fee;
    let taker_part = notional(expanding) * config.taker_fee;
    Usd::new(maker_part + taker_part)
}

/// Keeper compensation floor before bounds: gas cost marked up by the larger
/// of the percentage and the flat profit margin.
pub fn keeper_fee_base(gas_cost_usd: Decimal, cfg: &GlobalConfig) -> Decimal {
    let with_percent = gas_cost_usd * (Decimal::ONE + cfg.keeper_profit_margin_percent);
    let with_flat = gas_cost_usd + cfg.keeper_profit_margin_usd.value();
    with_percent.max(with_flat)
}

fn bounded(fee: Decimal, cfg: &GlobalConfig) -> Usd {
    Usd::new(
        fee.max(cfg.min_keeper_fee_usd.value())
            .min(cfg.max_keeper_fee_usd.value()),
    )
}

/// Fee paid to the keeper that settles an order. The committer's buffer is
/// added before clamping, so a generous buffer cannot exceed the global cap.
pub fn settlement_keeper_fee(
    gas: &GasSnapshot,
    keeper_fee_buffer_usd: Usd,
    cfg: &GlobalConfig,
) -> Usd {
    let cost = gas.gas_cost_usd(cfg.settlement_gas_units);
    bounded(keeper_fee_base(cost, cfg) + keeper_fee_buffer_usd.value(), cfg)
}

/// Fee paid to the keeper that cancels an order on a breached price tolerance.
pub fn cancellation_keeper_fee(gas: &GasSnapshot, cfg: &GlobalConfig) -> Usd {
    let cost = gas.gas_cost_usd(cfg.cancellation_gas_units);
    bounded(keeper_fee_base(cost, cfg), cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> MarketConfig {
        MarketConfig::eth_perp()
    }

    fn oracle() -> Price {
        Price::new_unchecked(dec!(2000))
    }

    #[test]
    fn fill_price_flat_at_zero_skew_midpoint() {
        // buying into zero skew: premium averages 0 and delta/scale
        let cfg = config();
        let p = fill_price(oracle(), dec!(0), cfg.skew_scale, dec!(1000));
        // pd_after = 1000/100000 = 0.01, average 0.005
        assert_eq!(p.value(), dec!(2010));
    }

    #[test]
    fn fill_price_discount_when_reducing_skew() {
        let cfg = config();
        // selling into positive skew gets a premium; buying gets charged one
        let sell = fill_price(oracle(), dec!(2000), cfg.skew_scale, dec!(-1000));
        let buy = fill_price(oracle(), dec!(2000), cfg.skew_scale, dec!(1000));
        assert!(sell.value() < buy.value());
        // sell: pd 0.02 -> 0.01, average 0.015 premium still positive
        assert_eq!(sell.value(), dec!(2030));
    }

    #[test]
    fn fee_all_taker_when_expanding() {
        let cfg = config();
        let fee = order_fee(dec!(10), oracle(), dec!(5), &cfg);
        // 10 * 2000 * 0.0006
        assert_eq!(fee.value(), dec!(12));
    }

    #[test]
    fn fee_all_maker_when_reducing_within_skew() {
        let cfg = config();
        let fee = order_fee(dec!(10), oracle(), dec!(-25), &cfg);
        // 10 * 2000 * 0.0002
        assert_eq!(fee.value(), dec!(4));
    }

    #[test]
    fn fee_splits_exactly_at_zero_crossing() {
        let cfg = config();
        // skew -15, buy 40: 15 maker, 25 taker
        let fee = order_fee(dec!(40), oracle(), dec!(-15), &cfg);
        let expected = dec!(15) * dec!(2000) * cfg.maker_fee + dec!(25) * dec!(2000) * cfg.taker_fee;
        assert_eq!(fee.value(), expected);
    }

    #[test]
    fn keeper_fee_clamped_to_bounds() {
        let cfg = GlobalConfig::default();

        // negligible gas: the flat $2 profit margin sets the fee, already
        // above the $1 floor. cost = 1.6M * 0.001 gwei * $2000 = $0.0032
        let cheap = GasSnapshot::new(dec!(0.001), Price::new_unchecked(dec!(2000)));
        assert_eq!(
            settlement_keeper_fee(&cheap, Usd::zero(), &cfg).value(),
            dec!(2.0032)
        );

        // absurd gas: fee caps at the maximum
        let spike = GasSnapshot::new(dec!(100_000), Price::new_unchecked(dec!(2000)));
        assert_eq!(
            settlement_keeper_fee(&spike, Usd::zero(), &cfg),
            cfg.max_keeper_fee_usd
        );

        // the floor binds once the profit margin drops below it
        let mut tight = GlobalConfig::default();
        tight.keeper_profit_margin_usd = Usd::new(dec!(0.10));
        assert_eq!(
            settlement_keeper_fee(&cheap, Usd::zero(), &tight),
            tight.min_keeper_fee_usd
        );
    }

    #[test]
    fn keeper_buffer_added_before_clamp() {
        let cfg = GlobalConfig::default();
        let gas = GasSnapshot::new(dec!(10), Price::new_unchecked(dec!(2000)));
        let base = settlement_keeper_fee(&gas, Usd::zero(), &cfg);
        let buffered = settlement_keeper_fee(&gas, Usd::new(dec!(5)), &cfg);
        assert_eq!(buffered.value(), (base.value() + dec!(5)).min(cfg.max_keeper_fee_usd.value()));

        // buffer can never push past the cap
        let huge = settlement_keeper_fee(&gas, Usd::new(dec!(10_000)), &cfg);
        assert_eq!(huge, cfg.max_keeper_fee_usd);
    }

    #[test]
    fn keeper_base_uses_larger_margin() {
        let cfg = GlobalConfig::default();
        // small cost: flat $2 margin dominates the 20% markup
        assert_eq!(keeper_fee_base(dec!(1), &cfg), dec!(3));
        // large cost: percentage dominates
        assert_eq!(keeper_fee_base(dec!(100), &cfg), dec!(120));
    }
}
