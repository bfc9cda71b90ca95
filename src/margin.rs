//! Margin requirement and health computation.
//!
//! Margin ratios grow with position size relative to skewScale, so bigger
//! positions post proportionally more margin. Both IM and MM carry additive
//! keeper provisions (liquidation fee, flag reward) derived from the gas
//! snapshot, which makes margin requirements gas-price-sensitive by design.

use crate::config::GlobalConfig;
use crate::liquidation::{flag_reward, liquidation_keeper_fee};
use crate::market::MarketConfig;
use crate::oracle::GasSnapshot;
use crate::types::{Price, SignedSize, Usd};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// IM/MM in USD for a position of a given size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarginBreakdown {
    pub im: Usd,
    pub mm: Usd,
}

/// Initial margin ratio: linear in |size|/skewScale, floored and capped.
pub fn initial_margin_ratio(size_abs: Decimal, config: &MarketConfig) -> Decimal {
    let scaled = if config.skew_scale.is_zero() {
        Decimal::ZERO
    } else {
        size_abs / config.skew_scale * config.incremental_margin_scalar
    };
    (scaled + config.min_margin_ratio).min(config.max_initial_margin_ratio)
}

pub fn maintenance_margin_ratio(size_abs: Decimal, config: &MarketConfig) -> Decimal {
    initial_margin_ratio(size_abs, config) * config.maintenance_margin_scalar
}

/// IM and MM for a position sized `size`, with keeper provisions priced at
/// the current gas snapshot. `window_capacity` is the market's per-window
/// liquidatable size, which sets how many keeper passes a close-out needs.
pub fn liquidation_margins(
    size: SignedSize,
    price: Price,
    collateral_usd: Usd,
    window_capacity: Decimal,
    config: &MarketConfig,
    global: &GlobalConfig,
    gas: &GasSnapshot,
) -> MarginBreakdown {
    let size_abs = size.abs();
    let notional = size_abs * price.value();
    let imr = initial_margin_ratio(size_abs, config);
    let mmr = imr * config.maintenance_margin_scalar;

    let keeper_fee = liquidation_keeper_fee(size_abs, window_capacity, gas, global);
    let reward = flag_reward(collateral_usd, gas, global);
    let additive = config.min_margin_usd.value() + keeper_fee.value() + reward.value();

    MarginBreakdown {
        im: Usd::new(notional * imr + additive),
        mm: Usd::new(notional * mmr + additive),
    }
}

/// Remaining margin over maintenance margin. Below one the position is
/// liquidatable. `Decimal::MAX` is the "cannot be liquidated" sentinel for
/// empty positions and degenerate MM.
pub fn health_factor(remaining_margin: Usd, mm: Usd) -> Decimal {
    if mm.value() <= Decimal::ZERO {
        return Decimal::MAX;
    }
    remaining_margin.value() / mm.value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market() -> MarketConfig {
        MarketConfig::eth_perp()
    }

    fn gas() -> GasSnapshot {
        GasSnapshot::new(dec!(10), Price::new_unchecked(dec!(2000)))
    }

    #[test]
    fn imr_grows_with_size() {
        let cfg = market();
        let small = initial_margin_ratio(dec!(100), &cfg);
        let large = initial_margin_ratio(dec!(10_000), &cfg);
        assert!(large > small);
        // floor: 100/100000 * 1 + 0.02 = 0.021
        assert_eq!(small, dec!(0.021));
    }

    #[test]
    fn imr_caps_at_max() {
        let cfg = market();
        // size equal to skewScale would want ratio 1.02, capped at 0.9
        let capped = initial_margin_ratio(dec!(100_000), &cfg);
        assert_eq!(capped, cfg.max_initial_margin_ratio);
    }

    #[test]
    fn mm_scales_from_im() {
        let cfg = market();
        let imr = initial_margin_ratio(dec!(1000), &cfg);
        let mmr = maintenance_margin_ratio(dec!(1000), &cfg);
        assert_eq!(mmr, imr * cfg.maintenance_margin_scalar);
    }

    #[test]
    fn margins_include_keeper_provisions() {
        let cfg = market();
        let global = GlobalConfig::default();
        let size = SignedSize::new(dec!(10));
        let price = Price::new_unchecked(dec!(2000));

        let margins = liquidation_margins(
            size,
            price,
            Usd::new(dec!(5000)),
            dec!(100),
            &cfg,
            &global,
            &gas(),
        );

        let notional = dec!(20000);
        let imr = initial_margin_ratio(dec!(10), &cfg);
        // strictly above the pure ratio margin because of the additive terms
        assert!(margins.im.value() > notional * imr);
        assert!(margins.mm < margins.im);
        assert!(margins.mm.value() > Decimal::ZERO);
    }

    #[test]
    fn margins_move_with_gas_price() {
        let cfg = market();
        let global = GlobalConfig::default();
        let size = SignedSize::new(dec!(10));
        let price = Price::new_unchecked(dec!(2000));
        let collateral = Usd::new(dec!(5000));

        let calm = GasSnapshot::new(dec!(5), Price::new_unchecked(dec!(2000)));
        let spiky = GasSnapshot::new(dec!(500), Price::new_unchecked(dec!(2000)));

        let low = liquidation_margins(size, price, collateral, dec!(100), &cfg, &global, &calm);
        let high = liquidation_margins(size, price, collateral, dec!(100), &cfg, &global, &spiky);
        assert!(high.mm > low.mm);
    }

    #[test]
    fn health_factor_sentinel() {
        assert_eq!(health_factor(Usd::new(dec!(100)), Usd::zero()), Decimal::MAX);
        assert_eq!(
            health_factor(Usd::new(dec!(100)), Usd::new(dec!(50))),
            dec!(2)
        );
        assert!(health_factor(Usd::new(dec!(40)), Usd::new(dec!(50))) < Decimal::ONE);
    }
}
