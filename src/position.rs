// 4.0: open position tracking under the recomputed-entry model: every
// settlement realizes the prior position's pnl and accruals into collateral
// and resets the entry price to the fill price. accrued funding/utilization
// are deltas against the market accumulators captured at entry.

use crate::types::{ActorId, Price, Side, SignedSize, Timestamp, Usd};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub size: SignedSize,
    pub entry_price: Price,
    /// Market funding accumulator at entry.
    pub entry_funding_acc: Decimal,
    /// Market utilization accumulator at entry.
    pub entry_utilization_acc: Decimal,
    /// Running total of order and keeper fees this position has paid.
    pub accrued_fees_usd: Usd,
    /// Keeper that flagged the position for liquidation, if any. A flagged
    /// position accepts no new order commitments.
    pub flagged_by: Option<ActorId>,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Position {
    pub fn new(
        size: SignedSize,
        entry_price: Price,
        funding_acc: Decimal,
        utilization_acc: Decimal,
        timestamp: Timestamp,
    ) -> Self {
        debug_assert!(!size.is_zero(), "a stored position always has a side");
        Self {
            size,
            entry_price,
            entry_funding_acc: funding_acc,
            entry_utilization_acc: utilization_acc,
            accrued_fees_usd: Usd::zero(),
            flagged_by: None,
            opened_at: timestamp,
            updated_at: timestamp,
        }
    }

    pub fn side(&self) -> Option<Side> {
        self.size.side()
    }

    pub fn is_flagged(&self) -> bool {
        self.flagged_by.is_some()
    }

    // 4.1: paper gains/losses. size * (mark - entry)
    pub fn unrealized_pnl(&self, price: Price) -> Usd {
        Usd::new(self.size.value() * (price.value() - self.entry_price.value()))
    }

    /// Funding owed since entry. Positive = this position pays.
    pub fn accrued_funding(&self, current_funding_acc: Decimal) -> Usd {
        Usd::new(self.size.value() * (current_funding_acc - self.entry_funding_acc))
    }

    /// Utilization interest owed since entry. Always a cost, charged on
    /// absolute size regardless of side.
    pub fn accrued_utilization(&self, current_utilization_acc: Decimal) -> Usd {
        Usd::new(self.size.abs() * (current_utilization_acc - self.entry_utilization_acc))
    }

    pub fn notional(&self, price: Price) -> Usd {
        Usd::new(self.size.abs() * price.value())
    }

    // 4.2: collateral + pnl - accruals. this vs MM decides liquidation.
    pub fn remaining_margin(
        &self,
        collateral: Usd,
        price: Price,
        funding_acc: Decimal,
        utilization_acc: Decimal,
    ) -> Usd {
        collateral
            .add(self.unrealized_pnl(price))
            .sub(self.accrued_funding(funding_acc))
            .sub(self.accrued_utilization(utilization_acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn long_position() -> Position {
        Position::new(
            SignedSize::new(dec!(2)),
            Price::new_unchecked(dec!(2000)),
            Decimal::ZERO,
            Decimal::ZERO,
            Timestamp::from_millis(0),
        )
    }

    #[test]
    fn pnl_follows_price() {
        let pos = long_position();
        assert_eq!(
            pos.unrealized_pnl(Price::new_unchecked(dec!(2100))).value(),
            dec!(200)
        );
        assert_eq!(
            pos.unrealized_pnl(Price::new_unchecked(dec!(1900))).value(),
            dec!(-200)
        );
    }

    #[test]
    fn short_pnl_inverts() {
        let pos = Position::new(
            SignedSize::new(dec!(-2)),
            Price::new_unchecked(dec!(2000)),
            Decimal::ZERO,
            Decimal::ZERO,
            Timestamp::from_millis(0),
        );
        assert_eq!(
            pos.unrealized_pnl(Price::new_unchecked(dec!(1900))).value(),
            dec!(200)
        );
    }

    #[test]
    fn funding_signs_by_side() {
        let long = long_position();
        // accumulator rose by 5 USD/unit: long pays 10
        assert_eq!(long.accrued_funding(dec!(5)).value(), dec!(10));

        let short = Position::new(
            SignedSize::new(dec!(-2)),
            Price::new_unchecked(dec!(2000)),
            Decimal::ZERO,
            Decimal::ZERO,
            Timestamp::from_millis(0),
        );
        // short receives when the accumulator rises
        assert_eq!(short.accrued_funding(dec!(5)).value(), dec!(-10));
    }

    #[test]
    fn utilization_always_costs() {
        let long = long_position();
        let short = Position::new(
            SignedSize::new(dec!(-2)),
            Price::new_unchecked(dec!(2000)),
            Decimal::ZERO,
            Decimal::ZERO,
            Timestamp::from_millis(0),
        );
        assert_eq!(long.accrued_utilization(dec!(3)).value(), dec!(6));
        assert_eq!(short.accrued_utilization(dec!(3)).value(), dec!(6));
    }

    #[test]
    fn remaining_margin_nets_everything() {
        let pos = long_position();
        let margin = pos.remaining_margin(
            Usd::new(dec!(1000)),
            Price::new_unchecked(dec!(2100)), // +200 pnl
            dec!(5),                          // -10 funding
            dec!(1),                          // -2 utilization
        );
        assert_eq!(margin.value(), dec!(1188));
    }
}
