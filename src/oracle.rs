// 9.0: external price and gas inputs. both are pushed into the engine and read
// once at call entry as an immutable snapshot. nothing in the engine re-queries
// a price mid-computation.

use crate::types::{Price, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A verified oracle observation: the price and when it was published.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OraclePrice {
    pub price: Price,
    pub publish_time: Timestamp,
}

impl OraclePrice {
    pub fn new(price: Price, publish_time: Timestamp) -> Self {
        Self {
            price,
            publish_time,
        }
    }

    /// True when the publish time falls inside the window anchored at the
    /// order commitment time. Settlement requires this.
    pub fn published_within(&self, commitment: Timestamp, min_ms: i64, max_ms: i64) -> bool {
        let offset = self.publish_time.millis_since(commitment);
        offset >= min_ms && offset <= max_ms
    }
}

/// Gas economics captured at call entry. Keeper fees and margin requirements
/// are derived from this, so they move with the gas market by design.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GasSnapshot {
    /// Gas price in gwei.
    pub gas_price_gwei: Decimal,
    /// ETH/USD price used to convert gas cost to USD.
    pub eth_price: Price,
}

impl GasSnapshot {
    pub fn new(gas_price_gwei: Decimal, eth_price: Price) -> Self {
        Self {
            gas_price_gwei,
            eth_price,
        }
    }

    /// USD cost of `gas_units` at this snapshot.
    pub fn gas_cost_usd(&self, gas_units: Decimal) -> Decimal {
        gas_units * self.gas_price_gwei * dec!(0.000000001) * self.eth_price.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn publish_window_check() {
        let price = OraclePrice::new(
            Price::new_unchecked(dec!(50000)),
            Timestamp::from_millis(20_000),
        );
        let commit = Timestamp::from_millis(10_000);

        assert!(price.published_within(commit, 6_000, 60_000));
        assert!(!price.published_within(commit, 15_000, 60_000)); // too early
        assert!(!price.published_within(commit, 0, 5_000)); // too late
    }

    #[test]
    fn gas_cost_conversion() {
        // 1,000,000 gas at 50 gwei = 0.05 ETH; at $2000/ETH that is $100
        let snap = GasSnapshot::new(dec!(50), Price::new_unchecked(dec!(2000)));
        assert_eq!(snap.gas_cost_usd(dec!(1_000_000)), dec!(100));
    }
}
