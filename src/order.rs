// 3.0: pending order commitments. an order is a signed size delta waiting out
// the oracle price delay; whether it is Pending, Ready or Stale is a pure
// function of its commitment time and the configured age windows. nothing
// expires actively — staleness is derived at read time.

use crate::config::GlobalConfig;
use crate::hooks::HookId;
use crate::types::{Price, SignedSize, Timestamp, Usd};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Inside the price-delay window; cannot settle or cancel yet.
    Pending,
    /// Inside the settlement window; settles with a fresh price, cancels only
    /// on a breached limit.
    Ready,
    /// Past the settlement window; cancellable without a tolerance check.
    Stale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub size_delta: SignedSize,
    /// Worst acceptable fill price: ceiling for buys, floor for sells.
    pub limit_price: Price,
    pub committed_at: Timestamp,
    /// Extra USD the committer offers the settling keeper on top of gas.
    pub keeper_fee_buffer_usd: Usd,
    /// Whitelisted hooks to run after settlement, in order.
    pub hooks: Vec<HookId>,
}

impl Order {
    pub fn new(
        size_delta: SignedSize,
        limit_price: Price,
        committed_at: Timestamp,
        keeper_fee_buffer_usd: Usd,
        hooks: Vec<HookId>,
    ) -> Self {
        Self {
            size_delta,
            limit_price,
            committed_at,
            keeper_fee_buffer_usd,
            hooks,
        }
    }

    pub fn age_ms(&self, now: Timestamp) -> i64 {
        now.millis_since(self.committed_at)
    }

    pub fn status(&self, now: Timestamp, cfg: &GlobalConfig) -> OrderStatus {
        let age = self.age_ms(now);
        if age < cfg.min_order_age_ms {
            OrderStatus::Pending
        } else if age <= cfg.max_order_age_ms {
            OrderStatus::Ready
        } else {
            OrderStatus::Stale
        }
    }

    pub fn is_stale(&self, now: Timestamp, cfg: &GlobalConfig) -> bool {
        self.status(now, cfg) == OrderStatus::Stale
    }

    /// True when `fill_price` lands outside the committed tolerance: above
    /// the limit for a buy, below it for a sell. Settlement refuses such a
    /// fill; tolerance-based cancellation requires it.
    pub fn limit_breached(&self, fill_price: Price) -> bool {
        if self.size_delta.is_long() {
            fill_price > self.limit_price
        } else {
            fill_price < self.limit_price
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(size: rust_decimal::Decimal, limit: rust_decimal::Decimal) -> Order {
        Order::new(
            SignedSize::new(size),
            Price::new_unchecked(limit),
            Timestamp::from_millis(10_000),
            Usd::zero(),
            Vec::new(),
        )
    }

    #[test]
    fn status_transitions_with_age() {
        let cfg = GlobalConfig::default(); // min 12s, max 60s
        let o = order(dec!(1), dec!(2000));

        assert_eq!(o.status(Timestamp::from_millis(15_000), &cfg), OrderStatus::Pending);
        assert_eq!(o.status(Timestamp::from_millis(22_000), &cfg), OrderStatus::Ready);
        assert_eq!(o.status(Timestamp::from_millis(70_000), &cfg), OrderStatus::Ready);
        assert_eq!(o.status(Timestamp::from_millis(70_001), &cfg), OrderStatus::Stale);
    }

    #[test]
    fn staleness_is_monotonic() {
        let cfg = GlobalConfig::default();
        let o = order(dec!(1), dec!(2000));

        let mut seen_stale = false;
        for ms in (10_000..120_000).step_by(1_000) {
            let stale = o.is_stale(Timestamp::from_millis(ms), &cfg);
            if seen_stale {
                assert!(stale, "stale order went back to live at {ms}");
            }
            seen_stale |= stale;
        }
        assert!(seen_stale);
    }

    #[test]
    fn limit_breach_by_side() {
        let buy = order(dec!(1), dec!(2000));
        assert!(!buy.limit_breached(Price::new_unchecked(dec!(1999))));
        assert!(!buy.limit_breached(Price::new_unchecked(dec!(2000))));
        assert!(buy.limit_breached(Price::new_unchecked(dec!(2001))));

        let sell = order(dec!(-1), dec!(2000));
        assert!(!sell.limit_breached(Price::new_unchecked(dec!(2001))));
        assert!(sell.limit_breached(Price::new_unchecked(dec!(1999))));
    }
}
