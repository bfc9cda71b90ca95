// 8.6 engine/funding.rs: explicit accrual entry points. settlement and
// liquidation checkpoint accruals implicitly; these let keepers roll the
// accumulators and refresh the utilization rate between trades. both are
// idempotent at a fixed timestamp.

use super::results::EngineError;
use crate::events::{EventPayload, FundingRecomputedEvent, UtilizationRecomputedEvent};
use crate::types::MarketId;
use rust_decimal::Decimal;

use super::core::Engine;

impl Engine {
    /// Roll the funding accumulator forward to now and return the new rate.
    pub fn recompute_funding(&mut self, market_id: MarketId) -> Result<Decimal, EngineError> {
        self.market_ref(market_id)?;
        let price = self.oracle(market_id)?.price;
        let now = self.current_time;

        let market = self.market_mut_ref(market_id)?;
        let skew = market.skew;
        let skew_scale = market.config.skew_scale;
        let max_velocity = market.config.max_funding_velocity;
        let clamp = market.config.funding_velocity_clamp;
        market
            .accruals
            .checkpoint(skew, skew_scale, max_velocity, clamp, price, now);
        let rate = market.accruals.funding_rate;
        let acc = market.accruals.funding_acc;

        self.emit_event(EventPayload::FundingRecomputed(FundingRecomputedEvent {
            market_id,
            funding_rate: rate,
            funding_acc: acc,
        }));
        Ok(rate)
    }

    /// Checkpoint accruals, then re-derive the utilization rate from the
    /// current open interest and delegated pool collateral. Calling twice at
    /// the same timestamp changes nothing.
    pub fn recompute_utilization(&mut self, market_id: MarketId) -> Result<Decimal, EngineError> {
        self.market_ref(market_id)?;
        let price = self.oracle(market_id)?.price;
        let now = self.current_time;
        let global = self.global.clone();

        let market = self.market_mut_ref(market_id)?;
        let skew = market.skew;
        let skew_scale = market.config.skew_scale;
        let max_velocity = market.config.max_funding_velocity;
        let clamp = market.config.funding_velocity_clamp;
        // the elapsed interval accrues at the previous rate before the rate
        // itself is refreshed
        market
            .accruals
            .checkpoint(skew, skew_scale, max_velocity, clamp, price, now);
        let oi_notional = market.open_interest_notional(price);
        let delegated = market.delegated_collateral_usd.value();
        let rate = market
            .accruals
            .recompute_utilization_rate(oi_notional, delegated, &global);
        let acc = market.accruals.utilization_acc;

        self.emit_event(EventPayload::UtilizationRecomputed(
            UtilizationRecomputedEvent {
                market_id,
                utilization_rate: rate,
                utilization_acc: acc,
            },
        ));
        Ok(rate)
    }
}
