// 8.4 engine/liquidations.rs: the two-step close-out path. a keeper first
// flags an unhealthy position (freezing new orders and earning the flag
// reward), then liquidation executes against the rolling capacity window,
// possibly over several partial passes. margin-only liquidation clears the
// residual debt-over-collateral case once the position itself is gone.

use super::results::{EngineError, FlagResult, LiquidationResult, MarginLiquidationResult};
use crate::events::{
    CancelReason, EventPayload, MarginLiquidatedEvent, OrderCanceledEvent, PositionFlaggedEvent,
    PositionLiquidatedEvent,
};
use crate::liquidation::{
    can_liquidate_margin_only, flag_reward, liquidation_keeper_fee, remaining_capacity,
};
use crate::types::{AccountId, ActorId, MarketId, SignedSize, Usd};
use rust_decimal::Decimal;

use super::core::Engine;

impl Engine {
    /// Flag a position whose health factor fell below one. Charges the flag
    /// reward to the account, cancels any pending order, and freezes new
    /// commitments until the position is fully liquidated.
    pub fn flag_position(
        &mut self,
        keeper: ActorId,
        account_id: AccountId,
        market_id: MarketId,
    ) -> Result<FlagResult, EngineError> {
        let market = self.market_ref(market_id)?;
        let account = self.account_ref(account_id)?;
        let position = account
            .position(market_id)
            .ok_or(EngineError::PositionNotFound)?;
        if position.is_flagged() {
            return Err(EngineError::PositionFlagged);
        }

        let oracle = self.oracle(market_id)?;
        let price = oracle.price;
        let (_, _, hf) = self.position_health(account, market, price);
        if hf >= Decimal::ONE {
            return Err(EngineError::CannotLiquidatePosition);
        }

        let reward = flag_reward(account.collateral_usd(market_id), &self.gas, &self.global);
        let accruals = self.projected_accruals(market, price);
        let had_order = account.order(market_id).is_some();

        // mutation phase
        self.market_mut_ref(market_id)?.accruals = accruals;
        self.ledger_apply(account_id, market_id, |acct| {
            acct.charge(market_id, reward);
            acct.orders.remove(&market_id);
            if let Some(p) = acct.position_mut(market_id) {
                p.flagged_by = Some(keeper);
            }
        })?;

        if had_order {
            self.emit_event(EventPayload::OrderCanceled(OrderCanceledEvent {
                account_id,
                market_id,
                reason: CancelReason::Flagged,
                keeper_fee: Usd::zero(),
            }));
        }
        self.emit_event(EventPayload::PositionFlagged(PositionFlaggedEvent {
            account_id,
            market_id,
            flagger: keeper,
            flag_reward: reward,
            health_factor: hf,
        }));
        Ok(FlagResult {
            flag_reward: reward,
            health_factor: hf,
        })
    }

    /// Liquidate as much of a flagged position as the rolling window allows.
    /// Oversized positions close in partial passes, keeping the flag until
    /// the size reaches zero. Health is not re-checked: a flag commits the
    /// position to close-out.
    pub fn liquidate_position(
        &mut self,
        account_id: AccountId,
        market_id: MarketId,
    ) -> Result<LiquidationResult, EngineError> {
        let now = self.current_time;
        let market = self.market_ref(market_id)?;
        let account = self.account_ref(account_id)?;
        let position = account
            .position(market_id)
            .ok_or(EngineError::PositionNotFound)?;
        if !position.is_flagged() {
            return Err(EngineError::PositionNotFlagged);
        }

        let oracle = self.oracle(market_id)?;
        let price = oracle.price;

        let capacity = market.liquidation_capacity();
        let available = remaining_capacity(
            &market.liquidation_window,
            capacity,
            now,
            market.config.liquidation_window_ms,
        );
        if available <= Decimal::ZERO {
            return Err(EngineError::LiquidationZeroCapacity);
        }

        let old_size = position.size;
        let liquidated_abs = old_size.abs().min(available);
        let sign = if old_size.is_long() {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        };
        let new_size = SignedSize::new(old_size.value() - sign * liquidated_abs);

        let accruals = self.projected_accruals(market, price);
        // the whole position realizes at the liquidation price, accruals
        // included; the surviving remainder re-enters flat at that price
        let funding = position.accrued_funding(accruals.funding_acc);
        let utilization = position.accrued_utilization(accruals.utilization_acc);
        let realized = position
            .unrealized_pnl(price)
            .sub(funding)
            .sub(utilization);

        let keeper_fee = liquidation_keeper_fee(liquidated_abs, capacity, &self.gas, &self.global);
        let notional = Usd::new(liquidated_abs * price.value());
        let window_ms = market.config.liquidation_window_ms;

        // mutation phase
        self.market_mut_ref(market_id)?.accruals = accruals.clone();
        self.ledger_apply(account_id, market_id, |acct| {
            acct.realize(market_id, realized);
            acct.charge(market_id, keeper_fee);
            if new_size.is_zero() {
                acct.positions.remove(&market_id);
            } else if let Some(p) = acct.position_mut(market_id) {
                // remainder re-enters at the liquidation price with fresh
                // accumulator anchors; the flag survives the partial pass
                p.size = new_size;
                p.entry_price = price;
                p.entry_funding_acc = accruals.funding_acc;
                p.entry_utilization_acc = accruals.utilization_acc;
                p.accrued_fees_usd = p.accrued_fees_usd.add(keeper_fee);
                p.updated_at = now;
            }
        })?;

        let global = self.global.clone();
        let market = self.market_mut_ref(market_id)?;
        market.apply_position_delta(old_size, new_size, now);
        market
            .liquidation_window
            .record(now, liquidated_abs, window_ms);
        let oi_notional = market.open_interest_notional(price);
        let delegated = market.delegated_collateral_usd.value();
        market
            .accruals
            .recompute_utilization_rate(oi_notional, delegated, &global);

        self.pool.distribute_reward(market_id, notional);

        self.emit_event(EventPayload::PositionLiquidated(PositionLiquidatedEvent {
            account_id,
            market_id,
            liquidated_size: liquidated_abs,
            remaining_size: new_size,
            price,
            keeper_fee,
            distributed_notional: notional,
        }));

        Ok(LiquidationResult {
            liquidated_size: liquidated_abs,
            remaining_size: new_size,
            price,
            keeper_fee,
            distributed_notional: notional,
        })
    }

    /// Clear a closed account whose debt outgrew its collateral: seize what
    /// collateral remains into the pool and forgive the debt. One unthrottled
    /// step; capacity windows only apply to position size.
    pub fn liquidate_margin_only(
        &mut self,
        account_id: AccountId,
        market_id: MarketId,
    ) -> Result<MarginLiquidationResult, EngineError> {
        self.market_ref(market_id)?;
        let account = self.account_ref(account_id)?;
        let eligible = can_liquidate_margin_only(
            account.position(market_id).is_none(),
            account.collateral_usd(market_id),
            account.debt_usd(market_id),
        );
        if !eligible {
            return Err(EngineError::CannotLiquidateMargin);
        }

        let (seized, cleared) =
            self.ledger_apply(account_id, market_id, |acct| acct.seize_margin(market_id))?;
        self.pool.absorb_seized_collateral(market_id, seized);

        self.emit_event(EventPayload::MarginLiquidated(MarginLiquidatedEvent {
            account_id,
            market_id,
            seized_collateral: seized,
            cleared_debt: cleared,
        }));
        Ok(MarginLiquidationResult {
            seized_collateral: seized,
            cleared_debt: cleared,
        })
    }
}
