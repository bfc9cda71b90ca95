// 8.3 engine/orders.rs: the order state machine. commit validates and parks a
// signed size delta; settle executes it against a delayed oracle price after
// the price-delay window; cancel handles breached limits and stale orders.
// every entry point validates fully before touching state.

use super::results::{CancellationResult, EngineError, SettlementResult};
use crate::auth::Capability;
use crate::events::{
    CancelReason, EventPayload, HookFailedEvent, OrderCanceledEvent, OrderCommittedEvent,
    OrderSettledEvent,
};
use crate::hooks::{HookContext, HookId, HookOutcome};
use crate::margin::liquidation_margins;
use crate::order::{Order, OrderStatus};
use crate::pricing::{cancellation_keeper_fee, fill_price, order_fee, settlement_keeper_fee};
use crate::position::Position;
use crate::types::{AccountId, ActorId, MarketId, Price, SignedSize, Usd};

use super::core::Engine;

/// A trade increases risk when it grows the absolute size or flips the side.
/// Only risk-increasing trades are gated on IM; deleveraging always goes
/// through.
fn increases_risk(old: SignedSize, new: SignedSize) -> bool {
    if new.is_zero() {
        return false;
    }
    if old.is_zero() {
        return true;
    }
    new.abs() > old.abs() || old.is_long() != new.is_long()
}

/// Collateral/debt after realizing `realized` and charging `fees`, without
/// touching the account. Settlement's IM gate runs on this preview; the
/// ledger mutation applies the same rules through `Account`.
fn preview_balances(collateral: Usd, debt: Usd, realized: Usd, fees: Usd) -> (Usd, Usd) {
    let (mut collateral, mut debt) = (collateral, debt);
    if realized.is_negative() {
        let loss = realized.abs();
        let from_collateral = collateral.min(loss);
        collateral = collateral.sub(from_collateral);
        debt = debt.add(loss.sub(from_collateral));
    } else {
        let to_debt = debt.min(realized);
        debt = debt.sub(to_debt);
        collateral = collateral.add(realized.sub(to_debt));
    }
    let from_collateral = collateral.min(fees);
    collateral = collateral.sub(from_collateral);
    debt = debt.add(fees.sub(from_collateral));
    (collateral, debt)
}

impl Engine {
    /// Commit an order: one per account per market. The order waits out the
    /// price-delay window before a keeper can settle it.
    #[allow(clippy::too_many_arguments)]
    pub fn commit_order(
        &mut self,
        actor: ActorId,
        account_id: AccountId,
        market_id: MarketId,
        size_delta: SignedSize,
        limit_price: Price,
        keeper_fee_buffer_usd: Usd,
        hooks: Vec<HookId>,
    ) -> Result<(), EngineError> {
        self.market_ref(market_id)?;
        self.ensure_authorized(actor, account_id, Capability::CommitOrder)?;
        if size_delta.is_zero() {
            return Err(EngineError::ZeroAmount);
        }
        for hook in &hooks {
            if !self.hooks.is_whitelisted(*hook) {
                return Err(EngineError::HookNotWhitelisted(hook.0));
            }
        }

        let account = self.account_ref(account_id)?;
        if account.order(market_id).is_some() {
            return Err(EngineError::OrderFound);
        }
        if account.position(market_id).is_some_and(|p| p.is_flagged()) {
            return Err(EngineError::PositionFlagged);
        }

        let oracle = self.oracle(market_id)?;
        let market = self.market_ref(market_id)?;
        let old_size = account
            .position(market_id)
            .map(|p| p.size)
            .unwrap_or_else(SignedSize::zero);
        let new_size = old_size.add(size_delta.value());

        if !market.side_within_max_size(old_size, new_size) {
            return Err(EngineError::MaxMarketSizeExceeded {
                size: new_size.abs(),
                max: market.config.max_market_size,
            });
        }

        // commit-time IM preview at today's skew and gas; settlement re-runs
        // this gate against the actual fill
        if increases_risk(old_size, new_size) {
            let fill = fill_price(
                oracle.price,
                market.skew,
                market.config.skew_scale,
                size_delta.value(),
            );
            let fees = order_fee(size_delta.value(), fill, market.skew, &market.config)
                .add(settlement_keeper_fee(
                    &self.gas,
                    keeper_fee_buffer_usd,
                    &self.global,
                ));
            let (margin, _, _) = self.position_health(account, market, oracle.price);
            let available = margin.sub(fees);
            let required = liquidation_margins(
                new_size,
                oracle.price,
                account.collateral_usd(market_id),
                market.liquidation_capacity(),
                &market.config,
                &self.global,
                &self.gas,
            )
            .im;
            if available < required {
                return Err(EngineError::InsufficientMargin {
                    required,
                    available,
                });
            }
        }

        let order = Order::new(
            size_delta,
            limit_price,
            self.current_time,
            keeper_fee_buffer_usd,
            hooks,
        );
        self.account_mut_ref(account_id)?
            .orders
            .insert(market_id, order);

        self.emit_event(EventPayload::OrderCommitted(OrderCommittedEvent {
            account_id,
            market_id,
            size_delta,
            limit_price,
            keeper_fee_buffer_usd,
        }));
        Ok(())
    }

    /// Settle a ready order. Permissionless: any keeper may call, funded by
    /// the keeper fee charged to the account.
    pub fn settle_order(
        &mut self,
        account_id: AccountId,
        market_id: MarketId,
    ) -> Result<SettlementResult, EngineError> {
        let now = self.current_time;

        // read phase: everything validated on immutable state
        let market = self.market_ref(market_id)?;
        let account = self.account_ref(account_id)?;
        let order = account
            .order(market_id)
            .ok_or(EngineError::OrderNotFound)?
            .clone();

        match order.status(now, &self.global) {
            OrderStatus::Pending => return Err(EngineError::OrderNotReady),
            OrderStatus::Stale => return Err(EngineError::OrderStale),
            OrderStatus::Ready => {}
        }

        let oracle = self.oracle(market_id)?;
        if !oracle.published_within(
            order.committed_at,
            self.global.pyth_publish_time_min_ms,
            self.global.pyth_publish_time_max_ms,
        ) {
            return Err(EngineError::StalePrice {
                publish_time_ms: oracle.publish_time.as_millis(),
                commitment_time_ms: order.committed_at.as_millis(),
            });
        }
        let price = oracle.price;

        // the size bound is checked before the fill price: past the per-side
        // cap the premium math is meaningless
        let position = account.position(market_id);
        let old_size = position.map(|p| p.size).unwrap_or_else(SignedSize::zero);
        let new_size = old_size.add(order.size_delta.value());

        if !market.side_within_max_size(old_size, new_size) {
            return Err(EngineError::MaxMarketSizeExceeded {
                size: new_size.abs(),
                max: market.config.max_market_size,
            });
        }

        let fill = fill_price(
            price,
            market.skew,
            market.config.skew_scale,
            order.size_delta.value(),
        );
        if order.limit_breached(fill) {
            return Err(EngineError::PriceToleranceExceeded {
                fill_price: fill,
                limit_price: order.limit_price,
            });
        }

        let accruals = self.projected_accruals(market, price);
        let fee = order_fee(order.size_delta.value(), fill, market.skew, &market.config);
        let keeper_fee =
            settlement_keeper_fee(&self.gas, order.keeper_fee_buffer_usd, &self.global);
        let total_fees = fee.add(keeper_fee);

        // the prior position realizes fully at the fill price; the new
        // position re-enters at the fill with fresh accumulator anchors
        let (realized, accrued_funding, accrued_utilization) = match position {
            Some(p) => {
                let funding = p.accrued_funding(accruals.funding_acc);
                let utilization = p.accrued_utilization(accruals.utilization_acc);
                (
                    p.unrealized_pnl(fill).sub(funding).sub(utilization),
                    funding,
                    utilization,
                )
            }
            None => (Usd::zero(), Usd::zero(), Usd::zero()),
        };

        let collateral = account.collateral_usd(market_id);
        let debt_before = account.debt_usd(market_id);
        if increases_risk(old_size, new_size) {
            let (collateral_after, _) =
                preview_balances(collateral, debt_before, realized, total_fees);
            let required = liquidation_margins(
                new_size,
                price,
                collateral,
                market.liquidation_capacity(),
                &market.config,
                &self.global,
                &self.gas,
            )
            .im;
            if collateral_after < required {
                return Err(EngineError::InsufficientMargin {
                    required,
                    available: collateral_after,
                });
            }
        }

        let prior_opened_at = position.map(|p| p.opened_at);
        let prior_fees = position
            .map(|p| p.accrued_fees_usd)
            .unwrap_or_else(Usd::zero);

        // mutation phase
        self.market_mut_ref(market_id)?.accruals = accruals.clone();

        self.ledger_apply(account_id, market_id, |acct| {
            acct.realize(market_id, realized);
            acct.charge(market_id, total_fees);
            acct.orders.remove(&market_id);
            if new_size.is_zero() {
                acct.positions.remove(&market_id);
            } else {
                let mut next = Position::new(
                    new_size,
                    fill,
                    accruals.funding_acc,
                    accruals.utilization_acc,
                    now,
                );
                next.opened_at = prior_opened_at.unwrap_or(now);
                next.accrued_fees_usd = prior_fees.add(total_fees);
                acct.positions.insert(market_id, next);
            }
        })?;
        let debt_after = self.account_ref(account_id)?.debt_usd(market_id);

        self.pool.collect_fee(market_id, fee);

        let global = self.global.clone();
        let market = self.market_mut_ref(market_id)?;
        market.apply_position_delta(old_size, new_size, now);
        let oi_notional = market.open_interest_notional(price);
        let delegated = market.delegated_collateral_usd.value();
        market
            .accruals
            .recompute_utilization_rate(oi_notional, delegated, &global);

        // hooks run after state is final; failures are recorded, not raised
        let ctx = HookContext {
            account_id,
            market_id,
            size_delta: order.size_delta,
            fill_price: fill,
            order_fee: fee,
        };
        for hook in &order.hooks {
            if let HookOutcome::Failed { name, reason } = self.hooks.invoke(*hook, &ctx) {
                self.emit_event(EventPayload::HookFailed(HookFailedEvent {
                    account_id,
                    market_id,
                    hook: name,
                    reason,
                }));
            }
        }

        let debt_delta = debt_after.sub(debt_before);
        self.emit_event(EventPayload::OrderSettled(OrderSettledEvent {
            account_id,
            market_id,
            size_delta: order.size_delta,
            fill_price: fill,
            order_fee: fee,
            keeper_fee,
            realized_usd: realized,
            accrued_funding,
            accrued_utilization,
            new_size,
            debt_delta,
        }));

        Ok(SettlementResult {
            fill_price: fill,
            order_fee: fee,
            keeper_fee,
            realized_usd: realized,
            new_size,
            debt_delta,
        })
    }

    /// Cancel a ready order on a breached price tolerance, or a stale order
    /// unconditionally. Unauthorized callers act as keepers and earn the
    /// cancellation fee, funded by the account.
    pub fn cancel_order(
        &mut self,
        actor: ActorId,
        account_id: AccountId,
        market_id: MarketId,
    ) -> Result<CancellationResult, EngineError> {
        let now = self.current_time;
        self.market_ref(market_id)?;
        let account = self.account_ref(account_id)?;
        let order = account
            .order(market_id)
            .ok_or(EngineError::OrderNotFound)?
            .clone();

        let status = order.status(now, &self.global);
        if status == OrderStatus::Pending {
            return Err(EngineError::OrderNotReady);
        }

        let reason = if status == OrderStatus::Stale {
            CancelReason::Stale
        } else {
            // inside the settlement window an order only cancels when the
            // fill it would get breaches its own limit
            let oracle = self.oracle(market_id)?;
            if !oracle.published_within(
                order.committed_at,
                self.global.pyth_publish_time_min_ms,
                self.global.pyth_publish_time_max_ms,
            ) {
                return Err(EngineError::StalePrice {
                    publish_time_ms: oracle.publish_time.as_millis(),
                    commitment_time_ms: order.committed_at.as_millis(),
                });
            }
            let market = self.market_ref(market_id)?;
            let fill = fill_price(
                oracle.price,
                market.skew,
                market.config.skew_scale,
                order.size_delta.value(),
            );
            if !order.limit_breached(fill) {
                return Err(EngineError::PriceToleranceNotExceeded {
                    fill_price: fill,
                    limit_price: order.limit_price,
                });
            }
            CancelReason::LimitBreached
        };

        let authorized = account.owner == actor
            || self
                .permissions
                .is_granted(account_id, Capability::CancelOrder, actor);
        let keeper_fee = if authorized {
            Usd::zero()
        } else {
            cancellation_keeper_fee(&self.gas, &self.global)
        };

        self.ledger_apply(account_id, market_id, |acct| {
            acct.orders.remove(&market_id);
            if !keeper_fee.is_zero() {
                acct.charge(market_id, keeper_fee);
            }
        })?;

        self.emit_event(EventPayload::OrderCanceled(OrderCanceledEvent {
            account_id,
            market_id,
            reason,
            keeper_fee,
        }));
        Ok(CancellationResult { keeper_fee })
    }

    /// Remove an order that outlived the settlement window. Permissionless
    /// and fee-free: staleness needs no price or tolerance evidence.
    pub fn cancel_stale_order(
        &mut self,
        account_id: AccountId,
        market_id: MarketId,
    ) -> Result<(), EngineError> {
        let now = self.current_time;
        self.market_ref(market_id)?;
        let account = self.account_ref(account_id)?;
        let order = account.order(market_id).ok_or(EngineError::OrderNotFound)?;
        if !order.is_stale(now, &self.global) {
            return Err(EngineError::OrderNotStale);
        }

        self.account_mut_ref(account_id)?.orders.remove(&market_id);
        self.emit_event(EventPayload::OrderCanceled(OrderCanceledEvent {
            account_id,
            market_id,
            reason: CancelReason::Stale,
            keeper_fee: Usd::zero(),
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn risk_direction_classification() {
        assert!(increases_risk(SignedSize::zero(), SignedSize::new(dec!(5))));
        assert!(increases_risk(
            SignedSize::new(dec!(5)),
            SignedSize::new(dec!(8))
        ));
        // partial close
        assert!(!increases_risk(
            SignedSize::new(dec!(5)),
            SignedSize::new(dec!(2))
        ));
        // full close
        assert!(!increases_risk(SignedSize::new(dec!(5)), SignedSize::zero()));
        // flip: smaller absolute size on the other side still re-risks
        assert!(increases_risk(
            SignedSize::new(dec!(5)),
            SignedSize::new(dec!(-1))
        ));
    }

    #[test]
    fn preview_matches_ledger_rules() {
        // loss eats collateral then becomes debt, fees after
        let (c, d) = preview_balances(
            Usd::new(dec!(100)),
            Usd::zero(),
            Usd::new(dec!(-120)),
            Usd::new(dec!(5)),
        );
        assert_eq!(c, Usd::zero());
        assert_eq!(d.value(), dec!(25));

        // profit pays debt first
        let (c, d) = preview_balances(
            Usd::new(dec!(10)),
            Usd::new(dec!(30)),
            Usd::new(dec!(50)),
            Usd::zero(),
        );
        assert_eq!(c.value(), dec!(30));
        assert_eq!(d, Usd::zero());
    }
}
