// 8.5 engine/accounts.rs: debt payment and account restructuring. split moves
// a proportional slice of one market's position, collateral and debt to an
// empty target account; merge realizes two positions at the oracle price and
// folds them into one. both preserve market aggregates exactly.

use super::results::{DebtPaymentResult, EngineError};
use crate::auth::Capability;
use crate::events::{AccountSplitEvent, AccountsMergedEvent, DebtPaidEvent, EventPayload};
use crate::margin::liquidation_margins;
use crate::position::Position;
use crate::types::{AccountId, ActorId, MarketId, SignedSize, Usd};
use rust_decimal::Decimal;

use super::core::Engine;

impl Engine {
    /// Pay down market debt, consuming margin collateral before wallet USD.
    /// Overpayment is capped at the outstanding debt, never banked.
    pub fn pay_debt(
        &mut self,
        actor: ActorId,
        account_id: AccountId,
        market_id: MarketId,
        amount: Usd,
    ) -> Result<DebtPaymentResult, EngineError> {
        self.market_ref(market_id)?;
        self.ensure_authorized(actor, account_id, Capability::PayDebt)?;
        if amount.is_zero() || amount.is_negative() {
            return Err(EngineError::ZeroAmount);
        }

        let (paid, from_collateral, from_wallet) = self
            .ledger_apply(account_id, market_id, |acct| acct.pay_debt(market_id, amount))??;
        let remaining_debt = self.account_ref(account_id)?.debt_usd(market_id);

        self.emit_event(EventPayload::DebtPaid(DebtPaidEvent {
            account_id,
            market_id,
            paid,
            from_collateral,
            from_wallet,
            remaining_debt,
        }));
        Ok(DebtPaymentResult {
            paid,
            from_collateral,
            from_wallet,
            remaining_debt,
        })
    }

    /// Move `proportion` of one market's position, collateral and debt from
    /// one account to an empty target. The slice keeps the source's entry
    /// price and accumulator anchors, so nothing is realized. A proportion of
    /// exactly one transfers everything with no residual dust.
    pub fn split_account(
        &mut self,
        actor: ActorId,
        from_id: AccountId,
        to_id: AccountId,
        market_id: MarketId,
        proportion: Decimal,
    ) -> Result<(), EngineError> {
        let now = self.current_time;
        self.market_ref(market_id)?;
        if from_id == to_id {
            return Err(EngineError::SameAccount);
        }
        self.ensure_authorized(actor, from_id, Capability::SplitAccount)?;
        self.ensure_authorized(actor, to_id, Capability::SplitAccount)?;
        if proportion <= Decimal::ZERO || proportion > Decimal::ONE {
            return Err(EngineError::InvalidProportion(proportion));
        }

        let market = self.market_ref(market_id)?;
        let from = self.account_ref(from_id)?;
        let to = self.account_ref(to_id)?;

        let position = from
            .position(market_id)
            .ok_or(EngineError::PositionNotFound)?;
        if position.is_flagged() {
            return Err(EngineError::PositionFlagged);
        }
        if from.order(market_id).is_some() || to.order(market_id).is_some() {
            return Err(EngineError::OrderFound);
        }
        if to.position(market_id).is_some() {
            return Err(EngineError::PositionFound);
        }
        if !to.collateral_usd(market_id).is_zero() || !to.debt_usd(market_id).is_zero() {
            return Err(EngineError::CollateralFound);
        }

        let oracle = self.oracle(market_id)?;
        let price = oracle.price;
        let (margin, _, hf) = self.position_health(from, market, price);
        if hf < Decimal::ONE {
            return Err(EngineError::CanLiquidatePosition);
        }

        // both resulting positions must clear IM on their proportional margin
        // share: the additive keeper provisions do not scale down with size,
        // so a split can fail where the whole was healthy
        let capacity = market.liquidation_capacity();
        let collateral = from.collateral_usd(market_id);
        let out_size = position.size.mul(proportion);
        let kept_size = SignedSize::new(position.size.value() - out_size.value());
        let out_margin = margin.mul(proportion);
        let kept_margin = margin.sub(out_margin);

        let out_im = liquidation_margins(
            out_size,
            price,
            collateral.mul(proportion),
            capacity,
            &market.config,
            &self.global,
            &self.gas,
        )
        .im;
        if out_margin < out_im {
            return Err(EngineError::InsufficientMargin {
                required: out_im,
                available: out_margin,
            });
        }
        if !kept_size.is_zero() {
            let kept_im = liquidation_margins(
                kept_size,
                price,
                collateral.sub(collateral.mul(proportion)),
                capacity,
                &market.config,
                &self.global,
                &self.gas,
            )
            .im;
            if kept_margin < kept_im {
                return Err(EngineError::InsufficientMargin {
                    required: kept_im,
                    available: kept_margin,
                });
            }
        }

        let entry_price = position.entry_price;
        let entry_funding_acc = position.entry_funding_acc;
        let entry_utilization_acc = position.entry_utilization_acc;
        let opened_at = position.opened_at;
        let moved_fees = if proportion == Decimal::ONE {
            position.accrued_fees_usd
        } else {
            position.accrued_fees_usd.mul(proportion)
        };

        // mutation phase: the two ledger passes move the same amounts in
        // opposite directions, so the market aggregates net to zero
        let (out_collateral, out_debt, out_size_dec) =
            self.ledger_apply(from_id, market_id, |acct| {
                let slice = acct.split_out(market_id, proportion);
                if proportion == Decimal::ONE {
                    acct.positions.remove(&market_id);
                } else if let Some(p) = acct.position_mut(market_id) {
                    p.size = SignedSize::new(p.size.value() - slice.2);
                    p.accrued_fees_usd = p.accrued_fees_usd.sub(moved_fees);
                    p.updated_at = now;
                }
                slice
            })?;

        self.ledger_apply(to_id, market_id, |acct| {
            acct.assume_debt(market_id, out_debt);
            acct.credit_collateral(market_id, out_collateral);
            let mut slice = Position::new(
                SignedSize::new(out_size_dec),
                entry_price,
                entry_funding_acc,
                entry_utilization_acc,
                now,
            );
            slice.opened_at = opened_at;
            slice.accrued_fees_usd = moved_fees;
            acct.positions.insert(market_id, slice);
        })?;

        self.emit_event(EventPayload::AccountSplit(AccountSplitEvent {
            from_id,
            to_id,
            market_id,
            proportion,
        }));
        Ok(())
    }

    /// Fold one account's position into another in the same market. Both
    /// positions realize their pnl and accruals at the oracle price, then the
    /// combined size re-enters at that price on the target account.
    pub fn merge_accounts(
        &mut self,
        actor: ActorId,
        from_id: AccountId,
        to_id: AccountId,
        market_id: MarketId,
    ) -> Result<(), EngineError> {
        let now = self.current_time;
        self.market_ref(market_id)?;
        if from_id == to_id {
            return Err(EngineError::SameAccount);
        }
        self.ensure_authorized(actor, from_id, Capability::MergeAccounts)?;
        self.ensure_authorized(actor, to_id, Capability::MergeAccounts)?;

        let market = self.market_ref(market_id)?;
        let from = self.account_ref(from_id)?;
        let to = self.account_ref(to_id)?;

        let from_pos = from
            .position(market_id)
            .ok_or(EngineError::PositionNotFound)?;
        let to_pos = to.position(market_id).ok_or(EngineError::PositionNotFound)?;
        if from.order(market_id).is_some() || to.order(market_id).is_some() {
            return Err(EngineError::OrderFound);
        }
        if from_pos.is_flagged() || to_pos.is_flagged() {
            return Err(EngineError::PositionFlagged);
        }

        let oracle = self.oracle(market_id)?;
        let price = oracle.price;

        // a merge is no escape hatch: both sides must be healthy going in
        let (_, _, from_hf) = self.position_health(from, market, price);
        let (_, _, to_hf) = self.position_health(to, market, price);
        if from_hf < Decimal::ONE || to_hf < Decimal::ONE {
            return Err(EngineError::CanLiquidatePosition);
        }

        let accruals = self.projected_accruals(market, price);
        let realize_at = |p: &Position| {
            p.unrealized_pnl(price)
                .sub(p.accrued_funding(accruals.funding_acc))
                .sub(p.accrued_utilization(accruals.utilization_acc))
        };
        let from_realized = realize_at(from_pos);
        let to_realized = realize_at(to_pos);

        let from_old = from_pos.size;
        let to_old = to_pos.size;
        let combined = SignedSize::new(from_old.value() + to_old.value());
        let merged_fees = from_pos.accrued_fees_usd.add(to_pos.accrued_fees_usd);
        let opened_at = from_pos.opened_at.min(to_pos.opened_at);

        if !combined.is_zero() {
            if !market.side_within_max_size(to_old, combined)
                || !market.side_within_max_size(from_old, SignedSize::zero())
            {
                return Err(EngineError::MaxMarketSizeExceeded {
                    size: combined.abs(),
                    max: market.config.max_market_size,
                });
            }

            // IM on the merged position, funded by both collaterals after
            // realization
            let preview = |collateral: Usd, debt: Usd, realized: Usd| -> (Usd, Usd) {
                if realized.is_negative() {
                    let loss = realized.abs();
                    let from_c = collateral.min(loss);
                    (collateral.sub(from_c), debt.add(loss.sub(from_c)))
                } else {
                    let to_d = debt.min(realized);
                    (collateral.add(realized.sub(to_d)), debt.sub(to_d))
                }
            };
            let (from_c, _) = preview(
                from.collateral_usd(market_id),
                from.debt_usd(market_id),
                from_realized,
            );
            let (to_c, _) = preview(
                to.collateral_usd(market_id),
                to.debt_usd(market_id),
                to_realized,
            );
            let merged_collateral = from_c.add(to_c);
            let required = liquidation_margins(
                combined,
                price,
                merged_collateral,
                market.liquidation_capacity(),
                &market.config,
                &self.global,
                &self.gas,
            )
            .im;
            if merged_collateral < required {
                return Err(EngineError::InsufficientMargin {
                    required,
                    available: merged_collateral,
                });
            }
        }

        // mutation phase
        self.market_mut_ref(market_id)?.accruals = accruals.clone();

        let (moved_collateral, moved_debt, _) =
            self.ledger_apply(from_id, market_id, |acct| {
                acct.realize(market_id, from_realized);
                acct.positions.remove(&market_id);
                acct.split_out(market_id, Decimal::ONE)
            })?;

        self.ledger_apply(to_id, market_id, |acct| {
            acct.realize(market_id, to_realized);
            acct.assume_debt(market_id, moved_debt);
            acct.credit_collateral(market_id, moved_collateral);
            acct.positions.remove(&market_id);
            if !combined.is_zero() {
                let mut merged = Position::new(
                    combined,
                    price,
                    accruals.funding_acc,
                    accruals.utilization_acc,
                    now,
                );
                merged.opened_at = opened_at;
                merged.accrued_fees_usd = merged_fees;
                acct.positions.insert(market_id, merged);
            }
        })?;

        let global = self.global.clone();
        let market = self.market_mut_ref(market_id)?;
        market.apply_position_delta(from_old, SignedSize::zero(), now);
        market.apply_position_delta(to_old, combined, now);
        let oi_notional = market.open_interest_notional(price);
        let delegated = market.delegated_collateral_usd.value();
        market
            .accruals
            .recompute_utilization_rate(oi_notional, delegated, &global);

        self.emit_event(EventPayload::AccountsMerged(AccountsMergedEvent {
            from_id,
            to_id,
            market_id,
            merged_size: combined,
        }));
        Ok(())
    }
}
