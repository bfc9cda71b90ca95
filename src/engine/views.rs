// 8.2 engine/views.rs: the read surface. every digest is derived on demand
// from the ledger, the pushed oracle price and accruals projected to now.
// nothing here mutates state: accumulators only move at mutation checkpoints,
// so reads project a throwaway copy forward instead.

use super::results::{
    AccountDigest, EngineError, MarketDigest, OrderDigest, PositionDigest,
};
use crate::account::Account;
use crate::funding::AccrualState;
use crate::margin::{health_factor, liquidation_margins, MarginBreakdown};
use crate::market::MarketState;
use crate::pricing::{self, OrderFees};
use crate::types::{AccountId, MarketId, Price, SignedSize, Usd};
use rust_decimal::Decimal;

use super::core::Engine;

impl Engine {
    pub fn global_config(&self) -> &crate::config::GlobalConfig {
        &self.global
    }

    pub fn market_config(&self, market_id: MarketId) -> Result<&crate::market::MarketConfig, EngineError> {
        Ok(&self.market_ref(market_id)?.config)
    }

    /// Execution price a `size_delta` trade would get right now.
    pub fn quote_fill_price(
        &self,
        market_id: MarketId,
        size_delta: SignedSize,
    ) -> Result<Price, EngineError> {
        let market = self.market_ref(market_id)?;
        let oracle = self.oracle(market_id)?;
        // no settleable trade moves |skew| past the per-side cap, and the cap
        // keeps the premium from driving the price non-positive
        let post_skew = market.skew + size_delta.value();
        if post_skew.abs() > market.config.max_market_size {
            return Err(EngineError::MaxMarketSizeExceeded {
                size: post_skew.abs(),
                max: market.config.max_market_size,
            });
        }
        Ok(pricing::fill_price(
            oracle.price,
            market.skew,
            market.config.skew_scale,
            size_delta.value(),
        ))
    }

    /// Order and keeper fees a trade would pay if settled against the current
    /// skew and gas snapshot. Settlement reproduces these figures exactly for
    /// the same inputs.
    pub fn quote_order_fees(
        &self,
        market_id: MarketId,
        size_delta: SignedSize,
        keeper_fee_buffer_usd: Usd,
    ) -> Result<OrderFees, EngineError> {
        let market = self.market_ref(market_id)?;
        let fill = self.quote_fill_price(market_id, size_delta)?;
        Ok(OrderFees {
            order_fee: pricing::order_fee(size_delta.value(), fill, market.skew, &market.config),
            keeper_fee: pricing::settlement_keeper_fee(
                &self.gas,
                keeper_fee_buffer_usd,
                &self.global,
            ),
        })
    }

    /// IM/MM for the position the account would hold after `size_delta`.
    pub fn margin_requirements(
        &self,
        account_id: AccountId,
        market_id: MarketId,
        size_delta: SignedSize,
    ) -> Result<MarginBreakdown, EngineError> {
        let market = self.market_ref(market_id)?;
        let account = self.account_ref(account_id)?;
        let oracle = self.oracle(market_id)?;

        let current = account
            .position(market_id)
            .map(|p| p.size)
            .unwrap_or_else(SignedSize::zero);
        let resulting = current.add(size_delta.value());
        Ok(liquidation_margins(
            resulting,
            oracle.price,
            account.collateral_usd(market_id),
            market.liquidation_capacity(),
            &market.config,
            &self.global,
            &self.gas,
        ))
    }

    /// Remaining margin over MM. `Decimal::MAX` for accounts with no open
    /// position: nothing to liquidate.
    pub fn health_factor(
        &self,
        account_id: AccountId,
        market_id: MarketId,
    ) -> Result<Decimal, EngineError> {
        let market = self.market_ref(market_id)?;
        let account = self.account_ref(account_id)?;
        let oracle = self.oracle(market_id)?;
        let (_, _, hf) = self.position_health(account, market, oracle.price);
        Ok(hf)
    }

    pub fn order_digest(
        &self,
        account_id: AccountId,
        market_id: MarketId,
    ) -> Result<OrderDigest, EngineError> {
        self.market_ref(market_id)?;
        let account = self.account_ref(account_id)?;
        let order = account.order(market_id).ok_or(EngineError::OrderNotFound)?;
        let status = order.status(self.current_time, &self.global);
        Ok(OrderDigest {
            size_delta: order.size_delta,
            limit_price: order.limit_price,
            committed_at: order.committed_at,
            keeper_fee_buffer_usd: order.keeper_fee_buffer_usd,
            status,
            is_stale: order.is_stale(self.current_time, &self.global),
        })
    }

    /// Position digest. An account with no open position reads as a zeroed
    /// digest with the health sentinel rather than an error.
    pub fn position_digest(
        &self,
        account_id: AccountId,
        market_id: MarketId,
    ) -> Result<PositionDigest, EngineError> {
        let market = self.market_ref(market_id)?;
        let account = self.account_ref(account_id)?;
        let oracle = self.oracle(market_id)?;
        let price = oracle.price;

        let Some(position) = account.position(market_id) else {
            return Ok(PositionDigest {
                size: SignedSize::zero(),
                entry_price: None,
                oracle_price: price,
                pnl: Usd::zero(),
                accrued_funding: Usd::zero(),
                accrued_utilization: Usd::zero(),
                accrued_fees_usd: Usd::zero(),
                health_factor: Decimal::MAX,
                im: Usd::zero(),
                mm: Usd::zero(),
                flagged: false,
            });
        };

        let accruals = self.projected_accruals(market, price);
        let (_, margins, hf) = self.position_health(account, market, price);
        Ok(PositionDigest {
            size: position.size,
            entry_price: Some(position.entry_price),
            oracle_price: price,
            pnl: position.unrealized_pnl(price),
            accrued_funding: position.accrued_funding(accruals.funding_acc),
            accrued_utilization: position.accrued_utilization(accruals.utilization_acc),
            accrued_fees_usd: position.accrued_fees_usd,
            health_factor: hf,
            im: margins.im,
            mm: margins.mm,
            flagged: position.is_flagged(),
        })
    }

    pub fn account_digest(
        &self,
        account_id: AccountId,
        market_id: MarketId,
    ) -> Result<AccountDigest, EngineError> {
        self.market_ref(market_id)?;
        let account = self.account_ref(account_id)?;
        let position = if account.position(market_id).is_some() {
            Some(self.position_digest(account_id, market_id)?)
        } else {
            None
        };
        Ok(AccountDigest {
            collateral_usd: account.collateral_usd(market_id),
            debt_usd: account.debt_usd(market_id),
            position,
        })
    }

    pub fn market_digest(&self, market_id: MarketId) -> Result<MarketDigest, EngineError> {
        let market = self.market_ref(market_id)?;
        let oracle = self.oracle(market_id)?;
        let price = oracle.price;
        let accruals = self.projected_accruals(market, price);

        Ok(MarketDigest {
            market_id,
            oracle_price: price,
            skew: market.skew,
            long_oi: market.long_oi,
            short_oi: market.short_oi,
            open_interest_notional: market.open_interest_notional(price),
            total_trader_debt_usd: market.total_debt_usd,
            total_collateral_usd: market.total_collateral_usd,
            funding_rate: accruals.funding_rate,
            funding_acc: accruals.funding_acc,
            utilization_rate: accruals.utilization_rate,
            utilization_acc: accruals.utilization_acc,
            remaining_liquidatable_capacity: self.remaining_liquidatable_capacity(market_id)?,
            minimum_credit: market.minimum_credit(price, self.global.min_credit_percent),
            delegated_collateral_usd: market.delegated_collateral_usd,
        })
    }

    /// Size still liquidatable inside the current rolling window.
    pub fn remaining_liquidatable_capacity(
        &self,
        market_id: MarketId,
    ) -> Result<Decimal, EngineError> {
        let market = self.market_ref(market_id)?;
        Ok(crate::liquidation::remaining_capacity(
            &market.liquidation_window,
            market.liquidation_capacity(),
            self.current_time,
            market.config.liquidation_window_ms,
        ))
    }

    pub fn minimum_credit(&self, market_id: MarketId) -> Result<Usd, EngineError> {
        let market = self.market_ref(market_id)?;
        let oracle = self.oracle(market_id)?;
        Ok(market.minimum_credit(oracle.price, self.global.min_credit_percent))
    }

    pub fn wallet_balance(&self, account_id: AccountId) -> Result<Usd, EngineError> {
        Ok(self.account_ref(account_id)?.wallet)
    }

    // internals shared with the mutation paths

    /// Accruals rolled forward to now on a copy. Mutation paths commit this
    /// same projection, so reads and writes always agree on accrued amounts.
    pub(super) fn projected_accruals(&self, market: &MarketState, price: Price) -> AccrualState {
        let mut accruals = market.accruals.clone();
        accruals.checkpoint(
            market.skew,
            market.config.skew_scale,
            market.config.max_funding_velocity,
            market.config.funding_velocity_clamp,
            price,
            self.current_time,
        );
        accruals
    }

    /// (remaining margin, margin requirements, health factor) for the
    /// account's position. No position means nothing to liquidate, which
    /// reads as the `Decimal::MAX` sentinel.
    pub(super) fn position_health(
        &self,
        account: &Account,
        market: &MarketState,
        price: Price,
    ) -> (Usd, MarginBreakdown, Decimal) {
        let market_id = market.config.id;
        let collateral = account.collateral_usd(market_id);
        match account.position(market_id) {
            None => (
                collateral,
                MarginBreakdown {
                    im: Usd::zero(),
                    mm: Usd::zero(),
                },
                Decimal::MAX,
            ),
            Some(position) => {
                let accruals = self.projected_accruals(market, price);
                let margin = position.remaining_margin(
                    collateral,
                    price,
                    accruals.funding_acc,
                    accruals.utilization_acc,
                );
                let margins = liquidation_margins(
                    position.size,
                    price,
                    collateral,
                    market.liquidation_capacity(),
                    &market.config,
                    &self.global,
                    &self.gas,
                );
                let hf = health_factor(margin, margins.mm);
                (margin, margins, hf)
            }
        }
    }
}
