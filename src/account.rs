//! Account ledger leaf.
//!
//! An account owns, per market: collateral, debt, at most one position and at
//! most one pending order. The wallet is un-margined USD the owner deposits
//! from and withdraws to. All mutation goes through the engine entry points;
//! the helpers here keep the debt floor and collateral/debt overflow rules in
//! one place.

use crate::order::Order;
use crate::position::Position;
use crate::types::{AccountId, ActorId, MarketId, Timestamp, Usd};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner: ActorId,
    /// USD not yet posted as margin.
    pub wallet: Usd,
    pub collateral: HashMap<MarketId, Usd>,
    /// Non-negative USD liability per market.
    pub debt: HashMap<MarketId, Usd>,
    pub positions: HashMap<MarketId, Position>,
    pub orders: HashMap<MarketId, Order>,
    pub created_at: Timestamp,
}

/// How a charge was funded: collateral first, remainder accrued as debt.
#[derive(Debug, Clone, Copy)]
pub struct FeeCharge {
    pub from_collateral: Usd,
    pub to_debt: Usd,
}

impl Account {
    pub fn new(id: AccountId, owner: ActorId, timestamp: Timestamp) -> Self {
        Self {
            id,
            owner,
            wallet: Usd::zero(),
            collateral: HashMap::new(),
            debt: HashMap::new(),
            positions: HashMap::new(),
            orders: HashMap::new(),
            created_at: timestamp,
        }
    }

    pub fn collateral_usd(&self, market_id: MarketId) -> Usd {
        self.collateral.get(&market_id).copied().unwrap_or_else(Usd::zero)
    }

    pub fn debt_usd(&self, market_id: MarketId) -> Usd {
        self.debt.get(&market_id).copied().unwrap_or_else(Usd::zero)
    }

    pub fn position(&self, market_id: MarketId) -> Option<&Position> {
        self.positions.get(&market_id)
    }

    pub fn position_mut(&mut self, market_id: MarketId) -> Option<&mut Position> {
        self.positions.get_mut(&market_id)
    }

    pub fn order(&self, market_id: MarketId) -> Option<&Order> {
        self.orders.get(&market_id)
    }

    pub fn credit_collateral(&mut self, market_id: MarketId, amount: Usd) {
        let entry = self.collateral.entry(market_id).or_insert_with(Usd::zero);
        *entry = entry.add(amount);
    }

    fn set_collateral(&mut self, market_id: MarketId, amount: Usd) {
        if amount.is_zero() {
            self.collateral.remove(&market_id);
        } else {
            self.collateral.insert(market_id, amount);
        }
    }

    fn set_debt(&mut self, market_id: MarketId, amount: Usd) {
        debug_assert!(!amount.is_negative(), "debt never goes negative");
        if amount.is_zero() {
            self.debt.remove(&market_id);
        } else {
            self.debt.insert(market_id, amount);
        }
    }

    /// Charge `amount` against this market: collateral is consumed first and
    /// any shortfall accrues as debt rather than driving collateral negative.
    pub fn charge(&mut self, market_id: MarketId, amount: Usd) -> FeeCharge {
        debug_assert!(!amount.is_negative());
        let collateral = self.collateral_usd(market_id);
        let from_collateral = collateral.min(amount);
        let to_debt = amount.sub(from_collateral);

        self.set_collateral(market_id, collateral.sub(from_collateral));
        if !to_debt.is_zero() {
            self.set_debt(market_id, self.debt_usd(market_id).add(to_debt));
        }
        FeeCharge {
            from_collateral,
            to_debt,
        }
    }

    /// Debit collateral the caller has already bounds-checked.
    pub fn debit_collateral(&mut self, market_id: MarketId, amount: Usd) {
        let collateral = self.collateral_usd(market_id);
        debug_assert!(amount <= collateral);
        self.set_collateral(market_id, collateral.sub(amount));
    }

    /// Take on debt transferred from another account (split/merge). Unlike
    /// `charge`, this never touches collateral.
    pub fn assume_debt(&mut self, market_id: MarketId, amount: Usd) {
        debug_assert!(!amount.is_negative());
        if !amount.is_zero() {
            self.set_debt(market_id, self.debt_usd(market_id).add(amount));
        }
    }

    /// Apply a realized USD amount. Profit pays down debt before topping up
    /// collateral; loss is a charge (collateral first, overflow to debt).
    pub fn realize(&mut self, market_id: MarketId, amount: Usd) {
        if amount.is_negative() {
            self.charge(market_id, amount.abs());
            return;
        }
        let debt = self.debt_usd(market_id);
        let to_debt = debt.min(amount);
        self.set_debt(market_id, debt.sub(to_debt));
        let remainder = amount.sub(to_debt);
        if !remainder.is_zero() {
            self.credit_collateral(market_id, remainder);
        }
    }

    /// Reduce debt by up to `amount`, consuming collateral before wallet.
    /// Returns (paid, from_collateral, from_wallet).
    pub fn pay_debt(
        &mut self,
        market_id: MarketId,
        amount: Usd,
    ) -> Result<(Usd, Usd, Usd), AccountError> {
        let debt = self.debt_usd(market_id);
        let paying = debt.min(amount);

        let collateral = self.collateral_usd(market_id);
        let from_collateral = collateral.min(paying);
        let from_wallet = paying.sub(from_collateral);

        if from_wallet > self.wallet {
            return Err(AccountError::InsufficientBalance {
                requested: paying,
                available: collateral.add(self.wallet),
            });
        }

        self.set_collateral(market_id, collateral.sub(from_collateral));
        self.wallet = self.wallet.sub(from_wallet);
        self.set_debt(market_id, debt.sub(paying));
        Ok((paying, from_collateral, from_wallet))
    }

    /// Zero out a market's collateral and debt in one step (margin-only
    /// liquidation). Returns the seized collateral and the forgiven debt.
    pub fn seize_margin(&mut self, market_id: MarketId) -> (Usd, Usd) {
        let collateral = self.collateral_usd(market_id);
        let debt = self.debt_usd(market_id);
        self.collateral.remove(&market_id);
        self.debt.remove(&market_id);
        (collateral, debt)
    }

    /// Proportional slice of this market's balances for a split. `proportion`
    /// of exactly one transfers everything with no residual dust.
    pub fn split_out(
        &mut self,
        market_id: MarketId,
        proportion: Decimal,
    ) -> (Usd, Usd, Decimal) {
        let collateral = self.collateral_usd(market_id);
        let debt = self.debt_usd(market_id);
        let size = self
            .positions
            .get(&market_id)
            .map(|p| p.size.value())
            .unwrap_or(Decimal::ZERO);

        let (out_collateral, out_debt, out_size) = if proportion == Decimal::ONE {
            (collateral, debt, size)
        } else {
            (
                collateral.mul(proportion),
                debt.mul(proportion),
                size * proportion,
            )
        };

        self.set_collateral(market_id, collateral.sub(out_collateral));
        self.set_debt(market_id, debt.sub(out_debt));
        (out_collateral, out_debt, out_size)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AccountError {
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Usd, available: Usd },
}
