// 9.2: shared liquidity pool collaborator. the pool backs every market with
// delegated collateral, collects order fees, and receives liquidated notional
// for its reward distributor. this engine only needs the narrow accounting
// surface; payout and claim plumbing live outside.

use crate::types::{MarketId, Usd};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedPool {
    /// Pool collateral delegated per market, pushed by the pool system.
    delegated: HashMap<MarketId, Usd>,
    /// Order fees accrued to LPs per market.
    fees_collected: HashMap<MarketId, Usd>,
    /// Notional handed to the reward distributor by liquidations.
    rewards_distributed: HashMap<MarketId, Usd>,
    /// Collateral seized by margin-only liquidations.
    seized_collateral: HashMap<MarketId, Usd>,
}

impl SharedPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_delegated_collateral(&mut self, market_id: MarketId, amount: Usd) {
        self.delegated.insert(market_id, amount);
    }

    pub fn delegated_collateral(&self, market_id: MarketId) -> Usd {
        self.delegated.get(&market_id).copied().unwrap_or_else(Usd::zero)
    }

    pub fn collect_fee(&mut self, market_id: MarketId, amount: Usd) {
        let entry = self.fees_collected.entry(market_id).or_insert_with(Usd::zero);
        *entry = entry.add(amount);
    }

    pub fn fees_collected(&self, market_id: MarketId) -> Usd {
        self.fees_collected.get(&market_id).copied().unwrap_or_else(Usd::zero)
    }

    /// Register liquidated notional with the reward distributor.
    pub fn distribute_reward(&mut self, market_id: MarketId, notional: Usd) {
        let entry = self
            .rewards_distributed
            .entry(market_id)
            .or_insert_with(Usd::zero);
        *entry = entry.add(notional);
    }

    pub fn rewards_distributed(&self, market_id: MarketId) -> Usd {
        self.rewards_distributed
            .get(&market_id)
            .copied()
            .unwrap_or_else(Usd::zero)
    }

    pub fn absorb_seized_collateral(&mut self, market_id: MarketId, amount: Usd) {
        let entry = self
            .seized_collateral
            .entry(market_id)
            .or_insert_with(Usd::zero);
        *entry = entry.add(amount);
    }

    pub fn seized_collateral(&self, market_id: MarketId) -> Usd {
        self.seized_collateral
            .get(&market_id)
            .copied()
            .unwrap_or_else(Usd::zero)
    }
}
