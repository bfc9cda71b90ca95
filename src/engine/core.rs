// 8.1 engine/core.rs: main engine. holds all markets, accounts, the shared
// pool view, permissions, hooks and the pushed oracle/gas snapshots.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::account::Account;
use crate::auth::{Capability, PermissionSet};
use crate::config::GlobalConfig;
use crate::events::{DepositEvent, Event, EventId, EventPayload, WithdrawalEvent};
use crate::hooks::{HookId, HookRegistry, SettlementHook};
use crate::market::{MarketConfig, MarketState};
use crate::oracle::{GasSnapshot, OraclePrice};
use crate::pool::SharedPool;
use crate::types::{AccountId, ActorId, MarketId, Price, Timestamp, Usd};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// All engine state lives here. Every entry point takes `&mut self`, reads
/// the pushed oracle/gas snapshots once, and leaves state untouched on error.
#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) global: GlobalConfig,
    pub(super) markets: HashMap<MarketId, MarketState>,
    pub(super) accounts: HashMap<AccountId, Account>,
    pub(super) pool: SharedPool,
    pub(super) permissions: PermissionSet,
    pub(super) hooks: HookRegistry,
    pub(super) oracle_prices: HashMap<MarketId, OraclePrice>,
    pub(super) gas: GasSnapshot,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) next_account_id: u64,
    pub(super) current_time: Timestamp,
}

impl Engine {
    pub fn new(config: EngineConfig, global: GlobalConfig) -> Self {
        Self {
            config,
            global,
            markets: HashMap::new(),
            accounts: HashMap::new(),
            pool: SharedPool::new(),
            permissions: PermissionSet::new(),
            hooks: HookRegistry::new(),
            oracle_prices: HashMap::new(),
            // zero gas: keeper fees sit on the global floor until a real
            // snapshot is pushed
            gas: GasSnapshot::new(Decimal::ZERO, Price::new_unchecked(Decimal::ONE)),
            events: Vec::new(),
            next_event_id: 1,
            next_account_id: 1,
            current_time: Timestamp::from_millis(0),
        }
    }

    // logical time

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    // markets

    pub fn add_market(&mut self, config: MarketConfig) -> MarketId {
        let market_id = config.id;
        let state = MarketState::new(config, self.current_time);
        self.markets.insert(market_id, state);
        market_id
    }

    pub fn get_market(&self, market_id: MarketId) -> Option<&MarketState> {
        self.markets.get(&market_id)
    }

    /// Oracle price push. The engine never fetches; stale pushes surface as
    /// `StalePrice` at settlement time.
    pub fn set_oracle_price(
        &mut self,
        market_id: MarketId,
        price: OraclePrice,
    ) -> Result<(), EngineError> {
        if !self.markets.contains_key(&market_id) {
            return Err(EngineError::MarketNotFound(market_id));
        }
        self.oracle_prices.insert(market_id, price);
        Ok(())
    }

    pub fn set_gas_snapshot(&mut self, gas: GasSnapshot) {
        self.gas = gas;
    }

    /// Pool collateral delegated to a market, pushed by the pool system.
    /// Mirrored onto the market state so utilization reads stay local.
    pub fn set_delegated_collateral(
        &mut self,
        market_id: MarketId,
        amount: Usd,
    ) -> Result<(), EngineError> {
        let market = self
            .markets
            .get_mut(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))?;
        market.delegated_collateral_usd = amount;
        self.pool.set_delegated_collateral(market_id, amount);
        Ok(())
    }

    pub fn pool(&self) -> &SharedPool {
        &self.pool
    }

    // accounts

    pub fn create_account(&mut self, owner: ActorId) -> AccountId {
        let id = AccountId(self.next_account_id);
        self.next_account_id += 1;
        let account = Account::new(id, owner, self.current_time);
        self.accounts.insert(id, account);
        id
    }

    pub fn get_account(&self, account_id: AccountId) -> Option<&Account> {
        self.accounts.get(&account_id)
    }

    /// External USD arriving in the account's wallet. Permissionless: adding
    /// funds can never hurt the account.
    pub fn fund_wallet(&mut self, account_id: AccountId, amount: Usd) -> Result<(), EngineError> {
        if amount.is_zero() || amount.is_negative() {
            return Err(EngineError::ZeroAmount);
        }
        let account = self
            .accounts
            .get_mut(&account_id)
            .ok_or(EngineError::AccountNotFound(account_id))?;
        account.wallet = account.wallet.add(amount);
        Ok(())
    }

    /// Move wallet USD into a market as margin collateral. The `Withdraw`
    /// capability gates collateral movement in both directions.
    pub fn deposit(
        &mut self,
        actor: ActorId,
        account_id: AccountId,
        market_id: MarketId,
        amount: Usd,
    ) -> Result<(), EngineError> {
        if !self.markets.contains_key(&market_id) {
            return Err(EngineError::MarketNotFound(market_id));
        }
        self.ensure_authorized(actor, account_id, Capability::Withdraw)?;
        if amount.is_zero() || amount.is_negative() {
            return Err(EngineError::ZeroAmount);
        }

        {
            let account = self
                .accounts
                .get_mut(&account_id)
                .ok_or(EngineError::AccountNotFound(account_id))?;
            if amount > account.wallet {
                return Err(EngineError::Account(
                    crate::account::AccountError::InsufficientBalance {
                        requested: amount,
                        available: account.wallet,
                    },
                ));
            }
        }

        let new_collateral = self.ledger_apply(account_id, market_id, |acct| {
            acct.wallet = acct.wallet.sub(amount);
            acct.credit_collateral(market_id, amount);
            acct.collateral_usd(market_id)
        })?;

        self.emit_event(EventPayload::Deposit(DepositEvent {
            account_id,
            market_id,
            amount,
            new_collateral,
        }));
        Ok(())
    }

    /// Move margin collateral back to the wallet. Refused while an order is
    /// pending, while flagged, or if the remaining position would breach IM.
    pub fn withdraw(
        &mut self,
        actor: ActorId,
        account_id: AccountId,
        market_id: MarketId,
        amount: Usd,
    ) -> Result<(), EngineError> {
        if !self.markets.contains_key(&market_id) {
            return Err(EngineError::MarketNotFound(market_id));
        }
        self.ensure_authorized(actor, account_id, Capability::Withdraw)?;
        if amount.is_zero() || amount.is_negative() {
            return Err(EngineError::ZeroAmount);
        }

        {
            let account = self
                .accounts
                .get(&account_id)
                .ok_or(EngineError::AccountNotFound(account_id))?;
            if account.order(market_id).is_some() {
                return Err(EngineError::OrderFound);
            }
            if account
                .position(market_id)
                .is_some_and(|p| p.is_flagged())
            {
                return Err(EngineError::PositionFlagged);
            }
            let collateral = account.collateral_usd(market_id);
            if amount > collateral {
                return Err(EngineError::Account(
                    crate::account::AccountError::InsufficientBalance {
                        requested: amount,
                        available: collateral,
                    },
                ));
            }

            if account.position(market_id).is_some() {
                // IM check on what would remain after the withdrawal
                let market = &self.markets[&market_id];
                let price = self.oracle(market_id)?.price;
                let (margin, margins, _) = self.position_health(account, market, price);
                let after = margin.sub(amount);
                if after < margins.im {
                    return Err(EngineError::InsufficientMargin {
                        required: margins.im,
                        available: after,
                    });
                }
            }
        }

        let new_collateral = self.ledger_apply(account_id, market_id, |acct| {
            acct.wallet = acct.wallet.add(amount);
            acct.debit_collateral(market_id, amount);
            acct.collateral_usd(market_id)
        })?;

        self.emit_event(EventPayload::Withdrawal(WithdrawalEvent {
            account_id,
            market_id,
            amount,
            new_collateral,
        }));
        Ok(())
    }

    // permissions

    /// Only the account owner grants and revokes capabilities.
    pub fn grant_permission(
        &mut self,
        actor: ActorId,
        account_id: AccountId,
        capability: Capability,
        grantee: ActorId,
    ) -> Result<(), EngineError> {
        self.ensure_owner(actor, account_id, capability)?;
        self.permissions.grant(account_id, capability, grantee);
        Ok(())
    }

    pub fn revoke_permission(
        &mut self,
        actor: ActorId,
        account_id: AccountId,
        capability: Capability,
        grantee: ActorId,
    ) -> Result<(), EngineError> {
        self.ensure_owner(actor, account_id, capability)?;
        self.permissions.revoke(account_id, capability, grantee);
        Ok(())
    }

    // hooks

    pub fn register_hook(&mut self, id: HookId, hook: Box<dyn SettlementHook>) {
        self.hooks.register(id, hook);
    }

    // events

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            println!("[Event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }

    // shared internals

    pub(super) fn market_ref(&self, market_id: MarketId) -> Result<&MarketState, EngineError> {
        self.markets
            .get(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))
    }

    pub(super) fn market_mut_ref(
        &mut self,
        market_id: MarketId,
    ) -> Result<&mut MarketState, EngineError> {
        self.markets
            .get_mut(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))
    }

    pub(super) fn account_ref(&self, account_id: AccountId) -> Result<&Account, EngineError> {
        self.accounts
            .get(&account_id)
            .ok_or(EngineError::AccountNotFound(account_id))
    }

    pub(super) fn account_mut_ref(
        &mut self,
        account_id: AccountId,
    ) -> Result<&mut Account, EngineError> {
        self.accounts
            .get_mut(&account_id)
            .ok_or(EngineError::AccountNotFound(account_id))
    }

    pub(super) fn oracle(&self, market_id: MarketId) -> Result<OraclePrice, EngineError> {
        self.oracle_prices
            .get(&market_id)
            .copied()
            .ok_or(EngineError::NoOraclePrice(market_id))
    }

    /// The account owner implicitly holds every capability; everyone else
    /// needs an exact (account, capability, actor) grant.
    pub(super) fn ensure_authorized(
        &self,
        actor: ActorId,
        account_id: AccountId,
        capability: Capability,
    ) -> Result<(), EngineError> {
        let account = self.account_ref(account_id)?;
        if account.owner == actor || self.permissions.is_granted(account_id, capability, actor) {
            Ok(())
        } else {
            Err(EngineError::Unauthorized {
                account: account_id,
                actor,
                capability,
            })
        }
    }

    fn ensure_owner(
        &self,
        actor: ActorId,
        account_id: AccountId,
        capability: Capability,
    ) -> Result<(), EngineError> {
        let account = self.account_ref(account_id)?;
        if account.owner == actor {
            Ok(())
        } else {
            Err(EngineError::Unauthorized {
                account: account_id,
                actor,
                capability,
            })
        }
    }

    /// Run a ledger mutation and fold the account's collateral/debt movement
    /// into the market aggregates, so the totals never drift from the sums.
    pub(super) fn ledger_apply<T>(
        &mut self,
        account_id: AccountId,
        market_id: MarketId,
        f: impl FnOnce(&mut Account) -> T,
    ) -> Result<T, EngineError> {
        let account = self
            .accounts
            .get_mut(&account_id)
            .ok_or(EngineError::AccountNotFound(account_id))?;
        let collateral_before = account.collateral_usd(market_id);
        let debt_before = account.debt_usd(market_id);

        let out = f(account);

        let collateral_after = account.collateral_usd(market_id);
        let debt_after = account.debt_usd(market_id);

        let market = self
            .markets
            .get_mut(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))?;
        market.total_collateral_usd = market
            .total_collateral_usd
            .add(collateral_after.sub(collateral_before));
        market.total_debt_usd = market.total_debt_usd.add(debt_after.sub(debt_before));
        Ok(out)
    }
}
