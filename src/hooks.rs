// 9.1: settlement hooks. third-party code invoked after an order settles,
// behind a whitelist. a hook sees a read-only context and reports success or
// failure; failures are isolated into events and never revert the settlement.

use crate::types::{AccountId, MarketId, Price, SignedSize, Usd};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HookId(pub u32);

/// What a hook is allowed to see about the settlement that triggered it.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub size_delta: SignedSize,
    pub fill_price: Price,
    pub order_fee: Usd,
}

pub trait SettlementHook {
    /// Short identifier used in events.
    fn name(&self) -> &str;

    /// Invoked after settlement state is final. The returned error is
    /// recorded, not propagated.
    fn on_settlement(&mut self, ctx: &HookContext) -> Result<(), String>;
}

/// Whitelist-gated hook storage. Only registered ids can be attached to an
/// order, and registration is the admin seam for the external whitelist.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<HookId, Box<dyn SettlementHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: HookId, hook: Box<dyn SettlementHook>) {
        self.hooks.insert(id, hook);
    }

    pub fn is_whitelisted(&self, id: HookId) -> bool {
        self.hooks.contains_key(&id)
    }

    /// Run one hook, converting its failure into a describable outcome.
    pub fn invoke(&mut self, id: HookId, ctx: &HookContext) -> HookOutcome {
        match self.hooks.get_mut(&id) {
            Some(hook) => match hook.on_settlement(ctx) {
                Ok(()) => HookOutcome::Ok {
                    name: hook.name().to_string(),
                },
                Err(reason) => HookOutcome::Failed {
                    name: hook.name().to_string(),
                    reason,
                },
            },
            None => HookOutcome::Failed {
                name: format!("hook-{}", id.0),
                reason: "not whitelisted".to_string(),
            },
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum HookOutcome {
    Ok { name: String },
    Failed { name: String, reason: String },
}
