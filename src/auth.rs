// 10.0: capability-based authorization. permissions are a flat set keyed by
// (account, capability, grantee) — no role inheritance. the account owner
// implicitly holds every capability; keeper entry points are permissionless
// and never consult this.

use crate::types::{AccountId, ActorId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    CommitOrder,
    CancelOrder,
    Withdraw,
    PayDebt,
    SplitAccount,
    MergeAccounts,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    grants: HashSet<(AccountId, Capability, ActorId)>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, account: AccountId, capability: Capability, grantee: ActorId) {
        self.grants.insert((account, capability, grantee));
    }

    pub fn revoke(&mut self, account: AccountId, capability: Capability, grantee: ActorId) {
        self.grants.remove(&(account, capability, grantee));
    }

    pub fn is_granted(&self, account: AccountId, capability: Capability, actor: ActorId) -> bool {
        self.grants.contains(&(account, capability, actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_are_exact_triples() {
        let mut perms = PermissionSet::new();
        perms.grant(AccountId(1), Capability::CommitOrder, ActorId(9));

        assert!(perms.is_granted(AccountId(1), Capability::CommitOrder, ActorId(9)));
        // different capability, account or actor: no
        assert!(!perms.is_granted(AccountId(1), Capability::CancelOrder, ActorId(9)));
        assert!(!perms.is_granted(AccountId(2), Capability::CommitOrder, ActorId(9)));
        assert!(!perms.is_granted(AccountId(1), Capability::CommitOrder, ActorId(8)));

        perms.revoke(AccountId(1), Capability::CommitOrder, ActorId(9));
        assert!(!perms.is_granted(AccountId(1), Capability::CommitOrder, ActorId(9)));
    }
}
