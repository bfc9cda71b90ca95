// 11.0: every state change produces an event. used for audit trails, state
// reconstruction, and notifying external systems. the EventPayload enum lists
// all event types.

use crate::types::{AccountId, ActorId, MarketId, Price, SignedSize, Timestamp, Usd};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // collateral events
    Deposit(DepositEvent),
    Withdrawal(WithdrawalEvent),

    // order lifecycle events
    OrderCommitted(OrderCommittedEvent),
    OrderSettled(OrderSettledEvent),
    OrderCanceled(OrderCanceledEvent),

    // risk events
    PositionFlagged(PositionFlaggedEvent),
    PositionLiquidated(PositionLiquidatedEvent),
    MarginLiquidated(MarginLiquidatedEvent),
    DebtPaid(DebtPaidEvent),

    // account structure events
    AccountSplit(AccountSplitEvent),
    AccountsMerged(AccountsMergedEvent),

    // accrual events
    FundingRecomputed(FundingRecomputedEvent),
    UtilizationRecomputed(UtilizationRecomputedEvent),

    // collaborator events
    HookFailed(HookFailedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub amount: Usd,
    pub new_collateral: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub amount: Usd,
    pub new_collateral: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCommittedEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub size_delta: SignedSize,
    pub limit_price: Price,
    pub keeper_fee_buffer_usd: Usd,
}

/// The settlement digest: everything a caller needs to reconcile a fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSettledEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub size_delta: SignedSize,
    pub fill_price: Price,
    pub order_fee: Usd,
    pub keeper_fee: Usd,
    /// Pnl plus accruals realized off the prior position.
    pub realized_usd: Usd,
    pub accrued_funding: Usd,
    pub accrued_utilization: Usd,
    pub new_size: SignedSize,
    /// Debt created (positive) or repaid (negative) by this settlement.
    pub debt_delta: Usd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// Ready-window cancel on a breached price tolerance.
    LimitBreached,
    /// Past the settlement window; no tolerance check.
    Stale,
    /// Pending order removed when the position was flagged.
    Flagged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCanceledEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub reason: CancelReason,
    /// Zero when the owner cancels; funded by the account when a keeper does.
    pub keeper_fee: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionFlaggedEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub flagger: ActorId,
    pub flag_reward: Usd,
    pub health_factor: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLiquidatedEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub liquidated_size: Decimal,
    pub remaining_size: SignedSize,
    pub price: Price,
    pub keeper_fee: Usd,
    /// Notional handed to the reward distributor.
    pub distributed_notional: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginLiquidatedEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub seized_collateral: Usd,
    pub cleared_debt: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtPaidEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub paid: Usd,
    pub from_collateral: Usd,
    pub from_wallet: Usd,
    pub remaining_debt: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSplitEvent {
    pub from_id: AccountId,
    pub to_id: AccountId,
    pub market_id: MarketId,
    pub proportion: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsMergedEvent {
    pub from_id: AccountId,
    pub to_id: AccountId,
    pub market_id: MarketId,
    pub merged_size: SignedSize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingRecomputedEvent {
    pub market_id: MarketId,
    pub funding_rate: Decimal,
    pub funding_acc: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationRecomputedEvent {
    pub market_id: MarketId,
    pub utilization_rate: Decimal,
    pub utilization_acc: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookFailedEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub hook: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // events feed external audit consumers as JSON
    #[test]
    fn events_survive_json() {
        let event = Event::new(
            EventId(7),
            Timestamp::from_millis(1_000),
            EventPayload::DebtPaid(DebtPaidEvent {
                account_id: AccountId(1),
                market_id: MarketId(2),
                paid: Usd::new(dec!(25)),
                from_collateral: Usd::new(dec!(10)),
                from_wallet: Usd::new(dec!(15)),
                remaining_debt: Usd::zero(),
            }),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("DebtPaid"));

        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        assert!(matches!(
            back.payload,
            EventPayload::DebtPaid(ev) if ev.paid.value() == dec!(25)
        ));
    }
}
