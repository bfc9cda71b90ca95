// 8.0.2: result/digest types and the error taxonomy for engine operations.
//
// digests are derived on demand from the ledger plus current oracle and
// accrual state; they are never persisted, so they cannot go stale.

use crate::account::AccountError;
use crate::auth::Capability;
use crate::margin::MarginBreakdown;
use crate::order::OrderStatus;
use crate::types::{AccountId, ActorId, MarketId, Price, SignedSize, Timestamp, Usd};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct AccountDigest {
    pub collateral_usd: Usd,
    pub debt_usd: Usd,
    pub position: Option<PositionDigest>,
}

#[derive(Debug, Clone)]
pub struct PositionDigest {
    pub size: SignedSize,
    pub entry_price: Option<Price>,
    pub oracle_price: Price,
    pub pnl: Usd,
    pub accrued_funding: Usd,
    pub accrued_utilization: Usd,
    pub accrued_fees_usd: Usd,
    pub health_factor: Decimal,
    pub im: Usd,
    pub mm: Usd,
    pub flagged: bool,
}

#[derive(Debug, Clone)]
pub struct OrderDigest {
    pub size_delta: SignedSize,
    pub limit_price: Price,
    pub committed_at: Timestamp,
    pub keeper_fee_buffer_usd: Usd,
    pub status: OrderStatus,
    pub is_stale: bool,
}

#[derive(Debug, Clone)]
pub struct MarketDigest {
    pub market_id: MarketId,
    pub oracle_price: Price,
    pub skew: Decimal,
    pub long_oi: Decimal,
    pub short_oi: Decimal,
    pub open_interest_notional: Decimal,
    pub total_trader_debt_usd: Usd,
    pub total_collateral_usd: Usd,
    pub funding_rate: Decimal,
    pub funding_acc: Decimal,
    pub utilization_rate: Decimal,
    pub utilization_acc: Decimal,
    pub remaining_liquidatable_capacity: Decimal,
    pub minimum_credit: Usd,
    pub delegated_collateral_usd: Usd,
}

#[derive(Debug, Clone)]
pub struct SettlementResult {
    pub fill_price: Price,
    pub order_fee: Usd,
    pub keeper_fee: Usd,
    /// Pnl and accruals realized off the prior position.
    pub realized_usd: Usd,
    pub new_size: SignedSize,
    pub debt_delta: Usd,
}

#[derive(Debug, Clone)]
pub struct CancellationResult {
    pub keeper_fee: Usd,
}

#[derive(Debug, Clone)]
pub struct LiquidationResult {
    pub liquidated_size: Decimal,
    pub remaining_size: SignedSize,
    pub price: Price,
    pub keeper_fee: Usd,
    pub distributed_notional: Usd,
}

#[derive(Debug, Clone)]
pub struct MarginLiquidationResult {
    pub seized_collateral: Usd,
    pub cleared_debt: Usd,
}

#[derive(Debug, Clone)]
pub struct FlagResult {
    pub flag_reward: Usd,
    pub health_factor: Decimal,
}

#[derive(Debug, Clone)]
pub struct DebtPaymentResult {
    pub paid: Usd,
    pub from_collateral: Usd,
    pub from_wallet: Usd,
    pub remaining_debt: Usd,
}

/// Margin breakdown re-export point for callers that only see engine results.
pub type LiquidationMargins = MarginBreakdown;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    // not-found: always checked before any arithmetic
    #[error("Market {0:?} not found")]
    MarketNotFound(MarketId),

    #[error("Account {0:?} not found")]
    AccountNotFound(AccountId),

    // authorization
    #[error("Actor {actor:?} lacks {capability:?} on account {account:?}")]
    Unauthorized {
        account: AccountId,
        actor: ActorId,
        capability: Capability,
    },

    // oracle inputs
    #[error("No oracle price available for market {0:?}")]
    NoOraclePrice(MarketId),

    #[error("Oracle publish time {publish_time_ms}ms outside window for commitment at {commitment_time_ms}ms")]
    StalePrice {
        publish_time_ms: i64,
        commitment_time_ms: i64,
    },

    // order state machine
    #[error("Account already has a pending order in this market")]
    OrderFound,

    #[error("No pending order to act on")]
    OrderNotFound,

    #[error("Order is still inside the price delay window")]
    OrderNotReady,

    #[error("Order is past the settlement window")]
    OrderStale,

    #[error("Order is not yet stale")]
    OrderNotStale,

    #[error("Fill price {fill_price} breaches limit {limit_price}")]
    PriceToleranceExceeded {
        fill_price: Price,
        limit_price: Price,
    },

    #[error("Fill price {fill_price} is within limit {limit_price}")]
    PriceToleranceNotExceeded {
        fill_price: Price,
        limit_price: Price,
    },

    // risk preconditions
    #[error("Resulting side size {size} exceeds max market size {max}")]
    MaxMarketSizeExceeded { size: Decimal, max: Decimal },

    #[error("Insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Usd, available: Usd },

    #[error("Position is flagged for liquidation")]
    PositionFlagged,

    #[error("Position is not flagged for liquidation")]
    PositionNotFlagged,

    #[error("Position is healthy and cannot be liquidated")]
    CannotLiquidatePosition,

    #[error("Position is liquidatable")]
    CanLiquidatePosition,

    #[error("Margin-only liquidation requires a closed position with debt exceeding collateral")]
    CannotLiquidateMargin,

    #[error("No liquidation capacity left in the current window")]
    LiquidationZeroCapacity,

    // ledger preconditions
    #[error("No position in this market")]
    PositionNotFound,

    #[error("Target account already holds a position in this market")]
    PositionFound,

    #[error("Target account already holds collateral in this market")]
    CollateralFound,

    // value errors
    #[error("Amount must be a positive quantity")]
    ZeroAmount,

    #[error("Source and target accounts must differ")]
    SameAccount,

    #[error("Proportion {0} outside (0, 1]")]
    InvalidProportion(Decimal),

    #[error("Hook {0} is not whitelisted")]
    HookNotWhitelisted(u32),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),
}
