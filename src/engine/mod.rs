// 8.0: risk and settlement engine. coordinates the order state machine,
// margin checks, funding/utilization accrual, liquidations and account
// restructuring. deterministic and event-driven with no external I/O:
// prices, gas and time are all pushed in.

mod accounts;
mod config;
mod core;
mod funding;
mod liquidations;
mod orders;
mod results;
mod views;

pub use config::EngineConfig;
pub use core::Engine;
pub use results::{
    AccountDigest, CancellationResult, DebtPaymentResult, EngineError, FlagResult,
    LiquidationMargins, LiquidationResult, MarginLiquidationResult, MarketDigest, OrderDigest,
    PositionDigest, SettlementResult,
};
