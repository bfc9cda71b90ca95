// perps-risk: risk, settlement and liquidation engine for a leveraged
// perpetual futures market backed by a shared liquidity pool.
// commitment-based orders settle against delayed oracle prices; margin math
// and liquidation throttling take priority. all computation is deterministic
// with no external I/O: prices, gas and time are pushed in.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: MarketId, AccountId, SignedSize, Price, Usd
//   2.x  pricing.rs: skew-aware fill price, maker/taker split, keeper fees
//   3.x  order.rs: pending order commitments and the age state machine
//   4.x  position.rs: recomputed-entry positions, pnl and accrual deltas
//   5.x  funding.rs: funding velocity model, utilization interest curve
//   6.x  liquidation.rs: capacity windows, keeper rewards, margin-only path
//   7.x  config.rs: global engine parameters
//   8.x  engine/: entry points: orders, liquidations, accounts, funding, views
//   9.x  oracle.rs: pushed price/gas snapshots; hooks.rs, pool.rs collaborators
//   10.x auth.rs: capability grants as exact (account, capability, actor) triples
//   11.x events.rs: state transition events for audit
//   12.x market.rs: market config + runtime aggregates
//   13.x margin.rs: IM/MM ratios, keeper provisions, health factor

pub mod account;
pub mod auth;
pub mod config;
pub mod engine;
pub mod events;
pub mod funding;
pub mod hooks;
pub mod liquidation;
pub mod margin;
pub mod market;
pub mod oracle;
pub mod order;
pub mod pool;
pub mod position;
pub mod pricing;
pub mod types;

// re exports for convenience
pub use account::*;
pub use auth::*;
pub use config::*;
pub use engine::*;
pub use events::*;
pub use funding::AccrualState;
pub use hooks::*;
pub use liquidation::{can_liquidate_margin_only, LiquidationWindow};
pub use margin::{health_factor, MarginBreakdown};
pub use market::*;
pub use oracle::*;
pub use order::*;
pub use pool::*;
pub use position::*;
pub use pricing::OrderFees;
pub use types::*;
