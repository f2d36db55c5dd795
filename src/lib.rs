// ledger-core: balance ledger and transaction-approval engine.
// approval-first architecture: money moves only on a terminal decision.
// per-account serialization at the account store, no global lock.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x types.rs: primitives: ids, Role, Currency, Amount, Price, Timestamp
//   2.x account.rs: account records + the concurrent account store
//   3.x request.rs: deposit/withdrawal requests, payout method union
//   4.x trade.rs: trades and their settlement records
//   5.x copy_trading.rs: copy-trading allocations (informational)
//   6.x converter.rs: currency conversion + pluggable rate sources
//   7.x events.rs: audit events + notifier boundary
//   8.x engine/: the ledger: approvals, settlement, conversion, copy

// core ledger modules
pub mod account;
pub mod converter;
pub mod copy_trading;
pub mod engine;
pub mod events;
pub mod request;
pub mod trade;
pub mod types;

// re exports for convenience
pub use account::*;
pub use converter::*;
pub use copy_trading::*;
pub use engine::*;
pub use events::*;
pub use request::*;
pub use trade::*;
pub use types::*;
