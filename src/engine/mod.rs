// 8.0: the ledger engine. coordinates request approval, trade settlement,
// currency conversion, and copy allocations against the account store.
// per-account mutual exclusion only; two accounts never contend.

mod config;
mod conversion;
mod copy;
mod core;
mod requests;
mod results;
mod trades;

pub use config::LedgerConfig;
pub use core::Ledger;
pub use results::LedgerError;
