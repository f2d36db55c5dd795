// 8.0.2: the error taxonomy for ledger operations.

use crate::account::AccountError;
use crate::converter::RateError;
use crate::types::{AccountId, AllocationId, Amount, RequestId, TradeId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("request {0} not found")]
    RequestNotFound(RequestId),

    #[error("trade {0} not found")]
    TradeNotFound(TradeId),

    #[error("allocation {0} not found")]
    AllocationNotFound(AllocationId),

    /// The record exists but is not in the state the operation requires.
    /// Guards every terminal transition against double application.
    #[error("{entity} {id} is not in the required state (currently {status})")]
    InvalidStateTransition {
        entity: &'static str,
        id: String,
        status: String,
    },

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Amount, available: Amount },

    #[error("invalid payout detail: {0}")]
    InvalidPayoutDetail(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("account {0} is not authorized for this operation")]
    NotAuthorized(AccountId),

    #[error("rate unavailable: {0}")]
    RateUnavailable(#[from] RateError),

    /// Account store write failed for an infrastructure reason. With the
    /// in-memory store this does not occur, but callers are written against
    /// it so a persistent store can slot in behind the same contract.
    #[error("account store failure: {0}")]
    DependencyFailure(String),
}

impl From<AccountError> for LedgerError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::NotFound(id) => LedgerError::AccountNotFound(id),
            AccountError::InsufficientFunds {
                requested,
                available,
            } => LedgerError::InsufficientFunds {
                requested,
                available,
            },
            AccountError::NonPositiveAmount(_) => {
                LedgerError::InvalidInput("amount must be positive")
            }
        }
    }
}
