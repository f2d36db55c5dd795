//! Deposit and withdrawal requests.
//!
//! Requests are the approval queue between a customer asking for money to move
//! and an admin letting it happen. A request never touches a balance by itself;
//! only the approval step in the engine does.

use crate::types::{AccountId, Amount, Currency, RequestId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Deposit,
    Withdrawal,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Deposit => write!(f, "deposit"),
            RequestKind::Withdrawal => write!(f, "withdrawal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// How money enters or leaves. The two arms carry different fields on purpose;
/// a bank payout has no address and a crypto payout has no account number, and
/// the type makes mixing them unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Crypto {
        network: String,
        address: String,
    },
    Bank {
        bank_name: String,
        account_name: String,
        account_number: String,
    },
}

impl PaymentMethod {
    /// Check the fields a payout actually needs. Deposits skip this; the
    /// money arrives on our side regardless of how sloppy the metadata is.
    pub fn payout_ready(&self) -> Result<(), &'static str> {
        match self {
            PaymentMethod::Crypto { address, .. } => {
                if address.trim().is_empty() {
                    return Err("crypto payout requires a destination address");
                }
                Ok(())
            }
            PaymentMethod::Bank {
                bank_name,
                account_number,
                ..
            } => {
                if bank_name.trim().is_empty() {
                    return Err("bank payout requires a bank name");
                }
                if account_number.trim().is_empty() {
                    return Err("bank payout requires an account number");
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Crypto { network, .. } => write!(f, "crypto ({network})"),
            PaymentMethod::Bank { bank_name, .. } => write!(f, "bank ({bank_name})"),
        }
    }
}

/// A money-movement request waiting on (or past) an admin decision.
///
/// Requests are append-mostly: once filed they are never deleted, and the only
/// mutation they ever see is the single pending-to-terminal decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub id: RequestId,
    pub account_id: AccountId,
    pub kind: RequestKind,
    pub amount: Amount,
    /// Denomination of the account at the time the request was filed.
    pub currency: Currency,
    pub method: PaymentMethod,
    pub status: RequestStatus,
    /// Opaque evidence reference attached to deposits (a receipt URL, a tx
    /// hash). Never interpreted here.
    pub proof: Option<String>,
    pub admin_note: Option<String>,
    pub created_at: Timestamp,
    pub processed_at: Option<Timestamp>,
    pub processed_by: Option<AccountId>,
}

impl TransactionRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: RequestId,
        account_id: AccountId,
        kind: RequestKind,
        amount: Amount,
        currency: Currency,
        method: PaymentMethod,
        proof: Option<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            account_id,
            kind,
            amount,
            currency,
            method,
            status: RequestStatus::Pending,
            proof,
            admin_note: None,
            created_at,
            processed_at: None,
            processed_by: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Stamp the admin decision. Callers check `is_pending` first; a request
    /// is decided exactly once and `processed_by`/`processed_at` are set in
    /// the same write as the status.
    pub(crate) fn decide(
        &mut self,
        status: RequestStatus,
        processed_by: AccountId,
        note: Option<String>,
        at: Timestamp,
    ) {
        debug_assert!(self.is_pending());
        debug_assert!(status != RequestStatus::Pending);
        self.status = status;
        self.admin_note = note;
        self.processed_at = Some(at);
        self.processed_by = Some(processed_by);
    }
}
