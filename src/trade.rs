//! Trades and their settlement records.
//!
//! Opening a trade moves no money. The balance changes exactly once, when an
//! admin closes the trade with an adjudicated outcome, and never if the trade
//! is cancelled instead.

use crate::types::{AccountId, Amount, Price, Timestamp, TradeId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Active,
    Completed,
    Cancelled,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Active => write!(f, "active"),
            TradeStatus::Completed => write!(f, "completed"),
            TradeStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Which way the settlement goes. The direction lives here; the magnitude is
/// always a non-negative [`Amount`] alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeOutcome {
    Profit,
    Loss,
}

impl TradeOutcome {
    /// Turn a non-negative magnitude into the signed balance delta.
    pub fn signed(self, magnitude: Amount) -> Amount {
        debug_assert!(!magnitude.is_negative());
        match self {
            TradeOutcome::Profit => magnitude,
            TradeOutcome::Loss => magnitude.negate(),
        }
    }
}

impl fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeOutcome::Profit => write!(f, "profit"),
            TradeOutcome::Loss => write!(f, "loss"),
        }
    }
}

/// An open or settled position. `outcome` and `pnl` are populated if and only
/// if the trade completed; a cancelled trade keeps both `None` forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub account_id: AccountId,
    pub asset: String,
    pub side: TradeSide,
    /// Stake the user put on the position, in the account currency at open
    /// time. Informational for settlement; the admin adjudicates the pnl.
    pub amount: Amount,
    pub entry_price: Price,
    pub exit_price: Option<Price>,
    pub status: TradeStatus,
    pub outcome: Option<TradeOutcome>,
    /// Non-negative settlement magnitude. The sign is carried by `outcome`.
    pub pnl: Option<Amount>,
    pub admin_note: Option<String>,
    pub opened_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    pub processed_by: Option<AccountId>,
}

impl Trade {
    pub fn new(
        id: TradeId,
        account_id: AccountId,
        asset: String,
        side: TradeSide,
        amount: Amount,
        entry_price: Price,
        opened_at: Timestamp,
    ) -> Self {
        Self {
            id,
            account_id,
            asset,
            side,
            amount,
            entry_price,
            exit_price: None,
            status: TradeStatus::Active,
            outcome: None,
            pnl: None,
            admin_note: None,
            opened_at,
            closed_at: None,
            processed_by: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TradeStatus::Active
    }

    /// Record the adjudicated settlement. Callers check `is_active` first and
    /// apply the balance delta in the same critical section as this write.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn complete(
        &mut self,
        outcome: TradeOutcome,
        pnl: Amount,
        exit_price: Option<Price>,
        processed_by: AccountId,
        note: Option<String>,
        at: Timestamp,
    ) {
        debug_assert!(self.is_active());
        debug_assert!(!pnl.is_negative());
        self.status = TradeStatus::Completed;
        self.outcome = Some(outcome);
        self.pnl = Some(pnl);
        self.exit_price = exit_price;
        self.admin_note = note;
        self.closed_at = Some(at);
        self.processed_by = Some(processed_by);
    }

    /// Void the trade. No outcome, no pnl, no balance effect.
    pub(crate) fn cancel(&mut self, processed_by: AccountId, note: Option<String>, at: Timestamp) {
        debug_assert!(self.is_active());
        self.status = TradeStatus::Cancelled;
        self.admin_note = note;
        self.closed_at = Some(at);
        self.processed_by = Some(processed_by);
    }
}
