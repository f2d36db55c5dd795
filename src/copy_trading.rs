//! Copy-trading allocations.
//!
//! An allocation records that an account mirrors a trader with some stake.
//! It never moves money: the stake is a cap checked against the balance when
//! the allocation is created, not a debit. Settlement of copied trades flows
//! through the ordinary trade records, not through this entity.

use crate::types::{AccountId, AllocationId, Amount, Timestamp, TraderId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationStatus {
    Active,
    Stopped,
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationStatus::Active => write!(f, "active"),
            AllocationStatus::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyAllocation {
    pub id: AllocationId,
    pub account_id: AccountId,
    pub trader_id: TraderId,
    /// Stake pledged to mirror the trader. Capped by the balance at creation
    /// time and informational afterwards.
    pub amount: Amount,
    pub status: AllocationStatus,
    pub started_at: Timestamp,
    pub stopped_at: Option<Timestamp>,
}

impl CopyAllocation {
    pub fn new(
        id: AllocationId,
        account_id: AccountId,
        trader_id: TraderId,
        amount: Amount,
        started_at: Timestamp,
    ) -> Self {
        Self {
            id,
            account_id,
            trader_id,
            amount,
            status: AllocationStatus::Active,
            started_at,
            stopped_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AllocationStatus::Active
    }

    pub(crate) fn stop(&mut self, at: Timestamp) {
        debug_assert!(self.is_active());
        self.status = AllocationStatus::Stopped;
        self.stopped_at = Some(at);
    }
}
