//! Copy-trading allocations.
//!
//! Allocations are informational records. The balance cap is enforced against
//! the live balance under the account guard at creation; nothing is debited,
//! and stopping an allocation releases nothing.

use super::core::Ledger;
use super::results::LedgerError;
use crate::copy_trading::CopyAllocation;
use crate::events::{CopyStartedEvent, CopyStoppedEvent, EventPayload};
use crate::types::{AccountId, AllocationId, Amount, Timestamp, TraderId};
use tracing::info;

impl Ledger {
    /// Start copying a trader with a pledged stake. The stake may not exceed
    /// the balance at this moment; afterwards the balance moves freely.
    pub fn allocate_copy(
        &self,
        account_id: AccountId,
        trader_id: TraderId,
        amount: Amount,
    ) -> Result<CopyAllocation, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidInput("copy amount must be positive"));
        }

        // guard so the cap is checked against a balance nobody is moving
        let account = self
            .accounts
            .get_mut(account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        if account.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                requested: amount,
                available: account.balance,
            });
        }

        let allocation = CopyAllocation::new(
            self.next_allocation_id(),
            account_id,
            trader_id,
            amount,
            Timestamp::now(),
        );
        self.allocations.insert(allocation.id, allocation.clone());
        drop(account);

        info!(allocation = %allocation.id, account = %account_id, trader = %trader_id, %amount, "copy started");
        self.emit(
            account_id,
            format!(
                "copy allocation {} of {} to {} started",
                allocation.id, amount, trader_id
            ),
            EventPayload::CopyStarted(CopyStartedEvent {
                allocation_id: allocation.id,
                trader_id,
                amount,
            }),
        );
        Ok(allocation)
    }

    /// Stop an active allocation. Only the owning account may stop it.
    pub fn stop_copy(
        &self,
        account_id: AccountId,
        allocation_id: AllocationId,
    ) -> Result<CopyAllocation, LedgerError> {
        let mut allocation = self
            .allocations
            .get_mut(&allocation_id)
            .ok_or(LedgerError::AllocationNotFound(allocation_id))?;
        if allocation.account_id != account_id {
            return Err(LedgerError::NotAuthorized(account_id));
        }
        if !allocation.is_active() {
            return Err(LedgerError::InvalidStateTransition {
                entity: "allocation",
                id: allocation_id.to_string(),
                status: allocation.status.to_string(),
            });
        }
        allocation.stop(Timestamp::now());
        let stopped = allocation.clone();
        drop(allocation);

        info!(allocation = %allocation_id, account = %account_id, "copy stopped");
        self.emit(
            account_id,
            format!("copy allocation {allocation_id} stopped"),
            EventPayload::CopyStopped(CopyStoppedEvent { allocation_id }),
        );
        Ok(stopped)
    }
}
