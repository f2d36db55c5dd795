//! Trade settlement.
//!
//! Opening a trade records a position and nothing else. An admin later closes
//! it with an adjudicated outcome and magnitude, or cancels it. Only the close
//! touches the balance, as one signed adjustment with no sufficiency check: a
//! loss is allowed to take the balance negative, unlike a withdrawal.

use super::core::Ledger;
use super::results::LedgerError;
use crate::events::{EventPayload, TradeCancelledEvent, TradeCompletedEvent, TradeOpenedEvent};
use crate::trade::{Trade, TradeOutcome, TradeSide};
use crate::types::{AccountId, Amount, Price, Timestamp, TradeId};
use tracing::info;

impl Ledger {
    /// Open an active trade for an account. No funds are reserved or moved.
    pub fn open_trade(
        &self,
        account_id: AccountId,
        asset: &str,
        side: TradeSide,
        amount: Amount,
        entry_price: Price,
    ) -> Result<Trade, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidInput("trade amount must be positive"));
        }
        if asset.trim().is_empty() {
            return Err(LedgerError::InvalidInput("asset must not be empty"));
        }
        if !self.accounts.contains(account_id) {
            return Err(LedgerError::AccountNotFound(account_id));
        }

        let trade = Trade::new(
            self.next_trade_id(),
            account_id,
            asset.trim().to_string(),
            side,
            amount,
            entry_price,
            Timestamp::now(),
        );
        self.trades.insert(trade.id, trade.clone());

        info!(trade = %trade.id, account = %account_id, asset = %trade.asset, %side, %amount, "trade opened");
        self.emit(
            account_id,
            format!(
                "trade {} opened: {} {} {} at {}",
                trade.id, side, amount, trade.asset, entry_price
            ),
            EventPayload::TradeOpened(TradeOpenedEvent {
                trade_id: trade.id,
                asset: trade.asset.clone(),
                side,
                amount,
                entry_price,
            }),
        );
        Ok(trade)
    }

    /// Close an active trade with an adjudicated outcome.
    ///
    /// `pnl` is the non-negative settlement magnitude; `outcome` carries the
    /// sign. The signed delta is applied to the balance and the trade is
    /// completed inside the owning account's guard, so no reader ever sees
    /// the balance moved with the trade still active. Any failure leaves the
    /// trade active for the admin to retry.
    pub fn close_trade(
        &self,
        trade_id: TradeId,
        approver_id: AccountId,
        outcome: TradeOutcome,
        pnl: Amount,
        exit_price: Option<Price>,
        note: Option<String>,
    ) -> Result<Trade, LedgerError> {
        self.require_admin(approver_id)?;
        if pnl.is_negative() {
            return Err(LedgerError::InvalidInput(
                "settlement magnitude must not be negative",
            ));
        }

        let snapshot = self
            .get_trade(trade_id)
            .ok_or(LedgerError::TradeNotFound(trade_id))?;
        if !snapshot.is_active() {
            return Err(LedgerError::InvalidStateTransition {
                entity: "trade",
                id: trade_id.to_string(),
                status: snapshot.status.to_string(),
            });
        }
        let account_id = snapshot.account_id;

        // account guard first, then the trade guard
        let mut account = self
            .accounts
            .get_mut(account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let mut trade = self
            .trades
            .get_mut(&trade_id)
            .ok_or(LedgerError::TradeNotFound(trade_id))?;
        if !trade.is_active() {
            return Err(LedgerError::InvalidStateTransition {
                entity: "trade",
                id: trade_id.to_string(),
                status: trade.status.to_string(),
            });
        }

        let new_balance = account.apply_pnl(outcome.signed(pnl));
        trade.complete(outcome, pnl, exit_price, approver_id, note, Timestamp::now());
        let completed = trade.clone();
        drop(trade);
        drop(account);

        info!(
            trade = %trade_id, account = %account_id, %outcome, %pnl, %new_balance,
            "trade settled"
        );
        self.emit(
            account_id,
            format!("trade {trade_id} completed with {outcome} {pnl}, balance {new_balance}"),
            EventPayload::TradeCompleted(TradeCompletedEvent {
                trade_id,
                outcome,
                pnl,
                new_balance,
            }),
        );
        Ok(completed)
    }

    /// Cancel an active trade. The balance is never touched, so the trade
    /// guard suffices.
    pub fn cancel_trade(
        &self,
        trade_id: TradeId,
        approver_id: AccountId,
        note: Option<String>,
    ) -> Result<Trade, LedgerError> {
        self.require_admin(approver_id)?;

        let mut trade = self
            .trades
            .get_mut(&trade_id)
            .ok_or(LedgerError::TradeNotFound(trade_id))?;
        if !trade.is_active() {
            return Err(LedgerError::InvalidStateTransition {
                entity: "trade",
                id: trade_id.to_string(),
                status: trade.status.to_string(),
            });
        }
        trade.cancel(approver_id, note, Timestamp::now());
        let cancelled = trade.clone();
        drop(trade);

        let account_id = cancelled.account_id;
        info!(trade = %trade_id, account = %account_id, "trade cancelled");
        self.emit(
            account_id,
            format!("trade {trade_id} cancelled"),
            EventPayload::TradeCancelled(TradeCancelledEvent { trade_id }),
        );
        Ok(cancelled)
    }
}
