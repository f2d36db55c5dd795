//! Account currency conversion.
//!
//! The one path that rewrites `currency`, and the reason the store exposes an
//! atomic replace of currency and balance together. The rate is fetched before
//! the account guard is taken, so a slow or hung rate source never stalls
//! other work on the account.

use super::core::Ledger;
use super::results::LedgerError;
use crate::account::Account;
use crate::converter::CurrencyConverter;
use crate::events::{CurrencyChangedEvent, EventPayload};
use crate::types::{AccountId, Currency};
use tracing::info;

impl Ledger {
    /// Re-denominate an account into `new_currency`.
    ///
    /// Same-currency calls are a no-op. Otherwise the latest rate is fetched
    /// outside any lock; under the account guard the denomination is checked
    /// to be unchanged since the snapshot, the conversion is applied to the
    /// fresh balance, and both fields are replaced in one write. A concurrent
    /// conversion that got there first surfaces as `InvalidStateTransition`
    /// and the caller may simply retry. A rate failure changes nothing.
    pub fn change_currency(
        &self,
        account_id: AccountId,
        new_currency: Currency,
    ) -> Result<Account, LedgerError> {
        let snapshot = self
            .accounts
            .get(account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let from = snapshot.currency;
        if from == new_currency {
            return Ok(snapshot);
        }

        let rate = self.converter.quote(from, new_currency)?;

        let mut account = self
            .accounts
            .get_mut(account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        if account.currency != from {
            return Err(LedgerError::InvalidStateTransition {
                entity: "account",
                id: account_id.to_string(),
                status: account.currency.to_string(),
            });
        }

        let new_balance = CurrencyConverter::apply_rate(account.balance, rate, new_currency);
        account.set_denomination(new_currency, new_balance);
        let converted = account.clone();
        drop(account);

        info!(account = %account_id, %from, to = %new_currency, %rate, %new_balance, "currency changed");
        self.emit(
            account_id,
            format!("currency changed {from} -> {new_currency} at {rate}, balance {new_balance} {new_currency}"),
            EventPayload::CurrencyChanged(CurrencyChangedEvent {
                from,
                to: new_currency,
                rate,
                new_balance,
            }),
        );
        Ok(converted)
    }
}
