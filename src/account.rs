//! Account records and the account store.
//!
//! The store is the only component in the crate that writes `balance` or
//! `currency`. Every workflow funnels its financial effect through the four
//! mutators on [`Account`], reached either via the store's one-shot operations
//! or via the exclusive entry guard the engine holds across a workflow step.

use crate::types::{AccountId, Amount, Currency, Role, Timestamp};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by account lookups and balance mutations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccountError {
    #[error("account {0} not found")]
    NotFound(AccountId),
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Amount, available: Amount },
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Amount),
}

/// A customer or admin account. Balance is denominated in `currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Amount,
    pub currency: Currency,
    pub role: Role,
    pub created_at: Timestamp,
}

impl Account {
    pub fn new(id: AccountId, currency: Currency, role: Role, created_at: Timestamp) -> Self {
        Self {
            id,
            balance: Amount::zero(),
            currency,
            role,
            created_at,
        }
    }

    /// Add funds. Callers validate positivity before reaching this point.
    pub(crate) fn credit(&mut self, amount: Amount) -> Amount {
        debug_assert!(amount.is_positive());
        self.balance = self.balance.add(amount);
        self.balance
    }

    /// Remove funds, refusing to overdraw.
    pub(crate) fn debit(&mut self, amount: Amount) -> Result<Amount, AccountError> {
        debug_assert!(amount.is_positive());
        if self.balance < amount {
            return Err(AccountError::InsufficientFunds {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance = self.balance.sub(amount);
        Ok(self.balance)
    }

    /// Apply a signed settlement adjustment. Losses may take the balance
    /// negative; accepting that exposure is the adjudicating admin's call.
    pub(crate) fn apply_pnl(&mut self, delta: Amount) -> Amount {
        self.balance = self.balance.add(delta);
        self.balance
    }

    /// Replace denomination and balance in one write.
    pub(crate) fn set_denomination(&mut self, currency: Currency, balance: Amount) {
        self.currency = currency;
        self.balance = balance;
    }
}

/// Concurrent account store keyed by [`AccountId`].
///
/// Each mutation happens under the exclusive guard of the account's map entry,
/// so two operations on the same account serialize while operations on
/// different accounts proceed in parallel.
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: DashMap<AccountId, Account>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    /// Snapshot of an account. The clone is detached from the store and may be
    /// stale the moment it is returned.
    pub fn get(&self, id: AccountId) -> Option<Account> {
        self.accounts.get(&id).map(|entry| entry.clone())
    }

    pub fn contains(&self, id: AccountId) -> bool {
        self.accounts.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Exclusive guard for one account. Engine workflows hold this across
    /// validate, mutate, and record updates so the whole step is atomic with
    /// respect to that account.
    pub(crate) fn get_mut(&self, id: AccountId) -> Option<RefMut<'_, AccountId, Account>> {
        self.accounts.get_mut(&id)
    }

    /// Add `amount` to the balance. Returns the new balance.
    pub fn credit(&self, id: AccountId, amount: Amount) -> Result<Amount, AccountError> {
        if !amount.is_positive() {
            return Err(AccountError::NonPositiveAmount(amount));
        }
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or(AccountError::NotFound(id))?;
        Ok(account.credit(amount))
    }

    /// Subtract `amount` from the balance, failing if it would overdraw.
    /// Returns the new balance.
    pub fn debit(&self, id: AccountId, amount: Amount) -> Result<Amount, AccountError> {
        if !amount.is_positive() {
            return Err(AccountError::NonPositiveAmount(amount));
        }
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or(AccountError::NotFound(id))?;
        account.debit(amount)
    }

    /// Signed settlement adjustment with no sufficiency check.
    pub fn apply_pnl(&self, id: AccountId, delta: Amount) -> Result<Amount, AccountError> {
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or(AccountError::NotFound(id))?;
        Ok(account.apply_pnl(delta))
    }

    /// Atomically replace both the denomination and the balance. No caller
    /// ever observes the new currency with the old balance.
    pub fn set_currency_and_balance(
        &self,
        id: AccountId,
        currency: Currency,
        balance: Amount,
    ) -> Result<(), AccountError> {
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or(AccountError::NotFound(id))?;
        account.set_denomination(currency, balance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn store_with_account(id: u64, balance: Amount) -> AccountStore {
        let store = AccountStore::new();
        let mut account = Account::new(
            AccountId(id),
            Currency::Usd,
            Role::User,
            Timestamp::from_millis(0),
        );
        account.balance = balance;
        store.insert(account);
        store
    }

    #[test]
    fn new_account_starts_empty() {
        let account = Account::new(
            AccountId(1),
            Currency::Eur,
            Role::User,
            Timestamp::from_millis(0),
        );
        assert!(account.balance.is_zero());
        assert_eq!(account.currency, Currency::Eur);
    }

    #[test]
    fn credit_increases_balance() {
        let store = store_with_account(1, Amount::new(dec!(100)));
        let balance = store
            .credit(AccountId(1), Amount::new(dec!(25.50)))
            .unwrap();
        assert_eq!(balance, Amount::new(dec!(125.50)));
        assert_eq!(store.get(AccountId(1)).unwrap().balance, balance);
    }

    #[test]
    fn debit_decreases_balance() {
        let store = store_with_account(1, Amount::new(dec!(100)));
        let balance = store.debit(AccountId(1), Amount::new(dec!(40))).unwrap();
        assert_eq!(balance, Amount::new(dec!(60)));
    }

    #[test]
    fn debit_refuses_overdraw() {
        let store = store_with_account(1, Amount::new(dec!(30)));
        let err = store
            .debit(AccountId(1), Amount::new(dec!(30.01)))
            .unwrap_err();
        assert_eq!(
            err,
            AccountError::InsufficientFunds {
                requested: Amount::new(dec!(30.01)),
                available: Amount::new(dec!(30)),
            }
        );
        // Balance untouched after the refusal.
        assert_eq!(
            store.get(AccountId(1)).unwrap().balance,
            Amount::new(dec!(30))
        );
    }

    #[test]
    fn debit_of_exact_balance_empties_account() {
        let store = store_with_account(1, Amount::new(dec!(30)));
        let balance = store.debit(AccountId(1), Amount::new(dec!(30))).unwrap();
        assert!(balance.is_zero());
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let store = store_with_account(1, Amount::new(dec!(100)));
        assert!(matches!(
            store.credit(AccountId(1), Amount::zero()),
            Err(AccountError::NonPositiveAmount(_))
        ));
        assert!(matches!(
            store.debit(AccountId(1), Amount::new(dec!(-5))),
            Err(AccountError::NonPositiveAmount(_))
        ));
    }

    #[test]
    fn apply_pnl_may_go_negative() {
        let store = store_with_account(1, Amount::new(dec!(50)));
        let balance = store
            .apply_pnl(AccountId(1), Amount::new(dec!(-80)))
            .unwrap();
        assert_eq!(balance, Amount::new(dec!(-30)));
    }

    #[test]
    fn set_currency_and_balance_replaces_both_fields() {
        let store = store_with_account(1, Amount::new(dec!(100)));
        store
            .set_currency_and_balance(AccountId(1), Currency::Eur, Amount::new(dec!(92.41)))
            .unwrap();
        let account = store.get(AccountId(1)).unwrap();
        assert_eq!(account.currency, Currency::Eur);
        assert_eq!(account.balance, Amount::new(dec!(92.41)));
    }

    #[test]
    fn missing_account_is_reported() {
        let store = AccountStore::new();
        assert_eq!(
            store.credit(AccountId(9), Amount::new(dec!(1))),
            Err(AccountError::NotFound(AccountId(9)))
        );
    }
}
