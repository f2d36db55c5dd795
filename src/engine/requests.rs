//! Deposit and withdrawal request workflows.
//!
//! Owners file requests; admins decide them. Filing never moves money.
//! Approval is the single point where the balance changes, and the change
//! lands in the same critical section as the status flip.

use super::core::Ledger;
use super::results::LedgerError;
use crate::events::{
    DepositApprovedEvent, DepositRejectedEvent, EventPayload, RequestFiledEvent,
    WithdrawalApprovedEvent, WithdrawalRejectedEvent,
};
use crate::request::{PaymentMethod, RequestKind, RequestStatus, TransactionRequest};
use crate::types::{AccountId, Amount, Currency, RequestId, Timestamp};
use tracing::info;

impl Ledger {
    /// File a deposit request. `proof` is an opaque evidence reference (a
    /// receipt URL, a transaction hash) stored untouched.
    pub fn request_deposit(
        &self,
        account_id: AccountId,
        amount: Amount,
        currency: Currency,
        method: PaymentMethod,
        proof: Option<String>,
    ) -> Result<TransactionRequest, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidInput("deposit amount must be positive"));
        }
        if !self.accounts.contains(account_id) {
            return Err(LedgerError::AccountNotFound(account_id));
        }

        let request = TransactionRequest::new(
            self.next_request_id(),
            account_id,
            RequestKind::Deposit,
            amount,
            currency,
            method,
            proof,
            Timestamp::now(),
        );
        self.requests.insert(request.id, request.clone());

        info!(request = %request.id, account = %account_id, %amount, %currency, "deposit requested");
        self.emit(
            account_id,
            format!("deposit {} of {} {} filed", request.id, amount, currency),
            EventPayload::RequestFiled(RequestFiledEvent {
                request_id: request.id,
                kind: RequestKind::Deposit,
                amount,
                currency,
            }),
        );
        Ok(request)
    }

    /// File a withdrawal request. Payout details are validated now; balance
    /// sufficiency is not, since the balance may move before review. Only the
    /// approval-time check counts.
    pub fn request_withdrawal(
        &self,
        account_id: AccountId,
        amount: Amount,
        currency: Currency,
        method: PaymentMethod,
    ) -> Result<TransactionRequest, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidInput(
                "withdrawal amount must be positive",
            ));
        }
        method
            .payout_ready()
            .map_err(LedgerError::InvalidPayoutDetail)?;
        if !self.accounts.contains(account_id) {
            return Err(LedgerError::AccountNotFound(account_id));
        }

        let request = TransactionRequest::new(
            self.next_request_id(),
            account_id,
            RequestKind::Withdrawal,
            amount,
            currency,
            method,
            None,
            Timestamp::now(),
        );
        self.requests.insert(request.id, request.clone());

        info!(request = %request.id, account = %account_id, %amount, %currency, "withdrawal requested");
        self.emit(
            account_id,
            format!("withdrawal {} of {} {} filed", request.id, amount, currency),
            EventPayload::RequestFiled(RequestFiledEvent {
                request_id: request.id,
                kind: RequestKind::Withdrawal,
                amount,
                currency,
            }),
        );
        Ok(request)
    }

    /// Approve a pending request and apply its balance effect.
    ///
    /// Runs under the owning account's guard: re-validate pending, credit or
    /// debit, stamp the decision. Deposits credit the amount against the
    /// account's current denomination. A failed debit leaves the request
    /// pending and the balance untouched, for the admin to retry or reject.
    /// A request already decided fails with `InvalidStateTransition`, which
    /// is what makes a duplicated or replayed approval harmless.
    pub fn approve_request(
        &self,
        request_id: RequestId,
        approver_id: AccountId,
        note: Option<String>,
    ) -> Result<TransactionRequest, LedgerError> {
        self.require_admin(approver_id)?;

        let snapshot = self
            .get_request(request_id)
            .ok_or(LedgerError::RequestNotFound(request_id))?;
        if !snapshot.is_pending() {
            // decided is forever, no need to look again under the guard
            return Err(LedgerError::InvalidStateTransition {
                entity: "request",
                id: request_id.to_string(),
                status: snapshot.status.to_string(),
            });
        }
        let account_id = snapshot.account_id;

        // account guard first, then the request guard
        let mut account = self
            .accounts
            .get_mut(account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let mut request = self
            .requests
            .get_mut(&request_id)
            .ok_or(LedgerError::RequestNotFound(request_id))?;
        if !request.is_pending() {
            return Err(LedgerError::InvalidStateTransition {
                entity: "request",
                id: request_id.to_string(),
                status: request.status.to_string(),
            });
        }

        let amount = request.amount;
        let kind = request.kind;
        let currency = account.currency;
        let new_balance = match kind {
            RequestKind::Deposit => account.credit(amount),
            RequestKind::Withdrawal => account.debit(amount).map_err(LedgerError::from)?,
        };
        request.decide(RequestStatus::Approved, approver_id, note, Timestamp::now());
        let approved = request.clone();
        drop(request);
        drop(account);

        info!(
            request = %request_id, account = %account_id, %kind, %amount, %new_balance,
            "request approved"
        );
        let payload = match kind {
            RequestKind::Deposit => EventPayload::DepositApproved(DepositApprovedEvent {
                request_id,
                amount,
                new_balance,
            }),
            RequestKind::Withdrawal => EventPayload::WithdrawalApproved(WithdrawalApprovedEvent {
                request_id,
                amount,
                new_balance,
            }),
        };
        self.emit(
            account_id,
            format!("{kind} {request_id} approved, balance {new_balance} {currency}"),
            payload,
        );
        Ok(approved)
    }

    /// Reject a pending request. The reason is mandatory and recorded as the
    /// admin note. No balance is involved, so the request guard suffices.
    pub fn reject_request(
        &self,
        request_id: RequestId,
        approver_id: AccountId,
        reason: &str,
    ) -> Result<TransactionRequest, LedgerError> {
        self.require_admin(approver_id)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::InvalidInput(
                "rejection reason must not be empty",
            ));
        }

        let mut request = self
            .requests
            .get_mut(&request_id)
            .ok_or(LedgerError::RequestNotFound(request_id))?;
        if !request.is_pending() {
            return Err(LedgerError::InvalidStateTransition {
                entity: "request",
                id: request_id.to_string(),
                status: request.status.to_string(),
            });
        }
        request.decide(
            RequestStatus::Rejected,
            approver_id,
            Some(reason.to_string()),
            Timestamp::now(),
        );
        let rejected = request.clone();
        drop(request);

        let account_id = rejected.account_id;
        info!(request = %request_id, account = %account_id, kind = %rejected.kind, "request rejected");
        let payload = match rejected.kind {
            RequestKind::Deposit => EventPayload::DepositRejected(DepositRejectedEvent {
                request_id,
                reason: reason.to_string(),
            }),
            RequestKind::Withdrawal => EventPayload::WithdrawalRejected(WithdrawalRejectedEvent {
                request_id,
                reason: reason.to_string(),
            }),
        };
        self.emit(
            account_id,
            format!("{} {} rejected: {}", rejected.kind, request_id, reason),
            payload,
        );
        Ok(rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::FixedRateSource;
    use crate::engine::LedgerConfig;
    use crate::types::Role;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn ledger() -> (Ledger, AccountId, AccountId) {
        let ledger = Ledger::new(LedgerConfig::default(), Arc::new(FixedRateSource::new()));
        let admin = ledger.create_account(Currency::Usd, Role::Admin);
        let user = ledger.create_account(Currency::Usd, Role::User);
        (ledger, admin, user)
    }

    fn crypto() -> PaymentMethod {
        PaymentMethod::Crypto {
            network: "TRC20".into(),
            address: "TXYZabc123".into(),
        }
    }

    #[test]
    fn deposit_approval_credits_once() {
        let (ledger, admin, user) = ledger();
        let request = ledger
            .request_deposit(user, Amount::new(dec!(100)), Currency::Usd, crypto(), None)
            .unwrap();
        assert!(ledger.get_account(user).unwrap().balance.is_zero());

        ledger.approve_request(request.id, admin, None).unwrap();
        assert_eq!(
            ledger.get_account(user).unwrap().balance,
            Amount::new(dec!(100))
        );

        // second approval must not double-credit
        let err = ledger.approve_request(request.id, admin, None).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
        assert_eq!(
            ledger.get_account(user).unwrap().balance,
            Amount::new(dec!(100))
        );
    }

    #[test]
    fn withdrawal_sufficiency_is_checked_at_approval_not_filing() {
        let (ledger, admin, user) = ledger();
        // filing succeeds with a zero balance
        let request = ledger
            .request_withdrawal(user, Amount::new(dec!(80)), Currency::Usd, crypto())
            .unwrap();

        let err = ledger.approve_request(request.id, admin, None).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        // the request is still pending and can be decided later
        assert!(ledger.get_request(request.id).unwrap().is_pending());
    }

    #[test]
    fn only_admins_decide() {
        let (ledger, _admin, user) = ledger();
        let request = ledger
            .request_deposit(user, Amount::new(dec!(10)), Currency::Usd, crypto(), None)
            .unwrap();
        assert_eq!(
            ledger.approve_request(request.id, user, None),
            Err(LedgerError::NotAuthorized(user))
        );
        assert_eq!(
            ledger.reject_request(request.id, user, "no"),
            Err(LedgerError::NotAuthorized(user))
        );
    }

    #[test]
    fn rejection_requires_a_reason() {
        let (ledger, admin, user) = ledger();
        let request = ledger
            .request_deposit(user, Amount::new(dec!(10)), Currency::Usd, crypto(), None)
            .unwrap();
        assert_eq!(
            ledger.reject_request(request.id, admin, "   "),
            Err(LedgerError::InvalidInput("rejection reason must not be empty"))
        );
    }
}
