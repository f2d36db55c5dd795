// 8.1 engine/core.rs: the ledger itself. holds the account store, the request and
// trade books, the converter, the notifier, and the audit log.
//
// lock discipline: take the account's exclusive guard first, then the guard of
// the record being transitioned. record-only transitions (reject, cancel, stop)
// may take the record guard alone since no balance is involved. guards are
// dropped before any event leaves the engine.

use super::config::LedgerConfig;
use super::results::LedgerError;
use crate::account::{Account, AccountStore};
use crate::converter::{CurrencyConverter, RateSource};
use crate::copy_trading::CopyAllocation;
use crate::events::{EventId, EventPayload, LedgerEvent, Notifier, NullNotifier};
use crate::request::TransactionRequest;
use crate::trade::Trade;
use crate::types::{
    AccountId, AllocationId, Currency, RequestId, Role, Timestamp, TradeId,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// The ledger engine. All operations take `&self`; per-account serialization
/// comes from the store's entry guards, so two accounts never contend.
pub struct Ledger {
    pub(super) config: LedgerConfig,
    pub(super) accounts: AccountStore,
    pub(super) requests: DashMap<RequestId, TransactionRequest>,
    pub(super) trades: DashMap<TradeId, Trade>,
    pub(super) allocations: DashMap<AllocationId, CopyAllocation>,
    pub(super) converter: CurrencyConverter,
    pub(super) notifier: Arc<dyn Notifier>,
    events: Mutex<Vec<LedgerEvent>>,
    next_event_id: AtomicU64,
    next_account_id: AtomicU64,
    next_request_id: AtomicU64,
    next_trade_id: AtomicU64,
    next_allocation_id: AtomicU64,
}

impl Ledger {
    pub fn new(config: LedgerConfig, rate_source: Arc<dyn RateSource>) -> Self {
        Self {
            config,
            accounts: AccountStore::new(),
            requests: DashMap::new(),
            trades: DashMap::new(),
            allocations: DashMap::new(),
            converter: CurrencyConverter::new(rate_source),
            notifier: Arc::new(NullNotifier),
            events: Mutex::new(Vec::new()),
            next_event_id: AtomicU64::new(1),
            next_account_id: AtomicU64::new(1),
            next_request_id: AtomicU64::new(1),
            next_trade_id: AtomicU64::new(1),
            next_allocation_id: AtomicU64::new(1),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn create_account(&self, currency: Currency, role: Role) -> AccountId {
        let id = AccountId(self.next_account_id.fetch_add(1, Ordering::Relaxed));
        let account = Account::new(id, currency, role, Timestamp::now());
        self.accounts.insert(account);
        id
    }

    pub fn get_account(&self, account_id: AccountId) -> Option<Account> {
        self.accounts.get(account_id)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn get_request(&self, request_id: RequestId) -> Option<TransactionRequest> {
        self.requests.get(&request_id).map(|r| r.clone())
    }

    pub fn get_trade(&self, trade_id: TradeId) -> Option<Trade> {
        self.trades.get(&trade_id).map(|t| t.clone())
    }

    pub fn get_allocation(&self, allocation_id: AllocationId) -> Option<CopyAllocation> {
        self.allocations.get(&allocation_id).map(|a| a.clone())
    }

    /// All requests filed by one account, oldest first.
    pub fn account_requests(&self, account_id: AccountId) -> Vec<TransactionRequest> {
        let mut requests: Vec<TransactionRequest> = self
            .requests
            .iter()
            .filter(|r| r.account_id == account_id)
            .map(|r| r.clone())
            .collect();
        requests.sort_by_key(|r| r.id);
        requests
    }

    /// The admin review queue: every request still awaiting a decision.
    pub fn pending_requests(&self) -> Vec<TransactionRequest> {
        let mut requests: Vec<TransactionRequest> = self
            .requests
            .iter()
            .filter(|r| r.is_pending())
            .map(|r| r.clone())
            .collect();
        requests.sort_by_key(|r| r.id);
        requests
    }

    pub fn account_trades(&self, account_id: AccountId) -> Vec<Trade> {
        let mut trades: Vec<Trade> = self
            .trades
            .iter()
            .filter(|t| t.account_id == account_id)
            .map(|t| t.clone())
            .collect();
        trades.sort_by_key(|t| t.id);
        trades
    }

    pub fn active_trades(&self) -> Vec<Trade> {
        let mut trades: Vec<Trade> = self
            .trades
            .iter()
            .filter(|t| t.is_active())
            .map(|t| t.clone())
            .collect();
        trades.sort_by_key(|t| t.id);
        trades
    }

    pub fn account_allocations(&self, account_id: AccountId) -> Vec<CopyAllocation> {
        let mut allocations: Vec<CopyAllocation> = self
            .allocations
            .iter()
            .filter(|a| a.account_id == account_id)
            .map(|a| a.clone())
            .collect();
        allocations.sort_by_key(|a| a.id);
        allocations
    }

    /// Full audit trail, in emission order.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().clone()
    }

    pub fn recent_events(&self, count: usize) -> Vec<LedgerEvent> {
        let events = self.events.lock();
        let start = events.len().saturating_sub(count);
        events[start..].to_vec()
    }

    /// Actor check for administrative operations. Reads the actor's account
    /// and releases it before the caller takes any guard.
    pub(super) fn require_admin(&self, actor_id: AccountId) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get(actor_id)
            .ok_or(LedgerError::AccountNotFound(actor_id))?;
        if !account.role.is_admin() {
            return Err(LedgerError::NotAuthorized(actor_id));
        }
        Ok(())
    }

    pub(super) fn next_request_id(&self) -> RequestId {
        RequestId(self.next_request_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(super) fn next_trade_id(&self) -> TradeId {
        TradeId(self.next_trade_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(super) fn next_allocation_id(&self) -> AllocationId {
        AllocationId(self.next_allocation_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Append to the audit log and hand the event to the notifier. Callers
    /// must have released every guard; the notifier may call back into reads.
    pub(super) fn emit(&self, account_id: AccountId, summary: String, payload: EventPayload) {
        // id allocation happens under the log lock so log order and id order agree
        let event = {
            let mut events = self.events.lock();
            let id = EventId(self.next_event_id.fetch_add(1, Ordering::Relaxed));
            let event = LedgerEvent::new(id, Timestamp::now(), account_id, summary, payload);
            events.push(event.clone());
            if events.len() > self.config.max_events {
                let drain_count = events.len() - self.config.max_events;
                events.drain(0..drain_count);
            }
            event
        };
        debug!(event_id = event.id.0, summary = %event.summary, "ledger event");

        self.notifier.notify(&event);
    }
}
