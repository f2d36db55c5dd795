// 7.0: every terminal transition produces an event. used for the audit trail and
// for notifying external systems. the EventPayload enum lists all event types.

use crate::request::RequestKind;
use crate::trade::{TradeOutcome, TradeSide};
use crate::types::{
    AccountId, AllocationId, Amount, Currency, Price, RequestId, Timestamp, TradeId, TraderId,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

/// One notification-worthy thing that happened to one account.
///
/// `summary` is the human-readable line a delivery channel can show verbatim;
/// the payload carries the structured fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub account_id: AccountId,
    pub summary: String,
    pub payload: EventPayload,
}

impl LedgerEvent {
    pub fn new(
        id: EventId,
        timestamp: Timestamp,
        account_id: AccountId,
        summary: String,
        payload: EventPayload,
    ) -> Self {
        Self {
            id,
            timestamp,
            account_id,
            summary,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Request lifecycle
    RequestFiled(RequestFiledEvent),
    DepositApproved(DepositApprovedEvent),
    DepositRejected(DepositRejectedEvent),
    WithdrawalApproved(WithdrawalApprovedEvent),
    WithdrawalRejected(WithdrawalRejectedEvent),

    // Trade lifecycle
    TradeOpened(TradeOpenedEvent),
    TradeCompleted(TradeCompletedEvent),
    TradeCancelled(TradeCancelledEvent),

    // Profile
    CurrencyChanged(CurrencyChangedEvent),

    // Copy trading
    CopyStarted(CopyStartedEvent),
    CopyStopped(CopyStoppedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFiledEvent {
    pub request_id: RequestId,
    pub kind: RequestKind,
    pub amount: Amount,
    pub currency: Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositApprovedEvent {
    pub request_id: RequestId,
    pub amount: Amount,
    pub new_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRejectedEvent {
    pub request_id: RequestId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalApprovedEvent {
    pub request_id: RequestId,
    pub amount: Amount,
    pub new_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRejectedEvent {
    pub request_id: RequestId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOpenedEvent {
    pub trade_id: TradeId,
    pub asset: String,
    pub side: TradeSide,
    pub amount: Amount,
    pub entry_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeCompletedEvent {
    pub trade_id: TradeId,
    pub outcome: TradeOutcome,
    pub pnl: Amount,
    pub new_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeCancelledEvent {
    pub trade_id: TradeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyChangedEvent {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
    pub new_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyStartedEvent {
    pub allocation_id: AllocationId,
    pub trader_id: TraderId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyStoppedEvent {
    pub allocation_id: AllocationId,
}

/// Delivery boundary. The engine calls this once per event after the state
/// change is committed; formatting and transport are the implementor's
/// problem. Implementations must tolerate being called from many threads.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &LedgerEvent);
}

/// Discards everything. Default when no delivery channel is wired up.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: &LedgerEvent) {}
}

/// Buffers events in memory. Tests assert on it, the simulator prints from it.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    events: Mutex<Vec<LedgerEvent>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, event: &LedgerEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn memory_notifier_buffers_events() {
        let notifier = MemoryNotifier::new();

        let event = LedgerEvent::new(
            EventId(1),
            Timestamp::from_millis(1000),
            AccountId(1),
            "deposit req-1 approved, balance 100.00 USD".into(),
            EventPayload::DepositApproved(DepositApprovedEvent {
                request_id: RequestId(1),
                amount: Amount::new(dec!(100)),
                new_balance: Amount::new(dec!(100)),
            }),
        );

        notifier.notify(&event);
        assert_eq!(notifier.len(), 1);
        assert_eq!(notifier.events()[0].account_id, AccountId(1));

        notifier.clear();
        assert!(notifier.is_empty());
    }

    #[test]
    fn currency_changed_event_carries_the_rate() {
        let payload = CurrencyChangedEvent {
            from: Currency::Usd,
            to: Currency::Eur,
            rate: dec!(0.92),
            new_balance: Amount::new(dec!(92.00)),
        };
        assert_eq!(payload.rate, dec!(0.92));
    }
}
