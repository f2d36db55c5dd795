//! Concurrency tests.
//!
//! The ledger serializes per account, not globally. These tests hammer the
//! same account from several threads and check that every balance anyone
//! observes is one a serial history could produce.

use ledger_core::*;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn crypto() -> PaymentMethod {
    PaymentMethod::Crypto {
        network: "TRC20".into(),
        address: "TXYZabc123".into(),
    }
}

fn usd_ledger() -> (Arc<Ledger>, AccountId, AccountId) {
    let ledger = Arc::new(Ledger::new(
        LedgerConfig::default(),
        Arc::new(FixedRateSource::new()),
    ));
    let admin = ledger.create_account(Currency::Usd, Role::Admin);
    let user = ledger.create_account(Currency::Usd, Role::User);
    (ledger, admin, user)
}

fn fund(ledger: &Ledger, admin: AccountId, account: AccountId, amount: Amount) {
    let request = ledger
        .request_deposit(account, amount, Currency::Usd, crypto(), None)
        .unwrap();
    ledger.approve_request(request.id, admin, None).unwrap();
}

#[test]
fn racing_deposit_and_withdrawal_settle_to_the_serial_result() {
    // starting at 50, a 100 deposit and a 40 withdrawal land in either order;
    // both orders end at 110, and no reader may catch a balance outside the
    // four serial prefixes.
    let (ledger, admin, user) = usd_ledger();
    fund(&ledger, admin, user, Amount::new(dec!(50)));

    let deposit = ledger
        .request_deposit(user, Amount::new(dec!(100)), Currency::Usd, crypto(), None)
        .unwrap();
    let withdrawal = ledger
        .request_withdrawal(user, Amount::new(dec!(40)), Currency::Usd, crypto())
        .unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let ledger = ledger.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut seen = HashSet::new();
            while !done.load(Ordering::Relaxed) {
                seen.insert(ledger.get_account(user).unwrap().balance);
            }
            seen.insert(ledger.get_account(user).unwrap().balance);
            seen
        })
    };

    let approvals: Vec<_> = [deposit.id, withdrawal.id]
        .into_iter()
        .map(|id| {
            let ledger = ledger.clone();
            thread::spawn(move || ledger.approve_request(id, admin, None).unwrap())
        })
        .collect();
    for handle in approvals {
        handle.join().unwrap();
    }
    done.store(true, Ordering::Relaxed);

    let seen = reader.join().unwrap();
    let allowed: HashSet<Amount> = [dec!(50), dec!(150), dec!(10), dec!(110)]
        .into_iter()
        .map(Amount::new)
        .collect();
    assert!(
        seen.is_subset(&allowed),
        "observed balances outside any serial prefix: {seen:?}"
    );
    assert_eq!(
        ledger.get_account(user).unwrap().balance,
        Amount::new(dec!(110))
    );
}

#[test]
fn parallel_approvals_never_lose_a_credit() {
    let (ledger, admin, user) = usd_ledger();

    let per_thread = 25;
    let requests: Vec<Vec<RequestId>> = (0..8)
        .map(|_| {
            (0..per_thread)
                .map(|_| {
                    ledger
                        .request_deposit(
                            user,
                            Amount::new(dec!(3.50)),
                            Currency::Usd,
                            crypto(),
                            None,
                        )
                        .unwrap()
                        .id
                })
                .collect()
        })
        .collect();

    let handles: Vec<_> = requests
        .into_iter()
        .map(|chunk| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                for id in chunk {
                    ledger.approve_request(id, admin, None).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        ledger.get_account(user).unwrap().balance,
        Amount::new(dec!(700))
    );
    assert!(ledger.pending_requests().is_empty());
}

#[test]
fn contended_withdrawals_stop_exactly_at_the_balance() {
    // five 30s against a balance of 100: three fit, two do not, in any order.
    let (ledger, admin, user) = usd_ledger();
    fund(&ledger, admin, user, Amount::new(dec!(100)));

    let requests: Vec<RequestId> = (0..5)
        .map(|_| {
            ledger
                .request_withdrawal(user, Amount::new(dec!(30)), Currency::Usd, crypto())
                .unwrap()
                .id
        })
        .collect();

    let handles: Vec<_> = requests
        .into_iter()
        .map(|id| {
            let ledger = ledger.clone();
            thread::spawn(move || match ledger.approve_request(id, admin, None) {
                Ok(_) => true,
                Err(LedgerError::InsufficientFunds { .. }) => false,
                Err(other) => panic!("unexpected error: {other}"),
            })
        })
        .collect();
    let approved = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|&ok| ok)
        .count();

    assert_eq!(approved, 3);
    assert_eq!(
        ledger.get_account(user).unwrap().balance,
        Amount::new(dec!(10))
    );
    assert_eq!(ledger.pending_requests().len(), 2);
}

#[test]
fn a_request_decided_twice_applies_once() {
    for _ in 0..20 {
        let (ledger, admin, user) = usd_ledger();
        let request = ledger
            .request_deposit(user, Amount::new(dec!(10)), Currency::Usd, crypto(), None)
            .unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = ledger.clone();
                thread::spawn(move || ledger.approve_request(request.id, admin, None))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        for result in results {
            if let Err(err) = result {
                assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
            }
        }
        assert_eq!(
            ledger.get_account(user).unwrap().balance,
            Amount::new(dec!(10))
        );
    }
}

#[test]
fn racing_conversions_commit_one_consistent_pair() {
    for _ in 0..20 {
        let rates = FixedRateSource::new()
            .with_pair(Currency::Usd, Currency::Eur, dec!(0.92))
            .with_pair(Currency::Usd, Currency::Gbp, dec!(0.79));
        let ledger = Arc::new(Ledger::new(LedgerConfig::default(), Arc::new(rates)));
        let admin = ledger.create_account(Currency::Usd, Role::Admin);
        let user = ledger.create_account(Currency::Usd, Role::User);
        fund(&ledger, admin, user, Amount::new(dec!(1000)));

        let handles: Vec<_> = [Currency::Eur, Currency::Gbp]
            .into_iter()
            .map(|target| {
                let ledger = ledger.clone();
                thread::spawn(move || ledger.change_currency(user, target))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // the loser either saw the conflict under the guard or could not
        // quote from the winner's currency
        for result in &results {
            if let Err(err) = result {
                assert!(matches!(
                    err,
                    LedgerError::InvalidStateTransition { .. }
                        | LedgerError::RateUnavailable(_)
                ));
            }
        }

        let account = ledger.get_account(user).unwrap();
        match account.currency {
            Currency::Eur => assert_eq!(account.balance, Amount::new(dec!(920.00))),
            Currency::Gbp => assert_eq!(account.balance, Amount::new(dec!(790.00))),
            other => panic!("landed in {other} with balance {}", account.balance),
        }
    }
}

#[test]
fn accounts_do_not_contend_with_each_other() {
    let ledger = Arc::new(Ledger::new(
        LedgerConfig::default(),
        Arc::new(FixedRateSource::new()),
    ));
    let admin = ledger.create_account(Currency::Usd, Role::Admin);
    let users: Vec<AccountId> = (0..4)
        .map(|_| ledger.create_account(Currency::Usd, Role::User))
        .collect();

    let handles: Vec<_> = users
        .iter()
        .map(|&user| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                fund(&ledger, admin, user, Amount::new(dec!(500)));
                let withdrawal = ledger
                    .request_withdrawal(user, Amount::new(dec!(120)), Currency::Usd, crypto())
                    .unwrap();
                ledger.approve_request(withdrawal.id, admin, None).unwrap();
                let trade = ledger
                    .open_trade(
                        user,
                        "BTC/USD",
                        TradeSide::Buy,
                        Amount::new(dec!(100)),
                        Price::new_unchecked(dec!(61000)),
                    )
                    .unwrap();
                ledger
                    .close_trade(
                        trade.id,
                        admin,
                        TradeOutcome::Profit,
                        Amount::new(dec!(35)),
                        None,
                        None,
                    )
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for user in users {
        assert_eq!(
            ledger.get_account(user).unwrap().balance,
            Amount::new(dec!(415))
        );
    }
}
