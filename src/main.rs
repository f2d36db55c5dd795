//! Balance Ledger Simulation.
//!
//! Walks the full ledger lifecycle: deposit and withdrawal review, trade
//! settlement, currency conversion, copy allocations, the duplicate decision
//! guard, and concurrent approvals against one account.

use ledger_core::*;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Balance Ledger & Approval Engine Simulation");
    println!("Pending Records, Admin Decisions, Per-Account Serialization\n");

    scenario_1_deposit_review();
    scenario_2_withdrawal_review();
    scenario_3_trade_settlement();
    scenario_4_currency_conversion();
    scenario_5_copy_trading();
    scenario_6_duplicate_decisions();
    scenario_7_concurrent_approvals();
    scenario_8_audit_trail();

    println!("\nAll simulations completed successfully.");
}

fn crypto_method() -> PaymentMethod {
    PaymentMethod::Crypto {
        network: "TRC20".into(),
        address: "TL5oeXx1NQq7EWzJ2j4fMAs8kPPrranGi7".into(),
    }
}

fn bank_method() -> PaymentMethod {
    PaymentMethod::Bank {
        bank_name: "First National".into(),
        account_name: "Alice Example".into(),
        account_number: "0044 2210 9981".into(),
    }
}

fn usd_ledger() -> Ledger {
    Ledger::new(LedgerConfig::default(), Arc::new(FixedRateSource::new()))
}

/// Deposit requests from filing to decision.
fn scenario_1_deposit_review() {
    println!("Scenario 1: Deposit Review\n");

    let ledger = usd_ledger();
    let admin = ledger.create_account(Currency::Usd, Role::Admin);
    let alice = ledger.create_account(Currency::Usd, Role::User);

    let first = ledger
        .request_deposit(
            alice,
            Amount::new(dec!(1000)),
            Currency::Usd,
            crypto_method(),
            Some("receipt://tx/9f2c".into()),
        )
        .unwrap();
    let second = ledger
        .request_deposit(alice, Amount::new(dec!(250)), Currency::Usd, bank_method(), None)
        .unwrap();

    println!("  Alice files {} for $1,000 and {} for $250", first.id, second.id);
    println!("  Pending queue: {} requests", ledger.pending_requests().len());

    ledger.approve_request(first.id, admin, Some("verified on-chain".into())).unwrap();
    ledger.reject_request(second.id, admin, "reference number missing").unwrap();

    let account = ledger.get_account(alice).unwrap();
    println!("  Admin approves {} and rejects {}", first.id, second.id);
    println!("  Alice's balance: {} {}\n", account.balance, account.currency);
}

/// Withdrawals check sufficiency when the admin decides, not when the user asks.
fn scenario_2_withdrawal_review() {
    println!("Scenario 2: Withdrawal Review\n");

    let ledger = usd_ledger();
    let admin = ledger.create_account(Currency::Usd, Role::Admin);
    let alice = ledger.create_account(Currency::Usd, Role::User);

    let seed = ledger
        .request_deposit(alice, Amount::new(dec!(500)), Currency::Usd, crypto_method(), None)
        .unwrap();
    ledger.approve_request(seed.id, admin, None).unwrap();
    println!("  Alice starts with $500");

    let oversized = ledger
        .request_withdrawal(alice, Amount::new(dec!(800)), Currency::Usd, bank_method())
        .unwrap();
    println!("  Alice requests an $800 withdrawal ({})", oversized.id);

    match ledger.approve_request(oversized.id, admin, None) {
        Err(LedgerError::InsufficientFunds { requested, available }) => {
            println!("  Approval fails: requested {requested}, available {available}");
        }
        other => println!("  Unexpected: {other:?}"),
    }
    println!(
        "  {} is still {}, balance untouched",
        oversized.id,
        ledger.get_request(oversized.id).unwrap().status
    );
    ledger.reject_request(oversized.id, admin, "exceeds balance").unwrap();

    let modest = ledger
        .request_withdrawal(alice, Amount::new(dec!(300)), Currency::Usd, bank_method())
        .unwrap();
    ledger.approve_request(modest.id, admin, None).unwrap();
    let account = ledger.get_account(alice).unwrap();
    println!("  A $300 withdrawal approves cleanly");
    println!("  Alice's balance: {} {}\n", account.balance, account.currency);
}

/// Trades settle with admin-adjudicated outcomes; a loss may overdraw.
fn scenario_3_trade_settlement() {
    println!("Scenario 3: Trade Settlement\n");

    let ledger = usd_ledger();
    let admin = ledger.create_account(Currency::Usd, Role::Admin);
    let bob = ledger.create_account(Currency::Usd, Role::User);

    let seed = ledger
        .request_deposit(bob, Amount::new(dec!(100)), Currency::Usd, crypto_method(), None)
        .unwrap();
    ledger.approve_request(seed.id, admin, None).unwrap();
    println!("  Bob starts with $100");

    let winner = ledger
        .open_trade(bob, "BTC/USD", TradeSide::Buy, Amount::new(dec!(60)), Price::new_unchecked(dec!(61250)))
        .unwrap();
    let loser = ledger
        .open_trade(bob, "ETH/USD", TradeSide::Sell, Amount::new(dec!(40)), Price::new_unchecked(dec!(2410)))
        .unwrap();
    let voided = ledger
        .open_trade(bob, "XAU/USD", TradeSide::Buy, Amount::new(dec!(25)), Price::new_unchecked(dec!(2380)))
        .unwrap();
    println!("  Bob opens {}, {}, {}", winner.id, loser.id, voided.id);

    ledger
        .close_trade(winner.id, admin, TradeOutcome::Profit, Amount::new(dec!(45)), Some(Price::new_unchecked(dec!(62100))), None)
        .unwrap();
    println!("  {} closes at +$45 profit", winner.id);

    ledger
        .close_trade(loser.id, admin, TradeOutcome::Loss, Amount::new(dec!(180)), Some(Price::new_unchecked(dec!(2304))), Some("copied position unwound".into()))
        .unwrap();
    println!("  {} closes at -$180 loss (balance may go negative)", loser.id);

    ledger.cancel_trade(voided.id, admin, Some("fat finger".into())).unwrap();
    println!("  {} is cancelled, no balance effect", voided.id);

    let account = ledger.get_account(bob).unwrap();
    println!("  Bob's balance: {} {}\n", account.balance, account.currency);
}

/// Re-denominating an account converts the balance in the same write.
fn scenario_4_currency_conversion() {
    println!("Scenario 4: Currency Conversion\n");

    let rates = FixedRateSource::new()
        .with_pair(Currency::Usd, Currency::Eur, dec!(0.92))
        .with_pair(Currency::Usd, Currency::Gbp, dec!(0.79));
    let ledger = Ledger::new(LedgerConfig::default(), Arc::new(rates));
    let admin = ledger.create_account(Currency::Usd, Role::Admin);
    let alice = ledger.create_account(Currency::Usd, Role::User);

    let seed = ledger
        .request_deposit(alice, Amount::new(dec!(1000)), Currency::Usd, crypto_method(), None)
        .unwrap();
    ledger.approve_request(seed.id, admin, None).unwrap();
    println!("  Alice holds 1000.00 USD");

    let account = ledger.change_currency(alice, Currency::Eur).unwrap();
    println!("  After switching to EUR: {} {}", account.balance, account.currency);

    let account = ledger.change_currency(alice, Currency::Usd).unwrap();
    println!("  Switching back to USD: {} {}", account.balance, account.currency);

    match ledger.change_currency(alice, Currency::Chf) {
        Err(LedgerError::RateUnavailable(e)) => {
            println!("  CHF has no quote: {e}");
        }
        other => println!("  Unexpected: {other:?}"),
    }
    let account = ledger.get_account(alice).unwrap();
    println!("  Balance untouched by the failure: {} {}\n", account.balance, account.currency);
}

/// Copy allocations are capped by the balance but never move it.
fn scenario_5_copy_trading() {
    println!("Scenario 5: Copy Trading\n");

    let ledger = usd_ledger();
    let admin = ledger.create_account(Currency::Usd, Role::Admin);
    let bob = ledger.create_account(Currency::Usd, Role::User);

    let seed = ledger
        .request_deposit(bob, Amount::new(dec!(400)), Currency::Usd, crypto_method(), None)
        .unwrap();
    ledger.approve_request(seed.id, admin, None).unwrap();

    let allocation = ledger
        .allocate_copy(bob, TraderId(7), Amount::new(dec!(250)))
        .unwrap();
    println!("  Bob allocates $250 to {}", allocation.trader_id);
    println!(
        "  Balance after allocating: {} (nothing debited)",
        ledger.get_account(bob).unwrap().balance
    );

    match ledger.allocate_copy(bob, TraderId(8), Amount::new(dec!(500))) {
        Err(LedgerError::InsufficientFunds { requested, available }) => {
            println!("  A $500 allocation is refused: requested {requested}, available {available}");
        }
        other => println!("  Unexpected: {other:?}"),
    }

    ledger.stop_copy(bob, allocation.id).unwrap();
    println!("  {} stopped\n", allocation.id);
}

/// A decided request refuses every further decision.
fn scenario_6_duplicate_decisions() {
    println!("Scenario 6: Duplicate Decisions\n");

    let ledger = usd_ledger();
    let admin = ledger.create_account(Currency::Usd, Role::Admin);
    let second_admin = ledger.create_account(Currency::Usd, Role::Admin);
    let alice = ledger.create_account(Currency::Usd, Role::User);

    let deposit = ledger
        .request_deposit(alice, Amount::new(dec!(120)), Currency::Usd, crypto_method(), None)
        .unwrap();
    ledger.approve_request(deposit.id, admin, None).unwrap();
    println!(
        "  {} approves once, balance {}",
        deposit.id,
        ledger.get_account(alice).unwrap().balance
    );

    match ledger.approve_request(deposit.id, second_admin, None) {
        Err(LedgerError::InvalidStateTransition { entity, id, status }) => {
            println!("  A second approval is refused: {entity} {id} is already {status}");
        }
        other => println!("  Unexpected: {other:?}"),
    }
    match ledger.reject_request(deposit.id, second_admin, "changed my mind") {
        Err(LedgerError::InvalidStateTransition { .. }) => {
            println!("  So is a late rejection");
        }
        other => println!("  Unexpected: {other:?}"),
    }

    let account = ledger.get_account(alice).unwrap();
    println!("  Credited exactly once: {} {}\n", account.balance, account.currency);
}

/// Two admins act on the same account at once; the balance still adds up.
fn scenario_7_concurrent_approvals() {
    println!("Scenario 7: Concurrent Approvals\n");

    let ledger = Arc::new(usd_ledger());
    let admin = ledger.create_account(Currency::Usd, Role::Admin);
    let alice = ledger.create_account(Currency::Usd, Role::User);

    let seed = ledger
        .request_deposit(alice, Amount::new(dec!(50)), Currency::Usd, crypto_method(), None)
        .unwrap();
    ledger.approve_request(seed.id, admin, None).unwrap();

    let deposit = ledger
        .request_deposit(alice, Amount::new(dec!(100)), Currency::Usd, crypto_method(), None)
        .unwrap();
    let withdrawal = ledger
        .request_withdrawal(alice, Amount::new(dec!(40)), Currency::Usd, bank_method())
        .unwrap();
    println!("  Balance $50; a $100 deposit and a $40 withdrawal are both pending");

    let l1 = Arc::clone(&ledger);
    let approve_deposit = thread::spawn(move || l1.approve_request(deposit.id, admin, None));
    let l2 = Arc::clone(&ledger);
    let approve_withdrawal = thread::spawn(move || l2.approve_request(withdrawal.id, admin, None));
    approve_deposit.join().unwrap().unwrap();
    approve_withdrawal.join().unwrap().unwrap();

    let account = ledger.get_account(alice).unwrap();
    println!("  Two admins approve concurrently");
    println!("  Final balance: {} {} (always 110)\n", account.balance, account.currency);
}

/// Every terminal transition leaves an audit event behind.
fn scenario_8_audit_trail() {
    println!("Scenario 8: Audit Trail\n");

    let notifier = Arc::new(MemoryNotifier::new());
    let rates = FixedRateSource::new().with_pair(Currency::Usd, Currency::Eur, dec!(0.92));
    let ledger = Ledger::new(LedgerConfig::default(), Arc::new(rates))
        .with_notifier(notifier.clone());

    let admin = ledger.create_account(Currency::Usd, Role::Admin);
    let alice = ledger.create_account(Currency::Usd, Role::User);

    let deposit = ledger
        .request_deposit(alice, Amount::new(dec!(750)), Currency::Usd, crypto_method(), None)
        .unwrap();
    ledger.approve_request(deposit.id, admin, None).unwrap();
    ledger.change_currency(alice, Currency::Eur).unwrap();
    let trade = ledger
        .open_trade(alice, "BTC/EUR", TradeSide::Buy, Amount::new(dec!(100)), Price::new_unchecked(dec!(56500)))
        .unwrap();
    ledger
        .close_trade(trade.id, admin, TradeOutcome::Profit, Amount::new(dec!(32.50)), None, None)
        .unwrap();

    println!("  Notifier saw {} events:", notifier.len());
    for event in notifier.events() {
        println!("    [{}] {}", event.id.0, event.summary);
    }
}
