// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use ledgerkit::error::Error;
use ledgerkit::ledger::{
    self, CategoryFallback, CategoryRef, NewTransaction, TransactionPatch,
};
use ledgerkit::models::TxKind;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    ledgerkit::db::init_schema(&mut conn).unwrap();
    conn.execute("INSERT INTO users(name) VALUES('ada')", [])
        .unwrap();
    conn.execute(
        "INSERT INTO currencies(code, name) VALUES('USD','US Dollar'),('EUR','Euro')",
        [],
    )
    .unwrap();
    conn
}

fn add_account(conn: &Connection, name: &str, initial: &str) -> i64 {
    conn.execute(
        "INSERT INTO accounts(user_id, name, type, currency, initial_balance)
         VALUES (1, ?1, 'checking', 'USD', ?2)",
        params![name, initial],
    )
    .unwrap();
    conn.last_insert_rowid()
}

fn expense(account_id: i64, amount: &str, date: &str) -> NewTransaction {
    NewTransaction {
        account_id,
        category: None,
        amount: amount.parse().unwrap(),
        kind: TxKind::Expense,
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        description: None,
        reference: None,
    }
}

#[test]
fn expense_rejected_when_balance_insufficient() {
    let mut conn = setup();
    let acct = add_account(&conn, "Main", "100");

    let err = ledger::create_transaction(&mut conn, &expense(acct, "150", "2025-08-01"), CategoryFallback::Reject)
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { .. }));

    // Nothing was persisted; the balance is still derivable as 100.
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 0);
    assert_eq!(
        ledger::derived_balance(&conn, acct).unwrap(),
        Decimal::from(100)
    );
}

#[test]
fn income_and_expense_drive_derived_balance() {
    let mut conn = setup();
    let acct = add_account(&conn, "Main", "100");

    let mut income = expense(acct, "50", "2025-08-01");
    income.kind = TxKind::Income;
    ledger::create_transaction(&mut conn, &income, CategoryFallback::Reject).unwrap();
    ledger::create_transaction(&mut conn, &expense(acct, "120", "2025-08-02"), CategoryFallback::Reject)
        .unwrap();

    assert_eq!(
        ledger::derived_balance(&conn, acct).unwrap(),
        Decimal::from(30)
    );
    // Pure function of the log: recomputation yields the identical value.
    assert_eq!(
        ledger::derived_balance(&conn, acct).unwrap(),
        Decimal::from(30)
    );
}

#[test]
fn update_increasing_outflow_is_checked_with_delta() {
    let mut conn = setup();
    let acct = add_account(&conn, "Main", "70");
    let tx = ledger::create_transaction(&mut conn, &expense(acct, "50", "2025-08-01"), CategoryFallback::Reject)
        .unwrap();
    // Balance is now 20; growing the expense by 30 would go negative.
    let patch = TransactionPatch {
        amount: Some(Decimal::from(80)),
        ..Default::default()
    };
    let err = ledger::update_transaction(&mut conn, tx, &patch, CategoryFallback::Reject)
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { .. }));

    // Shrinking the outflow always passes.
    let patch = TransactionPatch {
        amount: Some(Decimal::from(10)),
        ..Default::default()
    };
    ledger::update_transaction(&mut conn, tx, &patch, CategoryFallback::Reject).unwrap();
    assert_eq!(
        ledger::derived_balance(&conn, acct).unwrap(),
        Decimal::from(60)
    );
}

#[test]
fn moving_to_another_account_checks_target_in_isolation() {
    let mut conn = setup();
    let a = add_account(&conn, "A", "500");
    let poor = add_account(&conn, "Poor", "40");
    let rich = add_account(&conn, "Rich", "60");
    let tx = ledger::create_transaction(&mut conn, &expense(a, "50", "2025-08-01"), CategoryFallback::Reject)
        .unwrap();

    let to_poor = TransactionPatch {
        account_id: Some(poor),
        ..Default::default()
    };
    let err = ledger::update_transaction(&mut conn, tx, &to_poor, CategoryFallback::Reject)
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { .. }));

    let to_rich = TransactionPatch {
        account_id: Some(rich),
        ..Default::default()
    };
    ledger::update_transaction(&mut conn, tx, &to_rich, CategoryFallback::Reject).unwrap();
    assert_eq!(
        ledger::derived_balance(&conn, rich).unwrap(),
        Decimal::from(10)
    );
    assert_eq!(
        ledger::derived_balance(&conn, a).unwrap(),
        Decimal::from(500)
    );
}

#[test]
fn soft_delete_reverses_effect_without_checks() {
    let mut conn = setup();
    let acct = add_account(&conn, "Main", "100");
    let tx = ledger::create_transaction(&mut conn, &expense(acct, "30", "2025-08-01"), CategoryFallback::Reject)
        .unwrap();
    assert_eq!(
        ledger::derived_balance(&conn, acct).unwrap(),
        Decimal::from(70)
    );

    ledger::delete_transaction(&mut conn, tx).unwrap();
    assert_eq!(
        ledger::derived_balance(&conn, acct).unwrap(),
        Decimal::from(100)
    );
    // The row survives for historical queries.
    let kept: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM transactions WHERE deleted_at IS NOT NULL",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(kept, 1);
}

#[test]
fn category_resolves_by_id_or_legacy_name() {
    let mut conn = setup();
    let acct = add_account(&conn, "Main", "100");
    conn.execute("INSERT INTO categories(name) VALUES('Dining')", [])
        .unwrap();
    let cat_id = conn.last_insert_rowid();

    let mut by_name = expense(acct, "10", "2025-08-01");
    by_name.category = Some(CategoryRef::Name("Dining".into()));
    let t1 = ledger::create_transaction(&mut conn, &by_name, CategoryFallback::Reject).unwrap();

    let mut by_id = expense(acct, "10", "2025-08-02");
    by_id.category = Some(CategoryRef::Id(cat_id));
    let t2 = ledger::create_transaction(&mut conn, &by_id, CategoryFallback::Reject).unwrap();

    for t in [t1, t2] {
        let got: Option<i64> = conn
            .query_row(
                "SELECT category_id FROM transactions WHERE id=?1",
                params![t],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(got, Some(cat_id));
    }
}

#[test]
fn unresolvable_category_honors_fallback() {
    let mut conn = setup();
    let acct = add_account(&conn, "Main", "100");

    let mut tx = expense(acct, "10", "2025-08-01");
    tx.category = Some(CategoryRef::Name("Nope".into()));

    let err =
        ledger::create_transaction(&mut conn, &tx, CategoryFallback::Reject).unwrap_err();
    assert!(matches!(err, Error::CategoryNotFound(_)));

    let id = ledger::create_transaction(&mut conn, &tx, CategoryFallback::Drop).unwrap();
    let got: Option<i64> = conn
        .query_row(
            "SELECT category_id FROM transactions WHERE id=?1",
            params![id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(got, None);
}

#[test]
fn transfer_kind_is_rejected_outside_transfer_operations() {
    let mut conn = setup();
    let acct = add_account(&conn, "Main", "100");
    let mut tx = expense(acct, "10", "2025-08-01");
    tx.kind = TxKind::Transfer;
    let err = ledger::create_transaction(&mut conn, &tx, CategoryFallback::Reject).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn non_positive_amounts_are_rejected() {
    let mut conn = setup();
    let acct = add_account(&conn, "Main", "100");
    let mut tx = expense(acct, "10", "2025-08-01");
    tx.amount = Decimal::ZERO;
    assert!(matches!(
        ledger::create_transaction(&mut conn, &tx, CategoryFallback::Reject),
        Err(Error::Validation(_))
    ));
}

#[test]
fn inactive_account_is_not_found() {
    let mut conn = setup();
    let acct = add_account(&conn, "Main", "100");
    conn.execute("UPDATE accounts SET active=0 WHERE id=?1", params![acct])
        .unwrap();
    let err = ledger::create_transaction(&mut conn, &expense(acct, "10", "2025-08-01"), CategoryFallback::Reject)
        .unwrap_err();
    assert!(matches!(err, Error::AccountNotFound(_)));
}
