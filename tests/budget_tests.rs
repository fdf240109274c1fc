// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{NaiveDate, TimeZone, Utc};
use ledgerkit::budget::{self, Health, NewBudget, Trend};
use ledgerkit::error::Error;
use ledgerkit::models::{BudgetStatus, PeriodType};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    ledgerkit::db::init_schema(&mut conn).unwrap();
    conn.execute("INSERT INTO users(name) VALUES('ada')", [])
        .unwrap();
    conn.execute(
        "INSERT INTO currencies(code, name) VALUES('USD','US Dollar')",
        [],
    )
    .unwrap();
    conn.execute("INSERT INTO categories(name) VALUES('groceries')", [])
        .unwrap();
    conn.execute(
        "INSERT INTO accounts(user_id, name, type, currency, initial_balance)
         VALUES (1, 'Main', 'checking', 'USD', '100000')",
        [],
    )
    .unwrap();
    conn
}

fn add_expense(conn: &Connection, account_id: i64, category_id: Option<i64>, amount: &str, date: &str) {
    conn.execute(
        "INSERT INTO transactions(account_id, category_id, amount, kind, date)
         VALUES (?1, ?2, ?3, 'expense', ?4)",
        params![account_id, category_id, amount, date],
    )
    .unwrap();
}

fn monthly_budget(amount: &str, start: &str) -> NewBudget {
    NewBudget {
        user_id: 1,
        account_id: None,
        category_id: 1,
        currency: "USD".to_string(),
        amount: amount.parse().unwrap(),
        period_type: PeriodType::Monthly,
        start_date: NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap(),
        end_date: None,
        auto_renew: false,
        alert_threshold: None,
        alert_enabled: true,
    }
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn recompute_sums_only_matching_expenses() {
    let conn = setup();
    let id = budget::create_budget(&conn, &monthly_budget("1000", "2025-08-01")).unwrap();

    add_expense(&conn, 1, Some(1), "200", "2025-08-05");
    add_expense(&conn, 1, Some(1), "150", "2025-08-10");
    // Wrong category, wrong window, and an uncategorized row are skipped.
    conn.execute("INSERT INTO categories(name) VALUES('rent')", [])
        .unwrap();
    add_expense(&conn, 1, Some(2), "999", "2025-08-06");
    add_expense(&conn, 1, Some(1), "999", "2025-07-31");
    add_expense(&conn, 1, None, "999", "2025-08-07");

    assert_eq!(budget::recompute_spent(&conn, id).unwrap(), Decimal::from(350));
    assert_eq!(
        budget::get_budget(&conn, id).unwrap().spent_amount,
        Decimal::from(350)
    );
}

#[test]
fn account_scoped_budget_ignores_other_accounts() {
    let conn = setup();
    conn.execute(
        "INSERT INTO accounts(user_id, name, type, currency) VALUES (1,'Side','savings','USD')",
        [],
    )
    .unwrap();
    let mut new = monthly_budget("1000", "2025-08-01");
    new.account_id = Some(1);
    let id = budget::create_budget(&conn, &new).unwrap();

    add_expense(&conn, 1, Some(1), "200", "2025-08-05");
    add_expense(&conn, 2, Some(1), "500", "2025-08-05");

    assert_eq!(budget::recompute_spent(&conn, id).unwrap(), Decimal::from(200));
}

#[test]
fn near_threshold_warns_once_within_cooldown() {
    let conn = setup();
    let id = budget::create_budget(&conn, &monthly_budget("1000", "2025-08-01")).unwrap();
    // 850 of 1000 with the default 80% threshold.
    add_expense(&conn, 1, Some(1), "850", "2025-08-05");

    let budget_row = {
        budget::recompute_spent(&conn, id).unwrap();
        budget::get_budget(&conn, id).unwrap()
    };
    assert_eq!(budget::classify(&budget_row), Health::NearThreshold);

    let now = Utc.with_ymd_and_hms(2025, 8, 5, 12, 0, 0).unwrap();
    let first = budget::check_alerts(&conn, id, now).unwrap();
    assert_eq!(first.len(), 1);
    let second = budget::check_alerts(&conn, id, now).unwrap();
    assert!(second.is_empty());

    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM notifications WHERE kind='budget_warning'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn exceeded_flips_status_and_notifies() {
    let conn = setup();
    let id = budget::create_budget(&conn, &monthly_budget("1000", "2025-08-01")).unwrap();
    add_expense(&conn, 1, Some(1), "1200", "2025-08-05");

    let now = Utc.with_ymd_and_hms(2025, 8, 5, 12, 0, 0).unwrap();
    let emitted = budget::check_alerts(&conn, id, now).unwrap();
    assert_eq!(emitted.len(), 1);

    let budget_row = budget::get_budget(&conn, id).unwrap();
    assert_eq!(budget_row.status, BudgetStatus::Exceeded);
    let kind: String = conn
        .query_row("SELECT kind FROM notifications WHERE id=?1", params![emitted[0]], |r| r.get(0))
        .unwrap();
    assert_eq!(kind, "budget_exceeded");
}

#[test]
fn separate_budgets_warn_independently() {
    let conn = setup();
    conn.execute("INSERT INTO categories(name) VALUES('rent')", [])
        .unwrap();
    let a = budget::create_budget(&conn, &monthly_budget("1000", "2025-08-01")).unwrap();
    let mut other = monthly_budget("1000", "2025-08-01");
    other.category_id = 2;
    let b = budget::create_budget(&conn, &other).unwrap();

    add_expense(&conn, 1, Some(1), "900", "2025-08-05");
    add_expense(&conn, 1, Some(2), "900", "2025-08-05");

    let now = Utc.with_ymd_and_hms(2025, 8, 5, 12, 0, 0).unwrap();
    // Same kind within one cooldown window; the budget_id correlation
    // keeps them distinct.
    assert_eq!(budget::check_alerts(&conn, a, now).unwrap().len(), 1);
    assert_eq!(budget::check_alerts(&conn, b, now).unwrap().len(), 1);
}

#[test]
fn overlapping_active_budget_is_rejected() {
    let conn = setup();
    budget::create_budget(&conn, &monthly_budget("1000", "2025-08-01")).unwrap();
    let err = budget::create_budget(&conn, &monthly_budget("500", "2025-08-15")).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // An account-scoped budget for the same category is a different scope.
    let mut scoped = monthly_budget("500", "2025-08-15");
    scoped.account_id = Some(1);
    budget::create_budget(&conn, &scoped).unwrap();
}

#[test]
fn invalid_inputs_are_rejected() {
    let conn = setup();

    let zero = monthly_budget("0", "2025-08-01");
    assert!(matches!(
        budget::create_budget(&conn, &zero).unwrap_err(),
        Error::Validation(_)
    ));

    let mut bad_threshold = monthly_budget("1000", "2025-08-01");
    bad_threshold.alert_threshold = Some(Decimal::from(120));
    assert!(matches!(
        budget::create_budget(&conn, &bad_threshold).unwrap_err(),
        Error::Validation(_)
    ));

    let mut bad_cat = monthly_budget("1000", "2025-08-01");
    bad_cat.category_id = 99;
    assert!(matches!(
        budget::create_budget(&conn, &bad_cat).unwrap_err(),
        Error::CategoryNotFound(_)
    ));

    let mut bad_ccy = monthly_budget("1000", "2025-08-01");
    bad_ccy.currency = "XXX".to_string();
    assert!(matches!(
        budget::create_budget(&conn, &bad_ccy).unwrap_err(),
        Error::CurrencyNotFound(_)
    ));

    let mut foreign_account = monthly_budget("1000", "2025-08-01");
    foreign_account.account_id = Some(42);
    assert!(matches!(
        budget::create_budget(&conn, &foreign_account).unwrap_err(),
        Error::AccountNotFound(42)
    ));
}

#[test]
fn projection_extrapolates_the_daily_average() {
    let conn = setup();
    let id = budget::create_budget(&conn, &monthly_budget("1000", "2025-01-01")).unwrap();
    add_expense(&conn, 1, Some(1), "100", "2025-01-03");
    budget::recompute_spent(&conn, id).unwrap();
    let budget_row = budget::get_budget(&conn, id).unwrap();

    // 100 over 10 elapsed days of a 31-day period: 10/day -> 310.
    assert_eq!(
        budget::project_spending(&budget_row, date("2025-01-10")),
        Decimal::from(310)
    );
    // Outside the window there is nothing to extrapolate.
    assert_eq!(
        budget::project_spending(&budget_row, date("2025-02-10")),
        Decimal::from(100)
    );
}

#[test]
fn trend_compares_pace_against_elapsed_time() {
    let conn = setup();
    let id = budget::create_budget(&conn, &monthly_budget("1000", "2025-01-01")).unwrap();
    add_expense(&conn, 1, Some(1), "500", "2025-01-02");
    budget::recompute_spent(&conn, id).unwrap();
    let budget_row = budget::get_budget(&conn, id).unwrap();

    assert_eq!(budget::trend(&budget_row, date("2024-12-25")), Trend::NotStarted);
    // Day 2 of 31: 50% spent vs ~6.5% expected.
    assert_eq!(budget::trend(&budget_row, date("2025-01-02")), Trend::Overspending);
    // Day 31: 50% spent vs 100% expected.
    assert_eq!(budget::trend(&budget_row, date("2025-01-31")), Trend::Underspending);
    // Half way through, half spent.
    assert_eq!(budget::trend(&budget_row, date("2025-01-16")), Trend::OnTrack);
}

#[test]
fn renew_rolls_auto_renew_budgets_and_completes_the_rest() {
    let conn = setup();
    conn.execute("INSERT INTO categories(name) VALUES('rent')", [])
        .unwrap();
    let mut rolling = monthly_budget("1000", "2025-07-01");
    rolling.auto_renew = true;
    let a = budget::create_budget(&conn, &rolling).unwrap();
    let mut ending = monthly_budget("1000", "2025-07-01");
    ending.category_id = 2;
    let b = budget::create_budget(&conn, &ending).unwrap();
    add_expense(&conn, 1, Some(1), "400", "2025-07-10");
    budget::recompute_spent(&conn, a).unwrap();

    let changed = budget::renew_expired(&conn, date("2025-08-02")).unwrap();
    assert_eq!(changed, 2);

    let rolled = budget::get_budget(&conn, a).unwrap();
    assert_eq!(rolled.start_date, date("2025-08-01"));
    assert_eq!(rolled.end_date, date("2025-08-31"));
    assert_eq!(rolled.spent_amount, Decimal::ZERO);
    assert_eq!(rolled.status, BudgetStatus::Active);

    let completed = budget::get_budget(&conn, b).unwrap();
    assert_eq!(completed.status, BudgetStatus::Completed);

    // Nothing left to renew.
    assert_eq!(budget::renew_expired(&conn, date("2025-08-02")).unwrap(), 0);
}
