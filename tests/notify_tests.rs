// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{Duration, TimeZone, Utc};
use ledgerkit::error::Error;
use ledgerkit::notify::{self, Cooldown};
use rusqlite::{Connection, params};
use serde_json::json;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    ledgerkit::db::init_schema(&mut conn).unwrap();
    conn.execute("INSERT INTO users(name) VALUES('ada')", [])
        .unwrap();
    conn
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 15, 12, 0, 0).unwrap()
}

fn count(conn: &Connection, kind: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE kind=?1",
        params![kind],
        |r| r.get(0),
    )
    .unwrap()
}

#[test]
fn second_emission_inside_the_window_is_suppressed() {
    let conn = setup();
    let kind = notify::KIND_LARGE_EXPENSE;
    let cooldown = Cooldown::default_for(kind);
    let data = json!({"amount": "15000"});

    let first = notify::emit_if_due(&conn, 1, kind, None, &cooldown, "t", "m", &data, now()).unwrap();
    assert!(first.is_some());
    let again =
        notify::emit_if_due(&conn, 1, kind, None, &cooldown, "t", "m", &data, now() + Duration::hours(1))
            .unwrap();
    assert!(again.is_none());
    assert_eq!(count(&conn, kind), 1);
}

#[test]
fn emission_past_the_window_goes_through() {
    let conn = setup();
    let kind = notify::KIND_LARGE_EXPENSE; // 2h cooldown
    let cooldown = Cooldown::default_for(kind);
    let data = json!({});

    notify::emit_if_due(&conn, 1, kind, None, &cooldown, "t", "m", &data, now()).unwrap();
    let later = now() + Duration::hours(3);
    let second = notify::emit_if_due(&conn, 1, kind, None, &cooldown, "t", "m", &data, later).unwrap();
    assert!(second.is_some());
    assert_eq!(count(&conn, kind), 2);
}

#[test]
fn correlation_key_separates_subjects() {
    let conn = setup();
    let kind = notify::KIND_BUDGET_WARNING;
    let cooldown = Cooldown::default_for(kind);

    let a = json!(1);
    let b = json!(2);
    notify::emit_if_due(&conn, 1, kind, Some(("budget_id", &a)), &cooldown, "t", "m", &json!({"budget_id": 1}), now())
        .unwrap();
    // Different budget, same kind and user, same window.
    let other = notify::emit_if_due(
        &conn, 1, kind, Some(("budget_id", &b)), &cooldown, "t", "m", &json!({"budget_id": 2}), now(),
    )
    .unwrap();
    assert!(other.is_some());
    // Same budget again is a duplicate.
    let dup = notify::emit_if_due(
        &conn, 1, kind, Some(("budget_id", &a)), &cooldown, "t", "m", &json!({"budget_id": 1}), now(),
    )
    .unwrap();
    assert!(dup.is_none());
    assert_eq!(count(&conn, kind), 2);
}

#[test]
fn users_do_not_share_cooldowns() {
    let conn = setup();
    conn.execute("INSERT INTO users(name) VALUES('bob')", [])
        .unwrap();
    let kind = notify::KIND_EXPENSE_SURGE;
    let cooldown = Cooldown::default_for(kind);

    notify::emit_if_due(&conn, 1, kind, None, &cooldown, "t", "m", &json!({}), now()).unwrap();
    let bob = notify::emit_if_due(&conn, 2, kind, None, &cooldown, "t", "m", &json!({}), now()).unwrap();
    assert!(bob.is_some());
}

#[test]
fn since_anchor_suppresses_everything_after_it() {
    let conn = setup();
    let kind = notify::KIND_BUDGET_EXCEEDED;
    let anchor = Cooldown::Since(now() - Duration::days(10));

    notify::emit(&conn, 1, kind, "t", "m", &json!({}), now() - Duration::days(5)).unwrap();
    // A 24h window would have let this through; the anchor does not.
    assert!(!notify::should_emit(&conn, 1, kind, None, &anchor, now()).unwrap());
    assert!(
        notify::should_emit(&conn, 1, kind, None, &Cooldown::Window(Duration::hours(24)), now())
            .unwrap()
    );
}

#[test]
fn unknown_kind_falls_back_to_a_day() {
    assert_eq!(notify::cooldown_for("made_up_kind"), Duration::hours(24));
    assert_eq!(
        notify::cooldown_for(notify::KIND_MONTHLY_EXPENSE_HIGH),
        Duration::hours(168)
    );
}

#[test]
fn mark_read_is_one_shot() {
    let conn = setup();
    let id = notify::emit(&conn, 1, notify::KIND_LARGE_INCOME, "t", "m", &json!({}), now()).unwrap();

    notify::mark_read(&conn, id, now()).unwrap();
    let err = notify::mark_read(&conn, id, now()).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    let err = notify::mark_read(&conn, 999, now()).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn list_is_newest_first_and_delete_removes() {
    let conn = setup();
    let a = notify::emit(&conn, 1, "k", "first", "m", &json!({}), now()).unwrap();
    let b = notify::emit(&conn, 1, "k", "second", "m", &json!({}), now() + Duration::hours(1)).unwrap();

    let listed = notify::list_for_user(&conn, 1).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, b);
    assert_eq!(listed[1].id, a);

    notify::delete(&conn, a).unwrap();
    assert_eq!(notify::list_for_user(&conn, 1).unwrap().len(), 1);
}
