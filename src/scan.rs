// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Pattern scanners: stateless batch passes over a user's recent
//! transaction history, comparing rolling-window aggregates against
//! absolute and relative thresholds. Every crossing is gated through the
//! notification deduplicator, so repeated runs are idempotent within the
//! cooldown.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use log::debug;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde_json::json;

use crate::error::{Result, stored_decimal};
use crate::notify::{self, Cooldown};

// Absolute monthly spend tiers; the highest crossed tier is reported.
const MONTHLY_EXPENSE_TIERS: &[i64] = &[50_000, 100_000, 200_000];
// Relative month-over-month growth that counts as a surge: >= 1.3x.
const SURGE_NUM: i64 = 13;
const SURGE_DEN: i64 = 10;
// Today >= 3x the trailing-30-day daily average, above a floor.
const SPIKE_FACTOR: i64 = 3;
const SPIKE_FLOOR: i64 = 1_000;
const LARGE_EXPENSE_FLOOR: i64 = 10_000;
const EXPENSE_BURST_COUNT: i64 = 10;
const LARGE_INCOME_FLOOR: i64 = 50_000;
const TRANSFER_BURST_COUNT: i64 = 5;
const LARGE_TRANSFER_FLOOR: i64 = 25_000;
const BURST_WINDOW: Duration = Duration::hours(24);

/// Sum of a user's income/expense amounts with `date` in [from, to].
fn sum_kind_between(
    conn: &Connection,
    user_id: i64,
    kind: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Decimal> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.amount FROM transactions t
         JOIN accounts a ON t.account_id = a.id
         WHERE t.deleted_at IS NULL AND t.kind=?1 AND a.user_id=?2
           AND t.date >= ?3 AND t.date <= ?4",
    )?;
    let mut rows = stmt.query(params![kind, user_id, from.to_string(), to.to_string()])?;
    let mut total = Decimal::ZERO;
    while let Some(r) = rows.next()? {
        total += stored_decimal(&r.get::<_, String>(0)?)?;
    }
    Ok(total)
}

/// (id, amount) of a user's income/expense transactions dated `day`.
fn singles_on(
    conn: &Connection,
    user_id: i64,
    kind: &str,
    day: NaiveDate,
) -> Result<Vec<(i64, Decimal)>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.id, t.amount FROM transactions t
         JOIN accounts a ON t.account_id = a.id
         WHERE t.deleted_at IS NULL AND t.kind=?1 AND a.user_id=?2 AND t.date=?3",
    )?;
    let mut rows = stmt.query(params![kind, user_id, day.to_string()])?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? {
        out.push((r.get(0)?, stored_decimal(&r.get::<_, String>(1)?)?));
    }
    Ok(out)
}

/// How many of a user's transactions of `kind` were recorded inside the
/// trailing window ending at `now` (by row creation time).
fn count_recent(
    conn: &Connection,
    user_id: i64,
    kind: &str,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<i64> {
    let cutoff = (now - window).format("%Y-%m-%d %H:%M:%S").to_string();
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions t
         JOIN accounts a ON t.account_id = a.id
         WHERE t.deleted_at IS NULL AND t.kind=?1 AND a.user_id=?2
           AND t.created_at >= ?3",
        params![kind, user_id, cutoff],
        |r| r.get(0),
    )?;
    Ok(n)
}

fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

fn prev_month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = month_start(day) - Duration::days(1);
    (month_start(end), end)
}

pub fn scan_user_expenses(
    conn: &Connection,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<i64>> {
    let today = now.date_naive();
    let mut emitted = Vec::new();

    // Absolute monthly tiers.
    let month_total = sum_kind_between(conn, user_id, "expense", month_start(today), today)?;
    if let Some(tier) = MONTHLY_EXPENSE_TIERS
        .iter()
        .rev()
        .find(|t| month_total >= Decimal::from(**t))
    {
        let corr = json!(tier);
        if let Some(id) = notify::emit_if_due(
            conn,
            user_id,
            notify::KIND_MONTHLY_EXPENSE_HIGH,
            Some(("tier", &corr)),
            &Cooldown::default_for(notify::KIND_MONTHLY_EXPENSE_HIGH),
            "High monthly spending",
            &format!("This month's expenses reached {}", month_total),
            &json!({"tier": tier, "total": month_total.to_string()}),
            now,
        )? {
            emitted.push(id);
        }
    }

    // Month over month.
    let (prev_start, prev_end) = prev_month_bounds(today);
    let prev_total = sum_kind_between(conn, user_id, "expense", prev_start, prev_end)?;
    if prev_total > Decimal::ZERO
        && month_total * Decimal::from(SURGE_DEN) >= prev_total * Decimal::from(SURGE_NUM)
    {
        if let Some(id) = notify::emit_if_due(
            conn,
            user_id,
            notify::KIND_EXPENSE_SURGE,
            None,
            &Cooldown::default_for(notify::KIND_EXPENSE_SURGE),
            "Spending is up",
            &format!(
                "This month's expenses ({}) are at least 1.3x last month's ({})",
                month_total, prev_total
            ),
            &json!({"current": month_total.to_string(), "previous": prev_total.to_string()}),
            now,
        )? {
            emitted.push(id);
        }
    }

    // Daily spike against the trailing-30-day average.
    let today_total = sum_kind_between(conn, user_id, "expense", today, today)?;
    let trailing =
        sum_kind_between(conn, user_id, "expense", today - Duration::days(30), today - Duration::days(1))?;
    let daily_avg = trailing / Decimal::from(30);
    if today_total > Decimal::from(SPIKE_FLOOR)
        && daily_avg > Decimal::ZERO
        && today_total >= daily_avg * Decimal::from(SPIKE_FACTOR)
    {
        if let Some(id) = notify::emit_if_due(
            conn,
            user_id,
            notify::KIND_EXPENSE_SPIKE,
            None,
            &Cooldown::default_for(notify::KIND_EXPENSE_SPIKE),
            "Unusual daily spending",
            &format!(
                "Today's expenses ({}) are {}x the recent daily average ({})",
                today_total, SPIKE_FACTOR, daily_avg.round_dp(2)
            ),
            &json!({"today": today_total.to_string(), "daily_average": daily_avg.to_string()}),
            now,
        )? {
            emitted.push(id);
        }
    }

    // Individual large expenses.
    for (tx_id, amount) in singles_on(conn, user_id, "expense", today)? {
        if amount < Decimal::from(LARGE_EXPENSE_FLOOR) {
            continue;
        }
        let corr = json!(tx_id);
        if let Some(id) = notify::emit_if_due(
            conn,
            user_id,
            notify::KIND_LARGE_EXPENSE,
            Some(("transaction_id", &corr)),
            &Cooldown::default_for(notify::KIND_LARGE_EXPENSE),
            "Large expense",
            &format!("A single expense of {} was recorded today", amount),
            &json!({"transaction_id": tx_id, "amount": amount.to_string()}),
            now,
        )? {
            emitted.push(id);
        }
    }

    // Burst of expense entries in the trailing day.
    let recent = count_recent(conn, user_id, "expense", now, BURST_WINDOW)?;
    if recent >= EXPENSE_BURST_COUNT {
        if let Some(id) = notify::emit_if_due(
            conn,
            user_id,
            notify::KIND_EXPENSE_BURST,
            None,
            &Cooldown::default_for(notify::KIND_EXPENSE_BURST),
            "Many expenses recorded",
            &format!("{} expenses were recorded in the last 24 hours", recent),
            &json!({"count": recent}),
            now,
        )? {
            emitted.push(id);
        }
    }

    Ok(emitted)
}

pub fn scan_user_income(conn: &Connection, user_id: i64, now: DateTime<Utc>) -> Result<Vec<i64>> {
    let today = now.date_naive();
    let mut emitted = Vec::new();

    for (tx_id, amount) in singles_on(conn, user_id, "income", today)? {
        if amount < Decimal::from(LARGE_INCOME_FLOOR) {
            continue;
        }
        let corr = json!(tx_id);
        if let Some(id) = notify::emit_if_due(
            conn,
            user_id,
            notify::KIND_LARGE_INCOME,
            Some(("transaction_id", &corr)),
            &Cooldown::default_for(notify::KIND_LARGE_INCOME),
            "Large income",
            &format!("An income of {} was recorded today", amount),
            &json!({"transaction_id": tx_id, "amount": amount.to_string()}),
            now,
        )? {
            emitted.push(id);
        }
    }

    let month_total = sum_kind_between(conn, user_id, "income", month_start(today), today)?;
    let (prev_start, prev_end) = prev_month_bounds(today);
    let prev_total = sum_kind_between(conn, user_id, "income", prev_start, prev_end)?;
    if prev_total > Decimal::ZERO
        && month_total * Decimal::from(SURGE_DEN) >= prev_total * Decimal::from(SURGE_NUM)
    {
        if let Some(id) = notify::emit_if_due(
            conn,
            user_id,
            notify::KIND_INCOME_SURGE,
            None,
            &Cooldown::default_for(notify::KIND_INCOME_SURGE),
            "Income is up",
            &format!(
                "This month's income ({}) is at least 1.3x last month's ({})",
                month_total, prev_total
            ),
            &json!({"current": month_total.to_string(), "previous": prev_total.to_string()}),
            now,
        )? {
            emitted.push(id);
        }
    }

    Ok(emitted)
}

pub fn scan_user_transfers(
    conn: &Connection,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<i64>> {
    let today = now.date_naive();
    let mut emitted = Vec::new();

    // Outgoing legs only; the join against transfers fixes the direction.
    let mut stmt = conn.prepare_cached(
        "SELECT t.id, t.amount FROM transactions t
         JOIN accounts a ON t.account_id = a.id
         JOIN transfers x ON x.source_transaction_id = t.id
         WHERE t.deleted_at IS NULL AND a.user_id=?1 AND t.date=?2",
    )?;
    let mut rows = stmt.query(params![user_id, today.to_string()])?;
    while let Some(r) = rows.next()? {
        let tx_id: i64 = r.get(0)?;
        let amount = stored_decimal(&r.get::<_, String>(1)?)?;
        if amount < Decimal::from(LARGE_TRANSFER_FLOOR) {
            continue;
        }
        let corr = json!(tx_id);
        if let Some(id) = notify::emit_if_due(
            conn,
            user_id,
            notify::KIND_LARGE_TRANSFER,
            Some(("transaction_id", &corr)),
            &Cooldown::default_for(notify::KIND_LARGE_TRANSFER),
            "Large transfer",
            &format!("An outgoing transfer of {} was recorded today", amount),
            &json!({"transaction_id": tx_id, "amount": amount.to_string()}),
            now,
        )? {
            emitted.push(id);
        }
    }

    let cutoff = (now - BURST_WINDOW).format("%Y-%m-%d %H:%M:%S").to_string();
    let recent: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transfers x
         JOIN transactions t ON t.id = x.source_transaction_id
         JOIN accounts a ON t.account_id = a.id
         WHERE t.deleted_at IS NULL AND a.user_id=?1 AND x.created_at >= ?2",
        params![user_id, cutoff],
        |r| r.get(0),
    )?;
    if recent >= TRANSFER_BURST_COUNT {
        if let Some(id) = notify::emit_if_due(
            conn,
            user_id,
            notify::KIND_FREQUENT_TRANSFERS,
            None,
            &Cooldown::default_for(notify::KIND_FREQUENT_TRANSFERS),
            "Frequent transfers",
            &format!("{} transfers were made in the last 24 hours", recent),
            &json!({"count": recent}),
            now,
        )? {
            emitted.push(id);
        }
    }

    Ok(emitted)
}

/// One scheduled pass: every user, all three scanners, sequentially.
pub fn scan_all(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    let mut stmt = conn.prepare("SELECT id FROM users ORDER BY id")?;
    let users: Vec<i64> = stmt
        .query_map([], |r| r.get(0))?
        .collect::<std::result::Result<_, _>>()?;

    let mut total = 0;
    for user_id in users {
        let mut emitted = scan_user_expenses(conn, user_id, now)?;
        emitted.extend(scan_user_income(conn, user_id, now)?);
        emitted.extend(scan_user_transfers(conn, user_id, now)?);
        debug!("scan: user {} emitted {}", user_id, emitted.len());
        total += emitted.len();
    }
    Ok(total)
}
