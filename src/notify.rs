// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Notification persistence and the dedup policy that gates alert
//! emission. The check and the insert are separate steps; under
//! concurrent scanner runs a duplicate can slip through, which the batch
//! invocation model tolerates.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rusqlite::{Connection, params};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::Notification;

pub const KIND_BUDGET_WARNING: &str = "budget_warning";
pub const KIND_BUDGET_EXCEEDED: &str = "budget_exceeded";
pub const KIND_LARGE_EXPENSE: &str = "large_expense";
pub const KIND_EXPENSE_SPIKE: &str = "expense_spike";
pub const KIND_EXPENSE_SURGE: &str = "expense_surge";
pub const KIND_EXPENSE_BURST: &str = "expense_burst";
pub const KIND_MONTHLY_EXPENSE_HIGH: &str = "monthly_expense_high";
pub const KIND_LARGE_INCOME: &str = "large_income";
pub const KIND_INCOME_SURGE: &str = "income_surge";
pub const KIND_FREQUENT_TRANSFERS: &str = "frequent_transfers";
pub const KIND_LARGE_TRANSFER: &str = "large_transfer";

/// One declarative table instead of literals scattered across call sites.
pub const COOLDOWN_HOURS: &[(&str, i64)] = &[
    (KIND_BUDGET_WARNING, 24),
    (KIND_BUDGET_EXCEEDED, 24),
    (KIND_LARGE_EXPENSE, 2),
    (KIND_EXPENSE_SPIKE, 24),
    (KIND_EXPENSE_SURGE, 24),
    (KIND_EXPENSE_BURST, 4),
    (KIND_MONTHLY_EXPENSE_HIGH, 168),
    (KIND_LARGE_INCOME, 6),
    (KIND_INCOME_SURGE, 168),
    (KIND_FREQUENT_TRANSFERS, 8),
    (KIND_LARGE_TRANSFER, 6),
];

pub fn cooldown_for(kind: &str) -> Duration {
    let hours = COOLDOWN_HOURS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, h)| *h)
        .unwrap_or(24);
    Duration::hours(hours)
}

/// How far back the dedup check looks: a sliding window, or everything
/// since a fixed anchor (e.g. the start of a budget period).
#[derive(Debug, Clone, Copy)]
pub enum Cooldown {
    Window(Duration),
    Since(DateTime<Utc>),
}

impl Cooldown {
    pub fn default_for(kind: &str) -> Self {
        Cooldown::Window(cooldown_for(kind))
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Cooldown::Window(d) => now - *d,
            Cooldown::Since(anchor) => *anchor,
        }
    }
}

const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TS_FMT)
        .map(|n| n.and_utc())
        .map_err(|_| Error::Corrupt(format!("invalid timestamp '{}'", s)))
}

/// True when no equivalent notification exists inside the cooldown. An
/// optional correlation pair narrows "equivalent" to payloads whose `key`
/// matches `value` (matched in Rust against the stored JSON).
pub fn should_emit(
    conn: &Connection,
    user_id: i64,
    kind: &str,
    correlation: Option<(&str, &Value)>,
    cooldown: &Cooldown,
    now: DateTime<Utc>,
) -> Result<bool> {
    let cutoff = cooldown.cutoff(now).format(TS_FMT).to_string();
    let mut stmt = conn.prepare_cached(
        "SELECT data FROM notifications
         WHERE user_id=?1 AND kind=?2 AND created_at >= ?3",
    )?;
    let mut rows = stmt.query(params![user_id, kind, cutoff])?;
    while let Some(r) = rows.next()? {
        let raw: String = r.get(0)?;
        match correlation {
            None => return Ok(false),
            Some((key, value)) => {
                let data: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
                if data.get(key) == Some(value) {
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}

/// Persist unconditionally; callers are expected to have consulted
/// `should_emit` (or to use `emit_if_due`).
pub fn emit(
    conn: &Connection,
    user_id: i64,
    kind: &str,
    title: &str,
    message: &str,
    data: &Value,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO notifications(user_id, kind, title, message, data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            kind,
            title,
            message,
            data.to_string(),
            now.format(TS_FMT).to_string()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The check-then-emit path every alert producer goes through.
#[allow(clippy::too_many_arguments)]
pub fn emit_if_due(
    conn: &Connection,
    user_id: i64,
    kind: &str,
    correlation: Option<(&str, &Value)>,
    cooldown: &Cooldown,
    title: &str,
    message: &str,
    data: &Value,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    if !should_emit(conn, user_id, kind, correlation, cooldown, now)? {
        return Ok(None);
    }
    emit(conn, user_id, kind, title, message, data, now).map(Some)
}

pub fn mark_read(conn: &Connection, notification_id: i64, now: DateTime<Utc>) -> Result<()> {
    let changed = conn.execute(
        "UPDATE notifications SET read_at=?1 WHERE id=?2 AND read_at IS NULL",
        params![now.format(TS_FMT).to_string(), notification_id],
    )?;
    if changed == 0 {
        return Err(Error::Validation(format!(
            "notification {} not found or already read",
            notification_id
        )));
    }
    Ok(())
}

pub fn delete(conn: &Connection, notification_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM notifications WHERE id=?1",
        params![notification_id],
    )?;
    Ok(())
}

pub fn list_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, kind, title, message, data, is_sent, read_at, created_at
         FROM notifications WHERE user_id=?1 ORDER BY created_at DESC, id DESC",
    )?;
    let mut rows = stmt.query(params![user_id])?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? {
        let data_raw: String = r.get(5)?;
        let read_at: Option<String> = r.get(7)?;
        let created_at: String = r.get(8)?;
        out.push(Notification {
            id: r.get(0)?,
            user_id: r.get(1)?,
            kind: r.get(2)?,
            title: r.get(3)?,
            message: r.get(4)?,
            data: serde_json::from_str(&data_raw).unwrap_or(Value::Null),
            is_sent: r.get(6)?,
            read_at: read_at.as_deref().map(parse_ts).transpose()?,
            created_at: parse_ts(&created_at)?,
        });
    }
    Ok(out)
}
