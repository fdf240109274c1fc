// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Budget consumption: recompute spent from the transaction log, classify
//! against the cap and alert threshold, and emit deduplicated alerts.
//! `spent_amount` is a cached materialized view, always re-derivable.

use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde_json::json;

use crate::error::{Error, Result, stored_date, stored_decimal};
use crate::models::{Budget, BudgetStatus, PeriodType};
use crate::notify;

#[derive(Debug, Clone)]
pub struct NewBudget {
    pub user_id: i64,
    /// None applies the budget across all of the user's accounts.
    pub account_id: Option<i64>,
    pub category_id: i64,
    pub currency: String,
    pub amount: Decimal,
    pub period_type: PeriodType,
    pub start_date: NaiveDate,
    /// Defaults to the end of the period starting at `start_date`.
    pub end_date: Option<NaiveDate>,
    pub auto_renew: bool,
    pub alert_threshold: Option<Decimal>,
    pub alert_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    OnTrack,
    NearThreshold,
    Exceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    NotStarted,
    Overspending,
    Underspending,
    OnTrack,
}

pub fn create_budget(conn: &Connection, new: &NewBudget) -> Result<i64> {
    if new.amount <= Decimal::ZERO {
        return Err(Error::Validation(format!(
            "budget amount must be positive, got {}",
            new.amount
        )));
    }
    let threshold = new.alert_threshold.unwrap_or(Decimal::from(80));
    if threshold <= Decimal::ZERO || threshold > Decimal::from(100) {
        return Err(Error::Validation(format!(
            "alert threshold must be within (0, 100], got {}",
            threshold
        )));
    }

    let user: Option<i64> = conn
        .query_row("SELECT id FROM users WHERE id=?1", params![new.user_id], |r| r.get(0))
        .optional()?;
    if user.is_none() {
        return Err(Error::UserNotFound(new.user_id));
    }
    let cat: Option<i64> = conn
        .query_row(
            "SELECT id FROM categories WHERE id=?1",
            params![new.category_id],
            |r| r.get(0),
        )
        .optional()?;
    if cat.is_none() {
        return Err(Error::CategoryNotFound(new.category_id.to_string()));
    }
    let ccy: Option<bool> = conn
        .query_row(
            "SELECT active FROM currencies WHERE code=?1",
            params![new.currency],
            |r| r.get(0),
        )
        .optional()?;
    if !matches!(ccy, Some(true)) {
        return Err(Error::CurrencyNotFound(new.currency.clone()));
    }
    if let Some(account_id) = new.account_id {
        let owner: Option<i64> = conn
            .query_row(
                "SELECT user_id FROM accounts WHERE id=?1 AND deleted_at IS NULL",
                params![account_id],
                |r| r.get(0),
            )
            .optional()?;
        if owner != Some(new.user_id) {
            return Err(Error::AccountNotFound(account_id));
        }
    }

    let end_date = new
        .end_date
        .unwrap_or_else(|| new.period_type.end_date(new.start_date));
    if end_date < new.start_date {
        return Err(Error::Validation(format!(
            "end date {} precedes start date {}",
            end_date, new.start_date
        )));
    }

    // At most one active budget per (user, account-or-null, category,
    // overlapping window).
    let clash: Option<i64> = conn
        .query_row(
            "SELECT id FROM budgets
             WHERE user_id=?1 AND category_id=?2 AND account_id IS ?3
               AND status='active' AND start_date <= ?4 AND end_date >= ?5",
            params![
                new.user_id,
                new.category_id,
                new.account_id,
                end_date.to_string(),
                new.start_date.to_string()
            ],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = clash {
        return Err(Error::Validation(format!(
            "an active budget ({}) already covers this category in that window",
            id
        )));
    }

    conn.execute(
        "INSERT INTO budgets(user_id, account_id, category_id, currency, amount,
                             period_type, start_date, end_date, auto_renew,
                             alert_threshold, alert_enabled)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            new.user_id,
            new.account_id,
            new.category_id,
            new.currency,
            new.amount.to_string(),
            new.period_type.as_str(),
            new.start_date.to_string(),
            end_date.to_string(),
            new.auto_renew,
            threshold.to_string(),
            new.alert_enabled
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_budget(conn: &Connection, budget_id: i64) -> Result<Budget> {
    let row = conn
        .query_row(
            "SELECT id, user_id, account_id, category_id, currency, amount, period_type,
                    start_date, end_date, auto_renew, alert_threshold, alert_enabled,
                    spent_amount, status
             FROM budgets WHERE id=?1",
            params![budget_id],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, Option<i64>>(2)?,
                    r.get::<_, i64>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, String>(6)?,
                    r.get::<_, String>(7)?,
                    r.get::<_, String>(8)?,
                    r.get::<_, bool>(9)?,
                    r.get::<_, String>(10)?,
                    r.get::<_, bool>(11)?,
                    r.get::<_, String>(12)?,
                    r.get::<_, String>(13)?,
                ))
            },
        )
        .optional()?;
    let Some(row) = row else {
        return Err(Error::Validation(format!("budget {} not found", budget_id)));
    };
    Ok(Budget {
        id: row.0,
        user_id: row.1,
        account_id: row.2,
        category_id: row.3,
        currency: row.4,
        amount: stored_decimal(&row.5)?,
        period_type: PeriodType::parse(&row.6)?,
        start_date: stored_date(&row.7)?,
        end_date: stored_date(&row.8)?,
        auto_renew: row.9,
        alert_threshold: stored_decimal(&row.10)?,
        alert_enabled: row.11,
        spent_amount: stored_decimal(&row.12)?,
        status: BudgetStatus::parse(&row.13)?,
    })
}

/// Sum matching expense transactions for the budget's window and scope,
/// and write the cached `spent_amount` back.
pub fn recompute_spent(conn: &Connection, budget_id: i64) -> Result<Decimal> {
    let budget = get_budget(conn, budget_id)?;
    let mut stmt = conn.prepare_cached(
        "SELECT t.amount FROM transactions t
         JOIN accounts a ON t.account_id = a.id
         WHERE t.deleted_at IS NULL AND t.kind='expense'
           AND t.category_id = ?1
           AND t.date >= ?2 AND t.date <= ?3
           AND a.user_id = ?4
           AND (?5 IS NULL OR t.account_id = ?5)",
    )?;
    let mut rows = stmt.query(params![
        budget.category_id,
        budget.start_date.to_string(),
        budget.end_date.to_string(),
        budget.user_id,
        budget.account_id
    ])?;
    let mut spent = Decimal::ZERO;
    while let Some(r) = rows.next()? {
        spent += stored_decimal(&r.get::<_, String>(0)?)?;
    }
    conn.execute(
        "UPDATE budgets SET spent_amount=?1 WHERE id=?2",
        params![spent.to_string(), budget_id],
    )?;
    Ok(spent)
}

pub fn classify(budget: &Budget) -> Health {
    if budget.spent_amount >= budget.amount {
        return Health::Exceeded;
    }
    if budget.spent_percentage() >= budget.alert_threshold {
        return Health::NearThreshold;
    }
    Health::OnTrack
}

/// Linear extrapolation of the period's total from the daily average so
/// far. Outside the period there is nothing to extrapolate.
pub fn project_spending(budget: &Budget, today: NaiveDate) -> Decimal {
    if today < budget.start_date || today > budget.end_date {
        return budget.spent_amount;
    }
    let total_days = (budget.end_date - budget.start_date).num_days() + 1;
    let elapsed = ((today - budget.start_date).num_days() + 1).max(1);
    let daily = budget.spent_amount / Decimal::from(elapsed);
    daily * Decimal::from(total_days)
}

pub fn trend(budget: &Budget, today: NaiveDate) -> Trend {
    let elapsed = (today - budget.start_date).num_days() + 1;
    if elapsed <= 0 {
        return Trend::NotStarted;
    }
    let total_days = (budget.end_date - budget.start_date).num_days() + 1;
    let elapsed = elapsed.min(total_days);
    let expected = Decimal::from(elapsed) / Decimal::from(total_days) * Decimal::from(100);
    let actual = budget.spent_percentage();
    if actual > expected * Decimal::new(12, 1) {
        Trend::Overspending
    } else if actual < expected * Decimal::new(8, 1) {
        Trend::Underspending
    } else {
        Trend::OnTrack
    }
}

/// Recompute, classify, and fire deduplicated alerts. An exceeded budget
/// also has its status flipped.
pub fn check_alerts(conn: &Connection, budget_id: i64, now: DateTime<Utc>) -> Result<Vec<i64>> {
    recompute_spent(conn, budget_id)?;
    let budget = get_budget(conn, budget_id)?;
    if !budget.alert_enabled
        || matches!(budget.status, BudgetStatus::Inactive | BudgetStatus::Completed)
    {
        return Ok(Vec::new());
    }

    let pct = budget.spent_percentage().round_dp(1);
    let data = json!({
        "budget_id": budget.id,
        "spent": budget.spent_amount.to_string(),
        "amount": budget.amount.to_string(),
        "percentage": pct.to_string(),
    });
    let correlation_value = json!(budget.id);

    let mut emitted = Vec::new();
    match classify(&budget) {
        Health::Exceeded => {
            if budget.status != BudgetStatus::Exceeded {
                conn.execute(
                    "UPDATE budgets SET status='exceeded' WHERE id=?1",
                    params![budget.id],
                )?;
            }
            if let Some(id) = notify::emit_if_due(
                conn,
                budget.user_id,
                notify::KIND_BUDGET_EXCEEDED,
                Some(("budget_id", &correlation_value)),
                &notify::Cooldown::default_for(notify::KIND_BUDGET_EXCEEDED),
                "Budget exceeded",
                &format!(
                    "Spending reached {} of a {} {} budget",
                    budget.spent_amount, budget.amount, budget.currency
                ),
                &data,
                now,
            )? {
                emitted.push(id);
            }
        }
        Health::NearThreshold => {
            if let Some(id) = notify::emit_if_due(
                conn,
                budget.user_id,
                notify::KIND_BUDGET_WARNING,
                Some(("budget_id", &correlation_value)),
                &notify::Cooldown::default_for(notify::KIND_BUDGET_WARNING),
                "Budget warning",
                &format!("Spending is at {}% of the budget cap", pct),
                &data,
                now,
            )? {
                emitted.push(id);
            }
        }
        Health::OnTrack => {}
    }
    debug!("budget {} alerts: {} emitted", budget_id, emitted.len());
    Ok(emitted)
}

/// Roll expired auto-renew budgets into their next window (spent reset),
/// and complete the rest. Returns how many rows changed.
pub fn renew_expired(conn: &Connection, today: NaiveDate) -> Result<usize> {
    let mut stmt = conn.prepare(
        "SELECT id FROM budgets
         WHERE status IN ('active','exceeded') AND end_date < ?1",
    )?;
    let ids: Vec<i64> = stmt
        .query_map(params![today.to_string()], |r| r.get(0))?
        .collect::<std::result::Result<_, _>>()?;

    let mut changed = 0;
    for id in ids {
        let budget = get_budget(conn, id)?;
        if budget.auto_renew {
            let new_start = budget.end_date + chrono::Duration::days(1);
            let new_end = budget.period_type.end_date(new_start);
            conn.execute(
                "UPDATE budgets
                 SET start_date=?1, end_date=?2, spent_amount='0', status='active'
                 WHERE id=?3",
                params![new_start.to_string(), new_end.to_string(), id],
            )?;
        } else {
            conn.execute(
                "UPDATE budgets SET status='completed' WHERE id=?1",
                params![id],
            )?;
        }
        changed += 1;
    }
    Ok(changed)
}
