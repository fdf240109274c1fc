// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Transaction CRUD with the balance invariant: no committed outflow may
//! drive an account's derived balance negative. Balances are never stored;
//! they are recomputed from the transaction log on every check.

use chrono::NaiveDate;
use log::{debug, warn};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use rust_decimal::Decimal;

use crate::error::{Error, Result, stored_decimal};
use crate::models::{Direction, Transaction, TxKind};

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(250);

/// Run `op` up to three times, sleeping a fixed delay between attempts.
/// Only transient store failures (busy/locked) are retried; business-rule
/// rejections like `InsufficientBalance` fail fast.
pub(crate) fn with_retry<T>(what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_transient() && attempt < RETRY_ATTEMPTS => {
                warn!(
                    "{}: attempt {}/{} failed transiently: {}",
                    what, attempt, RETRY_ATTEMPTS, e
                );
                std::thread::sleep(RETRY_DELAY);
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// A category supplied either by id or by its legacy lookup key (name).
#[derive(Debug, Clone)]
pub enum CategoryRef {
    Id(i64),
    Name(String),
}

/// What to do when a supplied category reference does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFallback {
    /// Ignore the reference and keep going (legacy-compatible).
    Drop,
    /// Fail the operation with `CategoryNotFound`.
    Reject,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: i64,
    pub category: Option<CategoryRef>,
    pub amount: Decimal,
    pub kind: TxKind,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub reference: Option<String>,
}

/// Field-wise update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub account_id: Option<i64>,
    pub category: Option<CategoryRef>,
    pub amount: Option<Decimal>,
    pub kind: Option<TxKind>,
    pub date: Option<NaiveDate>,
    pub is_reconciled: Option<bool>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

impl TransactionPatch {
    fn touches_structure(&self) -> bool {
        self.account_id.is_some()
            || self.category.is_some()
            || self.amount.is_some()
            || self.kind.is_some()
            || self.date.is_some()
    }
}

/// Current balance of an account, derived from its non-deleted
/// transactions: initial + income − expense − transfer-out + transfer-in.
/// A transfer leg's direction comes from which side of the transfers row
/// its id matches.
pub fn derived_balance(conn: &Connection, account_id: i64) -> Result<Decimal> {
    let initial: Option<String> = conn
        .query_row(
            "SELECT initial_balance FROM accounts WHERE id=?1 AND deleted_at IS NULL",
            params![account_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(initial) = initial else {
        return Err(Error::AccountNotFound(account_id));
    };
    let mut balance = stored_decimal(&initial)?;

    let mut stmt = conn.prepare_cached(
        "SELECT t.amount, t.kind,
                EXISTS(SELECT 1 FROM transfers x WHERE x.source_transaction_id = t.id),
                EXISTS(SELECT 1 FROM transfers x WHERE x.destination_transaction_id = t.id)
         FROM transactions t
         WHERE t.account_id=?1 AND t.deleted_at IS NULL",
    )?;
    let mut rows = stmt.query(params![account_id])?;
    while let Some(r) = rows.next()? {
        let amount = stored_decimal(&r.get::<_, String>(0)?)?;
        let kind = TxKind::parse(&r.get::<_, String>(1)?)?;
        let is_out: bool = r.get(2)?;
        let is_in: bool = r.get(3)?;
        let direction = if is_out {
            Some(Direction::Out)
        } else if is_in {
            Some(Direction::In)
        } else {
            None
        };
        balance += signed_effect(kind, amount, direction);
    }
    Ok(balance)
}

/// Signed contribution of one transaction to its account's balance.
/// An unlinked transfer leg contributes nothing; it only counts once the
/// transfers row that gives it a direction exists.
fn signed_effect(kind: TxKind, amount: Decimal, direction: Option<Direction>) -> Decimal {
    match kind {
        TxKind::Income => amount,
        TxKind::Expense => -amount,
        TxKind::Transfer => match direction {
            Some(Direction::Out) => -amount,
            Some(Direction::In) => amount,
            None => Decimal::ZERO,
        },
    }
}

/// Which side of a transfer this transaction sits on, if any.
pub fn direction_of(conn: &Connection, transaction_id: i64) -> Result<Option<Direction>> {
    let out: Option<i64> = conn
        .query_row(
            "SELECT id FROM transfers WHERE source_transaction_id=?1",
            params![transaction_id],
            |r| r.get(0),
        )
        .optional()?;
    if out.is_some() {
        return Ok(Some(Direction::Out));
    }
    let inc: Option<i64> = conn
        .query_row(
            "SELECT id FROM transfers WHERE destination_transaction_id=?1",
            params![transaction_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(inc.map(|_| Direction::In))
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<Transaction> {
    let row = conn
        .query_row(
            "SELECT id, account_id, category_id, amount, kind, date, is_reconciled,
                    description, reference
             FROM transactions WHERE id=?1 AND deleted_at IS NULL",
            params![id],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, Option<i64>>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, bool>(6)?,
                    r.get::<_, Option<String>>(7)?,
                    r.get::<_, Option<String>>(8)?,
                ))
            },
        )
        .optional()?;
    let Some((id, account_id, category_id, amount, kind, date, is_reconciled, description, reference)) =
        row
    else {
        return Err(Error::Validation(format!("transaction {} not found", id)));
    };
    Ok(Transaction {
        id,
        account_id,
        category_id,
        amount: stored_decimal(&amount)?,
        kind: TxKind::parse(&kind)?,
        date: crate::error::stored_date(&date)?,
        is_reconciled,
        description,
        reference,
    })
}

fn require_active_account(conn: &Connection, account_id: i64) -> Result<()> {
    let active: Option<bool> = conn
        .query_row(
            "SELECT active FROM accounts WHERE id=?1 AND deleted_at IS NULL",
            params![account_id],
            |r| r.get(0),
        )
        .optional()?;
    match active {
        Some(true) => Ok(()),
        _ => Err(Error::AccountNotFound(account_id)),
    }
}

fn resolve_category(
    conn: &Connection,
    cat: Option<&CategoryRef>,
    fallback: CategoryFallback,
) -> Result<Option<Option<i64>>> {
    // Outer None: nothing supplied. Inner None: supplied but dropped.
    let Some(cat) = cat else { return Ok(None) };
    let found: Option<i64> = match cat {
        CategoryRef::Id(id) => conn
            .query_row("SELECT id FROM categories WHERE id=?1", params![id], |r| {
                r.get(0)
            })
            .optional()?,
        CategoryRef::Name(name) => conn
            .query_row(
                "SELECT id FROM categories WHERE name=?1",
                params![name],
                |r| r.get(0),
            )
            .optional()?,
    };
    match (found, fallback) {
        (Some(id), _) => Ok(Some(Some(id))),
        (None, CategoryFallback::Drop) => {
            debug!("dropping unresolvable category reference {:?}", cat);
            Ok(Some(None))
        }
        (None, CategoryFallback::Reject) => {
            let key = match cat {
                CategoryRef::Id(id) => id.to_string(),
                CategoryRef::Name(n) => n.clone(),
            };
            Err(Error::CategoryNotFound(key))
        }
    }
}

/// Balance pre-check for an outflow of `amount` on `account_id`.
pub(crate) fn check_outflow(conn: &Connection, account_id: i64, amount: Decimal) -> Result<()> {
    let available = derived_balance(conn, account_id)?;
    if available - amount < Decimal::ZERO {
        return Err(Error::InsufficientBalance {
            account_id,
            available,
            required: amount,
        });
    }
    Ok(())
}

/// Insert a transfer leg without a balance check. Callers own the check
/// (outgoing legs only) and the transfers row that gives the leg its
/// direction; everything happens inside the caller's transaction.
pub(crate) fn insert_leg(
    conn: &Connection,
    account_id: i64,
    category_id: Option<i64>,
    amount: Decimal,
    date: NaiveDate,
    description: Option<&str>,
    reference: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions(account_id, category_id, amount, kind, date, description, reference)
         VALUES (?1, ?2, ?3, 'transfer', ?4, ?5, ?6)",
        params![
            account_id,
            category_id,
            amount.to_string(),
            date.to_string(),
            description,
            reference
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Create an income or expense transaction. Expenses are checked against
/// the derived balance before the row is written; the IMMEDIATE
/// transaction takes the write lock before the balance read so two
/// concurrent outflows cannot both pass against a stale balance.
pub fn create_transaction(
    conn: &mut Connection,
    new: &NewTransaction,
    fallback: CategoryFallback,
) -> Result<i64> {
    if new.amount <= Decimal::ZERO {
        return Err(Error::Validation(format!(
            "amount must be positive, got {}",
            new.amount
        )));
    }
    if new.kind == TxKind::Transfer {
        return Err(Error::Validation(
            "transfer legs are created through transfer operations".into(),
        ));
    }
    with_retry("create_transaction", || {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        require_active_account(&tx, new.account_id)?;
        let category_id = resolve_category(&tx, new.category.as_ref(), fallback)?.flatten();
        if new.kind == TxKind::Expense {
            check_outflow(&tx, new.account_id, new.amount)?;
        }
        tx.execute(
            "INSERT INTO transactions(account_id, category_id, amount, kind, date, description, reference)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.account_id,
                category_id,
                new.amount.to_string(),
                new.kind.as_str(),
                new.date.to_string(),
                new.description,
                new.reference
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    })
}

/// Apply a patch, re-validating the balance invariant with the signed
/// effect delta. Moving the transaction to a different account checks the
/// new account's balance against the new effect in isolation.
pub fn update_transaction(
    conn: &mut Connection,
    id: i64,
    patch: &TransactionPatch,
    fallback: CategoryFallback,
) -> Result<()> {
    with_retry("update_transaction", || {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = get_transaction(&tx, id)?;
        let direction = direction_of(&tx, id)?;

        if direction.is_some() && patch.touches_structure() {
            return Err(Error::Validation(
                "transfer legs can only be reconciled or annotated; use transfer operations"
                    .into(),
            ));
        }
        let new_kind = patch.kind.unwrap_or(existing.kind);
        if new_kind == TxKind::Transfer && existing.kind != TxKind::Transfer {
            return Err(Error::Validation(
                "cannot turn a transaction into a transfer leg; use transfer operations".into(),
            ));
        }
        let new_amount = patch.amount.unwrap_or(existing.amount);
        if new_amount <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "amount must be positive, got {}",
                new_amount
            )));
        }
        let new_account = patch.account_id.unwrap_or(existing.account_id);

        if new_account != existing.account_id {
            require_active_account(&tx, new_account)?;
            // Account move: the new account's balance is checked against
            // the transaction's new effect alone, not a delta.
            if new_kind == TxKind::Expense {
                check_outflow(&tx, new_account, new_amount)?;
            }
        } else {
            let old_effect = signed_effect(existing.kind, existing.amount, direction);
            let new_effect = signed_effect(new_kind, new_amount, direction);
            let delta = new_effect - old_effect;
            if delta < Decimal::ZERO {
                let available = derived_balance(&tx, existing.account_id)?;
                if available + delta < Decimal::ZERO {
                    return Err(Error::InsufficientBalance {
                        account_id: existing.account_id,
                        available,
                        required: -delta,
                    });
                }
            }
        }

        let category_id = match resolve_category(&tx, patch.category.as_ref(), fallback)? {
            Some(resolved) => resolved.or(existing.category_id),
            None => existing.category_id,
        };
        let new_date = patch.date.unwrap_or(existing.date);
        let reconciled = patch.is_reconciled.unwrap_or(existing.is_reconciled);
        let description = patch.description.clone().or(existing.description.clone());
        let reference = patch.reference.clone().or(existing.reference.clone());

        tx.execute(
            "UPDATE transactions
             SET account_id=?1, category_id=?2, amount=?3, kind=?4, date=?5,
                 is_reconciled=?6, description=?7, reference=?8
             WHERE id=?9",
            params![
                new_account,
                category_id,
                new_amount.to_string(),
                new_kind.as_str(),
                new_date.to_string(),
                reconciled,
                description,
                reference,
                id
            ],
        )?;
        tx.commit()?;
        Ok(())
    })
}

/// Soft-delete a transaction; removing an entry cannot break the balance
/// invariant, so there is no pre-check. Transfer legs are rejected: the
/// pair is destroyed together through transfer deletion.
pub fn delete_transaction(conn: &mut Connection, id: i64) -> Result<()> {
    with_retry("delete_transaction", || {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        get_transaction(&tx, id)?;
        if direction_of(&tx, id)?.is_some() {
            return Err(Error::Validation(
                "transfer legs are deleted as a pair through transfer operations".into(),
            ));
        }
        tx.execute(
            "UPDATE transactions SET deleted_at=datetime('now') WHERE id=?1",
            params![id],
        )?;
        tx.commit()?;
        Ok(())
    })
}
