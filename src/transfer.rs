// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Two-leg transfer settlement: outgoing debit and incoming credit are
//! created with their linking row as one atomic unit. If anything fails,
//! neither leg nor the link survives.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use rust_decimal::Decimal;

use crate::error::{Error, Result, stored_decimal};
use crate::ledger::{check_outflow, insert_leg, with_retry};
use crate::models::Transfer;
use crate::rates::{RateProvider, RateSource};

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub user_id: i64,
    pub source_account_id: i64,
    pub destination_account_id: i64,
    pub amount: Decimal,
    /// Incoming-leg amount when it differs from `amount`. Required for the
    /// cross-currency path unless a real-time rate is requested.
    pub destination_amount: Option<Decimal>,
    pub category_id: Option<i64>,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct TransferOutcome {
    pub transfer_id: i64,
    pub source_transaction_id: i64,
    pub destination_transaction_id: i64,
}

struct AccountInfo {
    currency: String,
}

fn load_owned_account(conn: &Connection, user_id: i64, account_id: i64) -> Result<AccountInfo> {
    let row: Option<(i64, String, bool)> = conn
        .query_row(
            "SELECT user_id, currency, active FROM accounts WHERE id=?1 AND deleted_at IS NULL",
            params![account_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    match row {
        Some((owner, currency, active)) if owner == user_id && active => {
            Ok(AccountInfo { currency })
        }
        _ => Err(Error::AccountNotFound(account_id)),
    }
}

fn validate_request(req: &TransferRequest) -> Result<()> {
    if req.amount <= Decimal::ZERO {
        return Err(Error::Validation(format!(
            "transfer amount must be positive, got {}",
            req.amount
        )));
    }
    if let Some(dest) = req.destination_amount {
        if dest <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "destination amount must be positive, got {}",
                dest
            )));
        }
    }
    if req.source_account_id == req.destination_account_id {
        return Err(Error::Validation(
            "source and destination accounts must differ".into(),
        ));
    }
    Ok(())
}

/// Both sides share a currency; the incoming leg carries `amount` unless
/// `destination_amount` overrides it.
pub fn create_same_currency(
    conn: &mut Connection,
    req: &TransferRequest,
) -> Result<TransferOutcome> {
    validate_request(req)?;
    with_retry("create_same_currency", || {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let source = load_owned_account(&tx, req.user_id, req.source_account_id)?;
        let dest = load_owned_account(&tx, req.user_id, req.destination_account_id)?;
        if source.currency != dest.currency {
            return Err(Error::CurrencyMismatch(format!(
                "accounts hold {} and {}; use a currency transfer",
                source.currency, dest.currency
            )));
        }
        let dest_amount = req.destination_amount.unwrap_or(req.amount);
        let outcome = settle(&tx, req, dest_amount, None, false)?;
        tx.commit()?;
        Ok(outcome)
    })
}

/// Cross-currency settlement. The applied rate is recorded as
/// destination-units-per-source-unit; with `use_real_time_rate` the
/// destination amount is derived from the provider, and a missing rate
/// aborts the whole operation.
pub fn create_cross_currency<S: RateSource>(
    conn: &mut Connection,
    req: &TransferRequest,
    use_real_time_rate: bool,
    rates: &mut RateProvider<S>,
) -> Result<TransferOutcome> {
    validate_request(req)?;
    with_retry("create_cross_currency", || {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let source = load_owned_account(&tx, req.user_id, req.source_account_id)?;
        let dest = load_owned_account(&tx, req.user_id, req.destination_account_id)?;
        if source.currency == dest.currency {
            return Err(Error::CurrencyMismatch(format!(
                "both accounts hold {}; use a same-currency transfer",
                source.currency
            )));
        }
        let dest_amount = if use_real_time_rate {
            rates
                .convert(req.amount, &source.currency, &dest.currency)
                .ok_or_else(|| Error::RateUnavailable {
                    from: source.currency.clone(),
                    to: dest.currency.clone(),
                })?
        } else {
            req.destination_amount.ok_or_else(|| {
                Error::Validation(
                    "destination amount is required without a real-time rate".into(),
                )
            })?
        };
        let rate = dest_amount / req.amount;
        let outcome = settle(&tx, req, dest_amount, Some(rate), use_real_time_rate)?;
        tx.commit()?;
        Ok(outcome)
    })
}

/// Shared tail of both paths: balance-check the source, insert both legs,
/// then the linking row. Runs inside the caller's transaction.
fn settle(
    tx: &Connection,
    req: &TransferRequest,
    dest_amount: Decimal,
    exchange_rate: Option<Decimal>,
    used_real_time_rate: bool,
) -> Result<TransferOutcome> {
    check_outflow(tx, req.source_account_id, req.amount)?;
    let source_leg = insert_leg(
        tx,
        req.source_account_id,
        req.category_id,
        req.amount,
        req.date,
        req.description.as_deref(),
        req.reference.as_deref(),
    )?;
    let dest_leg = insert_leg(
        tx,
        req.destination_account_id,
        req.category_id,
        dest_amount,
        req.date,
        req.description.as_deref(),
        req.reference.as_deref(),
    )?;
    tx.execute(
        "INSERT INTO transfers(source_transaction_id, destination_transaction_id,
                               exchange_rate, used_real_time_rate)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            source_leg,
            dest_leg,
            exchange_rate.map(|r| r.to_string()),
            used_real_time_rate
        ],
    )?;
    Ok(TransferOutcome {
        transfer_id: tx.last_insert_rowid(),
        source_transaction_id: source_leg,
        destination_transaction_id: dest_leg,
    })
}

pub fn get_transfer(conn: &Connection, transfer_id: i64) -> Result<Transfer> {
    let row: Option<(i64, i64, i64, Option<String>, bool)> = conn
        .query_row(
            "SELECT id, source_transaction_id, destination_transaction_id,
                    exchange_rate, used_real_time_rate
             FROM transfers WHERE id=?1",
            params![transfer_id],
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                ))
            },
        )
        .optional()?;
    let Some((id, src, dst, rate, rt)) = row else {
        return Err(Error::Validation(format!("transfer {} not found", transfer_id)));
    };
    Ok(Transfer {
        id,
        source_transaction_id: src,
        destination_transaction_id: dst,
        exchange_rate: rate.as_deref().map(stored_decimal).transpose()?,
        used_real_time_rate: rt,
    })
}

/// Destroy the pair atomically: both legs soft-deleted, link row removed.
pub fn delete_transfer(conn: &mut Connection, transfer_id: i64) -> Result<()> {
    with_retry("delete_transfer", || {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let transfer = get_transfer(&tx, transfer_id)?;
        // The link row goes first so the legs lose their direction before
        // they stop counting at all.
        tx.execute("DELETE FROM transfers WHERE id=?1", params![transfer_id])?;
        tx.execute(
            "UPDATE transactions SET deleted_at=datetime('now') WHERE id IN (?1, ?2)",
            params![
                transfer.source_transaction_id,
                transfer.destination_transaction_id
            ],
        )?;
        tx.commit()?;
        Ok(())
    })
}
