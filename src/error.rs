// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("insufficient balance on account {account_id}: available {available}, required {required}")]
    InsufficientBalance {
        account_id: i64,
        available: Decimal,
        required: Decimal,
    },

    #[error("account {0} not found or inactive")]
    AccountNotFound(i64),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("category '{0}' not found")]
    CategoryNotFound(String),

    #[error("currency '{0}' not found or inactive")]
    CurrencyNotFound(String),

    #[error("{0}")]
    CurrencyMismatch(String),

    #[error("no exchange rate available for {from}->{to}")]
    RateUnavailable { from: String, to: String },

    #[error("{0}")]
    Validation(String),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    #[error("storage error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl Error {
    /// Transient store failures (lock contention) are worth retrying;
    /// business-rule rejections are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Store(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Parse a decimal persisted as TEXT, mapping failure to `Corrupt`.
pub fn stored_decimal(s: &str) -> Result<Decimal> {
    s.parse()
        .map_err(|_| Error::Corrupt(format!("invalid decimal '{}'", s)))
}

/// Parse a date persisted as TEXT (YYYY-MM-DD), mapping failure to `Corrupt`.
pub fn stored_date(s: &str) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::Corrupt(format!("invalid date '{}'", s)))
}
