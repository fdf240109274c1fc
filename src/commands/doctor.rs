// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;

pub fn handle(conn: &Connection) -> Result<()> {
    let mut rows = Vec::new();

    // 1) Transfer legs whose link row is gone (should never happen; the
    // pair is created and destroyed together).
    let mut stmt = conn.prepare(
        "SELECT t.id FROM transactions t
         WHERE t.kind='transfer' AND t.deleted_at IS NULL
           AND NOT EXISTS(SELECT 1 FROM transfers x
                          WHERE x.source_transaction_id=t.id
                             OR x.destination_transaction_id=t.id)",
    )?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let id: i64 = r.get(0)?;
        rows.push(vec!["orphan_transfer_leg".into(), format!("tx {}", id)]);
    }

    // 2) Accounts holding a currency the currencies table does not know.
    let mut stmt2 = conn.prepare(
        "SELECT DISTINCT currency FROM accounts WHERE deleted_at IS NULL
         EXCEPT SELECT code FROM currencies",
    )?;
    let mut cur2 = stmt2.query([])?;
    while let Some(r) = cur2.next()? {
        let c: String = r.get(0)?;
        rows.push(vec!["unknown_currency".into(), c]);
    }

    // 3) Negative derived balances (invariant breach, e.g. rows edited
    // outside the ledger).
    let mut stmt3 =
        conn.prepare("SELECT id, name FROM accounts WHERE deleted_at IS NULL")?;
    let mut cur3 = stmt3.query([])?;
    while let Some(r) = cur3.next()? {
        let id: i64 = r.get(0)?;
        let name: String = r.get(1)?;
        let balance = ledger::derived_balance(conn, id)?;
        if balance < Decimal::ZERO {
            rows.push(vec![
                "negative_balance".into(),
                format!("{} ({})", name, balance),
            ]);
        }
    }

    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
