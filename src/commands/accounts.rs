// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger;
use crate::utils::{fmt_money, id_for_account, id_for_user, parse_decimal, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, params};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let user_id = id_for_user(conn, sub.get_one::<String>("user").unwrap())?;
            let name = sub.get_one::<String>("name").unwrap();
            let typ = sub.get_one::<String>("type").unwrap();
            let ccy = sub.get_one::<String>("currency").unwrap().to_uppercase();
            let initial = parse_decimal(sub.get_one::<String>("initial").unwrap())?;
            conn.execute(
                "INSERT INTO accounts(user_id, name, type, currency, initial_balance)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, name, typ, ccy, initial.to_string()],
            )?;
            println!("Added account '{}' ({}, {})", name, typ, ccy);
        }
        Some(("list", sub)) => {
            let user_id = id_for_user(conn, sub.get_one::<String>("user").unwrap())?;
            let mut stmt = conn.prepare(
                "SELECT id, name, type, currency, active FROM accounts
                 WHERE user_id=?1 AND deleted_at IS NULL ORDER BY name",
            )?;
            let rows = stmt.query_map(params![user_id], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, bool>(4)?,
                ))
            })?;
            let mut data = Vec::new();
            for row in rows {
                let (id, n, t, c, active) = row?;
                let balance = ledger::derived_balance(conn, id)?;
                data.push(vec![
                    n,
                    t,
                    fmt_money(&balance, &c),
                    if active { "yes".into() } else { "no".into() },
                ]);
            }
            println!(
                "{}",
                pretty_table(&["Name", "Type", "Balance", "Active"], data)
            );
        }
        Some(("balance", sub)) => {
            let user_id = id_for_user(conn, sub.get_one::<String>("user").unwrap())?;
            let name = sub.get_one::<String>("name").unwrap();
            let account_id = id_for_account(conn, user_id, name)?;
            let ccy: String = conn.query_row(
                "SELECT currency FROM accounts WHERE id=?1",
                params![account_id],
                |r| r.get(0),
            )?;
            let balance = ledger::derived_balance(conn, account_id)?;
            println!("{}", fmt_money(&balance, &ccy));
        }
        Some(("rm", sub)) => {
            let user_id = id_for_user(conn, sub.get_one::<String>("user").unwrap())?;
            let name = sub.get_one::<String>("name").unwrap();
            let account_id = id_for_account(conn, user_id, name)?;
            if sub.get_flag("force") {
                // Hard delete cascades to the account's transactions.
                conn.execute("DELETE FROM accounts WHERE id=?1", params![account_id])?;
                println!("Removed account '{}' and its transactions", name);
            } else {
                conn.execute(
                    "UPDATE accounts SET active=0, deleted_at=datetime('now') WHERE id=?1",
                    params![account_id],
                )?;
                println!("Deactivated account '{}'", name);
            }
        }
        _ => {}
    }
    Ok(())
}
