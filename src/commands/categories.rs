// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::{Connection, params};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            conn.execute("INSERT INTO categories(name) VALUES (?1)", params![name])?;
            println!("Added category '{}'", name);
        }
        Some(("list", _)) => {
            let mut stmt = conn.prepare(
                "SELECT c.name, COUNT(b.id) FROM categories c
                 LEFT JOIN budgets b ON b.category_id = c.id AND b.status='active'
                 GROUP BY c.id ORDER BY c.name",
            )?;
            let rows =
                stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
            let mut data = Vec::new();
            for row in rows {
                let (name, budgets) = row?;
                data.push(vec![name, budgets.to_string()]);
            }
            println!("{}", pretty_table(&["Category", "Active budgets"], data));
        }
        Some(("rm", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let budgets: i64 = conn.query_row(
                "SELECT COUNT(*) FROM budgets b JOIN categories c ON b.category_id=c.id
                 WHERE c.name=?1",
                params![name],
                |r| r.get(0),
            )?;
            if budgets > 0 {
                println!(
                    "Removing '{}' also removes {} budget(s) on it.",
                    name, budgets
                );
            }
            conn.execute("DELETE FROM categories WHERE name=?1", params![name])?;
            println!("Removed category '{}'", name);
        }
        _ => {}
    }
    Ok(())
}
