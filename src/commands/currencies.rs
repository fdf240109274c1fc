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
            let code = sub.get_one::<String>("code").unwrap().to_uppercase();
            let name = sub.get_one::<String>("name").unwrap();
            let decimals = *sub.get_one::<u32>("decimals").unwrap();
            conn.execute(
                "INSERT INTO currencies(code, name, decimal_places) VALUES (?1, ?2, ?3)",
                params![code, name, decimals],
            )?;
            println!("Added currency {} ({})", code, name);
        }
        Some(("list", _)) => {
            let mut stmt = conn.prepare(
                "SELECT code, name, decimal_places, active FROM currencies ORDER BY code",
            )?;
            let rows = stmt.query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, u32>(2)?,
                    r.get::<_, bool>(3)?,
                ))
            })?;
            let mut data = Vec::new();
            for row in rows {
                let (code, name, dp, active) = row?;
                data.push(vec![
                    code,
                    name,
                    dp.to_string(),
                    if active { "yes".into() } else { "no".into() },
                ]);
            }
            println!("{}", pretty_table(&["Code", "Name", "Decimals", "Active"], data));
        }
        _ => {}
    }
    Ok(())
}
