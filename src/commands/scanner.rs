// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::scan;
use crate::utils::id_for_user;
use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let now = Utc::now();
    match m.get_one::<String>("user") {
        Some(name) => {
            let user_id = id_for_user(conn, name)?;
            let mut emitted = scan::scan_user_expenses(conn, user_id, now)?;
            emitted.extend(scan::scan_user_income(conn, user_id, now)?);
            emitted.extend(scan::scan_user_transfers(conn, user_id, now)?);
            println!("Scan emitted {} notification(s) for '{}'", emitted.len(), name);
        }
        None => {
            let total = scan::scan_all(conn, now)?;
            println!("Scan emitted {} notification(s)", total);
        }
    }
    Ok(())
}
