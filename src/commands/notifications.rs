// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::notify;
use crate::utils::{id_for_user, maybe_print_json, pretty_table};
use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => {
            let json_flag = sub.get_flag("json");
            let jsonl_flag = sub.get_flag("jsonl");
            let user_id = id_for_user(conn, sub.get_one::<String>("user").unwrap())?;
            let items = notify::list_for_user(conn, user_id)?;
            if !maybe_print_json(json_flag, jsonl_flag, &items)? {
                let rows: Vec<Vec<String>> = items
                    .iter()
                    .map(|n| {
                        vec![
                            n.id.to_string(),
                            n.created_at.format("%Y-%m-%d %H:%M").to_string(),
                            n.kind.clone(),
                            n.title.clone(),
                            if n.read_at.is_some() {
                                "read".into()
                            } else {
                                "unread".into()
                            },
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Id", "Created", "Kind", "Title", "Status"], rows)
                );
            }
        }
        Some(("read", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            notify::mark_read(conn, id, Utc::now())?;
            println!("Marked notification {} read", id);
        }
        Some(("rm", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            notify::delete(conn, id)?;
            println!("Deleted notification {}", id);
        }
        _ => {}
    }
    Ok(())
}
