// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::rates::{HttpRateSource, RateProvider};
use crate::transfer::{self, TransferRequest};
use crate::utils::{get_base_currency, id_for_account, id_for_user, parse_date, parse_decimal, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, params};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("rm", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            transfer::delete_transfer(conn, id)?;
            println!("Deleted transfer {} and both legs", id);
        }
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn add(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user_id = id_for_user(conn, sub.get_one::<String>("user").unwrap())?;
    let source = id_for_account(conn, user_id, sub.get_one::<String>("from").unwrap())?;
    let dest = id_for_account(conn, user_id, sub.get_one::<String>("to").unwrap())?;
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
    let date = parse_date(sub.get_one::<String>("date").unwrap())?;

    let req = TransferRequest {
        user_id,
        source_account_id: source,
        destination_account_id: dest,
        amount,
        destination_amount: sub
            .get_one::<String>("dest-amount")
            .map(|s| parse_decimal(s))
            .transpose()?,
        category_id: None,
        date,
        description: sub.get_one::<String>("description").cloned(),
        reference: None,
    };

    let source_ccy: String = conn.query_row(
        "SELECT currency FROM accounts WHERE id=?1",
        params![source],
        |r| r.get(0),
    )?;
    let dest_ccy: String = conn.query_row(
        "SELECT currency FROM accounts WHERE id=?1",
        params![dest],
        |r| r.get(0),
    )?;

    let outcome = if source_ccy == dest_ccy {
        transfer::create_same_currency(conn, &req)?
    } else {
        let base = get_base_currency(conn)?;
        let mut rates = RateProvider::new(
            HttpRateSource::new(super::fx::DEFAULT_RATE_API)?,
            &base,
        );
        let realtime = sub.get_flag("realtime");
        transfer::create_cross_currency(conn, &req, realtime, &mut rates)?
    };
    println!(
        "Transfer {} settled (legs {} -> {})",
        outcome.transfer_id, outcome.source_transaction_id, outcome.destination_transaction_id
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user_id = id_for_user(conn, sub.get_one::<String>("user").unwrap())?;
    let mut stmt = conn.prepare(
        "SELECT x.id, ts.date, sa.name, da.name, ts.amount, td.amount,
                x.exchange_rate, x.used_real_time_rate
         FROM transfers x
         JOIN transactions ts ON ts.id = x.source_transaction_id
         JOIN transactions td ON td.id = x.destination_transaction_id
         JOIN accounts sa ON sa.id = ts.account_id
         JOIN accounts da ON da.id = td.account_id
         WHERE sa.user_id=?1 AND ts.deleted_at IS NULL
         ORDER BY ts.date DESC, x.id DESC",
    )?;
    let rows = stmt.query_map(params![user_id], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
            r.get::<_, Option<String>>(6)?,
            r.get::<_, bool>(7)?,
        ))
    })?;
    let mut data = Vec::new();
    for row in rows {
        let (id, date, from, to, out_amt, in_amt, rate, rt) = row?;
        data.push(vec![
            id.to_string(),
            date,
            from,
            to,
            out_amt,
            in_amt,
            rate.unwrap_or_default(),
            if rt { "live".into() } else { String::new() },
        ]);
    }
    println!(
        "{}",
        pretty_table(&["Id", "Date", "From", "To", "Out", "In", "Rate", ""], data)
    );
    Ok(())
}
