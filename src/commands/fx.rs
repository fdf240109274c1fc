// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::rates::{HttpRateSource, RateProvider};
use crate::utils::{get_base_currency, parse_decimal, pretty_table, set_base_currency};
use anyhow::Result;
use rusqlite::Connection;

pub const DEFAULT_RATE_API: &str = "https://api.exchangerate.host";

fn provider(conn: &Connection) -> Result<RateProvider<HttpRateSource>> {
    let base = get_base_currency(conn)?;
    Ok(RateProvider::new(
        HttpRateSource::new(DEFAULT_RATE_API)?,
        &base,
    ))
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set-base", sub)) => {
            let ccy = sub.get_one::<String>("currency").unwrap().to_uppercase();
            set_base_currency(conn, &ccy)?;
            println!("Base currency set to {}", ccy);
        }
        Some(("rate", sub)) => {
            let from = sub.get_one::<String>("from").unwrap().to_uppercase();
            let to = sub.get_one::<String>("to").unwrap().to_uppercase();
            match provider(conn)?.get_rate(&from, &to) {
                Some(rate) => println!("1 {} = {} {}", from, rate, to),
                None => println!("No rate available for {} -> {}", from, to),
            }
        }
        Some(("convert", sub)) => {
            let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
            let from = sub.get_one::<String>("from").unwrap().to_uppercase();
            let to = sub.get_one::<String>("to").unwrap().to_uppercase();
            match provider(conn)?.convert(amount, &from, &to) {
                Some(v) => println!("{} {} -> {} {}", amount, from, v, to),
                None => println!("No rate available for {} -> {}", from, to),
            }
        }
        Some(("symbols", _)) => match provider(conn)?.supported() {
            Some(codes) => {
                let rows = codes.into_iter().map(|c| vec![c]).collect();
                println!("{}", pretty_table(&["Code"], rows));
            }
            None => println!("Symbol list unavailable"),
        },
        _ => {}
    }
    Ok(())
}
