// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::budget::{self, Health, NewBudget, Trend};
use crate::models::PeriodType;
use crate::utils::{
    id_for_account, id_for_category, id_for_user, maybe_print_json, parse_date, parse_decimal,
    pretty_table,
};
use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, params};
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("check", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let emitted = budget::check_alerts(conn, id, Utc::now())?;
            let b = budget::get_budget(conn, id)?;
            println!(
                "Budget {}: spent {} of {} ({}%), {} alert(s) emitted",
                id,
                b.spent_amount,
                b.amount,
                b.spent_percentage().round_dp(1),
                emitted.len()
            );
        }
        Some(("renew", _)) => {
            let n = budget::renew_expired(conn, Utc::now().date_naive())?;
            println!("Processed {} expired budget(s)", n);
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user_id = id_for_user(conn, sub.get_one::<String>("user").unwrap())?;
    let category_id = id_for_category(conn, sub.get_one::<String>("category").unwrap())?;
    let account_id = sub
        .get_one::<String>("account")
        .map(|name| id_for_account(conn, user_id, name))
        .transpose()?;
    let period = PeriodType::parse(sub.get_one::<String>("period").unwrap())?;
    let new = NewBudget {
        user_id,
        account_id,
        category_id,
        currency: sub.get_one::<String>("currency").unwrap().to_uppercase(),
        amount: parse_decimal(sub.get_one::<String>("amount").unwrap())?,
        period_type: period,
        start_date: parse_date(sub.get_one::<String>("start").unwrap())?,
        end_date: sub
            .get_one::<String>("end")
            .map(|s| parse_date(s))
            .transpose()?,
        auto_renew: sub.get_flag("auto-renew"),
        alert_threshold: sub
            .get_one::<String>("threshold")
            .map(|s| parse_decimal(s))
            .transpose()?,
        alert_enabled: true,
    };
    let id = budget::create_budget(conn, &new)?;
    println!("Budget {} created ({} {})", id, new.amount, new.currency);
    Ok(())
}

#[derive(Serialize)]
struct BudgetRow {
    id: i64,
    category: String,
    amount: String,
    spent: String,
    percentage: String,
    health: String,
    trend: String,
    projected: String,
    window: String,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let user_id = id_for_user(conn, sub.get_one::<String>("user").unwrap())?;
    let today = Utc::now().date_naive();

    let mut stmt = conn.prepare(
        "SELECT b.id, c.name FROM budgets b JOIN categories c ON b.category_id=c.id
         WHERE b.user_id=?1 ORDER BY b.start_date DESC, c.name",
    )?;
    let ids: Vec<(i64, String)> = stmt
        .query_map(params![user_id], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<std::result::Result<_, _>>()?;

    let mut data = Vec::new();
    for (id, category) in ids {
        budget::recompute_spent(conn, id)?;
        let b = budget::get_budget(conn, id)?;
        let health = match budget::classify(&b) {
            Health::OnTrack => "on track",
            Health::NearThreshold => "near threshold",
            Health::Exceeded => "exceeded",
        };
        let trend = match budget::trend(&b, today) {
            Trend::NotStarted => "not started",
            Trend::Overspending => "overspending",
            Trend::Underspending => "underspending",
            Trend::OnTrack => "on track",
        };
        data.push(BudgetRow {
            id,
            category,
            amount: b.amount.to_string(),
            spent: b.spent_amount.to_string(),
            percentage: b.spent_percentage().round_dp(1).to_string(),
            health: health.into(),
            trend: trend.into(),
            projected: budget::project_spending(&b, today).round_dp(2).to_string(),
            window: format!("{}..{}", b.start_date, b.end_date),
        });
    }

    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.category.clone(),
                    r.amount.clone(),
                    r.spent.clone(),
                    format!("{}%", r.percentage),
                    r.health.clone(),
                    r.trend.clone(),
                    r.projected.clone(),
                    r.window.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Id", "Category", "Cap", "Spent", "%", "Health", "Trend", "Projected", "Window"],
                rows,
            )
        );
    }
    Ok(())
}
