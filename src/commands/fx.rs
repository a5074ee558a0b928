// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store::LedgerStore;
use crate::utils::{http_client, pretty_table};
use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, params};
use serde::Deserialize;

pub fn handle(store: &LedgerStore, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("fetch", sub)) => {
            let days: usize = *sub.get_one::<usize>("days").unwrap_or(&120);
            fetch_rates(store.connection(), days)?;
        }
        Some(("list", _)) => list_rates(store.connection())?,
        _ => {}
    }
    Ok(())
}

fn distinct_currencies(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT currency FROM ledger_items WHERE currency != 'EUR'")?;
    let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        let c: String = row?;
        if !c.is_empty() {
            out.push(c);
        }
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct Series {
    rates: std::collections::HashMap<String, std::collections::HashMap<String, f64>>,
    #[serde(rename = "base")]
    _base: String,
}

/// Fetch EUR-based daily rates for every non-EUR currency in the ledger.
fn fetch_rates(conn: &Connection, days: usize) -> Result<()> {
    let today = Utc::now().date_naive();
    let start = today - chrono::Duration::days(days as i64);
    let targets = distinct_currencies(conn)?;
    if targets.is_empty() {
        println!("No non-EUR currencies found; nothing to fetch.");
        return Ok(());
    }
    let to_param = targets.join(",");
    let url = format!("https://api.frankfurter.dev/{start}..{today}?from=EUR&to={to_param}");
    let client = http_client()?;
    let resp = client.get(url).send()?.error_for_status()?;
    let s: Series = resp.json()?;
    for (date, mp) in s.rates {
        for (quote, rate) in mp {
            conn.execute(
                "INSERT OR IGNORE INTO fx_rates(date, quote, rate) VALUES (?1, ?2, ?3)",
                params![date, quote, rate.to_string()],
            )?;
        }
    }
    println!("FX rates fetched via Frankfurter (ECB).");
    Ok(())
}

fn list_rates(conn: &Connection) -> Result<()> {
    let mut stmt = conn
        .prepare("SELECT date, quote, rate FROM fx_rates ORDER BY date DESC, quote LIMIT 50")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
        ))
    })?;
    let mut data = Vec::new();
    for row in rows {
        let (d, q, r) = row?;
        data.push(vec![d, "EUR".to_string(), q, r]);
    }
    println!("{}", pretty_table(&["Date", "Base", "Quote", "Rate"], data));
    Ok(())
}
