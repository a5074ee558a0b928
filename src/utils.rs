// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

const UA: &str = concat!(
    "ledgersync/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/alphavelocity/ledgersync)"
);

pub fn http_client() -> Result<reqwest::blocking::Client> {
    let c = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .user_agent(UA)
        .build()?;
    Ok(c)
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt);
    }
    parse_date(s)
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .with_context(|| format!("Invalid datetime '{}'", s))
}

pub fn parse_month(s: &str) -> Result<String> {
    year_month(s)?;
    Ok(s.to_string())
}

fn year_month(s: &str) -> Result<(i32, u32)> {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() == 2 {
        let y: i32 = parts[0].parse().unwrap_or(0);
        let m: u32 = parts[1].parse().unwrap_or(0);
        if parts[0].len() == 4 && parts[1].len() == 2 && (1..=12).contains(&m) {
            return Ok((y, m));
        }
    }
    Err(anyhow!("Invalid month '{}', expected YYYY-MM", s))
}

fn fmt_month(year: i32, month: u32) -> String {
    format!("{:04}-{:02}", year, month)
}

fn previous(year: i32, month: u32) -> (i32, u32) {
    if month == 1 { (year - 1, 12) } else { (year, month - 1) }
}

fn next(year: i32, month: u32) -> (i32, u32) {
    if month == 12 { (year + 1, 1) } else { (year, month + 1) }
}

/// The current month and the n-1 before it, ascending.
pub fn trailing_months(n: usize) -> Vec<String> {
    let today = chrono::Local::now().date_naive();
    let (mut y, mut m) = (today.year(), today.month());
    let mut months = Vec::with_capacity(n);
    for _ in 0..n {
        months.push(fmt_month(y, m));
        (y, m) = previous(y, m);
    }
    months.reverse();
    months
}

/// Resolve the shared month-selection option set into a sorted,
/// de-duplicated list. Empty when nothing was selected; each command
/// picks its own default window in that case.
pub fn resolve_months(
    month: Option<&str>,
    last: Option<usize>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Vec<String>> {
    if let Some(m) = month {
        return Ok(vec![parse_month(m.trim())?]);
    }
    let mut months = BTreeSet::new();
    if let Some(n) = last {
        months.extend(trailing_months(n));
    }
    if let Some(start) = from {
        let (mut y, mut m) = year_month(start.trim())?;
        let end = match to {
            Some(t) => parse_month(t.trim())?,
            None => {
                let today = chrono::Local::now().date_naive();
                fmt_month(today.year(), today.month())
            }
        };
        while fmt_month(y, m) <= end {
            months.insert(fmt_month(y, m));
            (y, m) = next(y, m);
        }
    } else if to.is_some() {
        return Err(anyhow!("--to requires --from"));
    }
    Ok(months.into_iter().collect())
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

// Spreadsheet settings
pub fn get_sheet_id(conn: &Connection) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key='sheet_id'",
            [],
            |r| r.get(0),
        )
        .optional()?;
    Ok(v)
}

pub fn set_sheet_id(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES('sheet_id', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![id],
    )?;
    Ok(())
}
