// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store::LedgerStore;
use crate::utils::pretty_table;
use anyhow::{Result, anyhow};
use regex::Regex;
use rusqlite::params;

pub fn handle(store: &LedgerStore, m: &clap::ArgMatches) -> Result<()> {
    let conn = store.connection();
    match m.subcommand() {
        Some(("add", sub)) => {
            let pattern_raw = sub.get_one::<String>("pattern").unwrap();
            let pattern = pattern_raw.trim();
            Regex::new(pattern)
                .map_err(|err| anyhow!("Invalid regex pattern '{}': {}", pattern, err))?;

            let category = sub
                .get_one::<String>("category")
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());
            let counterparty = sub
                .get_one::<String>("counterparty")
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());
            if category.is_none() && counterparty.is_none() {
                return Err(anyhow!("A rule needs --category or --counterparty"));
            }
            conn.execute(
                "INSERT INTO rules(pattern, category, counterparty) VALUES (?1,?2,?3)",
                params![pattern, category, counterparty],
            )?;
            println!(
                "Added rule: /{}/ -> category {:?}, counterparty {:?}",
                pattern, category, counterparty
            );
        }
        Some(("list", _)) => {
            let mut stmt = conn.prepare(
                "SELECT id, pattern, COALESCE(category,''), COALESCE(counterparty,'') \
                 FROM rules ORDER BY id DESC",
            )?;
            let rows = stmt.query_map([], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?;
            let mut data = Vec::new();
            for row in rows {
                let (id, pat, cat, cp) = row?;
                data.push(vec![id.to_string(), pat, cat, cp]);
            }
            println!(
                "{}",
                pretty_table(&["ID", "Pattern", "Category", "Counterparty"], data)
            );
        }
        Some(("rm", sub)) => {
            let raw = sub.get_one::<String>("id").unwrap();
            let id = raw.trim().parse::<i64>()?;
            conn.execute("DELETE FROM rules WHERE id=?1", params![id])?;
            println!("Removed rule {}", id);
        }
        _ => {}
    }
    Ok(())
}
