// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Ledgersync", "ledgersync"));

pub fn db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("ledgersync.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let mut conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    migrate(&mut conn)?;
    Ok(conn)
}

/// Numbered migrations, applied in strict ascending order, each exactly
/// once. `PRAGMA user_version` records the last applied number.
const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        r#"
    CREATE TABLE ledger_items(
        tx_id TEXT PRIMARY KEY,
        tx_datetime TEXT NOT NULL,
        amount TEXT NOT NULL,
        currency TEXT NOT NULL,
        description TEXT NOT NULL,
        account TEXT NOT NULL,
        ledger_item_type TEXT NOT NULL,
        to_sync INTEGER NOT NULL DEFAULT 0
    );
    "#,
    ),
    (
        2,
        r#"
    CREATE TABLE augmented_data(
        tx_id TEXT PRIMARY KEY REFERENCES ledger_items(tx_id),
        amount_eur TEXT,
        counterparty TEXT,
        category TEXT,
        sub_category TEXT,
        event_name TEXT
    );
    "#,
    ),
    (
        3,
        r#"
    CREATE TABLE settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    -- EUR rates per day: 1 EUR = rate quote
    CREATE TABLE fx_rates(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        quote TEXT NOT NULL,
        rate TEXT NOT NULL,
        UNIQUE(date, quote)
    );
    "#,
    ),
    (
        4,
        "CREATE INDEX idx_ledger_items_datetime ON ledger_items(tx_datetime);",
    ),
    (
        5,
        r#"
    CREATE TABLE rules(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pattern TEXT NOT NULL,
        category TEXT,
        counterparty TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    ),
];

pub fn migrate(conn: &mut Connection) -> Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    for &(version, sql) in MIGRATIONS {
        if version > current {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .with_context(|| format!("Migration {} failed", version))?;
            tx.execute_batch(&format!("PRAGMA user_version = {}", version))?;
            tx.commit()?;
        }
    }
    Ok(())
}
