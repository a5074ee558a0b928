// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db;
use crate::error::LedgerError;
use crate::models::{AugmentedData, LedgerItem, LedgerItemType};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use rusqlite::{Connection, ErrorCode, params};
use std::collections::BTreeMap;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Behavior when an inserted tx_id already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail the whole batch, leaving no partial rows.
    Raise,
    /// Overwrite the existing row; used when the remote is authoritative.
    Replace,
    /// Keep the existing row untouched; surviving new rows are marked dirty.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    TxId,
    TxDatetime,
    Amount,
    Currency,
    Description,
    Account,
    LedgerItemType,
    ToSync,
    AmountEur,
    Counterparty,
    Category,
    SubCategory,
    EventName,
}

impl Field {
    fn column(self) -> &'static str {
        match self {
            Field::TxId => "li.tx_id",
            Field::TxDatetime => "li.tx_datetime",
            Field::Amount => "li.amount",
            Field::Currency => "li.currency",
            Field::Description => "li.description",
            Field::Account => "li.account",
            Field::LedgerItemType => "li.ledger_item_type",
            Field::ToSync => "li.to_sync",
            Field::AmountEur => "ad.amount_eur",
            Field::Counterparty => "ad.counterparty",
            Field::Category => "ad.category",
            Field::SubCategory => "ad.sub_category",
            Field::EventName => "ad.event_name",
        }
    }
}

/// One conjunct of a filter query.
#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(Field, String),
    Gte(Field, String),
    IsNull(Field, bool),
}

const SELECT_COLS: &str = "li.tx_id, li.tx_datetime, li.amount, li.currency, li.description, \
     li.account, li.ledger_item_type, li.to_sync, ad.amount_eur, ad.counterparty, \
     ad.category, ad.sub_category, ad.event_name";

/// Durable home for ledger items and their augmentation overlay.
///
/// Every write method runs inside one enclosing transaction: a batch either
/// fully commits or fully rolls back.
pub struct LedgerStore {
    conn: Connection,
}

impl LedgerStore {
    pub fn open_default() -> Result<Self> {
        Ok(LedgerStore {
            conn: db::open_or_init()?,
        })
    }

    /// Wrap an existing connection, running migrations first.
    pub fn from_connection(mut conn: Connection) -> Result<Self> {
        db::migrate(&mut conn)?;
        Ok(LedgerStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn insert(&mut self, items: &[LedgerItem], policy: DuplicatePolicy) -> Result<()> {
        let verb = match policy {
            DuplicatePolicy::Raise => "INSERT",
            DuplicatePolicy::Replace => "INSERT OR REPLACE",
            DuplicatePolicy::Skip => "INSERT OR IGNORE",
        };
        let sql = format!(
            "{} INTO ledger_items(tx_id, tx_datetime, amount, currency, description, \
             account, ledger_item_type, to_sync) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            verb
        );

        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        let mut overlays: Vec<AugmentedData> = Vec::new();
        for item in items {
            let to_sync = match policy {
                DuplicatePolicy::Skip => true,
                DuplicatePolicy::Replace => false,
                DuplicatePolicy::Raise => item.to_sync,
            };
            let result = tx.execute(
                &sql,
                params![
                    item.tx_id,
                    item.tx_datetime.format(DATETIME_FORMAT).to_string(),
                    item.amount.to_string(),
                    item.currency,
                    item.description,
                    item.account,
                    item.ledger_item_type.as_str(),
                    to_sync,
                ],
            );
            match result {
                // overlays only for rows that landed; a row skipped as a
                // duplicate keeps its own augmentation
                Ok(n) => {
                    inserted += n;
                    if n > 0 {
                        if let Some(ad) = &item.augmented_data {
                            if !ad.is_empty() {
                                overlays.push(ad.clone());
                            }
                        }
                    }
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(LedgerError::DuplicateItem(item.tx_id.clone()).into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        apply_overlays(&tx, &overlays)?;

        tx.commit()?;
        tracing::debug!(inserted, total = items.len(), "stored ledger items");
        Ok(())
    }

    /// Field-level overlay merge: every non-empty field is set
    /// unconditionally (last writer wins per field); unset fields never
    /// clobber present values. Empty overlays are skipped entirely.
    pub fn set_augmented_data(&mut self, overlays: &[AugmentedData]) -> Result<()> {
        let tx = self.conn.transaction()?;
        apply_overlays(&tx, overlays)?;
        tx.commit()?;
        Ok(())
    }

    /// Items matching the conjunction of the given predicates.
    pub fn filter(&self, predicates: &[Predicate]) -> Result<Vec<LedgerItem>> {
        let mut sql = format!(
            "SELECT {} FROM ledger_items li \
             LEFT JOIN augmented_data ad ON ad.tx_id = li.tx_id WHERE 1=1",
            SELECT_COLS
        );
        let mut binds: Vec<String> = Vec::new();
        for predicate in predicates {
            match predicate {
                Predicate::Eq(field, value) => {
                    sql.push_str(&format!(" AND {} = ?", field.column()));
                    binds.push(value.clone());
                }
                Predicate::Gte(field, value) => {
                    sql.push_str(&format!(" AND {} >= ?", field.column()));
                    binds.push(value.clone());
                }
                Predicate::IsNull(field, true) => {
                    sql.push_str(&format!(" AND {} IS NULL", field.column()));
                }
                Predicate::IsNull(field, false) => {
                    sql.push_str(&format!(" AND {} IS NOT NULL", field.column()));
                }
            }
        }
        sql.push_str(" ORDER BY li.tx_datetime, li.tx_id");
        self.query_items(&sql, &binds)
    }

    pub fn get_month_data(&self, month: &str) -> Result<Vec<LedgerItem>> {
        let sql = format!(
            "SELECT {} FROM ledger_items li \
             LEFT JOIN augmented_data ad ON ad.tx_id = li.tx_id \
             WHERE strftime('%Y-%m', li.tx_datetime) = ? \
             ORDER BY li.tx_datetime, li.tx_id",
            SELECT_COLS
        );
        self.query_items(&sql, &[month.to_string()])
    }

    /// Dirty items grouped by month, months ascending; the push catch-up path.
    pub fn get_updated_data_by_month(&self) -> Result<BTreeMap<String, Vec<LedgerItem>>> {
        let sql = format!(
            "SELECT {} FROM ledger_items li \
             LEFT JOIN augmented_data ad ON ad.tx_id = li.tx_id \
             WHERE li.to_sync = 1 ORDER BY li.tx_datetime, li.tx_id",
            SELECT_COLS
        );
        let mut by_month: BTreeMap<String, Vec<LedgerItem>> = BTreeMap::new();
        for item in self.query_items(&sql, &[])? {
            by_month.entry(item.month()).or_default().push(item);
        }
        Ok(by_month)
    }

    /// Distinct months present locally, ascending.
    pub fn months(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT strftime('%Y-%m', tx_datetime) FROM ledger_items ORDER BY 1",
        )?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut months = Vec::new();
        for row in rows {
            months.push(row?);
        }
        Ok(months)
    }

    pub fn mark_synced(&mut self, month: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE ledger_items SET to_sync = 0 WHERE strftime('%Y-%m', tx_datetime) = ?1",
            params![month],
        )?;
        Ok(())
    }

    pub fn mark_dirty(&mut self, tx_ids: &[String]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for tx_id in tx_ids {
            tx.execute(
                "UPDATE ledger_items SET to_sync = 1 WHERE tx_id = ?1",
                params![tx_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn delete(&mut self, tx_ids: &[String]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for tx_id in tx_ids {
            tx.execute("DELETE FROM augmented_data WHERE tx_id = ?1", params![tx_id])?;
            tx.execute("DELETE FROM ledger_items WHERE tx_id = ?1", params![tx_id])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Full-table CSV export for backup/audit; not part of the sync protocol.
    pub fn dump(&self, table: &str) -> Result<String> {
        if table != "ledger_items" && table != "augmented_data" {
            return Err(anyhow!("Unknown table '{}'", table));
        }
        let mut stmt = self.conn.prepare(&format!("SELECT * FROM {}", table))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(&columns)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut record: Vec<String> = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let value: rusqlite::types::Value = row.get(i)?;
                record.push(match value {
                    rusqlite::types::Value::Null => String::new(),
                    rusqlite::types::Value::Integer(v) => v.to_string(),
                    rusqlite::types::Value::Real(v) => v.to_string(),
                    rusqlite::types::Value::Text(v) => v,
                    rusqlite::types::Value::Blob(_) => String::new(),
                });
            }
            wtr.write_record(&record)?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| anyhow!("Flushing {} dump: {}", table, e))?;
        Ok(String::from_utf8(bytes)?)
    }

    fn query_items(&self, sql: &str, binds: &[String]) -> Result<Vec<LedgerItem>> {
        let mut stmt = self.conn.prepare(sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            binds.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(item_from_row(row)?);
        }
        Ok(items)
    }
}

fn apply_overlays(conn: &Connection, overlays: &[AugmentedData]) -> Result<()> {
    for overlay in overlays.iter().filter(|ad| !ad.is_empty()) {
        conn.execute(
            "INSERT OR IGNORE INTO augmented_data(tx_id) VALUES (?1)",
            params![overlay.tx_id],
        )?;
        if let Some(v) = &overlay.amount_eur {
            conn.execute(
                "UPDATE augmented_data SET amount_eur = ?1 WHERE tx_id = ?2",
                params![v.to_string(), overlay.tx_id],
            )?;
        }
        if let Some(v) = &overlay.counterparty {
            conn.execute(
                "UPDATE augmented_data SET counterparty = ?1 WHERE tx_id = ?2",
                params![v, overlay.tx_id],
            )?;
        }
        if let Some(v) = &overlay.category {
            conn.execute(
                "UPDATE augmented_data SET category = ?1 WHERE tx_id = ?2",
                params![v, overlay.tx_id],
            )?;
        }
        if let Some(v) = &overlay.sub_category {
            conn.execute(
                "UPDATE augmented_data SET sub_category = ?1 WHERE tx_id = ?2",
                params![v, overlay.tx_id],
            )?;
        }
        if let Some(v) = &overlay.event_name {
            conn.execute(
                "UPDATE augmented_data SET event_name = ?1 WHERE tx_id = ?2",
                params![v, overlay.tx_id],
            )?;
        }
    }
    Ok(())
}

fn item_from_row(row: &rusqlite::Row) -> Result<LedgerItem> {
    let tx_id: String = row.get(0)?;
    let raw_datetime: String = row.get(1)?;
    let raw_amount: String = row.get(2)?;
    let currency: String = row.get(3)?;
    let description: String = row.get(4)?;
    let account: String = row.get(5)?;
    let raw_type: String = row.get(6)?;
    let to_sync: bool = row.get(7)?;
    let raw_eur: Option<String> = row.get(8)?;
    let counterparty: Option<String> = row.get(9)?;
    let category: Option<String> = row.get(10)?;
    let sub_category: Option<String> = row.get(11)?;
    let event_name: Option<String> = row.get(12)?;

    let tx_datetime = NaiveDateTime::parse_from_str(&raw_datetime, DATETIME_FORMAT)
        .with_context(|| format!("Invalid stored datetime '{}'", raw_datetime))?;
    let amount = raw_amount
        .parse()
        .with_context(|| format!("Invalid stored amount '{}'", raw_amount))?;
    let amount_eur = match raw_eur {
        Some(s) => Some(
            s.parse()
                .with_context(|| format!("Invalid stored amount_eur '{}'", s))?,
        ),
        None => None,
    };

    let augmented = AugmentedData {
        tx_id: tx_id.clone(),
        amount_eur,
        counterparty,
        category,
        sub_category,
        event_name,
    };
    Ok(LedgerItem {
        tx_id,
        tx_datetime,
        amount,
        currency,
        description,
        account,
        ledger_item_type: LedgerItemType::parse(&raw_type)?,
        to_sync,
        augmented_data: if augmented.is_empty() {
            None
        } else {
            Some(augmented)
        },
    })
}
