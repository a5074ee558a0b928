// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::LedgerError;
use crate::models::{AugmentedData, FIELD_ORDER, LedgerItem, LedgerItemType};
use crate::utils::http_client;
use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Explicit remote configuration; passed in, never read from globals.
#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    pub token: String,
    pub base_url: String,
}

impl SheetConfig {
    pub fn new(spreadsheet_id: &str, token: &str) -> Self {
        SheetConfig {
            spreadsheet_id: spreadsheet_id.to_string(),
            token: token.to_string(),
            base_url: "https://sheets.googleapis.com".to_string(),
        }
    }
}

/// The physical boundary to the spreadsheet service. Tests substitute a
/// recording fake; production uses [`HttpTransport`].
pub trait SheetTransport {
    fn batch_update(&mut self, data: &[(String, Vec<Vec<String>>)]) -> Result<()>;
    fn batch_clear(&mut self, ranges: &[String]) -> Result<()>;
    fn append(&mut self, range: &str, values: &[Vec<String>]) -> Result<()>;
    fn get_values(&mut self, range: &str) -> Result<Vec<Vec<String>>>;
    fn sheet_titles(&mut self) -> Result<Vec<String>>;
    fn add_sheet(&mut self, title: &str) -> Result<()>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    config: SheetConfig,
}

impl HttpTransport {
    pub fn new(config: SheetConfig) -> Result<Self> {
        Ok(HttpTransport {
            client: http_client()?,
            config,
        })
    }

    fn values_url(&self, suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values{}",
            self.config.base_url, self.config.spreadsheet_id, suffix
        )
    }

    fn post(&self, url: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .map_err(remote_err)?
            .error_for_status()
            .map_err(remote_err)?;
        resp.json().map_err(remote_err)
    }

    fn get(&self, url: &str) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.config.token)
            .send()
            .map_err(remote_err)?
            .error_for_status()
            .map_err(remote_err)?;
        resp.json().map_err(remote_err)
    }
}

fn remote_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    LedgerError::RemoteUnavailable(e.to_string()).into()
}

/// Minimal percent-encoding for A1 ranges in a URL path ('ledger 2024-03'!2:9999).
fn encode_range(range: &str) -> String {
    range
        .replace('%', "%25")
        .replace(' ', "%20")
        .replace('\'', "%27")
        .replace('!', "%21")
}

#[derive(Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

fn cell_to_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl SheetTransport for HttpTransport {
    fn batch_update(&mut self, data: &[(String, Vec<Vec<String>>)]) -> Result<()> {
        let body = json!({
            "valueInputOption": "USER_ENTERED",
            "data": data
                .iter()
                .map(|(range, values)| json!({"range": range, "values": values}))
                .collect::<Vec<_>>(),
        });
        self.post(&self.values_url(":batchUpdate"), body)?;
        Ok(())
    }

    fn batch_clear(&mut self, ranges: &[String]) -> Result<()> {
        self.post(&self.values_url(":batchClear"), json!({ "ranges": ranges }))?;
        Ok(())
    }

    fn append(&mut self, range: &str, values: &[Vec<String>]) -> Result<()> {
        let url = format!(
            "{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            self.values_url(&format!("/{}", encode_range(range)))
        );
        self.post(&url, json!({ "values": values }))?;
        Ok(())
    }

    fn get_values(&mut self, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(&format!("/{}", encode_range(range)));
        let parsed: ValuesResponse = serde_json::from_value(self.get(&url)?).map_err(remote_err)?;
        Ok(parsed
            .values
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    fn sheet_titles(&mut self) -> Result<Vec<String>> {
        let url = format!(
            "{}/v4/spreadsheets/{}?fields=sheets.properties.title",
            self.config.base_url, self.config.spreadsheet_id
        );
        let parsed: SpreadsheetResponse =
            serde_json::from_value(self.get(&url)?).map_err(remote_err)?;
        Ok(parsed.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    fn add_sheet(&mut self, title: &str) -> Result<()> {
        let url = format!(
            "{}/v4/spreadsheets/{}:batchUpdate",
            self.config.base_url, self.config.spreadsheet_id
        );
        let body = json!({
            "requests": [{"addSheet": {"properties": {"title": title}}}],
        });
        self.post(&url, body)?;
        Ok(())
    }
}

/// One queued spreadsheet operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetOp {
    Update {
        range: String,
        values: Vec<Vec<String>>,
    },
    Append {
        range: String,
        values: Vec<Vec<String>>,
    },
    Clear {
        range: String,
    },
}

/// Operation queue over a transport.
///
/// Nothing touches the network until `flush()`, which coalesces each
/// maximal run of consecutive same-type operations into one batched call
/// and spaces physical calls to respect the service rate limit.
pub struct SheetSession<T: SheetTransport> {
    transport: T,
    queue: Vec<SheetOp>,
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl<T: SheetTransport> SheetSession<T> {
    pub fn new(transport: T) -> Self {
        Self::with_min_interval(transport, Duration::from_secs(1))
    }

    pub fn with_min_interval(transport: T, min_interval: Duration) -> Self {
        SheetSession {
            transport,
            queue: Vec::new(),
            min_interval,
            last_call: None,
        }
    }

    pub fn update(&mut self, range: &str, values: Vec<Vec<String>>) {
        self.queue.push(SheetOp::Update {
            range: range.to_string(),
            values,
        });
    }

    pub fn append(&mut self, range: &str, values: Vec<Vec<String>>) {
        self.queue.push(SheetOp::Append {
            range: range.to_string(),
            values,
        });
    }

    pub fn clear(&mut self, range: &str) {
        self.queue.push(SheetOp::Clear {
            range: range.to_string(),
        });
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Discard still-queued operations. Batches already dispatched by a
    /// previous or failing `flush()` stay applied remotely.
    pub fn rollback(&mut self) {
        if !self.queue.is_empty() {
            tracing::debug!(discarded = self.queue.len(), "rolling back queued sheet ops");
        }
        self.queue.clear();
    }

    /// Dispatch the queue in original order. On failure the failed batch
    /// and everything after it stay queued so the caller can decide to
    /// roll them back.
    pub fn flush(&mut self) -> Result<()> {
        let ops = std::mem::take(&mut self.queue);
        let mut i = 0;
        while i < ops.len() {
            let start = i;
            let result = match &ops[i] {
                SheetOp::Update { .. } => {
                    let mut data = Vec::new();
                    while let Some(SheetOp::Update { range, values }) = ops.get(i) {
                        data.push((range.clone(), values.clone()));
                        i += 1;
                    }
                    self.throttle();
                    self.transport.batch_update(&data)
                }
                SheetOp::Clear { .. } => {
                    let mut ranges = Vec::new();
                    while let Some(SheetOp::Clear { range }) = ops.get(i) {
                        ranges.push(range.clone());
                        i += 1;
                    }
                    self.throttle();
                    self.transport.batch_clear(&ranges)
                }
                SheetOp::Append { range, .. } => {
                    let range = range.clone();
                    let mut values = Vec::new();
                    while let Some(SheetOp::Append {
                        range: next_range,
                        values: next_values,
                    }) = ops.get(i)
                    {
                        if *next_range != range {
                            break;
                        }
                        values.extend(next_values.iter().cloned());
                        i += 1;
                    }
                    self.throttle();
                    self.transport.append(&range, &values)
                }
            };
            if let Err(e) = result {
                self.queue = ops[start..].to_vec();
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn get_values(&mut self, range: &str) -> Result<Vec<Vec<String>>> {
        self.throttle();
        self.transport.get_values(range)
    }

    pub fn sheet_titles(&mut self) -> Result<Vec<String>> {
        self.throttle();
        self.transport.sheet_titles()
    }

    pub fn add_sheet(&mut self, title: &str) -> Result<()> {
        self.throttle();
        self.transport.add_sheet(title)
    }

    fn throttle(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
    }
}

pub fn partition_name(month: &str) -> String {
    format!("ledger {}", month)
}

pub fn month_range(month: &str, cells: &str) -> String {
    format!("'{}'!{}", partition_name(month), cells)
}

/// Month-partitioned view of the remote table: one partition per month,
/// row 1 reserved for the header, data from row 2.
pub struct RemoteLedger<T: SheetTransport> {
    session: SheetSession<T>,
    months: Option<Vec<String>>,
}

impl<T: SheetTransport> RemoteLedger<T> {
    pub fn new(session: SheetSession<T>) -> Self {
        RemoteLedger {
            session,
            months: None,
        }
    }

    /// Months with a remote partition. Cached for this instance's lifetime,
    /// which is one sync call; callers must not assume freshness beyond it.
    pub fn get_months(&mut self) -> Result<Vec<String>> {
        if let Some(months) = &self.months {
            return Ok(months.clone());
        }
        let mut months: Vec<String> = self
            .session
            .sheet_titles()?
            .into_iter()
            .filter_map(|title| title.strip_prefix("ledger ").map(|m| m.to_string()))
            .collect();
        months.sort();
        self.months = Some(months.clone());
        Ok(months)
    }

    fn set_header(&mut self, month: &str) {
        let header = FIELD_ORDER.iter().map(|f| f.to_string()).collect();
        self.session
            .update(&month_range(month, "1:1"), vec![header]);
    }

    /// Leave the partition existing with a header and an empty body,
    /// whether or not it existed before.
    pub fn clear_month(&mut self, month: &str) -> Result<()> {
        if self.get_months()?.contains(&month.to_string()) {
            self.session.clear(&month_range(month, "1:9999"));
        } else {
            self.session.add_sheet(&partition_name(month))?;
            if let Some(months) = &mut self.months {
                months.push(month.to_string());
                months.sort();
            }
        }
        self.set_header(month);
        Ok(())
    }

    pub fn replace_month_data(&mut self, month: &str, items: &[LedgerItem]) -> Result<()> {
        self.clear_month(month)?;
        let values: Vec<Vec<String>> = items.iter().map(item_to_row).collect();
        if !values.is_empty() {
            self.session.append(&month_range(month, "2:2"), values);
        }
        Ok(())
    }

    /// Overlay the given items by tx_id onto the remote month and write the
    /// union back; remote rows the caller holds no opinion about survive.
    pub fn update_month_data(&mut self, month: &str, items: &[LedgerItem]) -> Result<()> {
        let existing = self.get_month_data(month)?;
        let mut order: Vec<String> = existing.iter().map(|i| i.tx_id.clone()).collect();
        let mut by_id: HashMap<String, LedgerItem> = existing
            .into_iter()
            .map(|item| (item.tx_id.clone(), item))
            .collect();
        for item in items {
            if !by_id.contains_key(&item.tx_id) {
                order.push(item.tx_id.clone());
            }
            by_id.insert(item.tx_id.clone(), item.clone());
        }
        let merged: Vec<LedgerItem> = order
            .iter()
            .filter_map(|tx_id| by_id.remove(tx_id))
            .collect();
        self.replace_month_data(month, &merged)
    }

    pub fn get_month_data(&mut self, month: &str) -> Result<Vec<LedgerItem>> {
        if !self.get_months()?.contains(&month.to_string()) {
            return Ok(Vec::new());
        }
        let rows = self.session.get_values(&month_range(month, "2:9999"))?;
        rows.iter()
            .map(|row| item_from_row(row))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Parsing remote rows for month {}", month))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.session.flush()
    }

    pub fn rollback(&mut self) {
        self.session.rollback()
    }
}

pub fn item_to_row(item: &LedgerItem) -> Vec<String> {
    let empty = AugmentedData::new(&item.tx_id);
    let ad = item.augmented_data.as_ref().unwrap_or(&empty);
    vec![
        item.tx_id.clone(),
        item.tx_datetime.format("%Y-%m-%dT%H:%M:%S").to_string(),
        item.amount.to_string(),
        item.currency.clone(),
        item.description.clone(),
        item.account.clone(),
        item.ledger_item_type.as_str().to_string(),
        ad.amount_eur.map(|d| d.to_string()).unwrap_or_default(),
        ad.counterparty.clone().unwrap_or_default(),
        ad.category.clone().unwrap_or_default(),
        ad.sub_category.clone().unwrap_or_default(),
        ad.event_name.clone().unwrap_or_default(),
    ]
}

/// Parse one data row in canonical field order. Items parsed from the
/// remote are clean; the dirty flag is local bookkeeping only.
pub fn item_from_row(row: &[String]) -> Result<LedgerItem> {
    let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");
    let tx_id = cell(0).to_string();
    if tx_id.is_empty() {
        return Err(anyhow!("Remote row has no tx_id: {:?}", row));
    }
    let tx_datetime = parse_sheet_datetime(cell(1))?;
    let amount = cell(2)
        .parse()
        .with_context(|| format!("Invalid remote amount '{}' for {}", cell(2), tx_id))?;
    let amount_eur = match cell(7) {
        "" => None,
        raw => Some(
            raw.parse()
                .with_context(|| format!("Invalid remote amount_eur '{}' for {}", raw, tx_id))?,
        ),
    };
    let non_empty = |i: usize| {
        let v = cell(i);
        if v.is_empty() { None } else { Some(v.to_string()) }
    };
    let augmented = AugmentedData {
        tx_id: tx_id.clone(),
        amount_eur,
        counterparty: non_empty(8),
        category: non_empty(9),
        sub_category: non_empty(10),
        event_name: non_empty(11),
    };
    Ok(LedgerItem {
        tx_id,
        tx_datetime,
        amount,
        currency: cell(3).to_string(),
        description: cell(4).to_string(),
        account: cell(5).to_string(),
        ledger_item_type: LedgerItemType::parse(cell(6))?,
        to_sync: false,
        augmented_data: if augmented.is_empty() {
            None
        } else {
            Some(augmented)
        },
    })
}

/// Datetime cells arrive either as a spreadsheet serial (day count from
/// 1899-12-30) or as an ISO-8601 string; serial is tried first. A cell
/// failing both fails the whole read with the raw value named, so a row
/// is never silently dropped.
pub fn parse_sheet_datetime(raw: &str) -> Result<NaiveDateTime> {
    if let (Ok(days), Some(epoch)) = (raw.parse::<f64>(), NaiveDate::from_ymd_opt(1899, 12, 30)) {
        let seconds = (days * 86_400.0).round() as i64;
        return Ok(epoch.and_time(NaiveTime::MIN) + chrono::Duration::seconds(seconds));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    Err(anyhow!("Unparseable datetime cell '{}'", raw))
}
