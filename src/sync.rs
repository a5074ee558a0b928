// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{AugmentedData, DELETE_SENTINEL, LedgerItem};
use crate::remote::{RemoteLedger, SheetTransport};
use crate::store::{DuplicatePolicy, Field, LedgerStore, Predicate};
use crate::utils::trailing_months;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Months pulled when none are named.
const DEFAULT_PULL_WINDOW: usize = 3;

/// Narrow seam to currency conversion; the conversion source itself is an
/// external collaborator.
pub trait RateProvider {
    /// EUR->currency rate closest on or before the date, if known.
    fn rate_to_eur(&self, currency: &str, date: NaiveDate) -> Result<Option<Decimal>>;
}

/// Rates from the local `fx_rates` table (maintained by `fx fetch`),
/// loaded up front so the provider does not hold the store's connection
/// during a pull.
pub struct StoredRates {
    by_quote: HashMap<String, Vec<(NaiveDate, Decimal)>>,
}

impl StoredRates {
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare("SELECT date, quote, rate FROM fx_rates ORDER BY date")?;
        let mut cur = stmt.query([])?;
        let mut by_quote: HashMap<String, Vec<(NaiveDate, Decimal)>> = HashMap::new();
        while let Some(r) = cur.next()? {
            let raw_date: String = r.get(0)?;
            let quote: String = r.get(1)?;
            let raw_rate: String = r.get(2)?;
            let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
                .with_context(|| format!("Invalid fx date '{}'", raw_date))?;
            let rate = raw_rate
                .parse()
                .with_context(|| format!("Invalid rate '{}' for EUR/{}", raw_rate, quote))?;
            by_quote.entry(quote).or_default().push((date, rate));
        }
        Ok(StoredRates { by_quote })
    }
}

impl RateProvider for StoredRates {
    fn rate_to_eur(&self, currency: &str, date: NaiveDate) -> Result<Option<Decimal>> {
        let Some(rates) = self.by_quote.get(currency) else {
            return Ok(None);
        };
        Ok(rates
            .iter()
            .rev()
            .find(|(rate_date, _)| *rate_date <= date)
            .map(|(_, rate)| *rate))
    }
}

/// Local -> remote, month by month.
///
/// Named months replace their partition wholesale (bounded resync); an
/// empty list means incremental catch-up of every month holding dirty
/// items, merged by tx_id so unrelated remote rows survive. Each month is
/// marked synced only after its batches were confirmed flushed; a failure
/// leaves the in-flight month dirty and later months untouched.
pub fn push<T: SheetTransport>(
    store: &mut LedgerStore,
    remote: &mut RemoteLedger<T>,
    months: &[String],
) -> Result<()> {
    if !months.is_empty() {
        for month in months {
            let items = store.get_month_data(month)?;
            tracing::info!(%month, items = items.len(), "pushing month (replace)");
            push_month(store, remote, month, |remote| {
                remote.replace_month_data(month, &items)
            })?;
        }
        return Ok(());
    }
    for (month, items) in store.get_updated_data_by_month()? {
        tracing::info!(%month, items = items.len(), "pushing month (merge)");
        push_month(store, remote, &month, |remote| {
            remote.update_month_data(&month, &items)
        })?;
    }
    Ok(())
}

fn push_month<T, F>(
    store: &mut LedgerStore,
    remote: &mut RemoteLedger<T>,
    month: &str,
    write: F,
) -> Result<()>
where
    T: SheetTransport,
    F: FnOnce(&mut RemoteLedger<T>) -> Result<()>,
{
    let result = match write(remote) {
        Ok(()) => remote.flush(),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        remote.rollback();
        return Err(e).with_context(|| format!("Pushing month {}", month));
    }
    store.mark_synced(month)
}

/// Remote -> local for the given months (default: trailing 3).
///
/// The remote is authoritative: base rows come back with the Replace
/// policy and the dirty flag clear, augmentation is merged field-wise so
/// an empty remote cell never clobbers a locally present value. A row
/// whose category is the reserved sentinel deletes its item instead.
/// Afterwards `amount_eur` is filled for items still lacking it, as a
/// separate normalization pass rather than part of the merge.
pub fn pull<T: SheetTransport>(
    store: &mut LedgerStore,
    remote: &mut RemoteLedger<T>,
    months: &[String],
    rates: Option<&dyn RateProvider>,
) -> Result<()> {
    let months = if months.is_empty() {
        trailing_months(DEFAULT_PULL_WINDOW)
    } else {
        months.to_vec()
    };
    for month in &months {
        let items = remote.get_month_data(month)?;
        tracing::info!(%month, items = items.len(), "pulled remote month");

        let (deleted, kept): (Vec<LedgerItem>, Vec<LedgerItem>) =
            items.into_iter().partition(is_sentinel_delete);
        if !deleted.is_empty() {
            let tx_ids: Vec<String> = deleted.into_iter().map(|i| i.tx_id).collect();
            tracing::info!(%month, deleted = tx_ids.len(), "deleting sentinel rows");
            store.delete(&tx_ids)?;
        }
        store.insert(&kept, DuplicatePolicy::Replace)?;
    }
    if let Some(rates) = rates {
        set_missing_amount_eur(store, &months, rates)?;
    }
    Ok(())
}

fn is_sentinel_delete(item: &LedgerItem) -> bool {
    item.augmented_data
        .as_ref()
        .and_then(|ad| ad.category.as_deref())
        .map(|c| c == DELETE_SENTINEL)
        .unwrap_or(false)
}

/// Fill `amount_eur` where it is unset. EUR items copy their amount;
/// other currencies consult the provider and are skipped (for the next
/// run) when no rate is known yet.
pub fn set_missing_amount_eur(
    store: &mut LedgerStore,
    months: &[String],
    rates: &dyn RateProvider,
) -> Result<usize> {
    let mut overlays = Vec::new();
    for month in months {
        let candidates = store.filter(&[
            Predicate::Gte(Field::TxDatetime, format!("{}-01", month)),
            Predicate::IsNull(Field::AmountEur, true),
        ])?;
        for item in candidates.into_iter().filter(|i| i.month() == *month) {
            let amount_eur = if item.currency == "EUR" {
                Some(item.amount)
            } else {
                rates
                    .rate_to_eur(&item.currency, item.tx_datetime.date())?
                    .filter(|rate| !rate.is_zero())
                    .map(|rate| (item.amount / rate).round_dp(2))
            };
            if let Some(value) = amount_eur {
                let mut overlay = AugmentedData::new(&item.tx_id);
                overlay.amount_eur = Some(value);
                overlays.push(overlay);
            }
        }
    }
    store.set_augmented_data(&overlays)?;
    Ok(overlays.len())
}
