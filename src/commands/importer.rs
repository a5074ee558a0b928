// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::cli::months_from;
use crate::error::LedgerError;
use crate::models::{AugmentedData, LedgerItem, LedgerItemType, derive_tx_id};
use crate::store::{DuplicatePolicy, LedgerStore};
use crate::utils::{parse_datetime, parse_decimal};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::path::{Path, PathBuf};

/// Something that can turn a source file into canonical ledger items.
/// A file not in this importer's format is a `LedgerError::Format`, which
/// moves the selection loop on to the next importer.
pub trait Importer {
    fn name(&self) -> &'static str;
    fn get_ledger_items(&self, path: &Path) -> Result<Vec<LedgerItem>>;
}

/// Explicit importer registry, tried in order.
pub fn importers() -> Vec<Box<dyn Importer>> {
    vec![Box::new(WalletCsvImporter)]
}

pub fn handle(store: &mut LedgerStore, m: &clap::ArgMatches) -> Result<()> {
    let path = m.get_one::<String>("path").unwrap().trim();
    let months = months_from(m)?;
    import_path(store, Path::new(path), &months)
}

pub fn import_path(store: &mut LedgerStore, path: &Path, months: &[String]) -> Result<()> {
    let files: Vec<PathBuf> = if path.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(path)
            .with_context(|| format!("Read folder {}", path.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    };
    for file in files {
        import_file(store, &file, months)?;
    }
    Ok(())
}

/// Try every registered importer on the file; the first one whose format
/// matches wins. Surviving new rows are stored with the Skip policy so
/// the local copy, possibly already edited, is never overwritten.
pub fn import_file(store: &mut LedgerStore, file: &Path, months: &[String]) -> Result<()> {
    for importer in importers() {
        match importer.get_ledger_items(file) {
            Ok(mut items) => {
                if !months.is_empty() {
                    items.retain(|item| months.contains(&item.month()));
                }
                tracing::info!(
                    importer = importer.name(),
                    file = %file.display(),
                    items = items.len(),
                    "importing file"
                );
                store.insert(&items, DuplicatePolicy::Skip)?;
                println!("Imported {} item(s) from {}", items.len(), file.display());
                return Ok(());
            }
            Err(e) if is_format_error(&e) => {
                tracing::debug!(
                    importer = importer.name(),
                    file = %file.display(),
                    "format mismatch, trying next importer"
                );
            }
            Err(e) => return Err(e),
        }
    }
    tracing::error!(file = %file.display(), "no importer accepts this file");
    println!("Skipped {} (no importer accepts it)", file.display());
    Ok(())
}

fn is_format_error(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<LedgerError>(), Some(LedgerError::Format { .. }))
}

fn format_error(path: &Path, reason: &str) -> anyhow::Error {
    LedgerError::Format {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// CSV export of the wallet app the ledger started from.
pub struct WalletCsvImporter;

const WALLET_COLUMNS: [&str; 8] = [
    "Date",
    "Amount",
    "Currency",
    "Note",
    "Wallet",
    "Type",
    "Counterparty",
    "Category",
];

impl Importer for WalletCsvImporter {
    fn name(&self) -> &'static str {
        "wallet-csv"
    }

    fn get_ledger_items(&self, path: &Path) -> Result<Vec<LedgerItem>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| format_error(path, &e.to_string()))?;
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| format_error(path, &e.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect();
        if WALLET_COLUMNS
            .iter()
            .any(|col| !headers.iter().any(|h| h == col))
        {
            return Err(format_error(path, "missing expected wallet columns"));
        }
        let column = |name: &str| headers.iter().position(|h| h == name).unwrap_or(usize::MAX);
        let idx_date = column("Date");
        let idx_amount = column("Amount");
        let idx_currency = column("Currency");
        let idx_note = column("Note");
        let idx_wallet = column("Wallet");
        let idx_type = column("Type");
        let idx_counterparty = column("Counterparty");
        let idx_category = column("Category");

        let mut items = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let cell = |i: usize| record.get(i).unwrap_or("");

            let tx_datetime = parse_datetime(cell(idx_date).trim())
                .with_context(|| format!("Row {} of {}", items.len() + 2, path.display()))?;
            let amount = parse_decimal(&cell(idx_amount).replace(',', ""))
                .with_context(|| format!("Row {} of {}", items.len() + 2, path.display()))?;
            let account = cell(idx_wallet).trim().to_string();
            let ledger_item_type = LedgerItemType::parse(cell(idx_type).trim())?;
            // Description stays verbatim: it feeds the identity hash.
            let description = cell(idx_note).to_string();

            let tx_id = derive_tx_id(&account, tx_datetime, amount, &description);
            let mut augmented = AugmentedData::new(&tx_id);
            augmented.counterparty = non_empty(cell(idx_counterparty));
            augmented.category = non_empty(cell(idx_category));

            items.push(LedgerItem {
                tx_id,
                tx_datetime,
                amount,
                currency: cell(idx_currency).trim().to_uppercase(),
                description,
                account,
                ledger_item_type,
                to_sync: true,
                augmented_data: if augmented.is_empty() {
                    None
                } else {
                    Some(augmented)
                },
            });
        }
        Ok(items)
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
