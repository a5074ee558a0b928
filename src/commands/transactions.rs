// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::LedgerItem;
use crate::store::{Field, LedgerStore, Predicate};
use crate::utils::{maybe_print_json, parse_month, pretty_table};
use anyhow::Result;
use serde::Serialize;

pub fn handle(store: &LedgerStore, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => list(store, sub),
        _ => Ok(()),
    }
}

#[derive(Serialize)]
pub struct TransactionRow {
    pub tx_id: String,
    pub date: String,
    pub account: String,
    pub description: String,
    pub amount: String,
    pub currency: String,
    pub category: String,
    pub counterparty: String,
    pub to_sync: bool,
}

fn list(store: &LedgerStore, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let data = query_rows(store, sub)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.date.clone(),
                    r.account.clone(),
                    r.description.clone(),
                    r.amount.clone(),
                    r.currency.clone(),
                    r.category.clone(),
                    r.counterparty.clone(),
                    if r.to_sync { "*".into() } else { String::new() },
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "Date", "Account", "Description", "Amount", "CCY", "Category",
                    "Counterparty", "Dirty",
                ],
                rows,
            )
        );
    }
    Ok(())
}

pub fn query_rows(store: &LedgerStore, sub: &clap::ArgMatches) -> Result<Vec<TransactionRow>> {
    let mut predicates = Vec::new();
    if let Some(account) = sub.get_one::<String>("account") {
        predicates.push(Predicate::Eq(Field::Account, account.trim().to_string()));
    }
    let month = match sub.get_one::<String>("month") {
        Some(m) => Some(parse_month(m.trim())?),
        None => None,
    };
    if let Some(month) = &month {
        predicates.push(Predicate::Gte(Field::TxDatetime, format!("{}-01", month)));
    }

    let mut items: Vec<LedgerItem> = store
        .filter(&predicates)?
        .into_iter()
        .filter(|item| month.as_deref().is_none_or(|m| item.month() == m))
        .collect();
    items.reverse(); // newest first
    if let Some(limit) = sub.get_one::<usize>("limit") {
        items.truncate(*limit);
    }

    Ok(items
        .into_iter()
        .map(|item| {
            let ad = item.augmented_data.clone();
            TransactionRow {
                tx_id: item.tx_id.clone(),
                date: item.tx_datetime.format("%Y-%m-%d").to_string(),
                account: item.account.clone(),
                description: item.description.clone(),
                amount: item.amount.to_string(),
                currency: item.currency.clone(),
                category: ad
                    .as_ref()
                    .and_then(|a| a.category.clone())
                    .unwrap_or_default(),
                counterparty: ad
                    .as_ref()
                    .and_then(|a| a.counterparty.clone())
                    .unwrap_or_default(),
                to_sync: item.to_sync,
            }
        })
        .collect())
}
