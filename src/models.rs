// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Canonical field order, shared by the sheet header and table dumps.
pub const FIELD_ORDER: [&str; 12] = [
    "tx_id",
    "tx_datetime",
    "amount",
    "currency",
    "description",
    "account",
    "ledger_item_type",
    "amount_eur",
    "counterparty",
    "category",
    "sub_category",
    "event_name",
];

/// Reserved category value: a pulled row carrying it deletes the item locally.
pub const DELETE_SENTINEL: &str = "Delete";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerItemType {
    Transfer,
    Expense,
    Income,
}

impl LedgerItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerItemType::Transfer => "transfer",
            LedgerItemType::Expense => "expense",
            LedgerItemType::Income => "income",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "transfer" => Ok(LedgerItemType::Transfer),
            "expense" => Ok(LedgerItemType::Expense),
            "income" => Ok(LedgerItemType::Income),
            other => Err(anyhow!("Unknown ledger item type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedData {
    pub tx_id: String,
    pub amount_eur: Option<Decimal>,
    pub counterparty: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub event_name: Option<String>,
}

impl AugmentedData {
    pub fn new(tx_id: &str) -> Self {
        AugmentedData {
            tx_id: tx_id.to_string(),
            amount_eur: None,
            counterparty: None,
            category: None,
            sub_category: None,
            event_name: None,
        }
    }

    /// An overlay with every field unset is logically absent.
    pub fn is_empty(&self) -> bool {
        self.amount_eur.is_none()
            && self.counterparty.is_none()
            && self.category.is_none()
            && self.sub_category.is_none()
            && self.event_name.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerItem {
    pub tx_id: String,
    pub tx_datetime: NaiveDateTime,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub account: String,
    pub ledger_item_type: LedgerItemType,
    pub to_sync: bool,
    pub augmented_data: Option<AugmentedData>,
}

impl LedgerItem {
    pub fn month(&self) -> String {
        self.tx_datetime.format("%Y-%m").to_string()
    }
}

/// Derive the stable transaction id from the identity inputs.
///
/// The amount is rendered with exactly two decimals and the description is
/// used verbatim: trimming would fork ids across re-imports with whitespace
/// drift. Sources with a natively unique id skip this and use it directly.
pub fn derive_tx_id(
    account: &str,
    tx_datetime: NaiveDateTime,
    amount: Decimal,
    description: &str,
) -> String {
    let key = format!(
        "{}|{}|{:.2}|{}",
        account,
        tx_datetime.format("%Y-%m-%dT%H:%M:%S%.f"),
        amount,
        description
    );
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}
