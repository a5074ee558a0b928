// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{AugmentedData, LedgerItem};
use crate::store::LedgerStore;
use anyhow::Result;
use regex::Regex;
use rusqlite::Connection;

/// Narrow capability interface: something that can guess missing
/// classification fields for an item. The ensemble behind it is external.
pub trait Classifier {
    fn name(&self) -> &str;
    fn predict(&self, item: &LedgerItem) -> Option<AugmentedData>;
}

struct CompiledRule {
    pattern: Regex,
    category: Option<String>,
    counterparty: Option<String>,
}

/// Matches the `rules` table's regex patterns against item descriptions;
/// newest rule wins.
pub struct RuleClassifier {
    rules: Vec<CompiledRule>,
}

impl RuleClassifier {
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut stmt =
            conn.prepare("SELECT pattern, category, counterparty FROM rules ORDER BY id DESC")?;
        let mut cur = stmt.query([])?;
        let mut rules = Vec::new();
        while let Some(r) = cur.next()? {
            let pattern: String = r.get(0)?;
            let category: Option<String> = r.get(1)?;
            let counterparty: Option<String> = r.get(2)?;
            match Regex::new(&pattern) {
                Ok(re) => rules.push(CompiledRule {
                    pattern: re,
                    category,
                    counterparty,
                }),
                Err(err) => {
                    tracing::warn!(%pattern, %err, "skipping unparseable rule");
                }
            }
        }
        Ok(RuleClassifier { rules })
    }
}

impl Classifier for RuleClassifier {
    fn name(&self) -> &str {
        "rules"
    }

    fn predict(&self, item: &LedgerItem) -> Option<AugmentedData> {
        for rule in &self.rules {
            if rule.pattern.is_match(&item.description) {
                let mut prediction = AugmentedData::new(&item.tx_id);
                prediction.category = rule.category.clone();
                prediction.counterparty = rule.counterparty.clone();
                if !prediction.is_empty() {
                    return Some(prediction);
                }
            }
        }
        None
    }
}

/// Explicit registry of classifiers the guess pass consults, in order.
pub fn registry(conn: &Connection) -> Result<Vec<Box<dyn Classifier>>> {
    Ok(vec![Box::new(RuleClassifier::load(conn)?)])
}

/// Apply registered classifiers to the given months, filling only fields
/// that are currently unset. Changed items are marked dirty for the next
/// push.
pub fn guess(store: &mut LedgerStore, months: &[String], to_sync_only: bool) -> Result<usize> {
    let classifiers = registry(store.connection())?;
    let mut overlays: Vec<AugmentedData> = Vec::new();
    let mut changed: Vec<String> = Vec::new();

    for month in months {
        for item in store.get_month_data(month)? {
            if to_sync_only && !item.to_sync {
                continue;
            }
            let mut current = item
                .augmented_data
                .clone()
                .unwrap_or_else(|| AugmentedData::new(&item.tx_id));
            let mut overlay = AugmentedData::new(&item.tx_id);
            for classifier in &classifiers {
                let Some(prediction) = classifier.predict(&item) else {
                    continue;
                };
                tracing::debug!(
                    classifier = classifier.name(),
                    tx_id = %item.tx_id,
                    "classifier produced a prediction"
                );
                if current.counterparty.is_none() && prediction.counterparty.is_some() {
                    current.counterparty = prediction.counterparty.clone();
                    overlay.counterparty = prediction.counterparty;
                }
                if current.category.is_none() && prediction.category.is_some() {
                    current.category = prediction.category.clone();
                    overlay.category = prediction.category;
                }
                if current.sub_category.is_none() && prediction.sub_category.is_some() {
                    current.sub_category = prediction.sub_category.clone();
                    overlay.sub_category = prediction.sub_category;
                }
                if current.event_name.is_none() && prediction.event_name.is_some() {
                    current.event_name = prediction.event_name.clone();
                    overlay.event_name = prediction.event_name;
                }
            }
            if !overlay.is_empty() {
                changed.push(item.tx_id.clone());
                overlays.push(overlay);
            }
        }
    }

    store.set_augmented_data(&overlays)?;
    store.mark_dirty(&changed)?;
    Ok(overlays.len())
}
