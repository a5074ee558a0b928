// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use ledgersync::error::LedgerError;
use ledgersync::models::{AugmentedData, LedgerItem, LedgerItemType, derive_tx_id};
use ledgersync::store::{DuplicatePolicy, Field, LedgerStore, Predicate};

fn item(account: &str, date: &str, amount: &str, description: &str) -> LedgerItem {
    let tx_datetime = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    let amount = amount.parse().unwrap();
    LedgerItem {
        tx_id: derive_tx_id(account, tx_datetime, amount, description),
        tx_datetime,
        amount,
        currency: "EUR".to_string(),
        description: description.to_string(),
        account: account.to_string(),
        ledger_item_type: LedgerItemType::Expense,
        to_sync: false,
        augmented_data: None,
    }
}

fn count(store: &LedgerStore, table: &str) -> i64 {
    store
        .connection()
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
        .unwrap()
}

#[test]
fn migrations_apply_once_in_order() {
    let store = LedgerStore::open_in_memory().unwrap();
    let version: i64 = store
        .connection()
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap();
    assert_eq!(version, 5);
    for table in ["ledger_items", "augmented_data", "settings", "fx_rates", "rules"] {
        assert_eq!(count(&store, table), 0, "missing table {}", table);
    }
}

#[test]
fn raise_policy_rejects_duplicates_and_keeps_one_row() {
    let mut store = LedgerStore::open_in_memory().unwrap();
    let a = item("Bank", "2023-02-18", "-50.92", "Groceries");
    store.insert(&[a.clone()], DuplicatePolicy::Raise).unwrap();

    let err = store
        .insert(&[a.clone()], DuplicatePolicy::Raise)
        .unwrap_err();
    match err.downcast_ref::<LedgerError>() {
        Some(LedgerError::DuplicateItem(tx_id)) => assert_eq!(*tx_id, a.tx_id),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(count(&store, "ledger_items"), 1);
}

#[test]
fn raise_policy_rolls_back_the_whole_batch() {
    let mut store = LedgerStore::open_in_memory().unwrap();
    let a = item("Bank", "2023-02-18", "-50.92", "Groceries");
    store.insert(&[a.clone()], DuplicatePolicy::Raise).unwrap();

    let fresh = item("Bank", "2023-02-19", "-3.50", "Coffee");
    assert!(
        store
            .insert(&[fresh, a], DuplicatePolicy::Raise)
            .is_err()
    );
    // the fresh row must not survive the failed batch
    assert_eq!(count(&store, "ledger_items"), 1);
}

#[test]
fn skip_policy_keeps_existing_rows_and_marks_new_ones_dirty() {
    let mut store = LedgerStore::open_in_memory().unwrap();
    let a = item("Bank", "2023-02-18", "-50.92", "Groceries");
    store.insert(&[a.clone()], DuplicatePolicy::Skip).unwrap();
    store
        .set_augmented_data(&[AugmentedData {
            category: Some("Food".into()),
            ..AugmentedData::new(&a.tx_id)
        }])
        .unwrap();

    // re-import of the same file plus one new row
    let b = item("Bank", "2023-02-19", "-3.50", "Coffee");
    store
        .insert(&[a.clone(), b.clone()], DuplicatePolicy::Skip)
        .unwrap();

    assert_eq!(count(&store, "ledger_items"), 2);
    let stored = store.get_month_data("2023-02").unwrap();
    assert!(stored.iter().all(|i| i.to_sync));
    let kept = stored.iter().find(|i| i.tx_id == a.tx_id).unwrap();
    assert_eq!(
        kept.augmented_data.as_ref().unwrap().category.as_deref(),
        Some("Food")
    );
}

#[test]
fn skip_policy_ignores_overlays_carried_by_duplicate_rows() {
    let mut store = LedgerStore::open_in_memory().unwrap();
    let a = item("Bank", "2023-02-18", "-50.92", "Groceries");
    store.insert(&[a.clone()], DuplicatePolicy::Skip).unwrap();
    store
        .set_augmented_data(&[AugmentedData {
            category: Some("Groceries".into()),
            ..AugmentedData::new(&a.tx_id)
        }])
        .unwrap();

    // a re-import whose source row carries a stale category
    let mut stale = a.clone();
    stale.augmented_data = Some(AugmentedData {
        category: Some("Food".into()),
        ..AugmentedData::new(&a.tx_id)
    });
    store.insert(&[stale], DuplicatePolicy::Skip).unwrap();

    let ad = store.get_month_data("2023-02").unwrap()[0]
        .augmented_data
        .clone()
        .unwrap();
    assert_eq!(ad.category.as_deref(), Some("Groceries"));
}

#[test]
fn replace_policy_overwrites_and_marks_clean() {
    let mut store = LedgerStore::open_in_memory().unwrap();
    let mut a = item("Bank", "2023-02-18", "-50.92", "Groceries");
    store.insert(&[a.clone()], DuplicatePolicy::Skip).unwrap();

    a.description = "Groceries (edited)".to_string();
    store.insert(&[a.clone()], DuplicatePolicy::Replace).unwrap();

    let stored = store.get_month_data("2023-02").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].description, "Groceries (edited)");
    assert!(!stored[0].to_sync);
}

#[test]
fn overlay_merge_fills_and_replaces_but_never_clears() {
    let mut store = LedgerStore::open_in_memory().unwrap();
    let a = item("Bank", "2023-02-18", "-50.92", "Groceries");
    store.insert(&[a.clone()], DuplicatePolicy::Raise).unwrap();

    store
        .set_augmented_data(&[AugmentedData {
            category: Some("Food".into()),
            ..AugmentedData::new(&a.tx_id)
        }])
        .unwrap();

    // an overlay with category unset must leave it alone
    store
        .set_augmented_data(&[AugmentedData {
            counterparty: Some("Esselunga".into()),
            ..AugmentedData::new(&a.tx_id)
        }])
        .unwrap();
    let ad = store.get_month_data("2023-02").unwrap()[0]
        .augmented_data
        .clone()
        .unwrap();
    assert_eq!(ad.category.as_deref(), Some("Food"));
    assert_eq!(ad.counterparty.as_deref(), Some("Esselunga"));

    // a present value replaces
    store
        .set_augmented_data(&[AugmentedData {
            category: Some("Transport".into()),
            ..AugmentedData::new(&a.tx_id)
        }])
        .unwrap();
    let ad = store.get_month_data("2023-02").unwrap()[0]
        .augmented_data
        .clone()
        .unwrap();
    assert_eq!(ad.category.as_deref(), Some("Transport"));
    assert_eq!(ad.counterparty.as_deref(), Some("Esselunga"));
}

#[test]
fn empty_overlays_are_not_persisted() {
    let mut store = LedgerStore::open_in_memory().unwrap();
    let a = item("Bank", "2023-02-18", "-50.92", "Groceries");
    store.insert(&[a.clone()], DuplicatePolicy::Raise).unwrap();

    store
        .set_augmented_data(&[AugmentedData::new(&a.tx_id)])
        .unwrap();
    assert_eq!(count(&store, "augmented_data"), 0);
    assert!(store.get_month_data("2023-02").unwrap()[0]
        .augmented_data
        .is_none());
}

#[test]
fn filter_conjoins_typed_predicates() {
    let mut store = LedgerStore::open_in_memory().unwrap();
    let a = item("Bank", "2023-02-18", "-50.92", "Groceries");
    let b = item("Card", "2023-02-19", "-3.50", "Coffee");
    let c = item("Bank", "2023-03-01", "-12.00", "Books");
    store
        .insert(&[a.clone(), b, c.clone()], DuplicatePolicy::Raise)
        .unwrap();
    store
        .set_augmented_data(&[AugmentedData {
            category: Some("Food".into()),
            ..AugmentedData::new(&a.tx_id)
        }])
        .unwrap();

    let bank = store
        .filter(&[Predicate::Eq(Field::Account, "Bank".into())])
        .unwrap();
    assert_eq!(bank.len(), 2);

    let since_march = store
        .filter(&[Predicate::Gte(Field::TxDatetime, "2023-03-01".into())])
        .unwrap();
    assert_eq!(since_march.len(), 1);
    assert_eq!(since_march[0].tx_id, c.tx_id);

    let unclassified = store
        .filter(&[
            Predicate::Eq(Field::Account, "Bank".into()),
            Predicate::IsNull(Field::Category, true),
        ])
        .unwrap();
    assert_eq!(unclassified.len(), 1);
    assert_eq!(unclassified[0].tx_id, c.tx_id);

    let classified = store
        .filter(&[Predicate::IsNull(Field::Category, false)])
        .unwrap();
    assert_eq!(classified.len(), 1);
    assert_eq!(classified[0].tx_id, a.tx_id);
}

#[test]
fn dirty_items_group_by_month_until_marked_synced() {
    let mut store = LedgerStore::open_in_memory().unwrap();
    let a = item("Bank", "2023-02-18", "-50.92", "Groceries");
    let b = item("Bank", "2023-03-02", "-8.00", "Cinema");
    store
        .insert(&[a.clone(), b.clone()], DuplicatePolicy::Skip)
        .unwrap();

    let updated = store.get_updated_data_by_month().unwrap();
    assert_eq!(
        updated.keys().cloned().collect::<Vec<_>>(),
        vec!["2023-02".to_string(), "2023-03".to_string()]
    );

    store.mark_synced("2023-02").unwrap();
    let updated = store.get_updated_data_by_month().unwrap();
    assert_eq!(updated.len(), 1);
    assert!(updated.contains_key("2023-03"));

    store.mark_dirty(&[a.tx_id.clone()]).unwrap();
    let updated = store.get_updated_data_by_month().unwrap();
    assert_eq!(updated.len(), 2);
}

#[test]
fn months_lists_distinct_months_ascending() {
    let mut store = LedgerStore::open_in_memory().unwrap();
    store
        .insert(
            &[
                item("Bank", "2023-03-02", "-8.00", "Cinema"),
                item("Bank", "2023-02-18", "-50.92", "Groceries"),
                item("Bank", "2023-02-19", "-3.50", "Coffee"),
            ],
            DuplicatePolicy::Raise,
        )
        .unwrap();
    assert_eq!(
        store.months().unwrap(),
        vec!["2023-02".to_string(), "2023-03".to_string()]
    );
}

#[test]
fn delete_removes_item_and_overlay() {
    let mut store = LedgerStore::open_in_memory().unwrap();
    let a = item("Bank", "2023-02-18", "-50.92", "Groceries");
    store.insert(&[a.clone()], DuplicatePolicy::Raise).unwrap();
    store
        .set_augmented_data(&[AugmentedData {
            category: Some("Food".into()),
            ..AugmentedData::new(&a.tx_id)
        }])
        .unwrap();

    store.delete(&[a.tx_id.clone()]).unwrap();
    assert_eq!(count(&store, "ledger_items"), 0);
    assert_eq!(count(&store, "augmented_data"), 0);
}

#[test]
fn dump_exports_csv_with_headers() {
    let mut store = LedgerStore::open_in_memory().unwrap();
    let a = item("Bank", "2023-02-18", "-50.92", "Groceries");
    store.insert(&[a.clone()], DuplicatePolicy::Raise).unwrap();

    let csv = store.dump("ledger_items").unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "tx_id,tx_datetime,amount,currency,description,account,ledger_item_type,to_sync"
    );
    let row = lines.next().unwrap();
    assert!(row.contains(&a.tx_id));
    assert!(row.contains("Groceries"));

    assert!(store.dump("sqlite_master").is_err());
}
