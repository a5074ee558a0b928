// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use ledgersync::models::{AugmentedData, LedgerItemType, derive_tx_id};
use rust_decimal::Decimal;

fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

#[test]
fn tx_id_is_deterministic() {
    let when = dt(2023, 2, 18, 0, 0, 0);
    let amount: Decimal = "-50.92".parse().unwrap();
    let a = derive_tx_id("Bank", when, amount, "Groceries");
    let b = derive_tx_id("Bank", when, amount, "Groceries");
    assert_eq!(a, b);
    assert_eq!(a.len(), 40);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn tx_id_changes_with_each_identity_input() {
    let when = dt(2023, 2, 18, 12, 30, 0);
    let amount: Decimal = "-50.92".parse().unwrap();
    let base = derive_tx_id("Bank", when, amount, "Groceries");

    assert_ne!(base, derive_tx_id("Card", when, amount, "Groceries"));
    assert_ne!(
        base,
        derive_tx_id("Bank", dt(2023, 2, 18, 12, 30, 1), amount, "Groceries")
    );
    assert_ne!(
        base,
        derive_tx_id("Bank", when, "-50.93".parse().unwrap(), "Groceries")
    );
    assert_ne!(base, derive_tx_id("Bank", when, amount, "Groceries "));
}

#[test]
fn tx_id_is_stable_across_amount_representations() {
    let when = dt(2023, 2, 18, 0, 0, 0);
    let padded: Decimal = "-50.920".parse().unwrap();
    let plain: Decimal = "-50.92".parse().unwrap();
    assert_eq!(
        derive_tx_id("Bank", when, padded, "Groceries"),
        derive_tx_id("Bank", when, plain, "Groceries")
    );

    let whole: Decimal = "7".parse().unwrap();
    let scaled: Decimal = "7.00".parse().unwrap();
    assert_eq!(
        derive_tx_id("Bank", when, whole, "Refund"),
        derive_tx_id("Bank", when, scaled, "Refund")
    );
}

#[test]
fn ledger_item_type_round_trips() {
    for t in [
        LedgerItemType::Transfer,
        LedgerItemType::Expense,
        LedgerItemType::Income,
    ] {
        assert_eq!(LedgerItemType::parse(t.as_str()).unwrap(), t);
    }
    assert_eq!(
        LedgerItemType::parse("Expense").unwrap(),
        LedgerItemType::Expense
    );
    assert!(LedgerItemType::parse("dividend").is_err());
}

#[test]
fn empty_overlay_is_logically_absent() {
    let mut ad = AugmentedData::new("abc");
    assert!(ad.is_empty());
    ad.category = Some("Food".into());
    assert!(!ad.is_empty());
}
