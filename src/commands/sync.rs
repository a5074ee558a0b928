// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::cli::months_from;
use crate::remote::{HttpTransport, RemoteLedger, SheetConfig, SheetSession};
use crate::store::LedgerStore;
use crate::sync;
use crate::utils::get_sheet_id;
use anyhow::{Context, Result};

pub const TOKEN_ENV: &str = "LEDGERSYNC_SHEETS_TOKEN";

fn remote_ledger(store: &LedgerStore) -> Result<RemoteLedger<HttpTransport>> {
    let sheet_id = get_sheet_id(store.connection())?
        .context("No spreadsheet configured; run 'ledgersync sheet set-id <id>'")?;
    let token = std::env::var(TOKEN_ENV)
        .with_context(|| format!("{} is not set", TOKEN_ENV))?;
    let transport = HttpTransport::new(SheetConfig::new(&sheet_id, &token))?;
    Ok(RemoteLedger::new(SheetSession::new(transport)))
}

pub fn push(store: &mut LedgerStore, m: &clap::ArgMatches) -> Result<()> {
    let months = months_from(m)?;
    let mut remote = remote_ledger(store)?;
    sync::push(store, &mut remote, &months)?;
    if months.is_empty() {
        println!("Pushed all changed months");
    } else {
        println!("Pushed {}", months.join(", "));
    }
    Ok(())
}

pub fn pull(store: &mut LedgerStore, m: &clap::ArgMatches) -> Result<()> {
    let months = months_from(m)?;
    let mut remote = remote_ledger(store)?;
    let rates = sync::StoredRates::load(store.connection())?;
    sync::pull(store, &mut remote, &months, Some(&rates))?;
    if months.is_empty() {
        println!("Pulled the default trailing window");
    } else {
        println!("Pulled {}", months.join(", "));
    }
    Ok(())
}
