// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::classify;
use crate::cli::months_from;
use crate::store::LedgerStore;
use anyhow::Result;

pub fn handle(store: &mut LedgerStore, m: &clap::ArgMatches) -> Result<()> {
    let mut months = months_from(m)?;
    if months.is_empty() {
        months = store.months()?;
    }
    let to_sync_only = m.get_flag("to-sync-only");
    let updated = classify::guess(store, &months, to_sync_only)?;
    println!("Updated {} item(s)", updated);
    Ok(())
}
