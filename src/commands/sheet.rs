// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store::LedgerStore;
use crate::utils::{get_sheet_id, set_sheet_id};
use anyhow::Result;

pub fn handle(store: &LedgerStore, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set-id", sub)) => {
            let id = sub.get_one::<String>("id").unwrap().trim();
            set_sheet_id(store.connection(), id)?;
            println!("Spreadsheet id set to {}", id);
        }
        Some(("show", _)) => match get_sheet_id(store.connection())? {
            Some(id) => println!("Spreadsheet id: {}", id),
            None => println!("No spreadsheet configured"),
        },
        _ => {}
    }
    Ok(())
}
