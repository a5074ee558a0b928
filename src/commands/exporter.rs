// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store::LedgerStore;
use anyhow::{Context, Result};

pub fn handle(store: &LedgerStore, m: &clap::ArgMatches) -> Result<()> {
    let table = m.get_one::<String>("table").unwrap().trim().to_lowercase();
    let csv = store.dump(&table)?;
    match m.get_one::<String>("out") {
        Some(out) => {
            std::fs::write(out, csv).with_context(|| format!("Write {}", out))?;
            println!("Exported {} to {}", table, out);
        }
        None => print!("{}", csv),
    }
    Ok(())
}
