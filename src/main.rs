// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use ledgersync::{cli, commands, db, store::LedgerStore};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ledgersync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let mut store = LedgerStore::open_default()?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path()?.display());
        }
        Some(("import", sub)) => commands::importer::handle(&mut store, sub)?,
        Some(("push", sub)) => commands::sync::push(&mut store, sub)?,
        Some(("pull", sub)) => commands::sync::pull(&mut store, sub)?,
        Some(("guess", sub)) => commands::guess::handle(&mut store, sub)?,
        Some(("rules", sub)) => commands::rules::handle(&store, sub)?,
        Some(("fx", sub)) => commands::fx::handle(&store, sub)?,
        Some(("tx", sub)) => commands::transactions::handle(&store, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&store, sub)?,
        Some(("sheet", sub)) => commands::sheet::handle(&store, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
