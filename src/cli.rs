// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::resolve_months;
use anyhow::Result;
use clap::{Arg, ArgAction, Command, value_parser};

pub fn build_cli() -> Command {
    Command::new("ledgersync")
        .about("Consolidate personal finance transactions and reconcile them with a review spreadsheet")
        .subcommand(Command::new("init").about("Initialize the local database"))
        .subcommand(with_month_args(
            Command::new("import")
                .about("Import source files into the local store")
                .arg(
                    Arg::new("path")
                        .long("path")
                        .required(true)
                        .help("File or folder to import"),
                ),
        ))
        .subcommand(with_month_args(
            Command::new("push").about("Push local data to the spreadsheet"),
        ))
        .subcommand(with_month_args(
            Command::new("pull").about("Pull spreadsheet edits into the local store"),
        ))
        .subcommand(with_month_args(
            Command::new("guess")
                .about("Fill unset classification fields using registered classifiers")
                .arg(
                    Arg::new("to-sync-only")
                        .long("to-sync-only")
                        .action(ArgAction::SetTrue)
                        .help("Only consider items not yet pushed"),
                ),
        ))
        .subcommand(
            Command::new("rules")
                .about("Manage classification rules")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("pattern").long("pattern").required(true))
                        .arg(Arg::new("category").long("category"))
                        .arg(Arg::new("counterparty").long("counterparty")),
                )
                .subcommand(Command::new("list"))
                .subcommand(Command::new("rm").arg(Arg::new("id").required(true))),
        )
        .subcommand(
            Command::new("fx")
                .about("Maintain the EUR rate table")
                .subcommand(
                    Command::new("fetch").arg(
                        Arg::new("days")
                            .long("days")
                            .value_parser(value_parser!(usize))
                            .default_value("120"),
                    ),
                )
                .subcommand(Command::new("list")),
        )
        .subcommand(
            Command::new("tx").about("Inspect stored transactions").subcommand(
                Command::new("list")
                    .arg(Arg::new("month").long("month").value_name("YYYY-MM"))
                    .arg(Arg::new("account").long("account"))
                    .arg(
                        Arg::new("limit")
                            .long("limit")
                            .value_parser(value_parser!(usize)),
                    )
                    .arg(Arg::new("json").long("json").action(ArgAction::SetTrue))
                    .arg(Arg::new("jsonl").long("jsonl").action(ArgAction::SetTrue)),
            ),
        )
        .subcommand(
            Command::new("export")
                .about("Dump a table as CSV")
                .arg(Arg::new("table").long("table").default_value("ledger_items"))
                .arg(Arg::new("out").long("out")),
        )
        .subcommand(
            Command::new("sheet")
                .about("Spreadsheet configuration")
                .subcommand(Command::new("set-id").arg(Arg::new("id").required(true)))
                .subcommand(Command::new("show")),
        )
}

/// The shared month-selection option set.
fn with_month_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("month")
            .long("month")
            .value_name("YYYY-MM")
            .help("A single month"),
    )
    .arg(
        Arg::new("last")
            .long("last")
            .value_name("N")
            .value_parser(value_parser!(usize))
            .help("The trailing N months"),
    )
    .arg(
        Arg::new("from")
            .long("from")
            .value_name("YYYY-MM")
            .help("Start of an inclusive month range"),
    )
    .arg(
        Arg::new("to")
            .long("to")
            .value_name("YYYY-MM")
            .help("End of the range; defaults to the current month"),
    )
}

pub fn months_from(m: &clap::ArgMatches) -> Result<Vec<String>> {
    resolve_months(
        m.get_one::<String>("month").map(|s| s.as_str()),
        m.get_one::<usize>("last").copied(),
        m.get_one::<String>("from").map(|s| s.as_str()),
        m.get_one::<String>("to").map(|s| s.as_str()),
    )
}
