// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// Failures the sync engine distinguishes by kind.
///
/// Everything else travels as a plain `anyhow::Error`; callers that need to
/// branch on one of these downcast with `err.downcast_ref::<LedgerError>()`.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A source file does not match an importer's format. The importer
    /// selection loop treats this as "try the next one", not as a failure.
    #[error("Cannot parse {path}: {reason}")]
    Format { path: String, reason: String },

    /// Insert with the Raise policy hit an existing tx_id.
    #[error("Duplicate ledger item '{0}'")]
    DuplicateItem(String),

    /// Network or auth failure talking to the spreadsheet service.
    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    /// Reserved: the field-level merge avoids conflicts by construction,
    /// so nothing raises this today.
    #[error("Reconciliation conflict for '{0}'")]
    ReconciliationConflict(String),
}
