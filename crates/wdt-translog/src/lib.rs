#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `wdt-translog` implements spec §4.7: the append-only, single-writer
//! transfer log a receiver uses to survive a crash mid-transfer, plus the
//! parse-and-reconcile path that turns a log back into per-file owned-byte
//! ranges for resumption or diagnostic printing.
//!
//! # Design
//!
//! [`TransferLogEntry::encode`]/[`TransferLogEntry::decode`] reuse
//! `wdt-protocol`'s varint and length-prefixed string primitives rather
//! than inventing a second wire format, since the log's entries have the
//! same "small integers and short strings" shape as the network frames.
//! [`reconcile`] is pure and allocation-light so it can run both at
//! resumption (latency-sensitive) and under `parse_transfer_log` (a
//! diagnostic CLI path, spec §6).

mod entry;
mod error;
mod reader;
mod writer;

pub use entry::{LogConfigSnapshot, TransferLogEntry, LOG_FORMAT_VERSION, MAGIC};
pub use error::TransLogError;
pub use reader::{filter_against_disk, read_all_entries, reconcile, OwnedRanges};
pub use writer::{SyncGranularity, TransferLogWriter};

/// Reads the log at `path` and formats every entry one per line, the
/// engine-side half of `parse_transfer_log` (spec §4.7 "Parse-and-print
/// mode", §6 CLI flag `parse_transfer_log`). The CLI front-end owns
/// printing this to stdout.
///
/// # Errors
///
/// Propagates any error from [`read_all_entries`].
pub fn format_for_diagnostics(path: &std::path::Path) -> Result<String, TransLogError> {
    let entries = read_all_entries(path)?;
    let mut out = String::new();
    for entry in &entries {
        out.push_str(&format!("{entry:?}\n"));
    }
    Ok(out)
}
