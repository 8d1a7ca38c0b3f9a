#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `wdt-engine` holds the pieces of the transfer engine that are shared by
//! both the sender and the receiver side but belong to neither's wire
//! handling: the closed [`ErrorCode`] enumeration and its severity ordering
//! (spec §6/§7), the cooperative [`AbortChecker`] (spec §4.9), per-connection
//! [`ThreadTransferHistory`] (spec §4.5), and the [`TransferStats`] counters
//! aggregated bottom-up into a `TransferReport` (spec §3).
//!
//! # Design
//!
//! These types model the capability-set design note in spec §9: rather than
//! a `WdtBase` class hierarchy, "can be aborted" is exactly
//! [`AbortChecker`], and "produces a transfer report" is exactly
//! [`TransferStats`] plus [`ErrorCode::worst`]. Both Sender and Receiver
//! compose these instead of inheriting from a shared base.

mod abort;
mod error_code;
mod history;
mod stats;

pub use abort::AbortChecker;
pub use error_code::ErrorCode;
pub use history::{InFlightRecord, PartialAck, ThreadTransferHistory};
pub use stats::TransferStats;
