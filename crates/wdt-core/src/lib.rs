#![deny(missing_docs)]

//! # Overview
//!
//! `wdt-core` wires `wdt-protocol`, `wdt-queue`, `wdt-engine`, `wdt-fileio`,
//! `wdt-throttle`, and `wdt-translog` into the two runtimes a transfer
//! actually drives: [`Sender`], which probes a receiver, enumerates a
//! directory, and races N worker connections against it; and [`Receiver`],
//! which binds a port range, replies to each connection's handshake, and
//! persists incoming blocks with crash-resumable logging.
//!
//! # Design
//!
//! Both runtimes are thread-per-connection (spec §4): one OS thread per
//! port, each owning its own [`wdt_engine::ThreadTransferHistory`] or open
//! files, with no shared mutable state beyond the queue, the throttler, the
//! abort flag, and (on the receiver) a single dedicated thread that owns the
//! transfer log writer. `wdt-cli` is the only intended caller of this crate.

mod connection;
mod error;
mod options;
mod receiver;
mod request;
mod resumption;
mod sender;
mod url;

pub use error::CoreError;
pub use options::WdtOptions;
pub use receiver::Receiver;
pub use request::{TransferReport, TransferRequest};
pub use sender::Sender;
pub use url::ConnectionUrl;
