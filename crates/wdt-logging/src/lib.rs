#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `wdt-logging` is the process-wide logging and verbosity system: a
//! small [`Verbosity`] enum the CLI surface maps `-v` flags onto, and
//! [`init`], which installs a single `tracing-subscriber` formatter for
//! the whole process.
//!
//! # Design
//!
//! Every other crate in this workspace logs through `tracing` directly;
//! this crate only owns turning a verbosity level into an `EnvFilter` and
//! installing the subscriber, so the engine crates stay independent of any
//! particular subscriber implementation.

mod init;
mod verbosity;

pub use init::init;
pub use verbosity::Verbosity;
