#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `wdt-throttle` is the shared bandwidth limiter described in spec §4.8: a
//! token bucket bounding the aggregate bytes/sec every worker on one side
//! of a transfer may admit, with an independent average and peak rate.
//!
//! # Design
//!
//! [`Throttler`] is meant to live behind an `Arc` and be cloned to every
//! worker thread; `limit` takes `&self` and locks internally so no caller
//! needs its own synchronization. The debt-accounting algorithm mirrors the
//! token-bucket pacing used by traditional bandwidth-limited file transfer
//! tools: accumulate debt per byte admitted, drain it by elapsed time at
//! the average rate, and force a sleep once the owed time crosses a
//! minimum threshold so small writes don't each pay a scheduler wakeup.

mod limiter;

pub use limiter::Throttler;
