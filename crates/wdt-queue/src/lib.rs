#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `wdt-queue` turns a directory tree (or a pre-supplied file list) into the
//! ordered stream of [`ByteSource`] work units that the sender's workers
//! drain, and provides the thread-safe FIFO-with-priority-retry queue they
//! drain it through (spec §4.2).
//!
//! # Design
//!
//! - [`enumerator::walk_directory`] and [`enumerator::enumerate_file_list`]
//!   are the two producers named in spec §4.2; both end by closing the
//!   [`SourceQueue`] they were given.
//! - [`SourceQueue`] is a single-producer, multi-consumer blocking queue: one
//!   enumerator thread appends fresh blocks at the tail, N worker threads
//!   pull from the head, and a failed worker's unacked blocks go back in at
//!   the head via [`SourceQueue::return_to_queue`] so retries are served
//!   before fresh work.
//! - [`enumerator::ResumptionFilter`] is the seam download resumption hooks
//!   into: the sender's reconciled `FILE_CHUNKS_INFO` implements it to
//!   suppress ranges the receiver already owns.
//!
//! # Invariants
//!
//! - Blocks of one file are always emitted in increasing offset order.
//! - The queue is closed exactly once, by its producer; after closing and
//!   draining, every consumer observes end-of-queue forever.
//! - [`SourceQueue::return_to_queue`] preserves insertion order among
//!   returned sources (spec §4.2 "Return path").

mod block;
mod enumerator;
mod metadata;
mod queue;

pub use block::ByteSource;
pub use enumerator::{EnumerateError, NoResumption, ResumptionFilter, enumerate_file_list, walk_directory};
pub use metadata::{FileMetadata, SeqAllocator};
pub use queue::{PollResult, SourceQueue};
