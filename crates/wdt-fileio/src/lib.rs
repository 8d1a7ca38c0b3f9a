#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `wdt-fileio` implements spec §4.6: the sender-side [`FileByteSource`]
//! reading block ranges out of source files, and the receiver-side
//! [`FileCreator`] / [`FileHandle`] pair creating destination files on
//! first touch and serving positioned, refcounted writes to them.
//!
//! # Design
//!
//! Every write is positioned (`pwrite`-style) rather than seek-then-write,
//! so two workers can hold the same [`FileHandle`] and write disjoint
//! ranges concurrently without coordinating a shared cursor. Direct I/O
//! (spec: "optionally opens with direct-I/O alignment") is attempted on
//! unix via `rustix` and falls back to buffered I/O if the filesystem
//! rejects it, rather than failing the transfer outright.

mod creator;
mod direct_io;
mod error;
mod reader;

pub use creator::{CreateOptions, FileCreator, FileHandle};
pub use direct_io::{align_down, align_up, pad_to_alignment, ALIGNMENT};
pub use error::FileIoError;
pub use reader::FileByteSource;
