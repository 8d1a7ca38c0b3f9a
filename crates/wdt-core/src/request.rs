use std::path::PathBuf;
use wdt_engine::{ErrorCode, TransferStats};

/// Configuration for one transfer (spec §3 "TransferRequest"): the sole
/// input the front-end constructs and the sole output [`TransferReport`] it
/// receives back. An empty `destination` means this side is the receiver.
#[derive(Debug, Clone, Default)]
pub struct TransferRequest {
    /// Receiver hostname; empty when this side receives.
    pub destination: String,
    /// Directory root: files are read from here (sender) or written here
    /// (receiver).
    pub directory: PathBuf,
    /// First port to bind (receiver) or probe (sender).
    pub start_port: u16,
    /// Number of ports requested.
    pub num_ports: u16,
    /// Caller-supplied transfer identifier; generated if absent.
    pub transfer_id: Option<String>,
    /// Caller-supplied protocol version override; defaults to
    /// [`wdt_protocol::CURRENT_VERSION`] if absent.
    pub protocol_version: Option<u16>,
    /// Pre-enumerated file list, bypassing the directory walk if present.
    pub file_list: Option<Vec<(PathBuf, Option<u64>)>>,
    /// A receiver-emitted connection URL (spec GLOSSARY); when present on
    /// the sender side it supersedes `destination`/`start_port`/`num_ports`.
    pub connection_url: Option<String>,
}

impl TransferRequest {
    /// `true` if this request describes the receiving side (spec §3: "empty
    /// ⇒ this side is receiver").
    #[must_use]
    pub fn is_receiver(&self) -> bool {
        self.destination.is_empty() && self.connection_url.is_none()
    }
}

/// The outcome of one transfer (spec §3, §4.3 "Termination"): the single
/// value the core returns to its caller.
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// Transfer identifier this run used, negotiated or generated during
    /// `init()`.
    pub transfer_id: String,
    /// The connection URL a receiver emitted, if this side was the receiver
    /// or adopted one from the sender's request.
    pub connection_url: Option<String>,
    /// Aggregated, bottom-up transfer statistics (spec §3 "Aggregated
    /// bottom-up").
    pub stats: TransferStats,
}

impl TransferReport {
    /// The worst [`ErrorCode`] observed across every worker (spec §4.3
    /// "Termination"), and the process exit code `wdt-cli` surfaces.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        self.stats.error_code()
    }

    /// `true` if the transfer completed with no error at any granularity.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.stats.error_code().is_ok()
    }
}
