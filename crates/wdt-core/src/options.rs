use std::num::NonZeroU64;
use wdt_translog::SyncGranularity;

/// Every tunable named in spec §6's CLI surface, threaded immutably into
/// [`crate::Sender`] and [`crate::Receiver`] initialisation. Built by the
/// front-end (`wdt-cli`); the core never mutates its own copy.
#[derive(Debug, Clone, PartialEq)]
pub struct WdtOptions {
    /// First port the receiver binds, and the first port the sender probes.
    pub start_port: u16,
    /// Number of consecutive ports requested, one worker connection each.
    pub num_ports: u16,
    /// Target size of one `FILE_CHUNK` body.
    pub block_size: u64,
    /// Whether `FILE_CHUNK` bodies are checksummed and verified at `DONE`.
    pub enable_checksum: bool,
    /// Whether the receiver reports `FILE_CHUNKS_INFO` for resumption.
    pub enable_download_resumption: bool,
    /// Average aggregate bytes/sec cap, shared by every worker of one side.
    pub avg_bytes_per_sec: Option<NonZeroU64>,
    /// Peak/burst bytes/sec ceiling (spec §4.8).
    pub peak_bytes_per_sec: Option<NonZeroU64>,
    /// Socket read timeout.
    pub read_timeout_ms: u32,
    /// Socket write timeout.
    pub write_timeout_ms: u32,
    /// Open destination files with direct-I/O alignment where supported.
    pub direct_io: bool,
    /// Pre-allocate destination files to their announced size.
    pub preallocate: bool,
    /// Receiver init fails with [`wdt_engine::ErrorCode::FewerPorts`] instead
    /// of continuing with a smaller port set (spec §8 scenario 2).
    pub treat_fewer_port_as_error: bool,
    /// How many times a worker retries a failed socket operation in place
    /// before rewinding its history and exiting (spec §7 "Retry-in-place",
    /// §4 supplemented default).
    pub max_retries: u32,
    /// Fsync granularity for the receiver's transfer log (spec §4.7).
    pub sync_granularity: SyncGranularity,
    /// If set, the abort flag fires this many seconds after the transfer
    /// starts (spec §6 `abort_after_seconds`).
    pub abort_after_seconds: Option<u64>,
}

impl Default for WdtOptions {
    fn default() -> Self {
        Self {
            start_port: 22_011,
            num_ports: 8,
            block_size: 4 * 1024 * 1024,
            enable_checksum: true,
            enable_download_resumption: true,
            avg_bytes_per_sec: None,
            peak_bytes_per_sec: None,
            read_timeout_ms: 60_000,
            write_timeout_ms: 60_000,
            direct_io: false,
            preallocate: true,
            treat_fewer_port_as_error: false,
            max_retries: 2,
            sync_granularity: SyncGranularity::PerFile,
            abort_after_seconds: None,
        }
    }
}
