use clap::Parser;
use std::num::NonZeroU64;
use std::path::PathBuf;

/// Command-line surface for the `wdt` binary (spec §6 "External interfaces").
///
/// An empty `destination` means this invocation receives; otherwise it
/// sends. Every [`wdt_core::WdtOptions`] tunable is exposed as a flag here so
/// the front-end never hardcodes a default the core doesn't already own.
#[derive(Debug, Parser)]
#[command(name = "wdt", about = "Warp-speed data transfer", version)]
pub struct Args {
    /// Directory to send from or receive into.
    #[arg(long, default_value = ".")]
    pub directory: PathBuf,

    /// Receiver hostname; omit to run as a receiver.
    #[arg(long, default_value = "")]
    pub destination: String,

    /// Path to a manifest file (tab-separated `path\tsize`), or `-` for
    /// stdin, bypassing the directory walk.
    #[arg(long)]
    pub manifest: Option<String>,

    /// Caller-supplied transfer identifier.
    #[arg(long)]
    pub transfer_id: Option<String>,

    /// Alternate spelling of `transfer_id` used when resuming a prior
    /// receiver run against the same transfer log.
    #[arg(long)]
    pub recovery_id: Option<String>,

    /// Protocol version to propose (sender) or require (receiver); defaults
    /// to this build's current version.
    #[arg(long)]
    pub protocol_version: Option<u16>,

    /// Receiver-emitted connection URL; supersedes `destination`/`start_port`
    /// /`num_ports` when set.
    #[arg(long)]
    pub connection_url: Option<String>,

    /// Run the receiver forever, accepting one transfer after another.
    #[arg(long)]
    pub run_as_daemon: bool,

    /// Print every entry in the transfer log at `directory`'s
    /// `.wdt_transfer_log` and exit, instead of running a transfer.
    #[arg(long)]
    pub parse_transfer_log: bool,

    /// Abort the transfer this many seconds after it starts.
    #[arg(long)]
    pub abort_after_seconds: Option<u64>,

    /// Fail receiver init instead of continuing with fewer than the
    /// requested number of bound ports.
    #[arg(long)]
    pub treat_fewer_port_as_error: bool,

    /// Print the effective, fully-resolved options and exit without
    /// transferring.
    #[arg(long)]
    pub print_options: bool,

    /// Retained for source compatibility; clap already rejects unrecognised
    /// flags unconditionally, so this has no independent effect.
    #[arg(long)]
    pub exit_on_bad_flags: bool,

    /// First port the receiver binds or the sender probes.
    #[arg(long, default_value_t = 22_011)]
    pub start_port: u16,

    /// Number of ports, one worker connection each.
    #[arg(long, default_value_t = 8)]
    pub num_ports: u16,

    /// Target size of one `FILE_CHUNK` body, in bytes.
    #[arg(long, default_value_t = 4 * 1024 * 1024)]
    pub block_size: u64,

    /// Disable whole-connection checksumming.
    #[arg(long)]
    pub disable_checksum: bool,

    /// Disable receiver-side download resumption.
    #[arg(long)]
    pub disable_download_resumption: bool,

    /// Average aggregate bytes/sec cap, shared across all workers.
    #[arg(long)]
    pub avg_bytes_per_sec: Option<NonZeroU64>,

    /// Peak/burst bytes/sec ceiling.
    #[arg(long)]
    pub peak_bytes_per_sec: Option<NonZeroU64>,

    /// Socket read timeout, in milliseconds.
    #[arg(long, default_value_t = 60_000)]
    pub read_timeout_ms: u32,

    /// Socket write timeout, in milliseconds.
    #[arg(long, default_value_t = 60_000)]
    pub write_timeout_ms: u32,

    /// Open destination files with O_DIRECT alignment where supported.
    #[arg(long)]
    pub enable_direct_io: bool,

    /// Skip pre-allocating destination files to their announced size.
    #[arg(long)]
    pub disable_preallocate: bool,

    /// How many times a worker retries a failed connection before rewinding
    /// and exiting.
    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,

    /// Increases log verbosity; repeatable (`-v`, `-vv`, `-vvv`).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}
