use crate::connection::Connection;
use crate::error::CoreError;
use crate::request::{TransferReport, TransferRequest};
use crate::resumption::ChunksInfoFilter;
use crate::url::ConnectionUrl;
use crate::options::WdtOptions;
use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wdt_engine::{AbortChecker, ErrorCode, PartialAck, ThreadTransferHistory, TransferStats};
use wdt_fileio::FileByteSource;
use wdt_protocol::{
    negotiate, AbortFrame, AckFrame, DoneFrame, FileChunkHeader, Frame, RunningChecksum,
    SettingsFrame, CURRENT_VERSION,
};
use wdt_queue::{NoResumption, ResumptionFilter, SeqAllocator, SourceQueue};

const QUEUE_POLL: Duration = Duration::from_millis(200);
const ACK_POLL: Duration = Duration::from_millis(1);

/// Drives one outbound transfer: probes the receiver, builds the
/// resumption filter, enumerates the directory, and runs N worker
/// connections against the negotiated ports (spec §4.3).
pub struct Sender {
    request: TransferRequest,
    options: WdtOptions,
    abort: AbortChecker,
}

impl Sender {
    /// Builds a sender for `request` under `options`.
    #[must_use]
    pub fn new(request: TransferRequest, options: WdtOptions) -> Self {
        Self {
            request,
            options,
            abort: AbortChecker::new(),
        }
    }

    /// The abort checker driving this sender; clone it to wire up a signal
    /// handler or an external cancellation source.
    #[must_use]
    pub fn abort_checker(&self) -> AbortChecker {
        self.abort.clone()
    }

    /// Runs the transfer to completion (spec §4.3 "Initialisation" through
    /// "Termination").
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if the receiver cannot be reached at all, or
    /// if version negotiation fails on the probe connection.
    pub fn transfer(self) -> Result<TransferReport, CoreError> {
        if let Some(seconds) = self.options.abort_after_seconds {
            self.abort.abort_after(seconds);
        }

        let (host, ports, transfer_id) = self.resolve_peer()?;

        tracing::info!(host, ?ports, transfer_id, "probing receiver");
        let probe = Probe::connect(&host, ports[0], &transfer_id, &self.options)?;
        let Probe {
            protocol_version,
            filter,
            conn: probe_conn,
        } = probe;
        let mut probe_conn = Some(probe_conn);

        let queue = SourceQueue::new();
        let seq = SeqAllocator::new();
        let filter: Arc<dyn ResumptionFilter> = filter
            .map(|f| Arc::new(f) as Arc<dyn ResumptionFilter>)
            .unwrap_or_else(|| Arc::new(NoResumption));

        let directory = self.request.directory.clone();
        let block_size = self.options.block_size;
        let file_list = self.request.file_list.clone();
        let enumerator_queue = Arc::clone(&queue);
        let enumerator = std::thread::Builder::new()
            .name("wdt-enumerator".into())
            .spawn(move || -> Result<(), wdt_queue::EnumerateError> {
                match file_list {
                    Some(entries) => wdt_queue::enumerate_file_list(
                        &directory,
                        &entries,
                        &enumerator_queue,
                        block_size,
                        &seq,
                        filter.as_ref(),
                    ),
                    None => wdt_queue::walk_directory(
                        &directory,
                        &enumerator_queue,
                        block_size,
                        &seq,
                        filter.as_ref(),
                    ),
                }
            })
            .expect("failed to spawn enumerator thread");

        let throttler = self.options.avg_bytes_per_sec.map(|avg| {
            Arc::new(wdt_throttle::Throttler::new(avg, self.options.peak_bytes_per_sec))
        });

        let mut handles = Vec::with_capacity(ports.len());
        for (index, port) in ports.iter().copied().enumerate() {
            let host = host.clone();
            let transfer_id = transfer_id.clone();
            let root = self.request.directory.clone();
            let queue = Arc::clone(&queue);
            let throttler = throttler.clone();
            let abort = self.abort.clone();
            let options = self.options.clone();
            // Worker 0 reuses the still-open probe connection instead of
            // opening a second one against the same port: the receiver
            // accepts exactly one connection per bound port (spec §4.4), so
            // a throwaway probe-and-close on `ports[0]` would starve its
            // worker of anything to connect to.
            let preconnected = if index == 0 { probe_conn.take() } else { None };
            handles.push(
                std::thread::Builder::new()
                    .name(format!("wdt-send-{index}"))
                    .spawn(move || {
                        run_worker(
                            &host,
                            port,
                            &transfer_id,
                            protocol_version,
                            &options,
                            &root,
                            &queue,
                            throttler.as_deref(),
                            &abort,
                            preconnected,
                        )
                    })
                    .expect("failed to spawn sender worker thread"),
            );
        }

        let mut total = TransferStats::new();
        for handle in handles {
            total.merge(&handle.join().expect("sender worker panicked"));
        }

        match enumerator.join().expect("enumerator thread panicked") {
            Ok(()) => {}
            Err(err) => total.escalate(CoreError::from(err).error_code()),
        }

        Ok(TransferReport {
            transfer_id,
            connection_url: None,
            stats: total,
        })
    }

    /// Resolves the receiver's host, port list, and transfer id, either
    /// from an explicit `connection_url` or from `destination`/`start_port`/
    /// `num_ports` (spec §3 "TransferRequest").
    fn resolve_peer(&self) -> Result<(String, Vec<u16>, String), CoreError> {
        if let Some(url) = &self.request.connection_url {
            let parsed: ConnectionUrl = url.parse()?;
            return Ok((parsed.host, parsed.ports, parsed.transfer_id));
        }

        let ports: Vec<u16> = (0..self.request.num_ports)
            .map(|i| self.request.start_port + i)
            .collect();
        let transfer_id = self
            .request
            .transfer_id
            .clone()
            .unwrap_or_else(generate_transfer_id);
        Ok((self.request.destination.clone(), ports, transfer_id))
    }
}

/// Generates a transfer identifier from the process id and current time,
/// the same ambient-uniqueness scheme used elsewhere in this workspace for
/// "good enough, no extra crate needed" identifiers.
pub(crate) fn generate_transfer_id() -> String {
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("wdt-{pid}-{nanos}")
}

fn connect_with_timeout(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let addr: SocketAddr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address resolved"))?;
    TcpStream::connect_timeout(&addr, timeout)
}

/// The sender's one-time handshake connection: establishes the negotiated
/// protocol version and, if resumption is enabled, the receiver's owned
/// ranges (spec §4.3 "Initialisation"). The connection itself is handed off
/// to worker 0 rather than closed, since it already occupies the one accept
/// slot `ports[0]`'s listener grants.
struct Probe {
    protocol_version: u16,
    filter: Option<ChunksInfoFilter>,
    conn: Connection,
}

impl Probe {
    fn connect(
        host: &str,
        port: u16,
        transfer_id: &str,
        options: &WdtOptions,
    ) -> Result<Self, CoreError> {
        let stream = connect_with_timeout(host, port, Duration::from_millis(options.read_timeout_ms.into()))?;
        let mut conn = Connection::from_stream(stream)?;
        conn.set_read_timeout(Some(Duration::from_millis(options.read_timeout_ms.into())))?;

        let proposed = SettingsFrame {
            protocol_version: CURRENT_VERSION,
            sender_id: generate_transfer_id(),
            read_timeout_ms: options.read_timeout_ms,
            write_timeout_ms: options.write_timeout_ms,
            transfer_id: transfer_id.to_string(),
            enable_checksum: options.enable_checksum,
            enable_download_resumption: options.enable_download_resumption,
            block_size: options.block_size,
        };
        conn.send(&Frame::Settings(proposed.clone()))?;

        let reply = match conn.recv()? {
            Frame::Settings(reply) => reply,
            other => return Err(unexpected_frame("SETTINGS", &other)),
        };
        let protocol_version = negotiate(proposed.protocol_version, reply.protocol_version)?;

        let filter = if options.enable_download_resumption {
            match conn.recv()? {
                Frame::FileChunksInfo(info) => Some(ChunksInfoFilter::from_frame(&info)),
                other => return Err(unexpected_frame("FILE_CHUNKS_INFO", &other)),
            }
        } else {
            None
        };

        Ok(Self {
            protocol_version,
            filter,
            conn,
        })
    }
}

fn unexpected_frame(expected: &str, got: &Frame) -> CoreError {
    CoreError::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("expected {expected}, got {got:?}"),
    ))
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    host: &str,
    port: u16,
    transfer_id: &str,
    protocol_version: u16,
    options: &WdtOptions,
    root: &std::path::Path,
    queue: &Arc<SourceQueue>,
    throttler: Option<&wdt_throttle::Throttler>,
    abort: &AbortChecker,
    preconnected: Option<Connection>,
) -> TransferStats {
    let mut stats = TransferStats::new();
    let mut attempt = 0u32;
    let mut preconnected = preconnected;

    loop {
        if abort.is_aborted() {
            stats.escalate(ErrorCode::AbortedByApplication);
            break;
        }
        match run_worker_once(
            host,
            port,
            transfer_id,
            protocol_version,
            options,
            root,
            queue,
            throttler,
            abort,
            preconnected.take(),
        ) {
            Ok(worker_stats) => {
                stats.merge(&worker_stats);
                break;
            }
            Err((worker_stats, err)) => {
                stats.merge(&worker_stats);
                stats.record_failed_attempt();
                stats.escalate(err.error_code());
                attempt += 1;
                if attempt > options.max_retries {
                    break;
                }
                tracing::warn!(port, attempt, %err, "worker connection failed, retrying");
            }
        }
    }

    stats
}

#[allow(clippy::too_many_arguments)]
fn run_worker_once(
    host: &str,
    port: u16,
    transfer_id: &str,
    protocol_version: u16,
    options: &WdtOptions,
    root: &std::path::Path,
    queue: &Arc<SourceQueue>,
    throttler: Option<&wdt_throttle::Throttler>,
    abort: &AbortChecker,
    preconnected: Option<Connection>,
) -> Result<TransferStats, (TransferStats, CoreError)> {
    let mut stats = TransferStats::new();
    let mut history = ThreadTransferHistory::new();
    let mut last_partial: Option<PartialAck> = None;
    let mut files: HashMap<PathBuf, Arc<FileByteSource>> = HashMap::new();
    let mut next_seq = 0u64;

    let attempt = (|| -> Result<(), CoreError> {
        let mut checksum = RunningChecksum::new();

        let mut conn = match preconnected {
            Some(mut conn) => {
                conn.set_write_timeout(Some(Duration::from_millis(options.write_timeout_ms.into())))?;
                conn
            }
            None => {
                let stream = connect_with_timeout(host, port, Duration::from_millis(options.read_timeout_ms.into()))?;
                let mut conn = Connection::from_stream(stream)?;
                conn.set_write_timeout(Some(Duration::from_millis(options.write_timeout_ms.into())))?;

                conn.send(&Frame::Settings(SettingsFrame {
                    protocol_version,
                    sender_id: generate_transfer_id(),
                    read_timeout_ms: options.read_timeout_ms,
                    write_timeout_ms: options.write_timeout_ms,
                    transfer_id: transfer_id.to_string(),
                    enable_checksum: options.enable_checksum,
                    enable_download_resumption: options.enable_download_resumption,
                    block_size: options.block_size,
                }))?;
                // The worker connection repeats the handshake per spec §4.4
                // ("each accepts exactly one inbound connection, reads
                // SETTINGS, replies"); the resumption filter was already
                // built from the probe, so any FILE_CHUNKS_INFO the receiver
                // resends here is read and discarded.
                match conn.recv()? {
                    Frame::Settings(_) => {}
                    other => return Err(unexpected_frame("SETTINGS", &other)),
                }
                if options.enable_download_resumption {
                    match conn.recv()? {
                        Frame::FileChunksInfo(_) => {}
                        other => return Err(unexpected_frame("FILE_CHUNKS_INFO", &other)),
                    }
                }
                conn
            }
        };

        loop {
            if abort.is_aborted() {
                conn.send(&Frame::Abort(AbortFrame {
                    error_code: ErrorCode::AbortedByApplication.exit_code() as u8,
                    protocol_version,
                }))?;
                return Err(CoreError::Io(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "aborted",
                )));
            }

            match queue.get_next_source(QUEUE_POLL) {
                wdt_queue::PollResult::Source(block) => {
                    let relative_path = block.file().relative_path().to_path_buf();
                    let source = match files.get(&relative_path) {
                        Some(source) => Arc::clone(source),
                        None => {
                            let absolute = root.join(&relative_path);
                            let source = Arc::new(FileByteSource::open(&absolute)?);
                            files.insert(relative_path.clone(), Arc::clone(&source));
                            source
                        }
                    };
                    let body = source.read_range(block.offset(), block.length())?;

                    let header = FileChunkHeader {
                        seq: next_seq,
                        file_seq: block.file().seq(),
                        file_size: block.file().total_size().unwrap_or(block.end()),
                        offset: block.offset(),
                        length: block.length(),
                        flags: 0,
                        relative_path: relative_path.to_string_lossy().into_owned(),
                    };
                    conn.send(&Frame::FileChunk(header))?;
                    conn.write_all(&body)?;
                    checksum.update(&body);

                    if let Some(throttler) = throttler {
                        throttler.limit(body.len());
                    }

                    stats.add_header_bytes(estimate_header_bytes(&relative_path));
                    stats.add_data_bytes(body.len() as u64);
                    history.append(block, next_seq);
                    next_seq += 1;

                    drain_acks(&mut conn, &mut history, &mut stats, &mut last_partial)?;
                }
                wdt_queue::PollResult::Timeout => {
                    drain_acks(&mut conn, &mut history, &mut stats, &mut last_partial)?;
                }
                wdt_queue::PollResult::EndOfQueue => break,
            }
        }

        conn.send(&Frame::Done(DoneFrame {
            total_blocks: next_seq,
            checksum: options.enable_checksum.then(|| checksum.finish().value()),
        }))?;

        conn.set_read_timeout(Some(Duration::from_millis(options.read_timeout_ms.into())))?;
        while !history.is_empty() {
            if abort.is_aborted() {
                return Err(CoreError::Io(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "aborted",
                )));
            }
            match conn.recv() {
                Ok(Frame::Ack(ack)) => apply_ack(&ack, &mut history, &mut stats, &mut last_partial),
                Ok(Frame::Wait) => {}
                Ok(Frame::Abort(a)) => {
                    return Err(CoreError::Io(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        format!("receiver aborted with code {}", a.error_code),
                    )))
                }
                Ok(_) => {}
                Err(wdt_protocol::ProtocolError::Io(e))
                    if e.kind() == io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        conn.shutdown();
        Ok(())
    })();

    match attempt {
        Ok(()) => Ok(stats),
        Err(err) => {
            history.rewind_all(queue, last_partial);
            Err((stats, err))
        }
    }
}

fn drain_acks(
    conn: &mut Connection,
    history: &mut ThreadTransferHistory,
    stats: &mut TransferStats,
    last_partial: &mut Option<PartialAck>,
) -> Result<(), CoreError> {
    conn.set_read_timeout(Some(ACK_POLL))?;
    loop {
        match conn.recv() {
            Ok(Frame::Ack(ack)) => apply_ack(&ack, history, stats, last_partial),
            Ok(Frame::Wait) => {}
            Ok(_) => {}
            Err(wdt_protocol::ProtocolError::Io(e))
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn apply_ack(
    ack: &AckFrame,
    history: &mut ThreadTransferHistory,
    stats: &mut TransferStats,
    last_partial: &mut Option<PartialAck>,
) {
    for entry in &ack.entries {
        let acked_bytes = history.ack_up_to(entry.last_persisted_seq);
        stats.add_effective_bytes(acked_bytes);
        *last_partial = Some(PartialAck {
            file_seq: entry.file_seq,
            persisted_offset: entry.persisted_offset,
        });
    }
}

fn estimate_header_bytes(relative_path: &std::path::Path) -> u64 {
    // Five varints (seq, file_seq, file_size, offset, length) plus the
    // opcode byte and a length-prefixed path; varints are rarely maximal so
    // this is an estimate, not a wire-exact count, used only for reporting.
    1 + 5 * 5 + relative_path.as_os_str().len() as u64
}
