use crate::connection::Connection;
use crate::error::CoreError;
use crate::request::{TransferReport, TransferRequest};
use crate::resumption::build_chunks_info_frame;
use crate::sender::generate_transfer_id;
use crate::url::ConnectionUrl;
use crate::options::WdtOptions;
use std::collections::HashMap;
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use wdt_engine::{AbortChecker, ErrorCode, TransferStats};
use wdt_fileio::{pad_to_alignment, CreateOptions, FileCreator, FileHandle};
use wdt_protocol::{
    negotiate, AbortFrame, AckEntry, AckFrame, FileChunksInfoFrame, Frame, RunningChecksum,
    SettingsFrame, CURRENT_VERSION,
};
use wdt_translog::{
    filter_against_disk, read_all_entries, reconcile, LogConfigSnapshot, TransferLogEntry,
    TransferLogWriter,
};

/// Name of the per-directory transfer log, rooted at the receive directory
/// (spec §4.7: "Append-only file at the root of the receive directory").
const TRANSFER_LOG_FILE_NAME: &str = ".wdt_transfer_log";

/// Drives one inbound transfer: binds the port range, replies to each
/// connection's handshake, and persists incoming blocks (spec §4.4).
pub struct Receiver {
    request: TransferRequest,
    options: WdtOptions,
    abort: AbortChecker,
}

impl Receiver {
    /// Builds a receiver for `request` under `options`.
    #[must_use]
    pub fn new(request: TransferRequest, options: WdtOptions) -> Self {
        Self {
            request,
            options,
            abort: AbortChecker::new(),
        }
    }

    /// The abort checker driving this receiver.
    #[must_use]
    pub fn abort_checker(&self) -> AbortChecker {
        self.abort.clone()
    }

    /// Runs a single transfer to completion (spec §4.4 "Initialisation"
    /// through the worker parse loop).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FewerPorts`] if fewer ports than requested bind
    /// and `treat_fewer_port_as_error` is set, and [`CoreError::Io`] if none
    /// bind at all.
    pub fn listen(self) -> Result<TransferReport, CoreError> {
        if let Some(seconds) = self.options.abort_after_seconds {
            self.abort.abort_after(seconds);
        }
        self.run_once()
    }

    /// Runs transfers forever, resetting per-transfer state between runs
    /// (spec §4.4 "Daemon mode"), until the abort checker fires.
    ///
    /// # Errors
    ///
    /// Returns the first [`CoreError`] a bind attempt produces; a
    /// completed-but-failed transfer does not stop the loop.
    pub fn run_daemon(self) -> Result<(), CoreError> {
        if let Some(seconds) = self.options.abort_after_seconds {
            self.abort.abort_after(seconds);
        }
        while !self.abort.is_aborted() {
            match self.run_once() {
                Ok(report) => tracing::info!(?report.stats, "daemon transfer complete"),
                Err(err) => tracing::warn!(%err, "daemon transfer failed, re-binding"),
            }
        }
        Ok(())
    }

    fn run_once(&self) -> Result<TransferReport, CoreError> {
        let listeners = self.bind_ports()?;
        let ports: Vec<u16> = listeners.iter().map(|(port, _)| *port).collect();
        let host = listeners[0]
            .1
            .local_addr()
            .map(|a| a.ip().to_string())
            .unwrap_or_else(|_| "0.0.0.0".to_string());
        let transfer_id = self
            .request
            .transfer_id
            .clone()
            .unwrap_or_else(generate_transfer_id);

        let log_path = self.request.directory.join(TRANSFER_LOG_FILE_NAME);
        let (chunks_info, log_writer) = self.open_log(&log_path, &transfer_id)?;

        let connection_url = ConnectionUrl {
            host: host.clone(),
            ports: ports.clone(),
            transfer_id: transfer_id.clone(),
            protocol_version: self.request.protocol_version.unwrap_or(CURRENT_VERSION),
        };
        tracing::info!(%connection_url, "receiver ready");

        let (log_tx, log_rx) = crossbeam_channel::unbounded::<TransferLogEntry>();
        let log_thread = std::thread::Builder::new()
            .name("wdt-translog-writer".into())
            .spawn(move || {
                let mut writer = log_writer;
                for entry in log_rx {
                    if let Err(err) = writer.append(&entry) {
                        tracing::warn!(%err, "failed to append transfer log entry");
                    }
                }
            })
            .expect("failed to spawn transfer log writer thread");

        let file_creator = FileCreator::new(self.request.directory.clone());
        let chunks_info = Arc::new(chunks_info);

        let mut handles = Vec::with_capacity(listeners.len());
        for (port, listener) in listeners {
            let options = self.options.clone();
            let abort = self.abort.clone();
            let transfer_id = transfer_id.clone();
            let file_creator = Arc::clone(&file_creator);
            let chunks_info = Arc::clone(&chunks_info);
            let log_tx = log_tx.clone();
            handles.push(
                std::thread::Builder::new()
                    .name(format!("wdt-recv-{port}"))
                    .spawn(move || {
                        run_port_worker(
                            &listener,
                            &transfer_id,
                            &options,
                            &abort,
                            &file_creator,
                            &chunks_info,
                            &log_tx,
                        )
                    })
                    .expect("failed to spawn receiver worker thread"),
            );
        }
        drop(log_tx);

        let mut total = TransferStats::new();
        for handle in handles {
            total.merge(&handle.join().expect("receiver worker panicked"));
        }
        log_thread.join().expect("transfer log writer panicked");

        Ok(TransferReport {
            transfer_id,
            connection_url: Some(connection_url.to_string()),
            stats: total,
        })
    }

    fn bind_ports(&self) -> Result<Vec<(u16, TcpListener)>, CoreError> {
        let requested = usize::from(self.request.num_ports.max(1));
        let mut bound = Vec::with_capacity(requested);
        for offset in 0..requested {
            let port = self.request.start_port + offset as u16;
            match TcpListener::bind(("0.0.0.0", port)) {
                Ok(listener) => bound.push((port, listener)),
                Err(err) => tracing::warn!(port, %err, "failed to bind port"),
            }
        }

        if bound.is_empty() {
            return Err(CoreError::NoReachablePort(format!(
                "0.0.0.0:{}-{}",
                self.request.start_port,
                self.request.start_port + requested as u16 - 1
            )));
        }
        if bound.len() < requested && self.options.treat_fewer_port_as_error {
            return Err(CoreError::FewerPorts {
                requested,
                bound: bound.len(),
            });
        }
        Ok(bound)
    }

    /// Opens the transfer log, reconciling it into a `FILE_CHUNKS_INFO`
    /// frame if download resumption is enabled and a prior log exists
    /// (spec §4.7 "Resumption on fresh start").
    fn open_log(
        &self,
        log_path: &Path,
        transfer_id: &str,
    ) -> Result<(FileChunksInfoFrame, TransferLogWriter), CoreError> {
        let config = LogConfigSnapshot {
            block_size: self.options.block_size,
            enable_checksum: self.options.enable_checksum,
        };

        if log_path.exists() && self.options.enable_download_resumption {
            let entries = read_all_entries(log_path)?;
            let reconciled = filter_against_disk(&self.request.directory, reconcile(&entries));
            let frame = build_chunks_info_frame(&reconciled);
            let writer =
                TransferLogWriter::append_to_existing(log_path, self.options.sync_granularity)?;
            return Ok((frame, writer));
        }

        let header = TransferLogEntry::Header {
            format_version: wdt_translog::LOG_FORMAT_VERSION,
            sender_id: transfer_id.to_string(),
            config,
        };
        let writer = TransferLogWriter::create(log_path, &header, self.options.sync_granularity)?;
        Ok((FileChunksInfoFrame::default(), writer))
    }
}

#[allow(clippy::too_many_arguments)]
fn run_port_worker(
    listener: &TcpListener,
    transfer_id: &str,
    options: &WdtOptions,
    abort: &AbortChecker,
    file_creator: &Arc<FileCreator>,
    chunks_info: &Arc<FileChunksInfoFrame>,
    log_tx: &crossbeam_channel::Sender<TransferLogEntry>,
) -> TransferStats {
    let mut stats = TransferStats::new();
    match accept_and_drive(
        listener,
        transfer_id,
        options,
        abort,
        file_creator,
        chunks_info,
        log_tx,
        &mut stats,
    ) {
        Ok(()) => {}
        Err(err) => {
            stats.record_failed_attempt();
            stats.escalate(err.error_code());
            tracing::warn!(%err, "receiver connection failed");
        }
    }
    stats
}

#[allow(clippy::too_many_arguments)]
fn accept_and_drive(
    listener: &TcpListener,
    transfer_id: &str,
    options: &WdtOptions,
    abort: &AbortChecker,
    file_creator: &Arc<FileCreator>,
    chunks_info: &Arc<FileChunksInfoFrame>,
    log_tx: &crossbeam_channel::Sender<TransferLogEntry>,
    stats: &mut TransferStats,
) -> Result<(), CoreError> {
    let (stream, peer): (TcpStream, _) = listener.accept()?;
    tracing::info!(%peer, "accepted connection");
    let mut conn = Connection::from_stream(stream)?;
    conn.set_read_timeout(Some(Duration::from_millis(options.read_timeout_ms.into())))?;
    conn.set_write_timeout(Some(Duration::from_millis(options.write_timeout_ms.into())))?;

    let incoming = match conn.recv()? {
        Frame::Settings(settings) => settings,
        other => return Err(unexpected_frame("SETTINGS", &other)),
    };

    let negotiated = match negotiate(incoming.protocol_version, CURRENT_VERSION) {
        Ok(version) => version,
        Err(err) => {
            conn.send(&Frame::Abort(AbortFrame {
                error_code: ErrorCode::VersionMismatch.exit_code() as u8,
                protocol_version: CURRENT_VERSION,
            }))?;
            return Err(err.into());
        }
    };

    conn.send(&Frame::Settings(SettingsFrame {
        protocol_version: negotiated,
        sender_id: generate_transfer_id(),
        read_timeout_ms: options.read_timeout_ms,
        write_timeout_ms: options.write_timeout_ms,
        transfer_id: transfer_id.to_string(),
        enable_checksum: options.enable_checksum,
        enable_download_resumption: options.enable_download_resumption,
        block_size: options.block_size,
    }))?;

    if options.enable_download_resumption {
        conn.send(&Frame::FileChunksInfo((**chunks_info).clone()))?;
    }

    let mut open_files: HashMap<PathBuf, FileHandle> = HashMap::new();
    let mut file_sizes: HashMap<PathBuf, u64> = HashMap::new();
    let mut checksum = RunningChecksum::new();
    let mut done = false;

    loop {
        if abort.is_aborted() {
            return Err(CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "aborted",
            )));
        }

        let frame = match conn.recv() {
            Ok(frame) => frame,
            Err(wdt_protocol::ProtocolError::Io(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        match frame {
            Frame::FileChunk(header) => {
                let mut body = vec![0u8; header.length as usize];
                conn.read_exact(&mut body)?;
                checksum.update(&body);

                let relative_path = PathBuf::from(&header.relative_path);
                if !open_files.contains_key(&relative_path) {
                    let handle = file_creator.open(
                        &relative_path,
                        Some(header.file_size),
                        CreateOptions {
                            preallocate: options.preallocate,
                            direct_io: options.direct_io,
                        },
                    )?;
                    open_files.insert(relative_path.clone(), handle);
                }
                file_sizes.insert(relative_path.clone(), header.file_size);
                let handle = open_files.get(&relative_path).expect("just inserted above");

                if options.direct_io {
                    // Every chunk offset is a multiple of the negotiated
                    // block size, which direct-I/O setups are expected to
                    // keep a multiple of the alignment; only the final,
                    // short chunk of a file needs padding. The true size is
                    // restored by `truncate_to` once the connection closes.
                    let mut aligned = body;
                    pad_to_alignment(&mut aligned);
                    tracing::debug!(
                        path = %header.relative_path,
                        offset = header.offset,
                        len = aligned.len(),
                        "direct-io aligned write"
                    );
                    handle.write_at(&aligned, header.offset)?;
                } else {
                    handle.write_at(&body, header.offset)?;
                }

                let _ = log_tx.send(TransferLogEntry::BlockWritten {
                    relative_path: header.relative_path.clone(),
                    seq: header.seq,
                    offset: header.offset,
                    length: header.length,
                });

                stats.add_header_bytes(estimate_header_bytes(&relative_path));
                stats.add_data_bytes(header.length);
                stats.add_effective_bytes(header.length);

                conn.send(&Frame::Ack(AckFrame {
                    entries: vec![AckEntry {
                        file_seq: header.file_seq,
                        last_persisted_seq: header.seq,
                        persisted_offset: header.offset + header.length,
                    }],
                }))?;
            }
            Frame::Done(frame) => {
                if let Some(expected) = frame.checksum {
                    let actual = std::mem::replace(&mut checksum, RunningChecksum::new())
                        .finish()
                        .value();
                    if actual != expected {
                        stats.escalate(ErrorCode::ChecksumMismatch);
                        tracing::warn!(expected, actual, "connection checksum mismatch");
                    }
                }
                done = true;
            }
            Frame::Abort(frame) => {
                tracing::warn!(error_code = frame.error_code, "sender aborted connection");
                stats.escalate(ErrorCode::Abort);
                break;
            }
            Frame::ErrCmd(frame) => {
                tracing::warn!(
                    relative_path = %frame.relative_path,
                    error_code = frame.error_code,
                    "sender reported a per-file error"
                );
            }
            Frame::Wait | Frame::SizeCmd(_) | Frame::Settings(_) | Frame::FileChunksInfo(_) => {}
        }

        if done {
            break;
        }
    }

    for (path, handle) in &open_files {
        if options.direct_io {
            if let Some(&true_size) = file_sizes.get(path) {
                handle.truncate_to(true_size)?;
            }
        }
        handle.sync()?;
    }
    conn.shutdown();
    Ok(())
}

fn unexpected_frame(expected: &str, got: &Frame) -> CoreError {
    CoreError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("expected {expected}, got {got:?}"),
    ))
}

fn estimate_header_bytes(relative_path: &Path) -> u64 {
    1 + 5 * 5 + relative_path.as_os_str().len() as u64
}
