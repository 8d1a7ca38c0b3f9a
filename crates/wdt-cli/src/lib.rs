#![deny(missing_docs)]

//! # Overview
//!
//! `wdt-cli` is the thin front-end over [`wdt_core`]: it parses the flags
//! spec §6 names, builds a [`wdt_core::TransferRequest`] and
//! [`wdt_core::WdtOptions`], and dispatches to [`wdt_core::Sender`] or
//! [`wdt_core::Receiver`] depending on whether a destination was given.
//!
//! # Design
//!
//! [`run`] takes an argument iterator rather than reading
//! `std::env::args_os()` itself, so the `wdt` binary stays a one-line
//! `main`, and tests can drive the CLI surface without touching the real
//! process environment. Everything this crate can plausibly fail on (bad
//! flags, a bad manifest, a failed transfer) is turned into an
//! [`wdt_engine::ErrorCode::exit_code`] rather than a panic; a panic here
//! would cost the operator their exit status.
//!
//! # Errors
//!
//! [`run`] never returns a `Result` — by design, a CLI front-end's only
//! externally visible failure mode is its process exit code.

mod args;
mod manifest;

use args::Args;
use clap::Parser;
use std::ffi::OsString;
use wdt_core::{CoreError, Receiver, Sender, TransferRequest, WdtOptions};
use wdt_engine::ErrorCode;
use wdt_logging::Verbosity;
use wdt_translog::SyncGranularity;

/// Parses `args`, runs the requested transfer, and returns the process exit
/// code (spec §6 "Exit codes").
#[must_use]
pub fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let parsed = match Args::try_parse_from(args) {
        Ok(parsed) => parsed,
        Err(err) => {
            let _ = err.print();
            return ErrorCode::Error.exit_code();
        }
    };

    wdt_logging::init(Verbosity::from_count(parsed.verbose));
    install_signal_handlers();

    if parsed.parse_transfer_log {
        return parse_transfer_log(&parsed);
    }

    let options = build_options(&parsed);
    if parsed.print_options {
        println!("{options:#?}");
        return ErrorCode::Ok.exit_code();
    }

    let request = match build_request(&parsed) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("wdt: {err}");
            return ErrorCode::Error.exit_code();
        }
    };

    if request.is_receiver() {
        run_receiver(request, options, &parsed)
    } else {
        run_sender(request, options)
    }
}

fn run_sender(request: TransferRequest, options: WdtOptions) -> i32 {
    let sender = Sender::new(request, options);
    match sender.transfer() {
        Ok(report) => {
            tracing::info!(?report.stats, "transfer complete");
            report.error_code().exit_code()
        }
        Err(err) => report_core_error(&err),
    }
}

fn run_receiver(request: TransferRequest, options: WdtOptions, parsed: &Args) -> i32 {
    let receiver = Receiver::new(request, options);
    if parsed.run_as_daemon {
        return match receiver.run_daemon() {
            Ok(()) => ErrorCode::Ok.exit_code(),
            Err(err) => report_core_error(&err),
        };
    }
    match receiver.listen() {
        Ok(report) => {
            if let Some(url) = &report.connection_url {
                println!("{url}");
            }
            tracing::info!(?report.stats, "transfer complete");
            report.error_code().exit_code()
        }
        Err(err) => report_core_error(&err),
    }
}

fn parse_transfer_log(parsed: &Args) -> i32 {
    let log_path = parsed.directory.join(".wdt_transfer_log");
    match wdt_translog::format_for_diagnostics(&log_path) {
        Ok(text) => {
            print!("{text}");
            ErrorCode::Ok.exit_code()
        }
        Err(err) => {
            eprintln!("wdt: {err}");
            ErrorCode::FileReadError.exit_code()
        }
    }
}

fn report_core_error(err: &CoreError) -> i32 {
    eprintln!("wdt: {err}");
    err.error_code().exit_code()
}

fn build_options(parsed: &Args) -> WdtOptions {
    WdtOptions {
        start_port: parsed.start_port,
        num_ports: parsed.num_ports,
        block_size: parsed.block_size,
        enable_checksum: !parsed.disable_checksum,
        enable_download_resumption: !parsed.disable_download_resumption,
        avg_bytes_per_sec: parsed.avg_bytes_per_sec,
        peak_bytes_per_sec: parsed.peak_bytes_per_sec,
        read_timeout_ms: parsed.read_timeout_ms,
        write_timeout_ms: parsed.write_timeout_ms,
        direct_io: parsed.enable_direct_io,
        preallocate: !parsed.disable_preallocate,
        treat_fewer_port_as_error: parsed.treat_fewer_port_as_error,
        max_retries: parsed.max_retries,
        sync_granularity: SyncGranularity::PerFile,
        abort_after_seconds: parsed.abort_after_seconds,
    }
}

fn build_request(parsed: &Args) -> Result<TransferRequest, std::io::Error> {
    let file_list = match &parsed.manifest {
        Some(path) => Some(manifest::parse(path)?),
        None => None,
    };
    let transfer_id = parsed
        .transfer_id
        .clone()
        .or_else(|| parsed.recovery_id.clone());

    Ok(TransferRequest {
        destination: parsed.destination.clone(),
        directory: parsed.directory.clone(),
        start_port: parsed.start_port,
        num_ports: parsed.num_ports,
        transfer_id,
        protocol_version: parsed.protocol_version,
        file_list,
        connection_url: parsed.connection_url.clone(),
    })
}

#[cfg(unix)]
fn install_signal_handlers() {
    use signal_hook::consts::{SIGINT, SIGPIPE, SIGTERM};
    use signal_hook::flag;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let term = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        if let Err(err) = flag::register(signal, Arc::clone(&term)) {
            tracing::warn!(signal, %err, "failed to register signal handler");
        }
    }
    // SIGPIPE must be ignored, not merely caught, or a dead peer's write
    // kills the process before the socket error ever reaches our code.
    unsafe {
        let _ = signal_hook::low_level::register(SIGPIPE, || {});
    }

    std::thread::Builder::new()
        .name("wdt-signal-watch".into())
        .spawn(move || {
            while !term.load(Ordering::Relaxed) {
                std::thread::sleep(std::time::Duration::from_millis(200));
            }
            tracing::warn!("signal received, exiting");
            std::process::exit(ErrorCode::AbortedByApplication.exit_code());
        })
        .expect("failed to spawn signal watcher thread");
}

#[cfg(not(unix))]
fn install_signal_handlers() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_options_exits_ok_without_transferring() {
        let code = run(["wdt", "--print-options"]);
        assert_eq!(code, ErrorCode::Ok.exit_code());
    }

    #[test]
    fn bad_flag_maps_to_error_exit_code() {
        let code = run(["wdt", "--not-a-real-flag"]);
        assert_eq!(code, ErrorCode::Error.exit_code());
    }
}
