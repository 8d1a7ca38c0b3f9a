//! End-to-end scenarios driving real `Sender`/`Receiver` pairs over
//! loopback TCP, plus a few hand-rolled peers speaking raw `wdt-protocol`
//! frames where the scenario needs to misbehave in a way the real `Sender`
//! never would (a bad version, a truncated body, a wrong checksum).

use std::fs;
use std::io::{BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::num::NonZeroU64;
use std::time::{Duration, Instant};

use wdt_core::{CoreError, Receiver, Sender, TransferReport, TransferRequest, WdtOptions};
use wdt_engine::ErrorCode;
use wdt_protocol::{
    DoneFrame, FileChunkHeader, Frame, SettingsFrame, CURRENT_VERSION,
};

/// Reserves a free port by binding it ephemerally, returning the listener
/// alongside it so the caller can hold the reservation until just before a
/// `Receiver` binds the same port, the same TOCTOU-minimizing trick the
/// teacher's own daemon tests use.
fn allocate_test_port() -> (u16, TcpListener) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral port for test");
    let port = listener.local_addr().expect("local addr").port();
    (port, listener)
}

/// Connects to a `Receiver` that may not have finished binding yet, backing
/// off until it's ready rather than racing a single attempt against it.
fn connect_with_retry(port: u16) -> TcpStream {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match TcpStream::connect(("127.0.0.1", port)) {
            Ok(stream) => return stream,
            Err(err) if Instant::now() < deadline => {
                let _ = err;
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(err) => panic!("could not connect to test receiver on port {port}: {err}"),
        }
    }
}

/// Runs a `Sender` to completion, retrying the whole attempt while the peer
/// refuses connections (the receiver thread may not have bound its
/// listener yet); nothing has been sent on a prior attempt that failed this
/// early, so retrying from scratch is safe.
fn transfer_with_retry(request: TransferRequest, options: WdtOptions) -> TransferReport {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match Sender::new(request.clone(), options.clone()).transfer() {
            Ok(report) => return report,
            Err(err) if Instant::now() < deadline => {
                let _ = err;
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(err) => panic!("sender failed to reach the test receiver: {err}"),
        }
    }
}

fn fake_settings(block_size: u64) -> SettingsFrame {
    SettingsFrame {
        protocol_version: CURRENT_VERSION,
        sender_id: "fake-sender".into(),
        read_timeout_ms: 5_000,
        write_timeout_ms: 5_000,
        transfer_id: "fake-xfer".into(),
        enable_checksum: false,
        enable_download_resumption: false,
        block_size,
    }
}

fn write_small_tree(root: &std::path::Path) {
    fs::write(root.join("a.txt"), b"hello wdt").expect("write a.txt");
    fs::create_dir_all(root.join("sub")).expect("mkdir sub");
    let payload: Vec<u8> = (0..5_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(root.join("sub/b.bin"), &payload).expect("write sub/b.bin");
}

#[test]
fn small_tree_round_trips_to_the_destination() {
    let src = tempfile::tempdir().expect("tempdir");
    let dst = tempfile::tempdir().expect("tempdir");
    write_small_tree(src.path());

    let (port, reservation) = allocate_test_port();
    drop(reservation);

    let recv_request = TransferRequest {
        directory: dst.path().to_path_buf(),
        start_port: port,
        num_ports: 1,
        ..TransferRequest::default()
    };
    let recv_options = WdtOptions {
        block_size: 1024,
        ..WdtOptions::default()
    };
    let receiver = Receiver::new(recv_request, recv_options);
    let recv_handle = std::thread::spawn(move || receiver.listen());

    let send_request = TransferRequest {
        destination: "127.0.0.1".into(),
        directory: src.path().to_path_buf(),
        start_port: port,
        num_ports: 1,
        ..TransferRequest::default()
    };
    let send_options = WdtOptions {
        block_size: 1024,
        ..WdtOptions::default()
    };
    let send_report = transfer_with_retry(send_request, send_options);
    assert!(
        send_report.is_ok(),
        "sender reported {:?}",
        send_report.error_code()
    );

    let recv_report = recv_handle
        .join()
        .expect("receiver thread panicked")
        .expect("receiver run");
    assert!(
        recv_report.is_ok(),
        "receiver reported {:?}",
        recv_report.error_code()
    );

    assert_eq!(fs::read(dst.path().join("a.txt")).unwrap(), b"hello wdt");
    let expected: Vec<u8> = (0..5_000u32).map(|i| (i % 251) as u8).collect();
    assert_eq!(fs::read(dst.path().join("sub/b.bin")).unwrap(), expected);
}

#[test]
fn fewer_ports_than_requested_is_reported_when_configured_fatal() {
    let dst = tempfile::tempdir().expect("tempdir");
    let (occupied_port, _blocker) = allocate_test_port();

    let options = WdtOptions {
        treat_fewer_port_as_error: true,
        ..WdtOptions::default()
    };
    let request = TransferRequest {
        directory: dst.path().to_path_buf(),
        start_port: occupied_port,
        num_ports: 2,
        ..TransferRequest::default()
    };

    let err = Receiver::new(request, options)
        .listen()
        .expect_err("binding onto an occupied port should fail");
    assert!(
        matches!(
            err,
            CoreError::FewerPorts {
                requested: 2,
                bound: 1,
            }
        ),
        "expected FewerPorts{{requested: 2, bound: 1}}, got {err:?}"
    );
}

#[test]
fn protocol_version_mismatch_is_reported_as_a_version_error() {
    let dst = tempfile::tempdir().expect("tempdir");
    let (port, reservation) = allocate_test_port();
    drop(reservation);

    let request = TransferRequest {
        directory: dst.path().to_path_buf(),
        start_port: port,
        num_ports: 1,
        ..TransferRequest::default()
    };
    let receiver = Receiver::new(request, WdtOptions::default());
    let recv_handle = std::thread::spawn(move || receiver.listen());

    let stream = connect_with_retry(port);
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("set read timeout");
    let mut writer = stream.try_clone().expect("clone stream");
    let mut reader = BufReader::new(stream);

    let mut proposed = fake_settings(4096);
    proposed.protocol_version = CURRENT_VERSION + 1;
    Frame::Settings(proposed)
        .encode(&mut writer)
        .expect("encode settings");
    writer.flush().expect("flush settings");

    match Frame::decode(&mut reader).expect("decode reply") {
        Frame::Abort(abort) => {
            assert_eq!(abort.error_code, ErrorCode::VersionMismatch.exit_code() as u8);
        }
        other => panic!("expected ABORT, got {other:?}"),
    }

    let report = recv_handle
        .join()
        .expect("receiver thread panicked")
        .expect("receiver run");
    assert_eq!(report.error_code(), ErrorCode::VersionMismatch);
}

#[test]
fn peer_disconnecting_mid_chunk_is_reported_as_a_connection_error() {
    let dst = tempfile::tempdir().expect("tempdir");
    let (port, reservation) = allocate_test_port();
    drop(reservation);

    let options = WdtOptions {
        enable_checksum: false,
        enable_download_resumption: false,
        read_timeout_ms: 2_000,
        write_timeout_ms: 2_000,
        ..WdtOptions::default()
    };
    let request = TransferRequest {
        directory: dst.path().to_path_buf(),
        start_port: port,
        num_ports: 1,
        ..TransferRequest::default()
    };
    let receiver = Receiver::new(request, options);
    let recv_handle = std::thread::spawn(move || receiver.listen());

    {
        let stream = connect_with_retry(port);
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set read timeout");
        let mut writer = stream.try_clone().expect("clone stream");
        let mut reader = BufReader::new(stream);

        Frame::Settings(fake_settings(1024))
            .encode(&mut writer)
            .expect("encode settings");
        writer.flush().expect("flush settings");
        match Frame::decode(&mut reader).expect("decode reply") {
            Frame::Settings(_) => {}
            other => panic!("expected SETTINGS reply, got {other:?}"),
        }

        let header = FileChunkHeader {
            seq: 0,
            file_seq: 0,
            file_size: 10,
            offset: 0,
            length: 10,
            flags: 0,
            relative_path: "killed.bin".into(),
        };
        Frame::FileChunk(header)
            .encode(&mut writer)
            .expect("encode chunk header");
        writer.write_all(&[1, 2, 3]).expect("write partial body");
        writer.flush().expect("flush partial body");
        // `writer`/`reader` (and their cloned socket) drop here, closing the
        // connection with 7 of the promised 10 body bytes never sent.
    }

    let report = recv_handle
        .join()
        .expect("receiver thread panicked")
        .expect("receiver run");
    assert_eq!(report.error_code(), ErrorCode::ConnError);
}

#[test]
fn corrupted_connection_checksum_is_reported_without_failing_the_write() {
    let dst = tempfile::tempdir().expect("tempdir");
    let (port, reservation) = allocate_test_port();
    drop(reservation);

    let options = WdtOptions {
        enable_checksum: true,
        enable_download_resumption: false,
        read_timeout_ms: 2_000,
        write_timeout_ms: 2_000,
        ..WdtOptions::default()
    };
    let request = TransferRequest {
        directory: dst.path().to_path_buf(),
        start_port: port,
        num_ports: 1,
        ..TransferRequest::default()
    };
    let receiver = Receiver::new(request, options);
    let recv_handle = std::thread::spawn(move || receiver.listen());

    let stream = connect_with_retry(port);
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("set read timeout");
    let mut writer = stream.try_clone().expect("clone stream");
    let mut reader = BufReader::new(stream);

    Frame::Settings(fake_settings(1024))
        .encode(&mut writer)
        .expect("encode settings");
    writer.flush().expect("flush settings");
    match Frame::decode(&mut reader).expect("decode reply") {
        Frame::Settings(_) => {}
        other => panic!("expected SETTINGS reply, got {other:?}"),
    }

    let body = b"0123456789";
    let header = FileChunkHeader {
        seq: 0,
        file_seq: 0,
        file_size: body.len() as u64,
        offset: 0,
        length: body.len() as u64,
        flags: 0,
        relative_path: "corrupt.bin".into(),
    };
    Frame::FileChunk(header)
        .encode(&mut writer)
        .expect("encode chunk header");
    writer.write_all(body).expect("write body");
    writer.flush().expect("flush body");
    match Frame::decode(&mut reader).expect("decode ack") {
        Frame::Ack(_) => {}
        other => panic!("expected ACK, got {other:?}"),
    }

    Frame::Done(DoneFrame {
        total_blocks: 1,
        checksum: Some(0xDEAD_BEEF),
    })
    .encode(&mut writer)
    .expect("encode done");
    writer.flush().expect("flush done");
    let _ = writer.shutdown(std::net::Shutdown::Both);

    let report = recv_handle
        .join()
        .expect("receiver thread panicked")
        .expect("receiver run");
    assert_eq!(report.error_code(), ErrorCode::ChecksumMismatch);

    // A bad whole-connection checksum is reported, but the bytes the
    // receiver actually got are still persisted rather than discarded.
    assert_eq!(fs::read(dst.path().join("corrupt.bin")).unwrap(), body);
}

#[test]
fn abort_after_seconds_terminates_a_slow_transfer() {
    let src = tempfile::tempdir().expect("tempdir");
    let dst = tempfile::tempdir().expect("tempdir");
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 256) as u8).collect();
    fs::write(src.path().join("slow.bin"), &payload).expect("write slow.bin");

    let (port, reservation) = allocate_test_port();
    drop(reservation);

    let recv_request = TransferRequest {
        directory: dst.path().to_path_buf(),
        start_port: port,
        num_ports: 1,
        ..TransferRequest::default()
    };
    let recv_options = WdtOptions {
        block_size: 4096,
        ..WdtOptions::default()
    };
    let receiver = Receiver::new(recv_request, recv_options);
    let recv_handle = std::thread::spawn(move || receiver.listen());

    let send_request = TransferRequest {
        destination: "127.0.0.1".into(),
        directory: src.path().to_path_buf(),
        start_port: port,
        num_ports: 1,
        ..TransferRequest::default()
    };
    // Throttled far below what 200,000 bytes needs to clear in one second,
    // so the abort fires mid-transfer rather than racing a transfer that
    // would have finished anyway.
    let send_options = WdtOptions {
        block_size: 4096,
        avg_bytes_per_sec: NonZeroU64::new(2_048),
        abort_after_seconds: Some(1),
        ..WdtOptions::default()
    };
    let send_report = transfer_with_retry(send_request, send_options);
    assert_eq!(send_report.error_code(), ErrorCode::AbortedByApplication);

    let recv_report = recv_handle
        .join()
        .expect("receiver thread panicked")
        .expect("receiver run");
    assert_eq!(recv_report.error_code(), ErrorCode::Abort);
}
