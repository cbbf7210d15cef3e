// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for midicap
//!
//! These tests drive the capture pipeline through the scripted backend and
//! check the files that come out of it.

use std::fs;
use std::thread;
use std::time::Duration;

use midicap::midi::{ScriptedBackend, ScriptedInjector};
use midicap::{
    convert_log, convert_log_file, Error, Notification, OutputSelection, RecorderHandle,
    SessionConfig, TickUnit,
};

const WAIT: Duration = Duration::from_secs(2);
const POLL: Duration = Duration::from_millis(1);

fn backend() -> (ScriptedBackend, ScriptedInjector) {
    let backend = ScriptedBackend::new(
        vec!["Keyboard".to_string()],
        vec!["Synth".to_string()],
    );
    let injector = backend.injector();
    (backend, injector)
}

fn expect_status(recorder: &RecorderHandle, expected: &str) {
    assert_eq!(
        recorder.recv_notification_timeout(WAIT),
        Some(Notification::Status(expected.to_string()))
    );
}

/// Split a Type 0 file into its header division and track body
fn track_body(bytes: &[u8]) -> (u16, &[u8]) {
    assert_eq!(&bytes[0..4], b"MThd");
    assert_eq!(&bytes[8..10], &[0, 0], "format 0");
    assert_eq!(&bytes[10..12], &[0, 1], "one track");
    let division = u16::from_be_bytes([bytes[12], bytes[13]]);
    assert_eq!(&bytes[14..18], b"MTrk");
    let len = u32::from_be_bytes([bytes[18], bytes[19], bytes[20], bytes[21]]) as usize;
    let body = &bytes[22..];
    assert_eq!(body.len(), len);
    (division, body)
}

/// Read one variable-length quantity
fn read_vlq(data: &[u8]) -> (u32, usize) {
    let mut value = 0u32;
    for (i, byte) in data.iter().enumerate() {
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return (value, i + 1);
        }
    }
    panic!("unterminated VLQ");
}

#[test]
fn test_record_session_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, injector) = backend();
    let recorder = RecorderHandle::spawn(backend, POLL).unwrap();

    recorder.connect(0, OutputSelection::Port(0)).unwrap();
    expect_status(&recorder, "Device connected");
    recorder
        .start_record(SessionConfig::new(dir.path(), "take.mid", 120.0))
        .unwrap();
    expect_status(&recorder, "Recording started");

    assert!(injector.inject(&[0x90, 60, 100]));
    thread::sleep(Duration::from_millis(30));
    assert!(injector.inject(&[0x80, 60, 0]));

    recorder.stop_record().unwrap();
    let notifications = recorder.join();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].message().starts_with("File saved: "));

    // Forwarded while recording
    assert_eq!(injector.sent(), vec![vec![0x90, 60, 100], vec![0x80, 60, 0]]);
    assert!(!injector.is_connected());

    let bytes = fs::read(dir.path().join("take.mid")).unwrap();
    let (division, body) = track_body(&bytes);
    assert_eq!(division, 480);

    // Tempo at delta 0, then the note-on at delta 0
    assert_eq!(&body[0..7], &[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
    assert_eq!(&body[7..11], &[0x00, 0x90, 60, 100]);

    let (delta, used) = read_vlq(&body[11..]);
    assert!(delta >= 30 && delta < 2000, "delta {} ms", delta);
    let rest = &body[11 + used..];
    assert_eq!(&rest[0..3], &[0x80, 60, 0]);
    assert_eq!(&rest[3..], &[0x00, 0xFF, 0x2F, 0x00]);
}

#[test]
fn test_virtual_output_records_without_forwarding() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, injector) = backend();
    let recorder = RecorderHandle::spawn(backend, POLL).unwrap();

    recorder.connect(0, OutputSelection::Virtual).unwrap();
    expect_status(&recorder, "Device connected");

    // Connected but not armed: forwarded nowhere, recorded nowhere
    injector.inject(&[0xB0, 64, 127]);

    let config = SessionConfig::new(dir.path(), "virtual.mid", 90.0)
        .with_resolution(96)
        .with_tick_unit(TickUnit::Beats);
    recorder.start_record(config).unwrap();
    expect_status(&recorder, "Recording started");
    injector.inject(&[0x90, 64, 80]);

    recorder.stop_record().unwrap();
    let notifications = recorder.join();
    assert!(notifications.iter().all(|n| !n.is_error()));
    assert!(injector.sent().is_empty());

    let bytes = fs::read(dir.path().join("virtual.mid")).unwrap();
    let (division, body) = track_body(&bytes);
    assert_eq!(division, 96);
    // 60e6 / 90 = 666666
    assert_eq!(&body[4..7], &666_666u32.to_be_bytes()[1..]);
    assert_eq!(&body[7..11], &[0x00, 0x90, 64, 80]);
    assert_eq!(body.len(), 15);
}

#[test]
fn test_invalid_messages_are_reported_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, injector) = backend();
    let recorder = RecorderHandle::spawn(backend, POLL).unwrap();

    recorder.connect(0, OutputSelection::Virtual).unwrap();
    expect_status(&recorder, "Device connected");
    recorder
        .start_record(SessionConfig::new(dir.path(), "mixed.mid", 120.0))
        .unwrap();
    expect_status(&recorder, "Recording started");

    injector.inject(&[0x90, 60, 100]);
    injector.inject(&[0xF1, 0x10]);
    injector.inject(&[0x80, 60, 0]);

    recorder.stop_record().unwrap();
    let notifications = recorder.join();
    assert_eq!(notifications.iter().filter(|n| n.is_error()).count(), 1);
    assert!(notifications.last().unwrap().message().starts_with("File saved: "));
    assert!(dir.path().join("mixed.mid").exists());
}

#[test]
fn test_connect_failure_reports_error() {
    let (backend, _injector) = backend();
    let recorder = RecorderHandle::spawn(backend, POLL).unwrap();

    recorder.connect(5, OutputSelection::Virtual).unwrap();
    let reply = recorder.recv_notification_timeout(WAIT).unwrap();
    assert!(reply.is_error());
    assert!(reply.message().contains("input port 5"));

    // Arming without a connection is refused
    recorder.start_record(SessionConfig::default()).unwrap();
    assert!(recorder.recv_notification_timeout(WAIT).unwrap().is_error());

    recorder.stop_record().unwrap();
    let notifications = recorder.join();
    assert_eq!(
        notifications,
        vec![Notification::Status("Stopped without recording".to_string())]
    );
}

#[test]
fn test_empty_recording_writes_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, _injector) = backend();
    let recorder = RecorderHandle::spawn(backend, POLL).unwrap();

    recorder.connect(0, OutputSelection::Virtual).unwrap();
    expect_status(&recorder, "Device connected");
    recorder
        .start_record(SessionConfig::new(dir.path(), "silence.mid", 120.0))
        .unwrap();
    expect_status(&recorder, "Recording started");

    recorder.stop_record().unwrap();
    assert!(recorder.join().is_empty());
    assert!(!dir.path().join("silence.mid").exists());
}

#[test]
fn test_commands_after_stop_fail() {
    let (backend, _injector) = backend();
    let recorder = RecorderHandle::spawn(backend, POLL).unwrap();
    recorder.stop_record().unwrap();

    let deadline = std::time::Instant::now() + WAIT;
    while !recorder.is_finished() && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(recorder.is_finished());
    assert!(matches!(recorder.stop_record(), Err(Error::PipelineClosed)));
}

#[test]
fn test_save_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, injector) = backend();
    let recorder = RecorderHandle::spawn(backend, POLL).unwrap();

    recorder.connect(0, OutputSelection::Virtual).unwrap();
    expect_status(&recorder, "Device connected");
    recorder
        .start_record(SessionConfig::new(dir.path().join("missing"), "take.mid", 120.0))
        .unwrap();
    expect_status(&recorder, "Recording started");
    injector.inject(&[0x90, 60, 100]);

    recorder.stop_record().unwrap();
    let notifications = recorder.join();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].is_error());
    assert!(!dir.path().join("missing").exists());
}

#[test]
fn test_log_conversion_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("session.txt");
    fs::write(
        &log,
        "MFile 0 1 96\nMTrk\n0 TimeSig 3/4 24 8\n0 Tempo 600000\n0 On ch=1 n=60 v=100\n96 Off ch=1 n=60 v=0\nTrkEnd\n",
    )
    .unwrap();

    let path = convert_log_file(&log, dir.path().join("session.mid")).unwrap();
    let bytes = fs::read(path).unwrap();
    let (division, body) = track_body(&bytes);
    assert_eq!(division, 96);
    assert_eq!(
        body,
        &[
            0x00, 0xFF, 0x51, 0x03, 0x09, 0x27, 0xC0, // tempo 600000
            0x00, 0xFF, 0x58, 0x04, 3, 2, 24, 8, // 3/4
            0x00, 0x90, 60, 100, //
            0x60, 0x80, 60, 0, //
            0x00, 0xFF, 0x2F, 0x00,
        ][..]
    );
}

#[test]
fn test_log_parse_error_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("broken.log");
    fs::write(&log, "0 On n=60\nabc On n=60\n").unwrap();

    let err = convert_log_file(&log, dir.path().join("broken.mid")).unwrap_err();
    assert!(matches!(err, Error::LogParse { line: 2, .. }));
    assert!(!dir.path().join("broken.mid").exists());

    assert!(convert_log("0 Par ch=2 c=7 v=127").is_ok());
}
