// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;
use std::vec::Vec;

use crate::device::{CharDevice, OpenFlags};
use crate::error::DeviceError;
use crate::sink::VirtualSink;
use crate::store::LogStore;
use crate::tests::fixtures::{journal, Event, MemStore, RecordingConsole};

#[test]
fn test_fan_out_appends_before_forwarding() {
    let events = journal();
    let store = Arc::new(MemStore::new(16, events.clone()));
    let console = Arc::new(RecordingConsole::new("uart0", events.clone()));
    let sink = VirtualSink::new(Some(store.clone()), Some(console), 512);

    let written = sink.write(0, b"hello flash\n");

    assert_eq!(written, 12);
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], Event::Append(b"hello flash\n".to_vec()));
    match &events[1] {
        Event::ConsoleWrite { bytes, .. } => assert_eq!(bytes, b"hello flash\n"),
        other => panic!("expected console write, got {:?}", other),
    }
}

#[test]
fn test_console_failure_does_not_affect_store_or_result() {
    let events = journal();
    let store = Arc::new(MemStore::new(16, events.clone()));
    let console = Arc::new(RecordingConsole::failing("uart0", events.clone()));
    let sink = VirtualSink::new(Some(store.clone()), Some(console), 512);

    assert_eq!(sink.write(0, b"payload"), 7);
    assert_eq!(store.payloads(), vec![b"payload".to_vec()]);
}

#[test]
fn test_full_store_still_forwards_and_reports_length() {
    let events = journal();
    let store = Arc::new(MemStore::new(1, events.clone()));
    let console = Arc::new(RecordingConsole::new("uart0", events.clone()));
    let sink = VirtualSink::new(Some(store.clone()), Some(console), 512);

    assert_eq!(sink.write(0, b"first"), 5);
    assert_eq!(sink.write(0, b"second"), 6);
    assert_eq!(sink.write(0, b"third"), 5);

    assert_eq!(store.count_pending(), 1);
    let forwarded: Vec<Vec<u8>> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            Event::ConsoleWrite { bytes, .. } => Some(bytes.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(forwarded, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
}

#[test]
fn test_console_written_in_stream_mode_and_flags_restored() {
    let events = journal();
    let console = Arc::new(RecordingConsole::new("uart0", events.clone()));
    let sink = VirtualSink::new(None, Some(console.clone()), 512);

    sink.write(0, b"x");

    match &events.lock().unwrap()[0] {
        Event::ConsoleWrite { flags, .. } => {
            assert!(flags.contains(OpenFlags::STREAM));
            assert!(flags.contains(OpenFlags::RDWR));
        }
        other => panic!("expected console write, got {:?}", other),
    }
    assert_eq!(console.open_flags(), OpenFlags::RDWR);
}

#[test]
fn test_long_write_split_into_records() {
    let events = journal();
    let store = Arc::new(MemStore::new(16, events.clone()));
    let sink = VirtualSink::new(Some(store.clone()), None, 4);

    assert_eq!(sink.write(0, b"abcdefghij"), 10);

    assert_eq!(
        store.payloads(),
        vec![b"abcd".to_vec(), b"efgh".to_vec(), b"ij".to_vec()]
    );
    assert_eq!(store.text(), "abcdefghij");
}

#[test]
fn test_no_store_no_console() {
    let sink = VirtualSink::new(None, None, 512);
    assert!(!sink.has_store());
    assert!(sink.console().is_none());
    assert_eq!(sink.write(0, b"into the void"), 13);
    assert_eq!(sink.write(0, b""), 0);
}

#[test]
fn test_only_write_is_supported() {
    let sink = VirtualSink::new(None, None, 512);
    let mut buf = [0u8; 8];

    assert_eq!(sink.name(), "logmgr");
    assert_eq!(sink.open(OpenFlags::RDWR), Err(DeviceError::Unsupported));
    assert_eq!(sink.read(0, &mut buf), Err(DeviceError::Unsupported));
    assert_eq!(sink.control(0), Err(DeviceError::Unsupported));
}

#[test]
fn test_zero_record_len_is_clamped() {
    let sink = VirtualSink::new(None, None, 0);
    assert_eq!(sink.max_record_len(), 1);
}
