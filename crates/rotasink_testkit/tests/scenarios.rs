//! End-to-end scenarios run against every backend.

use rotasink_client::ObjectStoreClient;
use rotasink_core::{
    BlobRotateWriter, BlobStoreConfig, ObjectRotateWriter, ObjectStoreConfig, RotateError,
    RotateWriter, WriterState,
};
use rotasink_testkit::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn hello_world_produces_three_segments() {
    for dest in TestDestination::all() {
        let writer = dest.open("testfile", 14);
        for payload in hello_world_payloads() {
            assert_eq!(writer.write(&payload).unwrap(), 13);
        }
        writer.close().unwrap();

        let segments = dest.segments();
        assert_eq!(segments.len(), 3, "{}: {:?}", dest.kind(), segments);
        assert!(
            segments.iter().all(|(_, len)| *len == 13),
            "{}: {:?}",
            dest.kind(),
            segments
        );
        assert_eq!(dest.read("testfile"), b"Hello World 3");

        // Finalized segments hold the earlier payloads in order.
        let finalized = writer.finalized_segments();
        assert_eq!(finalized.len(), 2);
        assert_eq!(dest.read(&finalized[0]), b"Hello World 1");
        assert_eq!(dest.read(&finalized[1]), b"Hello World 2");
    }
}

#[test]
fn close_without_writes_leaves_one_empty_segment() {
    for dest in TestDestination::all() {
        let writer = dest.open("quiet", 10);
        writer.close().unwrap();
        assert_eq!(dest.segments(), vec![("quiet".to_string(), 0)], "{}", dest.kind());
    }
}

#[test]
fn oversized_payload_persists_nothing() {
    for dest in TestDestination::all() {
        let writer = dest.open("big", 4);
        let err = writer.write(b"too large").unwrap_err();
        assert!(matches!(err, RotateError::PayloadTooLarge { len: 9, threshold: 4 }));
        assert_eq!(writer.state(), WriterState::Open);
        writer.close().unwrap();
        assert_eq!(dest.segments(), vec![("big".to_string(), 0)], "{}", dest.kind());
    }
}

#[test]
fn threshold_sized_payload_rotates_before_landing() {
    for dest in TestDestination::all() {
        let writer = dest.open("k", 4);
        writer.write(b"abcd").unwrap();
        writer.write(b"e").unwrap();
        writer.close().unwrap();

        let finalized = writer.finalized_segments();
        assert_eq!(finalized.len(), 2, "{}", dest.kind());
        assert_eq!(dest.read(&finalized[0]), b"");
        assert_eq!(dest.read(&finalized[1]), b"abcd");
        assert_eq!(dest.read("k"), b"e");
    }
}

#[test]
fn independent_writers_keep_independent_counters() {
    for dest in TestDestination::all() {
        let a = dest.open("alpha", 10);
        let b = dest.open("beta", 10);

        a.write(b"123456").unwrap();
        b.write(b"12").unwrap();
        b.write(b"34").unwrap();
        // Only `a` crosses its threshold.
        a.write(b"7890").unwrap();
        b.write(b"56").unwrap();

        assert_eq!(a.finalized_segments().len(), 1, "{}", dest.kind());
        assert!(b.finalized_segments().is_empty(), "{}", dest.kind());
        a.close().unwrap();
        b.close().unwrap();

        assert_eq!(dest.read("alpha"), b"7890");
        assert_eq!(dest.read("beta"), b"123456");
    }
}

#[test]
fn concurrent_writes_never_split_a_payload() {
    for dest in TestDestination::all() {
        let writer: Arc<dyn RotateWriter> = Arc::from(dest.open("shared", 16));

        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let writer = Arc::clone(&writer);
                thread::spawn(move || {
                    for _ in 0..25 {
                        writer.write(&[b'a' + t; 4]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        writer.close().unwrap();

        let segments = dest.segments();
        let total: usize = segments.iter().map(|(_, len)| len).sum();
        assert_eq!(total, 400, "{}", dest.kind());
        for (name, len) in &segments {
            assert!(*len < 16, "{}: {} holds {} bytes", dest.kind(), name, len);
            for payload in dest.read(name).chunks(4) {
                assert!(payload.iter().all(|&b| b == payload[0]));
            }
        }
    }
}

#[test]
fn rotate_on_closed_writer_is_a_no_op() {
    for dest in TestDestination::all() {
        let writer = dest.open("done", 10);
        writer.write(b"abc").unwrap();
        writer.close().unwrap();
        writer.rotate().unwrap();
        assert!(matches!(writer.write(b"x"), Err(RotateError::Closed)));
        assert_eq!(dest.segments(), vec![("done".to_string(), 3)], "{}", dest.kind());
    }
}

#[test]
fn restart_finalizes_the_previous_run() {
    for dest in TestDestination::all() {
        let first = dest.open("app", 100);
        first.write(b"first run").unwrap();
        first.close().unwrap();

        let second = dest.open("app", 100);
        let finalized = second.finalized_segments();
        assert_eq!(finalized.len(), 1, "{}", dest.kind());
        second.write(b"second run").unwrap();
        second.close().unwrap();

        assert_eq!(dest.read(&finalized[0]), b"first run");
        assert_eq!(dest.read("app"), b"second run");
    }
}

#[test]
fn object_copy_failure_keeps_the_working_object() {
    let dest = TestDestination::object();
    let TestDestination::Object(client) = &dest else {
        unreachable!()
    };
    let writer = dest.open("testfile", 14);
    writer.write(b"Hello World 1").unwrap();

    client.fail_next_copy("internal error");
    let err = writer.write(b"Hello World 2").unwrap_err();
    assert!(matches!(err, RotateError::CopyFailed { .. }));
    assert_eq!(writer.state(), WriterState::Failed);
    assert!(matches!(writer.write(b"x"), Err(RotateError::Poisoned)));

    assert_eq!(dest.segments(), vec![("testfile".to_string(), 13)]);
    assert_eq!(dest.read("testfile"), b"Hello World 1");
    assert_eq!(client.delete_calls(), 0);
}

#[test]
fn blob_copy_timeout_keeps_the_working_blob() {
    let dest = TestDestination::blob();
    let TestDestination::Blob(client) = &dest else {
        unreachable!()
    };
    let writer = BlobRotateWriter::connect(
        Arc::clone(client),
        BlobStoreConfig::new("devstoreaccount1", TEST_CONTAINER, "testfile", 14)
            .with_poll_interval(Duration::from_millis(2))
            .with_copy_timeout(Duration::from_millis(30)),
    )
    .unwrap();
    writer.write(b"Hello World 1").unwrap();

    client.set_pending_polls(u32::MAX);
    let err = writer.rotate().unwrap_err();
    assert!(matches!(err, RotateError::RotationTimedOut { .. }));
    assert!(err.may_leave_duplicate());
    assert!(client.status_polls() > 1);
    assert_eq!(dest.read("testfile"), b"Hello World 1");
}

#[test]
fn provisioning_is_idempotent() {
    let objects = TestDestination::object();
    let TestDestination::Object(client) = &objects else {
        unreachable!()
    };
    let config = ObjectStoreConfig::new("localhost:9000", TEST_BUCKET, "one", 10);
    for _ in 0..2 {
        ObjectRotateWriter::connect(Arc::clone(client), config.clone())
            .unwrap()
            .close()
            .unwrap();
    }
    assert!(client.bucket_exists(TEST_BUCKET).unwrap());
    assert_eq!(objects.segments(), vec![("one".to_string(), 0)]);

    let blobs = TestDestination::blob();
    for _ in 0..2 {
        blobs.open("one", 10).close().unwrap();
    }
    assert_eq!(blobs.segments(), vec![("one".to_string(), 0)]);
}
