// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Segment lifecycle and accessor tests against real OS shared memory.

mod common;

use std::time::Duration;

use common::{unique_name, Cleanup};
use mshm_core::{ErrorKind, Segment, SegmentOptions, SegmentState, SizeMismatch};

#[test]
fn test_open_close() {
    let name = unique_name("open-close");
    let _cleanup = Cleanup(name.clone());

    for size in [1, 16, 4096, 1 << 20] {
        let mut segment = Segment::open(&name, size).expect("open");
        segment.close().expect("close");
        let _ = Segment::delete(&name);
    }
}

#[test]
fn test_creator_state_and_capacity() {
    let name = unique_name("creator");
    let _cleanup = Cleanup(name.clone());

    let segment = Segment::open(&name, 128).unwrap();
    assert!(segment.is_creator());
    assert_eq!(segment.state(), SegmentState::Created);
    assert_eq!(segment.capacity().unwrap(), 128);
    assert_eq!(segment.size_mismatch(), None);
}

#[test]
fn test_invalid_names_rejected() {
    let long = "a".repeat(256);
    for bad in ["", "a/b", "foo@bar", "with space", "new\nline", long.as_str()] {
        let err = Segment::open(bad, 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter, "name {:?}", bad);
    }
}

#[test]
fn test_zero_size_rejected() {
    let err = Segment::open(&unique_name("zero"), 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[test]
fn test_new_segment_is_zeroed() {
    let name = unique_name("zeroed");
    let _cleanup = Cleanup(name.clone());

    let segment = Segment::open(&name, 256).unwrap();
    let mut buf = [0xFFu8; 256];
    segment.read(&mut buf, 0).unwrap();
    assert!(buf.iter().all(|b| *b == 0));
}

#[test]
fn test_round_trip() {
    let name = unique_name("round-trip");
    let _cleanup = Cleanup(name.clone());
    const N: usize = 64;

    let segment = Segment::open(&name, N).unwrap();

    // Whole buffer.
    let whole: Vec<u8> = (0..N as u8).collect();
    segment.write(&whole, 0).unwrap();
    let mut back = vec![0u8; N];
    segment.read(&mut back, 0).unwrap();
    assert_eq!(back, whole);

    // Single trailing byte.
    segment.write(&[0xEE], N - 1).unwrap();
    let mut last = [0u8; 1];
    segment.read(&mut last, N - 1).unwrap();
    assert_eq!(last, [0xEE]);

    // Interior range.
    segment.write(b"mshm", 10).unwrap();
    let mut mid = [0u8; 4];
    segment.read(&mut mid, 10).unwrap();
    assert_eq!(&mid, b"mshm");

    // Neighbours untouched.
    let mut around = [0u8; 2];
    segment.read(&mut around, 9).unwrap();
    assert_eq!(around, [9, b'm']);
}

#[test]
fn test_bounds_violation_leaves_buffer_untouched() {
    let name = unique_name("bounds");
    let _cleanup = Cleanup(name.clone());
    const N: usize = 32;

    let segment = Segment::open(&name, N).unwrap();
    segment.write(&[0x11; N], 0).unwrap();

    let err = segment.write(&[0x22; 2], N - 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeExceeded);
    let err = segment.write(&[0x22; N + 1], 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeExceeded);

    let mut dst = [0u8; 4];
    let err = segment.read(&mut dst, N).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeExceeded);
    assert_eq!(dst, [0; 4]);

    let mut all = [0u8; N];
    segment.read(&mut all, 0).unwrap();
    assert!(all.iter().all(|b| *b == 0x11));
}

#[test]
fn test_attach_sees_existing_data() {
    let name = unique_name("attach");
    let _cleanup = Cleanup(name.clone());

    let writer = Segment::open(&name, 16).unwrap();
    writer.write(&0xDEAD_BEEFu32.to_le_bytes(), 0).unwrap();

    let reader = Segment::open(&name, 16).unwrap();
    assert!(!reader.is_creator());
    assert_eq!(reader.state(), SegmentState::Attached);

    let mut buf = [0u8; 4];
    reader.read(&mut buf, 0).unwrap();
    assert_eq!(u32::from_le_bytes(buf), 0xDEAD_BEEF);

    reader.write(&[1, 2, 3, 4], 12).unwrap();
    writer.read(&mut buf, 12).unwrap();
    assert_eq!(buf, [1, 2, 3, 4]);
}

#[test]
fn test_attach_with_different_size_keeps_creator_capacity() {
    let name = unique_name("mismatch");
    let _cleanup = Cleanup(name.clone());

    let creator = Segment::open(&name, 32).unwrap();
    creator.write(&[7; 32], 0).unwrap();

    let larger = Segment::open(&name, 64).unwrap();
    assert_eq!(larger.capacity().unwrap(), 32);
    assert_eq!(
        larger.size_mismatch(),
        Some(SizeMismatch {
            requested: 64,
            capacity: 32
        })
    );
    let err = larger.write(&[0; 8], 30).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeExceeded);

    let smaller = Segment::open(&name, 8).unwrap();
    assert_eq!(smaller.capacity().unwrap(), 32);
    let mut tail = [0u8; 4];
    smaller.read(&mut tail, 28).unwrap();
    assert_eq!(tail, [7; 4]);

    // The creator's view is unaffected by either attach.
    let mut all = [0u8; 32];
    creator.read(&mut all, 0).unwrap();
    assert_eq!(all, [7; 32]);
}

#[test]
fn test_double_close() {
    let name = unique_name("double-close");
    let _cleanup = Cleanup(name.clone());

    let mut segment = Segment::open(&name, 8).unwrap();
    assert!(segment.close().is_ok());
    assert_eq!(segment.state(), SegmentState::Closed);
    assert!(!segment.is_open());

    let err = segment.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotOpen);
}

#[test]
fn test_use_after_close() {
    let name = unique_name("after-close");
    let _cleanup = Cleanup(name.clone());

    let mut segment = Segment::open(&name, 8).unwrap();
    segment.close().unwrap();

    assert_eq!(segment.write(&[1], 0).unwrap_err().kind(), ErrorKind::NotOpen);
    let mut buf = [0u8; 1];
    assert_eq!(segment.read(&mut buf, 0).unwrap_err().kind(), ErrorKind::NotOpen);
    assert_eq!(segment.capacity().unwrap_err().kind(), ErrorKind::NotOpen);
}

#[test]
fn test_namespace_prefix_isolates_segments() {
    let name = unique_name("prefixed");
    let scoped = SegmentOptions::new().with_namespace_prefix("scoped-").unwrap();
    let _cleanup = Cleanup(name.clone());

    let plain = Segment::open(&name, 8).unwrap();
    plain.write(&[9; 8], 0).unwrap();

    let other = Segment::open_with(&name, 8, &scoped).unwrap();
    assert!(other.is_creator());
    let mut buf = [0xFFu8; 8];
    other.read(&mut buf, 0).unwrap();
    assert_eq!(buf, [0; 8]);

    drop(other);
    let _ = Segment::delete_with(&name, &scoped);
}

#[test]
fn test_attach_with_unbounded_init_timeout() {
    let name = unique_name("wait-forever");
    let _cleanup = Cleanup(name.clone());
    let patient = SegmentOptions::new().with_init_timeout(Duration::MAX);

    let creator = Segment::open_with(&name, 16, &patient).unwrap();
    creator.write(b"ready", 0).unwrap();

    let attacher = Segment::open_with(&name, 16, &patient).unwrap();
    assert!(!attacher.is_creator());
    let mut buf = [0u8; 5];
    attacher.read(&mut buf, 0).unwrap();
    assert_eq!(&buf, b"ready");
}

#[test]
fn test_prefixed_name_too_long_rejected() {
    let scoped = SegmentOptions::new().with_namespace_prefix("app-").unwrap();
    let longest = "a".repeat(255);

    let err = Segment::open_with(&longest, 8, &scoped).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    let err = Segment::delete_with(&longest, &scoped).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[cfg(unix)]
mod posix {
    use std::fs::File;

    use mshm_core::{NamePolicy, PosixShmNamespace, SegmentName};
    use nix::fcntl::OFlag;
    use nix::sys::mman::shm_open;
    use nix::sys::stat::Mode;

    use super::*;

    /// Create the OS object directly, bypassing header initialization.
    fn create_raw_object(name: &str, len: u64) -> File {
        let object = PosixShmNamespace::new().object_name(&SegmentName::new(name).unwrap());
        let fd = shm_open(
            object.as_str(),
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )
        .unwrap();
        let file = File::from(fd);
        file.set_len(len).unwrap();
        file
    }

    fn impatient() -> SegmentOptions {
        SegmentOptions::new().with_init_timeout(Duration::from_millis(10))
    }

    #[test]
    fn test_attach_to_unsized_object_times_out_without_resizing() {
        let name = unique_name("unsized");
        let _cleanup = Cleanup(name.clone());
        let raw = create_raw_object(&name, 0);

        let err = Segment::open_with(&name, 64, &impatient()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OpenFailed);
        assert_eq!(raw.metadata().unwrap().len(), 0);
    }

    #[test]
    fn test_attach_to_unpublished_header_times_out() {
        let name = unique_name("unpublished");
        let _cleanup = Cleanup(name.clone());
        let len = (Segment::HEADER_SIZE + 64) as u64;
        let raw = create_raw_object(&name, len);

        let err = Segment::open_with(&name, 4096, &impatient()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OpenFailed);
        assert_eq!(raw.metadata().unwrap().len(), len);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_failed_create_removes_object() {
        let name = unique_name("failed-create");
        let _cleanup = Cleanup(name.clone());

        // Fits in usize but not in the OS's signed file length.
        let err = Segment::open(&name, usize::MAX / 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResizeFailed);

        let err = Segment::delete(&name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeleteFailed);

        let fresh = Segment::open(&name, 8).unwrap();
        assert!(fresh.is_creator());
    }

    #[test]
    fn test_delete_then_reopen_is_fresh() {
        let name = unique_name("delete");
        let _cleanup = Cleanup(name.clone());

        let old = Segment::open(&name, 16).unwrap();
        old.write(&[0xAB; 16], 0).unwrap();

        Segment::delete(&name).unwrap();

        let fresh = Segment::open(&name, 16).unwrap();
        assert!(fresh.is_creator());
        let mut buf = [0xFFu8; 16];
        fresh.read(&mut buf, 0).unwrap();
        assert_eq!(buf, [0; 16]);

        // The pre-delete handle keeps its own mapping.
        old.write(&[0xCD; 4], 0).unwrap();
        let mut old_buf = [0u8; 16];
        old.read(&mut old_buf, 0).unwrap();
        assert_eq!(&old_buf[..4], &[0xCD; 4]);
        assert_eq!(&old_buf[4..], &[0xAB; 12]);

        fresh.read(&mut buf, 0).unwrap();
        assert_eq!(buf, [0; 16]);
    }

    #[test]
    fn test_segment_outlives_its_creator() {
        let name = unique_name("persist");
        let _cleanup = Cleanup(name.clone());

        let mut creator = Segment::open(&name, 8).unwrap();
        creator.write(b"persists", 0).unwrap();
        creator.close().unwrap();

        let later = Segment::open(&name, 8).unwrap();
        assert!(!later.is_creator());
        let mut buf = [0u8; 8];
        later.read(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"persists");
    }

    #[test]
    fn test_delete_missing_segment_fails() {
        let err = Segment::delete(&unique_name("missing")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeleteFailed);
    }
}

#[cfg(windows)]
mod windows {
    use super::*;
    use mshm_core::ShmError;

    #[test]
    fn test_delete_is_unsupported() {
        let err = Segment::delete(&unique_name("delete")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeleteFailed);
        assert!(matches!(err, ShmError::DeleteUnsupported { .. }));
    }
}
