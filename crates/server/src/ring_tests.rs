// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn empty_snapshot() {
    let ring = RingBuffer::new(16);
    assert!(ring.is_empty());
    assert_eq!(ring.snapshot(), Vec::<u8>::new());
}

#[test]
fn sequential_writes() {
    let mut ring = RingBuffer::new(16);
    ring.write(b"hello");
    ring.write(b" world");
    assert_eq!(ring.len(), 11);
    assert_eq!(ring.snapshot(), b"hello world".to_vec());
}

#[test]
fn wrap_discards_oldest() {
    let mut ring = RingBuffer::new(8);
    ring.write(b"abcdef"); // write_pos=6
    ring.write(b"ghij"); // wraps, oldest "ab" gone
    assert_eq!(ring.len(), 8);
    assert_eq!(ring.snapshot(), b"cdefghij".to_vec());
}

#[test]
fn exact_capacity_write() {
    let mut ring = RingBuffer::new(4);
    ring.write(b"abcd");
    assert_eq!(ring.len(), 4);
    assert_eq!(ring.snapshot(), b"abcd".to_vec());
}

#[test]
fn overwrite_full_buffer() {
    let mut ring = RingBuffer::new(4);
    ring.write(b"abcd");
    ring.write(b"efgh");
    assert_eq!(ring.snapshot(), b"efgh".to_vec());
}

#[test]
fn oversized_chunk_keeps_tail() {
    let mut ring = RingBuffer::new(4);
    ring.write(b"0123456789");
    assert_eq!(ring.len(), 4);
    assert_eq!(ring.snapshot(), b"6789".to_vec());
}

#[test]
fn never_exceeds_capacity() {
    let mut ring = RingBuffer::new(32);
    for i in 0u32..100 {
        ring.write(format!("chunk-{i};").as_bytes());
        assert!(ring.len() <= 32);
    }
    // Snapshot ends with the most recent write.
    let snap = ring.snapshot();
    assert!(snap.ends_with(b"chunk-99;"));
}
