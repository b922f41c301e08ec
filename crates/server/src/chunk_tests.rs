// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Read;

use flate2::read::GzDecoder;

use super::*;

/// Reassemble frames and gunzip, asserting the framing invariants.
fn decode(frames: &[Vec<u8>]) -> Vec<u8> {
    let total = frames.len();
    assert!(total >= 1 && total <= MAX_CHUNKS);
    let mut compressed = Vec::new();
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame[0], CHUNK_MARKER);
        assert_eq!(frame[1] as usize, i);
        assert_eq!(frame[2] as usize, total);
        assert!((frame[1] as usize) < frame[2] as usize);
        compressed.extend_from_slice(&frame[3..]);
    }
    let mut out = Vec::new();
    GzDecoder::new(compressed.as_slice()).read_to_end(&mut out).unwrap();
    out
}

#[test]
fn roundtrip_small_payload() {
    let payload = b"hello terminal".to_vec();
    let frames = encode(&payload).frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(decode(&frames), payload);
}

#[test]
fn roundtrip_empty_payload() {
    let frames = encode(&[]).frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(decode(&frames), Vec::<u8>::new());
}

#[test]
fn roundtrip_multi_chunk_payload() {
    // Random-ish incompressible bytes so the gzip output spans chunks.
    let payload: Vec<u8> =
        (0..64 * 1024u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
    let frames = encode(&payload).frames();
    assert!(frames.len() > 1);
    assert_eq!(decode(&frames), payload);
}

#[test]
fn chunk_count_never_exceeds_255() {
    // ~5 MiB of incompressible data would need >255 default-size chunks,
    // forcing the chunk size up instead.
    let payload: Vec<u8> =
        (0..5 * 1024 * 1024u32).map(|i| (i.wrapping_mul(2246822519) >> 11) as u8).collect();
    let frames = encode(&payload).frames();
    assert!(frames.len() <= MAX_CHUNKS);
    assert_eq!(decode(&frames), payload);
}

#[test]
fn chunks_carry_sequential_indices() {
    let payload = vec![0xAB; 100 * 1024];
    let frames = encode(&payload).frames();
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame[1] as usize, i);
        assert_eq!(frame[2] as usize, frames.len());
    }
}
