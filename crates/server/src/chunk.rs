// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunked gzip framing for ring-buffer and snapshot delivery.
//!
//! Large payloads are gzipped and fragmented into binary frames of the
//! form `[0x02, chunk_index, total_chunks, …data]` so the browser can
//! reassemble them without a streaming decoder.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

/// Marker byte identifying a chunked frame.
pub const CHUNK_MARKER: u8 = 0x02;

/// Default chunk payload size.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Smallest allowed chunk payload size.
pub const MIN_CHUNK_SIZE: usize = 512;

/// A chunk index is a single byte, so a payload fragments into at most
/// 255 chunks; the chunk size grows when the payload would need more.
pub const MAX_CHUNKS: usize = 255;

/// Result of encoding a payload for delivery.
pub enum Encoded {
    /// Gzipped and fragmented into `[0x02, idx, total, …]` frames.
    Chunked(Vec<Vec<u8>>),
    /// Compression failed; send the payload as one raw binary frame.
    Raw(Vec<u8>),
}

impl Encoded {
    /// All frames to send, in order.
    pub fn frames(self) -> Vec<Vec<u8>> {
        match self {
            Encoded::Chunked(frames) => frames,
            Encoded::Raw(data) => vec![data],
        }
    }
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Split `compressed` into marker-prefixed frames.
fn fragment(compressed: &[u8]) -> Vec<Vec<u8>> {
    let mut chunk_size = DEFAULT_CHUNK_SIZE.max(MIN_CHUNK_SIZE);
    let total_len = compressed.len().max(1);
    if total_len.div_ceil(chunk_size) > MAX_CHUNKS {
        chunk_size = total_len.div_ceil(MAX_CHUNKS);
    }

    let total = total_len.div_ceil(chunk_size).max(1);
    let mut frames = Vec::with_capacity(total);
    for (idx, piece) in compressed.chunks(chunk_size).enumerate() {
        let mut frame = Vec::with_capacity(3 + piece.len());
        frame.push(CHUNK_MARKER);
        frame.push(idx as u8);
        frame.push(total as u8);
        frame.extend_from_slice(piece);
        frames.push(frame);
    }
    if frames.is_empty() {
        // Empty payload still produces one (empty) chunk.
        frames.push(vec![CHUNK_MARKER, 0, 1]);
    }
    frames
}

/// Gzip and fragment a payload; falls back to a single raw frame when
/// compression fails.
pub fn encode(payload: &[u8]) -> Encoded {
    match gzip(payload) {
        Ok(compressed) => Encoded::Chunked(fragment(&compressed)),
        Err(e) => {
            tracing::warn!(err = %e, "chunk: gzip failed, sending uncompressed");
            Encoded::Raw(payload.to_vec())
        }
    }
}

#[cfg(test)]
#[path = "chunk_tests.rs"]
mod tests;
