// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Scrollback capacity per session.
pub const RING_CAPACITY: usize = 512 * 1024;

/// Fixed-capacity circular byte buffer for raw PTY output.
///
/// Late-joining viewers receive the whole buffer, so the only read
/// operation is an oldest-first snapshot. When the buffer wraps, older
/// data is silently discarded.
#[derive(Debug)]
pub struct RingBuffer {
    buf: Vec<u8>,
    capacity: usize,
    write_pos: usize,
    filled: bool,
}

impl RingBuffer {
    /// Create a new ring buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self { buf: vec![0u8; capacity], capacity, write_pos: 0, filled: false }
    }

    /// Append data into the circular buffer, wrapping as needed.
    pub fn write(&mut self, data: &[u8]) {
        // A chunk larger than the buffer reduces to its trailing bytes.
        let data = if data.len() > self.capacity {
            self.filled = true;
            &data[data.len() - self.capacity..]
        } else {
            data
        };

        let start = self.write_pos;
        let end = start + data.len();
        if end <= self.capacity {
            self.buf[start..end].copy_from_slice(data);
        } else {
            let first = self.capacity - start;
            self.buf[start..self.capacity].copy_from_slice(&data[..first]);
            self.buf[..data.len() - first].copy_from_slice(&data[first..]);
            self.filled = true;
        }
        self.write_pos = end % self.capacity;
        if end >= self.capacity {
            self.filled = true;
        }
    }

    /// Bytes currently stored (≤ capacity).
    pub fn len(&self) -> usize {
        if self.filled {
            self.capacity
        } else {
            self.write_pos
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out the buffered bytes in write order, oldest first.
    pub fn snapshot(&self) -> Vec<u8> {
        if !self.filled {
            return self.buf[..self.write_pos].to_vec();
        }
        let mut out = Vec::with_capacity(self.capacity);
        out.extend_from_slice(&self.buf[self.write_pos..]);
        out.extend_from_slice(&self.buf[..self.write_pos]);
        out
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
