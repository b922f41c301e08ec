// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Non-blocking PTY master I/O on top of tokio's `AsyncFd`.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd};

use nix::libc;
use tokio::io::unix::AsyncFd;

/// Newtype wrapper around the PTY master `OwnedFd` for use with `AsyncFd`.
#[derive(Debug)]
pub struct PtyFd(pub OwnedFd);

impl AsRawFd for PtyFd {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.0.as_raw_fd()
    }
}

/// Set the given file descriptor to non-blocking mode.
// fcntl requires unsafe for the raw libc calls
#[allow(unsafe_code)]
pub fn set_nonblocking(fd: &impl AsRawFd) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: fcntl on an open descriptor we own; no pointers involved.
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(raw, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// The raw read/write below require unsafe for the libc calls; the buffers
// are live for the duration of each call.
#[allow(unsafe_code)]
fn raw_read(fd: i32, buf: &mut [u8]) -> io::Result<usize> {
    // SAFETY: buf is a valid, exclusively-borrowed slice of at least len bytes.
    let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

#[allow(unsafe_code)]
fn raw_write(fd: i32, buf: &[u8]) -> io::Result<usize> {
    // SAFETY: buf is a valid borrowed slice of at least len bytes.
    let n = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

/// Read a chunk of data from the async PTY fd.
pub async fn read_chunk(afd: &AsyncFd<PtyFd>, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let mut guard = afd.readable().await?;
        match guard.try_io(|inner| raw_read(inner.get_ref().as_raw_fd(), buf)) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}

/// Write all data to the async PTY fd.
pub async fn write_all(afd: &AsyncFd<PtyFd>, data: &[u8]) -> io::Result<()> {
    let mut offset = 0;
    while offset < data.len() {
        let mut guard = afd.writable().await?;
        match guard.try_io(|inner| raw_write(inner.get_ref().as_raw_fd(), &data[offset..])) {
            Ok(Ok(n)) => offset += n,
            Ok(Err(e)) => return Err(e),
            Err(_would_block) => continue,
        }
    }
    Ok(())
}
