// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::ffi::CString;
use std::os::fd::AsRawFd;
use std::path::Path;

use anyhow::{bail, Context};
use nix::libc;
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{chdir, execvpe, Pid};
use tokio::io::unix::AsyncFd;

use super::nbio::{set_nonblocking, PtyFd};

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Shell-style exit code: signal deaths map to 128 + signo.
    pub fn exit_code(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(sig)) => 128 + sig,
            (None, None) => 1,
        }
    }
}

/// A child process attached to a fresh PTY.
pub struct PtyProcess {
    pub master: AsyncFd<PtyFd>,
    child: Pid,
}

impl PtyProcess {
    /// Spawn `argv` on a new PTY with the given environment and working
    /// directory. `argv[0]` is resolved on PATH; `env` fully replaces the
    /// inherited environment.
    // forkpty requires unsafe: the post-fork child is partially initialized
    #[allow(unsafe_code)]
    pub fn spawn(
        argv: &[String],
        env: &[(String, String)],
        workdir: &Path,
        cols: u16,
        rows: u16,
    ) -> anyhow::Result<Self> {
        if argv.is_empty() {
            bail!("empty command");
        }

        let winsize = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

        // Prepare exec arguments before forking: allocation in the child
        // of a forked async runtime is not safe.
        let c_args: Vec<CString> = argv
            .iter()
            .map(|s| CString::new(s.as_bytes()))
            .collect::<Result<_, _>>()
            .context("invalid command argument")?;
        let c_env: Vec<CString> = env
            .iter()
            .map(|(k, v)| CString::new(format!("{k}={v}")))
            .collect::<Result<_, _>>()
            .context("invalid environment entry")?;
        let c_workdir = CString::new(workdir.as_os_str().as_encoded_bytes())
            .context("invalid working directory")?;

        // SAFETY: forkpty is unsafe because the child is in a
        // partially-initialized state after fork. The child only calls
        // async-signal-safe functions (chdir, execvpe, _exit).
        match unsafe { forkpty(&winsize, None) }.context("forkpty failed")? {
            ForkptyResult::Child => {
                let _ = chdir(c_workdir.as_c_str());
                let _ = execvpe(&c_args[0], &c_args, &c_env);
                // Exec failed; nothing sensible left to do in the child.
                // SAFETY: _exit is async-signal-safe.
                unsafe { libc::_exit(127) }
            }
            ForkptyResult::Parent { child, master } => {
                set_nonblocking(&master)?;
                let afd = AsyncFd::new(PtyFd(master)).context("AsyncFd::new failed")?;
                Ok(Self { master: afd, child })
            }
        }
    }

    pub fn pid(&self) -> i32 {
        self.child.as_raw()
    }

    /// Whether the child has not yet been reaped and still exists.
    pub fn is_alive(&self) -> bool {
        kill(self.child, None).is_ok()
    }

    pub fn signal(&self, sig: Signal) -> anyhow::Result<()> {
        kill(self.child, sig).context("kill failed")
    }

    /// Resize the PTY; the ioctl also delivers SIGWINCH to the child.
    // TIOCSWINSZ requires unsafe for the libc::ioctl call
    #[allow(unsafe_code)]
    pub fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        let ws = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };
        // SAFETY: TIOCSWINSZ is a well-defined ioctl on the PTY master fd
        // and the Winsize struct is fully initialized.
        let ret = unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        if ret < 0 {
            bail!("TIOCSWINSZ ioctl failed: {}", std::io::Error::last_os_error());
        }
        Ok(())
    }

    /// Block until the child exits (on a blocking thread) and return its
    /// status.
    pub async fn wait(&self) -> anyhow::Result<ExitStatus> {
        let pid = self.child;
        tokio::task::spawn_blocking(move || wait_for_exit(pid))
            .await
            .context("join wait thread")?
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        // Best-effort: make sure no orphaned child keeps the PTY open.
        let _ = kill(self.child, Signal::SIGHUP);
        let _ = waitpid(self.child, Some(WaitPidFlag::WNOHANG));
    }
}

/// Block until the child exits and convert to [`ExitStatus`].
fn wait_for_exit(pid: Pid) -> anyhow::Result<ExitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                return Ok(ExitStatus { code: Some(code), signal: None })
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                return Ok(ExitStatus { code: None, signal: Some(sig as i32) })
            }
            Ok(_) => continue,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(nix::errno::Errno::ECHILD) => {
                // Already reaped (e.g. by Drop's WNOHANG pass).
                return Ok(ExitStatus { code: Some(0), signal: None });
            }
            Err(e) => bail!("waitpid failed: {e}"),
        }
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
