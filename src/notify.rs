//! Readiness notification over an inherited file descriptor
//!
//! The parent passes the write end of a pipe (or any writable fd >= 3).
//! When the bus name shows up we write a single newline and close it.
//! If we never find the name the fd is closed without a byte written.

use std::fs::File;
use std::io::Write;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use nix::fcntl::{fcntl, FcntlArg, OFlag};

use crate::error::{Result, WaitError};

/// Lowest descriptor accepted; 0-2 are stdio
pub const MIN_NOTIFY_FD: RawFd = 3;

/// Write-once notification handle
#[derive(Debug)]
pub struct NotifyChannel {
    file: File,
}

impl NotifyChannel {
    /// Take ownership of an inherited descriptor
    ///
    /// Fails if the fd is below [`MIN_NOTIFY_FD`], is not open, or was not
    /// opened for writing.
    pub fn from_raw_fd(fd: RawFd) -> Result<Self> {
        if fd < MIN_NOTIFY_FD {
            return Err(WaitError::Usage(format!(
                "notification fd must be greater than 2, got {}",
                fd
            )));
        }

        let flags = fcntl(fd, FcntlArg::F_GETFL)
            .map_err(|source| WaitError::NotifyFd { fd, source })?;
        let mode = OFlag::from_bits_truncate(flags) & OFlag::O_ACCMODE;
        if mode != OFlag::O_WRONLY && mode != OFlag::O_RDWR {
            return Err(WaitError::NotifyFd {
                fd,
                source: nix::Error::EBADF,
            });
        }

        // SAFETY: the fd is open (F_GETFL succeeded) and was handed to us by
        // the parent; nothing else in this process owns it.
        let owned = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self::from(owned))
    }

    /// Write the readiness newline and close the descriptor
    pub fn signal(mut self) -> Result<()> {
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        log::debug!("Readiness written to notification fd");
        Ok(())
    }
}

impl From<OwnedFd> for NotifyChannel {
    fn from(fd: OwnedFd) -> Self {
        Self {
            file: File::from(fd),
        }
    }
}
