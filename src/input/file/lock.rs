// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io;

#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};

/// Exclusive advisory lock, released on drop.
///
/// Holds the raw descriptor rather than a borrow, so the file must outlive
/// the guard.
pub(crate) struct FileLock {
    #[cfg(unix)]
    fd: RawFd,
}

impl FileLock {
    /// Take the lock, waiting while another open file description holds it.
    #[cfg(unix)]
    pub(crate) fn exclusive(file: &File) -> io::Result<Self> {
        let fd = file.as_raw_fd();
        loop {
            let ret = unsafe { libc::flock(fd, libc::LOCK_EX) };
            if ret == 0 {
                return Ok(Self { fd });
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    #[cfg(not(unix))]
    pub(crate) fn exclusive(_file: &File) -> io::Result<Self> {
        Ok(Self {})
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            libc::flock(self.fd, libc::LOCK_UN);
        }
    }
}
