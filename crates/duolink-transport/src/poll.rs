use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::error::Result;

/// Block until at least one descriptor is readable.
///
/// Returns one readiness flag per input descriptor, in order. A `None`
/// timeout blocks indefinitely. A signal interrupting the wait returns an
/// all-false set so callers re-check their run flag instead of looping
/// inside the syscall.
pub fn poll_readable(fds: &[RawFd], timeout: Option<Duration>) -> Result<Vec<bool>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();

    let timeout_ms = match timeout {
        Some(timeout) => i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX),
        None => -1,
    };

    // SAFETY: `pollfds` is a valid, writable array of `pollfds.len()` pollfd
    // structs owned by this frame for the duration of the call.
    let rc = unsafe {
        libc::poll(
            pollfds.as_mut_ptr(),
            pollfds.len() as libc::nfds_t,
            timeout_ms,
        )
    };

    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(vec![false; fds.len()]);
        }
        return Err(err.into());
    }

    // POLLHUP/POLLERR count as readable: the next read surfaces the fault
    // instead of the loop spinning on an event it never consumes.
    Ok(pollfds
        .iter()
        .map(|p| p.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
        .collect())
}
