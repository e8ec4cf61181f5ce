//! Double-fork detachment
//!
//! When a successor program is given the process lineage becomes:
//!
//! ```text
//! original ──fork──> intermediate ──fork──> watcher
//!    │                    │
//!    │ waitpid            └─ _exit(0) right away
//!    └─ execvp(prog)
//! ```
//!
//! The original process execs the successor as soon as the intermediate
//! child is gone, so the successor keeps the launcher's pid. The watcher is
//! orphaned and signals readiness through the notification fd.
//!
//! Must run before any async runtime or extra thread is started.

use std::convert::Infallible;
use std::ffi::CString;

use nix::sys::wait::waitpid;
use nix::unistd::{execvp, fork, ForkResult};

use crate::error::{Result, WaitError};
use crate::notify::NotifyChannel;

/// Detach the watcher from the launching process
///
/// With an empty `successor` nothing happens and `notify` is handed straight
/// back. Otherwise this only returns `Ok` in the watcher (grandchild)
/// process; the original process either becomes the successor or returns
/// [`WaitError::Exec`].
pub fn detach(
    successor: &[String],
    notify: Option<NotifyChannel>,
) -> Result<Option<NotifyChannel>> {
    if successor.is_empty() {
        return Ok(notify);
    }

    // Converted up front so a bad argument fails before forking
    let argv = to_cstrings(successor)?;

    // SAFETY: called from the single-threaded start of main, before the
    // tokio runtime exists.
    match unsafe { fork() }.map_err(|source| WaitError::Fork { step: 1, source })? {
        ForkResult::Parent { child } => {
            // Only need to know it is gone, not how it exited
            let _ = waitpid(child, None);
            // The watcher holds its own copy of the descriptor
            drop(notify);
            match exec(&argv)? {}
        }
        ForkResult::Child => {}
    }

    // SAFETY: still single-threaded, we are the freshly forked child.
    match unsafe { fork() }.map_err(|source| WaitError::Fork { step: 2, source })? {
        ForkResult::Parent { .. } => {
            // Skip atexit handlers and stdio flushing inherited from the
            // original process.
            unsafe { libc::_exit(0) }
        }
        ForkResult::Child => {
            log::debug!("Detached watcher running as pid {}", std::process::id());
            Ok(notify)
        }
    }
}

/// Replace the current process image; only returns on failure
fn exec(argv: &[CString]) -> Result<Infallible> {
    let program = &argv[0];
    execvp(program, argv).map_err(|source| WaitError::Exec {
        program: program.to_string_lossy().into_owned(),
        source,
    })
}

fn to_cstrings(args: &[String]) -> Result<Vec<CString>> {
    args.iter()
        .map(|arg| {
            CString::new(arg.as_str()).map_err(|_| WaitError::Exec {
                program: args[0].clone(),
                source: nix::Error::EINVAL,
            })
        })
        .collect()
}
