//! Deadline for the whole watch
//!
//! Armed before the bus connection is made. On expiry the guarded future is
//! dropped mid-await, which also aborts a blocked bus read.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Result, WaitError};

/// Default timeout when -t is not given
pub const DEFAULT_TIMEOUT_SECS: u32 = 5;

#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    deadline: Instant,
}

impl TimeoutGuard {
    /// Arm a deadline `secs` seconds from now
    pub fn arm(secs: u32) -> Self {
        let deadline = Instant::now() + Duration::from_secs(u64::from(secs));
        log::debug!("Timeout armed for {}s", secs);
        Self { deadline }
    }

    /// Run `fut` until it completes or the deadline passes
    pub async fn guard<F, T>(self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout_at(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(WaitError::Timeout),
        }
    }
}
