//! What to wait for, fixed at startup

use crate::error::{Result, WaitError};
use crate::notify::NotifyChannel;
use crate::timeout::DEFAULT_TIMEOUT_SECS;

/// Parsed invocation, immutable once built
#[derive(Debug)]
pub struct WatchRequest {
    pub target_name: String,
    pub timeout_secs: u32,
    pub notify: Option<NotifyChannel>,
    /// Program (and args) to exec in front of the watcher; empty for none
    pub successor: Vec<String>,
}

impl WatchRequest {
    pub fn new(target_name: impl Into<String>) -> Result<Self> {
        let target_name = target_name.into();
        if target_name.is_empty() {
            return Err(WaitError::Usage("BusName must not be empty".into()));
        }
        Ok(Self {
            target_name,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            notify: None,
            successor: Vec::new(),
        })
    }

    pub fn timeout(mut self, secs: u32) -> Result<Self> {
        if secs == 0 {
            return Err(WaitError::Usage("timeout must be a positive integer".into()));
        }
        self.timeout_secs = secs;
        Ok(self)
    }

    pub fn notify(mut self, channel: Option<NotifyChannel>) -> Self {
        self.notify = channel;
        self
    }

    pub fn successor(mut self, command: Vec<String>) -> Self {
        self.successor = command;
        self
    }
}
