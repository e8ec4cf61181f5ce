//! dbus-service-wait - block until a D-Bus name is owned
//!
//! Meant as a startup gate: run it in front of a program that needs some
//! service on the bus, optionally telling a supervisor through an inherited
//! fd once the service is there.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 dbus-service-wait                 │
//! ├──────────────────────────────────────────────────┤
//! │  detach (fork/exec)  │  notify fd  │  timeout     │
//! ├──────────────────────────────────────────────────┤
//! │  event_loop ──> matcher ──> bus (zbus session)    │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod bus;
pub mod detach;
pub mod error;
pub mod event_loop;
pub mod matcher;
pub mod notify;
pub mod request;
pub mod timeout;

pub use bus::{BusKind, BusSession, NameDirectory};
pub use error::{Result, WaitError};
pub use matcher::{Matcher, Verdict};
pub use notify::NotifyChannel;
pub use request::WatchRequest;
pub use timeout::TimeoutGuard;

/// Wait for `target` on the bus chosen by `kind`, then signal `notify`
///
/// The timeout is armed before connecting, so a bus that never answers
/// still ends in [`WaitError::Timeout`].
pub async fn watch(
    target: &str,
    timeout_secs: u32,
    kind: BusKind,
    notify: Option<NotifyChannel>,
) -> Result<()> {
    let guard = TimeoutGuard::arm(timeout_secs);

    guard
        .guard(async {
            let session = BusSession::connect(kind).await?;
            // Subscribe before the first query so no change can slip between
            let events = session.owner_changes().await?;
            let mut matcher = Matcher::new(target, session.clone());
            event_loop::run(&mut matcher, events).await
        })
        .await?;

    report_found(notify);
    Ok(())
}

/// Signal readiness; the name was found even if the reader is gone
fn report_found(notify: Option<NotifyChannel>) {
    if let Some(notify) = notify {
        if let Err(e) = notify.signal() {
            log::warn!("Name found but readiness could not be written: {}", e);
        }
    }
}
