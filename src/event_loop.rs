//! Dispatch loop driving the matcher
//!
//! Waits on two things at once: the next ownership change from the bus and
//! the completion of the outstanding query. There is no normal exit; the
//! loop returns once the target is found or the bus fails.

use futures_lite::{Stream, StreamExt};

use crate::bus::NameDirectory;
use crate::error::{Result, WaitError};
use crate::matcher::{Matcher, Verdict};

/// Run until the target name is seen on the bus
///
/// Issues the initial query itself, so a name that is already owned is
/// reported without waiting for any event.
pub async fn run<D, S>(matcher: &mut Matcher<D>, events: S) -> Result<()>
where
    D: NameDirectory,
    S: Stream<Item = Result<()>>,
{
    futures_lite::pin!(events);

    matcher.start();

    loop {
        tokio::select! {
            // Completed replies first, so a change queued behind a reply
            // starts a fresh query instead of being swallowed
            biased;

            reply = matcher.completion() => {
                let names = reply?;
                if matcher.on_reply(&names) == Verdict::Found {
                    return Ok(());
                }
            }

            event = events.next() => match event {
                Some(Ok(())) => {
                    matcher.on_owner_changed();
                }
                Some(Err(e)) => return Err(e),
                None => return Err(WaitError::BusClosed),
            },
        }
    }
}
