//! Name query state machine
//!
//! ```text
//!            start / owner change
//!   Idle ────────────────────────────> Querying <──┐
//!    ^                                    │        │ reply without target,
//!    │                                    │        │ change seen meanwhile
//!    │                                    ├────────┘
//!    └──── reply without target ──────────┤ owner change: mark rerun
//!                                         │ reply with target
//!                                         v
//!                                       Found
//! ```
//!
//! At most one `ListNames` call is ever outstanding. A burst of ownership
//! changes while a query is in flight collapses into exactly one follow-up
//! query, sent once the reply is consumed. The reply may have been built
//! before the change, so the follow-up is never skipped. The reply is
//! treated as ground truth, so event payloads are never inspected.

use crate::bus::{NameDirectory, NameQuery};
use crate::error::Result;

/// Outcome of scanning one reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Found,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherState {
    Idle,
    Querying,
}

/// The one outstanding query
struct PendingQuery {
    call: NameQuery,
}

pub struct Matcher<D> {
    target: String,
    directory: D,
    pending: Option<PendingQuery>,
    /// An owner change arrived while a query was in flight
    rerun: bool,
    queries_sent: usize,
}

impl<D: NameDirectory> Matcher<D> {
    pub fn new(target: impl Into<String>, directory: D) -> Self {
        Self {
            target: target.into(),
            directory,
            pending: None,
            rerun: false,
            queries_sent: 0,
        }
    }

    pub fn state(&self) -> MatcherState {
        if self.pending.is_some() {
            MatcherState::Querying
        } else {
            MatcherState::Idle
        }
    }

    /// Number of ListNames calls issued so far
    pub fn queries_sent(&self) -> usize {
        self.queries_sent
    }

    /// Initial query, issued before any event is seen
    pub fn start(&mut self) {
        self.issue_query();
    }

    /// An ownership change was observed
    ///
    /// Returns true if it caused a new query. While a query is in flight
    /// the change is remembered and re-checked after the reply.
    pub fn on_owner_changed(&mut self) -> bool {
        match self.state() {
            MatcherState::Idle => {
                self.issue_query();
                true
            }
            MatcherState::Querying => {
                log::debug!("Query already in flight, re-checking after reply");
                self.rerun = true;
                false
            }
        }
    }

    /// Wait for the outstanding query to complete
    ///
    /// Pends forever while idle, so it can sit in a `select!` unconditionally.
    /// The query stays outstanding until [`Matcher::on_reply`] consumes it.
    pub async fn completion(&mut self) -> Result<Vec<String>> {
        match self.pending.as_mut() {
            Some(pending) => pending.call.as_mut().await,
            None => std::future::pending().await,
        }
    }

    /// Consume a completed query's names and scan them for the target
    ///
    /// On a miss with a change seen during the query, the follow-up query
    /// is issued here.
    pub fn on_reply(&mut self, names: &[String]) -> Verdict {
        self.pending = None;

        if contains_exact(names, &self.target) {
            log::debug!("{} is on the bus", self.target);
            return Verdict::Found;
        }

        if std::mem::take(&mut self.rerun) {
            log::debug!(
                "{} not among {} names, owner changed meanwhile",
                self.target,
                names.len()
            );
            self.issue_query();
        } else {
            log::debug!(
                "{} not among {} names, waiting for owner change",
                self.target,
                names.len()
            );
        }
        Verdict::NotFound
    }

    fn issue_query(&mut self) {
        debug_assert!(self.pending.is_none());
        self.queries_sent += 1;
        log::debug!("Sending ListNames (query #{})", self.queries_sent);
        self.pending = Some(PendingQuery {
            call: self.directory.list_names(),
        });
    }
}

/// Case-sensitive, whole-string membership
pub fn contains_exact(names: &[String], target: &str) -> bool {
    names.iter().any(|name| name == target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio_test::{assert_pending, assert_ready, task};

    #[derive(Clone, Default)]
    struct StaticDirectory {
        names: Arc<Mutex<Vec<String>>>,
        calls: Arc<AtomicUsize>,
    }

    impl NameDirectory for StaticDirectory {
        fn list_names(&self) -> NameQuery {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let names = self.names.lock().unwrap().clone();
            Box::pin(async move { Ok(names) })
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_match_only() {
        let list = names(&["org.freedesktop.DBus", ":1.7", "com.example.Foo"]);
        assert!(contains_exact(&list, "com.example.Foo"));
        assert!(!contains_exact(&list, "com.example.Foo2"));
        assert!(!contains_exact(&list, "com.Example.Foo"));
        assert!(!contains_exact(&list, "com.example"));
        assert!(!contains_exact(&list, "example.Foo"));
    }

    #[test]
    fn test_longer_name_on_bus_does_not_match() {
        let list = names(&["com.example.Foo2"]);
        assert!(!contains_exact(&list, "com.example.Foo"));
    }

    #[test]
    fn test_start_issues_one_query() {
        let dir = StaticDirectory::default();
        let mut matcher = Matcher::new("org.test.Echo", dir.clone());
        assert_eq!(matcher.state(), MatcherState::Idle);

        matcher.start();

        assert_eq!(matcher.state(), MatcherState::Querying);
        assert_eq!(dir.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_owner_changes_collapse_while_querying() {
        let dir = StaticDirectory::default();
        let mut matcher = Matcher::new("org.test.Echo", dir.clone());
        matcher.start();

        for _ in 0..10 {
            assert!(!matcher.on_owner_changed());
        }
        assert_eq!(dir.calls.load(Ordering::SeqCst), 1);

        // Ten changes during the query become exactly one follow-up
        assert_eq!(matcher.on_reply(&[]), Verdict::NotFound);
        assert_eq!(matcher.state(), MatcherState::Querying);
        assert_eq!(dir.calls.load(Ordering::SeqCst), 2);

        // No change during the follow-up, so nothing more is sent
        assert_eq!(matcher.on_reply(&[]), Verdict::NotFound);
        assert_eq!(matcher.state(), MatcherState::Idle);
        assert_eq!(matcher.queries_sent(), 2);
    }

    #[test]
    fn test_reply_without_changes_goes_idle() {
        let dir = StaticDirectory::default();
        let mut matcher = Matcher::new("org.test.Echo", dir.clone());
        matcher.start();

        assert_eq!(matcher.on_reply(&[]), Verdict::NotFound);
        assert_eq!(matcher.state(), MatcherState::Idle);

        assert!(matcher.on_owner_changed());
        assert_eq!(dir.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_found_clears_pending_rerun() {
        let dir = StaticDirectory::default();
        let mut matcher = Matcher::new("org.test.Echo", dir.clone());
        matcher.start();
        matcher.on_owner_changed();

        let verdict = matcher.on_reply(&names(&["org.test.Echo"]));
        assert_eq!(verdict, Verdict::Found);
        assert_eq!(dir.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_found_on_reply() {
        let dir = StaticDirectory::default();
        let mut matcher = Matcher::new("org.test.Echo", dir);
        matcher.start();

        let verdict = matcher.on_reply(&names(&[":1.1", "org.test.Echo"]));
        assert_eq!(verdict, Verdict::Found);
    }

    #[test]
    fn test_completion_pends_while_idle() {
        let mut matcher = Matcher::new("org.test.Echo", StaticDirectory::default());
        let mut fut = task::spawn(matcher.completion());
        assert_pending!(fut.poll());
    }

    #[test]
    fn test_completion_resolves_pending_query() {
        let dir = StaticDirectory::default();
        dir.names.lock().unwrap().push("org.test.Echo".into());
        let mut matcher = Matcher::new("org.test.Echo", dir);
        matcher.start();

        let reply = {
            let mut fut = task::spawn(matcher.completion());
            assert_ready!(fut.poll()).unwrap()
        };
        // Still outstanding until consumed
        assert_eq!(matcher.state(), MatcherState::Querying);
        assert_eq!(matcher.on_reply(&reply), Verdict::Found);
        assert_eq!(matcher.state(), MatcherState::Idle);
    }
}
