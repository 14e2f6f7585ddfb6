//! Topic matching and subscription management
//!
//! Implements topic validation, delivery groups and a topic trie for
//! resolving the destinations of a published topic.
//!
//! Concurrency model:
//! - One readers/writer lock guards the whole trie
//! - Lookups share the read lock; group cursors are atomics so selection
//!   needs no write access
//! - Subscribe, unsubscribe and bulk removals take the write lock, so a
//!   lookup never observes a half-pruned branch
//! - The session gauge is updated while the write lock is held, so it
//!   always agrees with the trie once writers are quiescent

mod group;
mod trie;
pub mod validation;

pub use group::DeliveryGroup;
pub use trie::{TopicTrie, TrieStats};
pub use validation::{split_topic, TopicKind, TopicLimits};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::Result;
use crate::metrics::{LookupKind, Metrics};
use crate::session::{NodeAddr, Session};

/// Thread-safe subscription trie
///
/// Created once at startup and shared (typically behind an `Arc`) by the
/// connection handlers, the cluster replication layer and the publish path.
pub struct SubTrie<A> {
    pub(crate) trie: RwLock<TopicTrie<A>>,
    pub(crate) metrics: Option<Metrics>,
}

impl<A: NodeAddr> SubTrie<A> {
    pub fn new() -> Self {
        Self::with_limits(TopicLimits::default())
    }

    pub fn with_limits(limits: TopicLimits) -> Self {
        Self {
            trie: RwLock::new(TopicTrie::with_limits(limits)),
            metrics: None,
        }
    }

    /// Record subscription churn and lookup outcomes into `metrics`
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        metrics.sessions_replaced(self.trie.get_mut().stats().sessions);
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    pub fn limits(&self) -> TopicLimits {
        *self.trie.read().limits()
    }

    /// Register `(addr, client_id)` in `group` at `topic`
    ///
    /// Returns false when the session was already registered there.
    pub fn subscribe(&self, topic: &str, group: &str, client_id: u64, addr: A) -> Result<bool> {
        let added = {
            let mut trie = self.trie.write();
            let added = trie.subscribe(topic, group, Session::new(addr.clone(), client_id))?;
            if let (true, Some(metrics)) = (added, &self.metrics) {
                metrics.session_added();
            }
            added
        };

        if added {
            debug!(topic, group, client_id, addr = ?addr, "subscribed");
        }
        Ok(added)
    }

    /// Remove `(addr, client_id)` from `group` at `topic`
    ///
    /// Returns false when there was nothing to remove.
    pub fn unsubscribe(&self, topic: &str, group: &str, client_id: u64, addr: &A) -> Result<bool> {
        let removed = {
            let mut trie = self.trie.write();
            let removed = trie.unsubscribe(topic, group, addr, client_id)?;
            if let (true, Some(metrics)) = (removed, &self.metrics) {
                metrics.sessions_removed(1);
            }
            removed
        };

        if removed {
            debug!(topic, group, client_id, addr = ?addr, "unsubscribed");
        }
        Ok(removed)
    }

    /// Destinations for a pattern: `+` wildcards plus subtree fan-out,
    /// one session per delivery group
    pub fn lookup(&self, pattern: &str) -> Result<Vec<Session<A>>> {
        let mut sessions = Vec::new();
        self.lookup_with(pattern, |s| sessions.push(s.clone()))?;
        Ok(sessions)
    }

    /// Destinations registered at exactly `topic`, one session per group
    pub fn lookup_exactly(&self, topic: &str) -> Result<Vec<Session<A>>> {
        let mut sessions = Vec::new();
        self.lookup_exactly_with(topic, |s| sessions.push(s.clone()))?;
        Ok(sessions)
    }

    /// Callback form of [`lookup`](Self::lookup); avoids collecting into a Vec
    ///
    /// The callback runs under the read lock and must not call back into
    /// this trie's mutating operations.
    pub fn lookup_with<F>(&self, pattern: &str, callback: F) -> Result<usize>
    where
        F: FnMut(&Session<A>),
    {
        let outcome = self.trie.read().lookup_with(pattern, callback);
        trace!(pattern, outcome = ?outcome, "lookup");
        if let Some(ref metrics) = self.metrics {
            metrics.lookup(LookupKind::Wildcard, &outcome);
        }
        outcome
    }

    /// Callback form of [`lookup_exactly`](Self::lookup_exactly)
    pub fn lookup_exactly_with<F>(&self, topic: &str, callback: F) -> Result<usize>
    where
        F: FnMut(&Session<A>),
    {
        let outcome = self.trie.read().lookup_exactly_with(topic, callback);
        trace!(topic, outcome = ?outcome, "exact lookup");
        if let Some(ref metrics) = self.metrics {
            metrics.lookup(LookupKind::Exact, &outcome);
        }
        outcome
    }

    /// Drop every subscription held by one connection, e.g. on disconnect
    pub fn remove_client(&self, addr: &A, client_id: u64) -> usize {
        let removed = self.remove_where(|s| s.is(addr, client_id));
        if removed > 0 {
            debug!(client_id, addr = ?addr, removed, "removed client subscriptions");
        }
        removed
    }

    /// Remove every session matching `pred`, pruning emptied groups and nodes
    pub(crate) fn remove_where<F>(&self, mut pred: F) -> usize
    where
        F: FnMut(&Session<A>) -> bool,
    {
        let mut trie = self.trie.write();
        let removed = trie.retain(|s| !pred(s));
        if let (true, Some(metrics)) = (removed > 0, &self.metrics) {
            metrics.sessions_removed(removed);
        }
        removed
    }

    pub fn stats(&self) -> TrieStats {
        self.trie.read().stats()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.read().is_empty()
    }
}

impl<A: NodeAddr> Default for SubTrie<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrieError;
    use crate::session::PeerName;

    #[test]
    fn test_subscribe_reports_new_sessions() {
        let st = SubTrie::new();
        assert!(st.subscribe("/a", "g", 1, PeerName(1)).unwrap());
        assert!(!st.subscribe("/a", "g", 1, PeerName(1)).unwrap());
        assert!(st.subscribe("/a", "g", 1, PeerName(2)).unwrap());
        assert_eq!(st.stats().sessions, 2);
    }

    #[test]
    fn test_unsubscribe_reports_removal() {
        let st = SubTrie::new();
        st.subscribe("/a", "g", 1, PeerName(1)).unwrap();
        assert!(st.unsubscribe("/a", "g", 1, &PeerName(1)).unwrap());
        assert!(!st.unsubscribe("/a", "g", 1, &PeerName(1)).unwrap());
        assert!(st.is_empty());
    }

    #[test]
    fn test_remove_client_across_topics() {
        let st = SubTrie::new();
        st.subscribe("/a", "g", 1, PeerName(1)).unwrap();
        st.subscribe("/b/c", "h", 1, PeerName(1)).unwrap();
        st.subscribe("/b/c", "h", 2, PeerName(1)).unwrap();
        st.subscribe("/b/c", "h", 1, PeerName(2)).unwrap();

        assert_eq!(st.remove_client(&PeerName(1), 1), 2);
        assert_eq!(st.lookup("/a"), Err(TrieError::NoMatch));
        assert_eq!(st.stats().sessions, 2);
    }

    #[test]
    fn test_metrics_follow_operations() {
        let st = SubTrie::new().with_metrics(Metrics::new());
        st.subscribe("/a", "g", 1, PeerName(1)).unwrap();
        st.subscribe("/a", "g", 1, PeerName(1)).unwrap();
        st.subscribe("/a", "g", 2, PeerName(1)).unwrap();
        st.unsubscribe("/a", "g", 2, &PeerName(1)).unwrap();
        st.lookup("/a").unwrap();
        assert!(st.lookup_exactly("/zzz").is_err());

        let metrics = st.metrics().unwrap();
        assert_eq!(metrics.subscriptions_total.get(), 2);
        assert_eq!(metrics.unsubscriptions_total.get(), 1);
        assert_eq!(metrics.sessions_current.get(), 1);
        assert_eq!(metrics.lookup_no_match_total.get(), 1);
    }
}
