//! Replicated subscription state
//!
//! Applies peer events to the local trie and moves whole subscription
//! state between nodes when one joins or leaves.

use tracing::{info, warn};

use super::protocol::{SubEvent, SubOp};
use crate::error::Result;
use crate::session::NodeAddr;
use crate::topic::validation::join_topic;
use crate::topic::{SubTrie, TopicTrie};

impl<A: NodeAddr> SubTrie<A> {
    /// Apply one replicated subscribe/unsubscribe event
    pub fn apply(&self, event: &SubEvent<A>) -> Result<bool> {
        let outcome = match event.op {
            SubOp::Subscribe => self.subscribe(
                &event.topic,
                &event.group,
                event.client_id,
                event.addr.clone(),
            ),
            SubOp::Unsubscribe => {
                self.unsubscribe(&event.topic, &event.group, event.client_id, &event.addr)
            }
        };

        if let Err(ref e) = outcome {
            warn!(
                topic = %event.topic,
                addr = ?event.addr,
                op = event.op.code(),
                "rejected replicated subscription event: {}",
                e
            );
        }
        outcome
    }

    /// Every live subscription as a subscribe event, in traversal order
    ///
    /// Replaying the result with [`rebuild`](Self::rebuild) on another node
    /// reproduces this trie's membership and each group's rotation order.
    /// New members enter a group at the front of the rotation, so a group's
    /// members are emitted back to front.
    pub fn snapshot(&self) -> Vec<SubEvent<A>> {
        let trie = self.trie.read();
        let mut events = Vec::new();
        trie.for_each(|path, group, members| {
            let topic = join_topic(path);
            events.extend(members.iter().rev().map(|session| {
                SubEvent::subscribe(
                    topic.clone(),
                    group,
                    session.client_id,
                    session.addr.clone(),
                )
            }));
        });
        events
    }

    /// Replace the whole trie with the result of replaying `events`
    ///
    /// The new trie is built before the lock is taken, so readers see either
    /// the old state or the new one. An invalid event aborts the rebuild and
    /// leaves the current state untouched. Returns the resulting session count.
    pub fn rebuild<I>(&self, events: I) -> Result<usize>
    where
        I: IntoIterator<Item = SubEvent<A>>,
    {
        let mut fresh = TopicTrie::with_limits(self.limits());
        for event in events {
            match event.op {
                SubOp::Subscribe => {
                    fresh.subscribe(&event.topic, &event.group, event.session())?;
                }
                SubOp::Unsubscribe => {
                    fresh.unsubscribe(&event.topic, &event.group, &event.addr, event.client_id)?;
                }
            }
        }

        let stats = fresh.stats();
        let stale = {
            let mut trie = self.trie.write();
            // Gauge is set under the same guard as the swap
            if let Some(ref metrics) = self.metrics {
                metrics.sessions_replaced(stats.sessions);
            }
            std::mem::replace(&mut *trie, fresh)
        };
        drop(stale);

        info!(
            nodes = stats.nodes,
            groups = stats.groups,
            sessions = stats.sessions,
            "rebuilt subscription trie"
        );
        Ok(stats.sessions)
    }

    /// Drop every session hosted on a node that left the cluster
    pub fn remove_peer(&self, addr: &A) -> usize {
        let removed = self.remove_where(|s| s.addr == *addr);
        info!(addr = ?addr, removed, "removed subscriptions of departed peer");
        removed
    }
}
