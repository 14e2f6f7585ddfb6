//! Topic Trie for subscription matching
//!
//! A prefix tree keyed by topic segment. Each node owns the delivery groups
//! subscribed at exactly that topic; lookups select one session per group.
//!
//! Matching semantics:
//! - `+` in a lookup pattern matches any single existing child
//! - A node matched by the full pattern delivers to its own groups and to
//!   every group in its subtree (hierarchical fan-out)
//! - Exact lookups visit one node and never fan out
//!
//! Children and groups are kept in insertion order so traversal, and
//! therefore the order of returned sessions, is deterministic.

use ahash::RandomState;
use compact_str::CompactString;
use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::debug;

use super::group::DeliveryGroup;
use super::validation::{split_topic, TopicKind, TopicLimits, SINGLE_WILDCARD};
use crate::error::{Result, TrieError};
use crate::session::{NodeAddr, Session};

type OrderedMap<V> = IndexMap<CompactString, V, RandomState>;

/// Node in the topic trie
#[derive(Debug)]
struct TrieNode<A> {
    /// Children indexed by segment
    children: OrderedMap<TrieNode<A>>,
    /// Delivery groups subscribed at this exact topic
    groups: OrderedMap<DeliveryGroup<A>>,
}

impl<A> TrieNode<A> {
    fn new() -> Self {
        Self {
            children: OrderedMap::default(),
            groups: OrderedMap::default(),
        }
    }

    /// A node with nothing to deliver to and no descendants can be pruned
    fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.children.is_empty()
    }
}

impl<A> Default for TrieNode<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: NodeAddr> TrieNode<A> {
    /// One session per group at this node
    fn select<F>(&self, callback: &mut F) -> usize
    where
        F: FnMut(&Session<A>),
    {
        let mut selected = 0;
        for group in self.groups.values() {
            if let Some(session) = group.select() {
                callback(session);
                selected += 1;
            }
        }
        selected
    }

    /// One session per group at this node and every descendant, pre-order
    fn fan_out<F>(&self, callback: &mut F) -> usize
    where
        F: FnMut(&Session<A>),
    {
        let mut selected = 0;
        let mut stack: Vec<&TrieNode<A>> = vec![self];
        while let Some(node) = stack.pop() {
            selected += node.select(callback);
            stack.extend(node.children.values().rev());
        }
        selected
    }

    fn remove(&mut self, segments: &[&str], group: &str, addr: &A, client_id: u64) -> bool {
        let mut node = &mut *self;
        for segment in segments {
            match node.children.get_mut(*segment) {
                Some(child) => node = child,
                None => return false,
            }
        }

        let Some(members) = node.groups.get_mut(group) else {
            return false;
        };
        if !members.remove(addr, client_id) {
            return false;
        }
        if members.is_empty() {
            node.groups.shift_remove(group);
        }
        if !node.is_empty() {
            return true;
        }

        // Deepest ancestor that keeps something after the leaf goes away;
        // everything below it on the path is a chain of empty nodes
        let mut cut = 0;
        let mut node = &*self;
        for (depth, segment) in segments.iter().enumerate() {
            if !node.groups.is_empty() || node.children.len() > 1 {
                cut = depth;
            }
            match node.children.get(*segment) {
                Some(child) => node = child,
                None => break,
            }
        }

        let Some(segment) = segments.get(cut) else {
            return true;
        };
        let mut parent = &mut *self;
        for segment in &segments[..cut] {
            match parent.children.get_mut(*segment) {
                Some(child) => parent = child,
                None => return true,
            }
        }
        parent.children.shift_remove(*segment);
        debug!(
            segment = *segment,
            levels = segments.len() - cut,
            "pruned empty topic branch"
        );
        true
    }

    fn retain_groups<F>(&mut self, keep: &mut F) -> usize
    where
        F: FnMut(&Session<A>) -> bool,
    {
        let mut removed = 0;
        self.groups.retain(|_, group| {
            removed += group.retain(|s| keep(s));
            !group.is_empty()
        });
        removed
    }

    /// Filter sessions in the whole subtree, pruning nodes left empty
    ///
    /// Nodes are detached while their subtree is processed and re-attached
    /// in their original position if anything survives, so children keep
    /// their insertion order.
    fn retain<F>(&mut self, keep: &mut F) -> usize
    where
        F: FnMut(&Session<A>) -> bool,
    {
        let mut root = std::mem::take(self);
        let mut removed = root.retain_groups(keep);
        let pending = std::mem::take(&mut root.children).into_iter();
        let mut stack = vec![(CompactString::default(), root, pending)];

        while let Some((_, _, pending)) = stack.last_mut() {
            if let Some((segment, mut child)) = pending.next() {
                removed += child.retain_groups(keep);
                let grandchildren = std::mem::take(&mut child.children).into_iter();
                stack.push((segment, child, grandchildren));
                continue;
            }

            let Some((segment, node, _)) = stack.pop() else {
                break;
            };
            match stack.last_mut() {
                Some((_, parent, _)) => {
                    if !node.is_empty() {
                        parent.children.insert(segment, node);
                    }
                }
                None => *self = node,
            }
        }
        removed
    }

    /// Pre-order visit of every group, with the segments leading to it
    fn walk<'a, F>(&'a self, callback: &mut F)
    where
        F: FnMut(&[&str], &str, &[Session<A>]),
    {
        let mut path: Vec<&'a str> = Vec::with_capacity(8);
        let mut stack: Vec<(usize, Option<&'a str>, &'a TrieNode<A>)> = vec![(0, None, self)];

        while let Some((depth, segment, node)) = stack.pop() {
            path.truncate(depth);
            path.extend(segment);
            for (name, group) in &node.groups {
                callback(path.as_slice(), name.as_str(), group.members());
            }
            let depth = path.len();
            stack.extend(
                node.children
                    .iter()
                    .rev()
                    .map(|(segment, child)| (depth, Some(segment.as_str()), child)),
            );
        }
    }

    fn count(&self, stats: &mut TrieStats) {
        let mut stack: Vec<&TrieNode<A>> = vec![self];
        while let Some(node) = stack.pop() {
            stats.nodes += node.children.len();
            stats.groups += node.groups.len();
            stats.sessions += node.groups.values().map(|g| g.len()).sum::<usize>();
            stack.extend(node.children.values());
        }
    }
}

// Topics may be tens of thousands of levels deep; the default recursive drop
// would take one stack frame per level.
impl<A> Drop for TrieNode<A> {
    fn drop(&mut self) {
        let mut stack: Vec<TrieNode<A>> = self.children.drain(..).map(|(_, child)| child).collect();
        while let Some(mut node) = stack.pop() {
            stack.extend(node.children.drain(..).map(|(_, child)| child));
        }
    }
}

/// Size of the trie, root excluded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrieStats {
    pub nodes: usize,
    pub groups: usize,
    pub sessions: usize,
}

/// Topic trie holding delivery groups
///
/// Not synchronized; [`SubTrie`](super::SubTrie) wraps it in a lock.
#[derive(Debug)]
pub struct TopicTrie<A> {
    root: TrieNode<A>,
    limits: TopicLimits,
}

impl<A: NodeAddr> TopicTrie<A> {
    pub fn new() -> Self {
        Self::with_limits(TopicLimits::default())
    }

    pub fn with_limits(limits: TopicLimits) -> Self {
        Self {
            root: TrieNode::new(),
            limits,
        }
    }

    pub fn limits(&self) -> &TopicLimits {
        &self.limits
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Add `session` to `group` at `topic`, creating nodes and the group as
    /// needed. Returns false if the session was already a member.
    pub fn subscribe(&mut self, topic: &str, group: &str, session: Session<A>) -> Result<bool> {
        let segments = split_topic(topic, TopicKind::Subscription, &self.limits)?;

        let mut node = &mut self.root;
        for segment in segments {
            node = node.children.entry(CompactString::new(segment)).or_default();
        }

        Ok(node
            .groups
            .entry(CompactString::new(group))
            .or_default()
            .insert(session))
    }

    /// Remove a session from `group` at `topic`, pruning groups and nodes
    /// left empty. Missing topics, groups or sessions are a no-op.
    pub fn unsubscribe(
        &mut self,
        topic: &str,
        group: &str,
        addr: &A,
        client_id: u64,
    ) -> Result<bool> {
        let segments = split_topic(topic, TopicKind::Subscription, &self.limits)?;
        Ok(self.root.remove(&segments, group, addr, client_id))
    }

    /// Remove every session rejected by `keep`, across all topics
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Session<A>) -> bool,
    {
        self.root.retain(&mut keep)
    }

    /// Resolve a pattern with `+` wildcards and subtree fan-out, invoking
    /// `callback` once per selected session. Returns the number selected.
    pub fn lookup_with<F>(&self, pattern: &str, mut callback: F) -> Result<usize>
    where
        F: FnMut(&Session<A>),
    {
        let segments = split_topic(pattern, TopicKind::Pattern, &self.limits)?;

        let mut frontier: SmallVec<[&TrieNode<A>; 8]> = SmallVec::new();
        let mut next: SmallVec<[&TrieNode<A>; 8]> = SmallVec::new();
        frontier.push(&self.root);

        for segment in segments {
            for node in frontier.drain(..) {
                if segment == SINGLE_WILDCARD {
                    next.extend(node.children.values());
                } else if let Some(child) = node.children.get(segment) {
                    next.push(child);
                }
            }
            if next.is_empty() {
                return Err(TrieError::NoMatch);
            }
            std::mem::swap(&mut frontier, &mut next);
        }

        let selected: usize = frontier
            .iter()
            .map(|node| node.fan_out(&mut callback))
            .sum();
        if selected == 0 {
            return Err(TrieError::NoMatch);
        }
        Ok(selected)
    }

    /// Resolve one exact topic without wildcards or fan-out
    pub fn lookup_exactly_with<F>(&self, topic: &str, mut callback: F) -> Result<usize>
    where
        F: FnMut(&Session<A>),
    {
        let segments = split_topic(topic, TopicKind::Exact, &self.limits)?;

        let mut node = &self.root;
        for segment in segments {
            node = node.children.get(segment).ok_or(TrieError::NoMatch)?;
        }

        match node.select(&mut callback) {
            0 => Err(TrieError::NoMatch),
            selected => Ok(selected),
        }
    }

    pub fn lookup(&self, pattern: &str) -> Result<Vec<Session<A>>> {
        let mut sessions = Vec::new();
        self.lookup_with(pattern, |s| sessions.push(s.clone()))?;
        Ok(sessions)
    }

    pub fn lookup_exactly(&self, topic: &str) -> Result<Vec<Session<A>>> {
        let mut sessions = Vec::new();
        self.lookup_exactly_with(topic, |s| sessions.push(s.clone()))?;
        Ok(sessions)
    }

    /// Visit every delivery group as (segments, group name, members)
    ///
    /// Members are given in rotation order starting from index 0.
    pub fn for_each<F>(&self, mut callback: F)
    where
        F: FnMut(&[&str], &str, &[Session<A>]),
    {
        self.root.walk(&mut callback);
    }

    pub fn stats(&self) -> TrieStats {
        let mut stats = TrieStats::default();
        self.root.count(&mut stats);
        stats
    }
}

impl<A: NodeAddr> Default for TopicTrie<A> {
    fn default() -> Self {
        Self::new()
    }
}
