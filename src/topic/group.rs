//! Delivery groups
//!
//! A delivery group is the set of sessions subscribed under one group name
//! at one topic. Every lookup that touches the group takes exactly one
//! member, rotating through them (competing consumers).

use std::sync::atomic::{AtomicUsize, Ordering};

use smallvec::SmallVec;

use crate::session::{NodeAddr, Session};

/// Ordered members plus a rotation cursor
///
/// The cursor is the index handed out by the next [`select`](Self::select).
/// It is atomic so selection works through a shared reference while the
/// trie is read-locked; membership changes go through `&mut self`.
#[derive(Debug)]
pub struct DeliveryGroup<A> {
    members: SmallVec<[Session<A>; 4]>,
    cursor: AtomicUsize,
}

impl<A: NodeAddr> DeliveryGroup<A> {
    pub fn new() -> Self {
        Self {
            members: SmallVec::new(),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in rotation order
    pub fn members(&self) -> &[Session<A>] {
        &self.members
    }

    pub fn contains(&self, addr: &A, client_id: u64) -> bool {
        self.members.iter().any(|s| s.is(addr, client_id))
    }

    /// Add a member. Returns false if it was already present.
    ///
    /// The new member is placed under the cursor, so the next selection
    /// returns it and the rotation then carries on with the member that was
    /// due before the insert. Members still waiting for their turn are never
    /// skipped.
    pub fn insert(&mut self, session: Session<A>) -> bool {
        if self.contains(&session.addr, session.client_id) {
            return false;
        }
        let cursor = self.cursor.get_mut();
        *cursor = (*cursor).min(self.members.len());
        self.members.insert(*cursor, session);
        true
    }

    /// Remove one member by identity
    pub fn remove(&mut self, addr: &A, client_id: u64) -> bool {
        self.retain(|s| !s.is(addr, client_id)) > 0
    }

    /// Keep only members matching the predicate, returning how many were removed
    ///
    /// The cursor keeps pointing at the same member if it survives, otherwise
    /// at the member that followed it, wrapping to the front.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Session<A>) -> bool,
    {
        let cursor = *self.cursor.get_mut();
        let before = self.members.len();
        let mut index = 0;
        let mut kept_before_cursor = 0;

        self.members.retain(|s| {
            let kept = keep(&*s);
            if kept && index < cursor {
                kept_before_cursor += 1;
            }
            index += 1;
            kept
        });

        let len = self.members.len();
        *self.cursor.get_mut() = if kept_before_cursor < len {
            kept_before_cursor
        } else {
            0
        };

        before - len
    }

    /// Pick the member under the cursor and advance it by one
    pub fn select(&self) -> Option<&Session<A>> {
        let len = self.members.len();
        if len == 0 {
            return None;
        }
        let current = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some((c + 1) % len))
            .unwrap_or_else(|c| c);
        self.members.get(current % len)
    }
}

impl<A: NodeAddr> Default for DeliveryGroup<A> {
    fn default() -> Self {
        Self::new()
    }
}
