//! Cluster Module
//!
//! Keeps every node's trie in step with subscriptions made on its peers.
//!
//! # Flow
//!
//! - A client subscribes on node P: P updates its own trie and gossips a
//!   [`SubEvent`] with `addr = P`
//! - Every other node applies the event with [`SubTrie::apply`]
//! - A joining node receives [`SubTrie::snapshot`] from a peer and loads it
//!   with [`SubTrie::rebuild`]
//! - A node leaving the cluster is purged with [`SubTrie::remove_peer`]
//!
//! The gossip transport itself lives outside this crate.
//!
//! [`SubTrie::apply`]: crate::topic::SubTrie::apply
//! [`SubTrie::snapshot`]: crate::topic::SubTrie::snapshot
//! [`SubTrie::rebuild`]: crate::topic::SubTrie::rebuild
//! [`SubTrie::remove_peer`]: crate::topic::SubTrie::remove_peer

mod protocol;
mod sync;

pub use protocol::{SubEvent, SubOp, CLUSTER_SUB, CLUSTER_UNSUB};
