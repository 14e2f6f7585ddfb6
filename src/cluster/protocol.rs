//! Cluster Subscription Events
//!
//! Subscribe/unsubscribe intents replicated between cluster nodes. The
//! gossip transport chooses the encoding; events only need to be serde
//! serializable.

use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Gossip code for a replicated subscribe
pub const CLUSTER_SUB: u8 = 1;

/// Gossip code for a replicated unsubscribe
pub const CLUSTER_UNSUB: u8 = 2;

/// Replicated operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubOp {
    Subscribe,
    Unsubscribe,
}

impl SubOp {
    /// Wire code used by the gossip layer
    pub fn code(&self) -> u8 {
        match self {
            SubOp::Subscribe => CLUSTER_SUB,
            SubOp::Unsubscribe => CLUSTER_UNSUB,
        }
    }
}

impl TryFrom<u8> for SubOp {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            CLUSTER_SUB => Ok(SubOp::Subscribe),
            CLUSTER_UNSUB => Ok(SubOp::Unsubscribe),
            other => Err(other),
        }
    }
}

/// One subscription change, as seen by every node in the cluster
///
/// `addr` names the node hosting the client connection, which for events
/// received from peers is the peer, not the local node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubEvent<A> {
    pub op: SubOp,
    pub topic: String,
    #[serde(default)]
    pub group: String,
    pub client_id: u64,
    pub addr: A,
}

impl<A> SubEvent<A> {
    pub fn subscribe(
        topic: impl Into<String>,
        group: impl Into<String>,
        client_id: u64,
        addr: A,
    ) -> Self {
        Self {
            op: SubOp::Subscribe,
            topic: topic.into(),
            group: group.into(),
            client_id,
            addr,
        }
    }

    pub fn unsubscribe(
        topic: impl Into<String>,
        group: impl Into<String>,
        client_id: u64,
        addr: A,
    ) -> Self {
        Self {
            op: SubOp::Unsubscribe,
            topic: topic.into(),
            group: group.into(),
            client_id,
            addr,
        }
    }

    pub fn session(&self) -> Session<A>
    where
        A: Clone,
    {
        Session {
            addr: self.addr.clone(),
            client_id: self.client_id,
        }
    }
}
