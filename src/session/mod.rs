//! Subscriber sessions
//!
//! A session names where a subscriber's live connection is: the cluster node
//! holding it plus the connection's client id on that node. The trie stores
//! these descriptors only; connection state stays with the caller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque cluster-node address
///
/// Anything cheap to clone and comparable works: a gossip peer name, a
/// node id string, a socket address.
pub trait NodeAddr: Clone + Eq + fmt::Debug {}

impl<T: Clone + Eq + fmt::Debug> NodeAddr for T {}

/// One subscriber destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session<A> {
    /// Node currently hosting the client connection
    pub addr: A,
    /// Connection id, unique per node
    pub client_id: u64,
}

impl<A: NodeAddr> Session<A> {
    pub fn new(addr: A, client_id: u64) -> Self {
        Self { addr, client_id }
    }

    /// Same node and same connection
    #[inline]
    pub fn is(&self, addr: &A, client_id: u64) -> bool {
        self.client_id == client_id && self.addr == *addr
    }
}

/// Numeric cluster peer name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerName(pub u64);

impl fmt::Display for PeerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PeerName {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(PeerName)
    }
}

impl From<u64> for PeerName {
    fn from(v: u64) -> Self {
        PeerName(v)
    }
}
