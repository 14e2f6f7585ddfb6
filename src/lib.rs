//! meshsub - subscription matching for a clustered pub/sub broker
//!
//! Maintains a trie of topic subscriptions grouped into load-balanced
//! delivery groups, and resolves the destination sessions of a published
//! topic in one pass: `+` wildcards, one session per group, and fan-out to
//! every subscriber below the matched topic.
//!
//! ```
//! use meshsub::{PeerName, SubTrie};
//!
//! let trie = SubTrie::new();
//! trie.subscribe("/a1/b1/c1", "workers", 1, PeerName(1)).unwrap();
//! trie.subscribe("/a1/b1/c1/d1", "audit", 2, PeerName(2)).unwrap();
//!
//! let destinations = trie.lookup("/a1/+/c1").unwrap();
//! assert_eq!(destinations.len(), 2);
//! ```

pub mod cluster;
pub mod config;
pub mod error;
pub mod metrics;
pub mod session;
pub mod topic;

pub use cluster::{SubEvent, SubOp};
pub use config::Config;
pub use error::TrieError;
pub use metrics::Metrics;
pub use session::{NodeAddr, PeerName, Session};
pub use topic::{SubTrie, TopicLimits, TrieStats};
