//! Matcher error types

use std::fmt;

/// Errors returned by subscription and lookup operations
///
/// Both kinds are terminal for the call that produced them. `NoMatch` is
/// not a fault: it means the message has no destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrieError {
    /// Empty topic, empty segment, wildcard in a subscription, or a topic
    /// over the configured limits
    InvalidTopic(&'static str),
    /// Well-formed query that resolved to no subscribers
    NoMatch,
}

impl TrieError {
    /// True for the "deliver to nobody" outcome
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch)
    }
}

impl fmt::Display for TrieError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTopic(reason) => write!(f, "invalid topic: {}", reason),
            Self::NoMatch => write!(f, "no matching subscribers"),
        }
    }
}

impl std::error::Error for TrieError {}

/// Result type for trie operations.
pub type Result<T> = std::result::Result<T, TrieError>;
