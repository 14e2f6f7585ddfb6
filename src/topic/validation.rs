//! Topic splitting and validation
//!
//! Key rules:
//! - `/` is the only separator; a single leading `/` is optional
//! - Every segment must be non-empty
//! - `+` is a single-level wildcard in lookup patterns only; subscriptions
//!   must not contain it, exact lookups treat it as a literal segment
//! - Topics must not contain a null character

use smallvec::SmallVec;

use crate::error::{Result, TrieError};

/// Segment separator
pub const SEPARATOR: char = '/';

/// Single-level wildcard segment
pub const SINGLE_WILDCARD: &str = "+";

/// Default maximum topic length in bytes
pub const DEFAULT_MAX_TOPIC_LENGTH: usize = 65535;

/// Topic segments; most topics are shallow enough to stay inline
pub type Segments<'a> = SmallVec<[&'a str; 8]>;

/// How a topic string is going to be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    /// Stored subscription topic (subscribe/unsubscribe)
    Subscription,
    /// Lookup pattern, `+` expands to every child
    Pattern,
    /// Exact lookup, `+` is literal
    Exact,
}

/// Size limits applied when splitting topics (0 = unlimited)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicLimits {
    pub max_levels: usize,
    pub max_length: usize,
}

impl Default for TopicLimits {
    fn default() -> Self {
        Self {
            max_levels: 0,
            max_length: DEFAULT_MAX_TOPIC_LENGTH,
        }
    }
}

/// Split a topic into validated segments
pub fn split_topic<'a>(
    topic: &'a str,
    kind: TopicKind,
    limits: &TopicLimits,
) -> Result<Segments<'a>> {
    if limits.max_length > 0 && topic.len() > limits.max_length {
        return Err(TrieError::InvalidTopic("topic exceeds maximum length"));
    }

    if topic.contains('\0') {
        return Err(TrieError::InvalidTopic("topic cannot contain null character"));
    }

    let body = topic.strip_prefix(SEPARATOR).unwrap_or(topic);
    if body.is_empty() {
        return Err(TrieError::InvalidTopic("topic cannot be empty"));
    }

    let mut segments = Segments::new();
    for segment in body.split(SEPARATOR) {
        if segment.is_empty() {
            return Err(TrieError::InvalidTopic("topic cannot contain empty segments"));
        }
        if kind == TopicKind::Subscription && segment == SINGLE_WILDCARD {
            return Err(TrieError::InvalidTopic(
                "subscription topic cannot contain wildcards",
            ));
        }
        segments.push(segment);
    }

    if limits.max_levels > 0 && segments.len() > limits.max_levels {
        return Err(TrieError::InvalidTopic("topic exceeds maximum allowed levels"));
    }

    Ok(segments)
}

/// Render segments back into a topic with a leading separator
pub fn join_topic<S: AsRef<str>>(segments: &[S]) -> String {
    let mut topic = String::with_capacity(segments.iter().map(|s| s.as_ref().len() + 1).sum());
    for segment in segments {
        topic.push(SEPARATOR);
        topic.push_str(segment.as_ref());
    }
    topic
}
