//! Prometheus metrics for the subscription matcher
//!
//! Counts subscription churn and lookup outcomes. The registry can be
//! scraped by an embedding broker or rendered with [`Metrics::encode_text`].

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::error::TrieError;

/// Which matcher entry point served a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// `lookup`: wildcards and subtree fan-out
    Wildcard,
    /// `lookup_exactly`: one node
    Exact,
}

impl LookupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupKind::Wildcard => "wildcard",
            LookupKind::Exact => "exact",
        }
    }
}

/// All matcher metrics in one place
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Subscription metrics
    pub subscriptions_total: IntCounter,
    pub unsubscriptions_total: IntCounter,
    pub sessions_current: IntGauge,

    // Lookup metrics
    pub lookups_total: IntCounterVec,
    pub lookup_no_match_total: IntCounter,
    pub lookup_invalid_total: IntCounter,
    pub lookup_fanout: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let subscriptions_total = IntCounter::with_opts(Opts::new(
            "meshsub_subscriptions_total",
            "Total sessions added to delivery groups since startup",
        ))
        .unwrap();

        let unsubscriptions_total = IntCounter::with_opts(Opts::new(
            "meshsub_unsubscriptions_total",
            "Total sessions removed from delivery groups since startup",
        ))
        .unwrap();

        let sessions_current = IntGauge::with_opts(Opts::new(
            "meshsub_sessions_current",
            "Current number of sessions across all delivery groups",
        ))
        .unwrap();

        let lookups_total = IntCounterVec::new(
            Opts::new("meshsub_lookups_total", "Total lookups by kind"),
            &["kind"],
        )
        .unwrap();

        let lookup_no_match_total = IntCounter::with_opts(Opts::new(
            "meshsub_lookup_no_match_total",
            "Lookups that resolved to no subscribers",
        ))
        .unwrap();

        let lookup_invalid_total = IntCounter::with_opts(Opts::new(
            "meshsub_lookup_invalid_total",
            "Lookups rejected for an invalid topic",
        ))
        .unwrap();

        let lookup_fanout = Histogram::with_opts(
            HistogramOpts::new(
                "meshsub_lookup_fanout",
                "Destinations selected per successful lookup",
            )
            .buckets(vec![
                1.0, 2.0, 4.0, 8.0, 16.0, 64.0, 256.0, 1024.0, 4096.0, 16384.0,
            ]),
        )
        .unwrap();

        registry
            .register(Box::new(subscriptions_total.clone()))
            .unwrap();
        registry
            .register(Box::new(unsubscriptions_total.clone()))
            .unwrap();
        registry
            .register(Box::new(sessions_current.clone()))
            .unwrap();
        registry.register(Box::new(lookups_total.clone())).unwrap();
        registry
            .register(Box::new(lookup_no_match_total.clone()))
            .unwrap();
        registry
            .register(Box::new(lookup_invalid_total.clone()))
            .unwrap();
        registry.register(Box::new(lookup_fanout.clone())).unwrap();

        Self {
            registry,
            subscriptions_total,
            unsubscriptions_total,
            sessions_current,
            lookups_total,
            lookup_no_match_total,
            lookup_invalid_total,
            lookup_fanout,
        }
    }

    pub fn session_added(&self) {
        self.subscriptions_total.inc();
        self.sessions_current.inc();
    }

    pub fn sessions_removed(&self, count: usize) {
        self.unsubscriptions_total.inc_by(count as u64);
        self.sessions_current.sub(count as i64);
    }

    /// Reset the session gauge after the trie was replaced wholesale
    pub fn sessions_replaced(&self, count: usize) {
        self.sessions_current.set(count as i64);
    }

    pub fn lookup(&self, kind: LookupKind, outcome: &Result<usize, TrieError>) {
        self.lookups_total.with_label_values(&[kind.as_str()]).inc();
        match outcome {
            Ok(selected) => self.lookup_fanout.observe(*selected as f64),
            Err(TrieError::NoMatch) => self.lookup_no_match_total.inc(),
            Err(TrieError::InvalidTopic(_)) => self.lookup_invalid_total.inc(),
        }
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_gauge() {
        let metrics = Metrics::new();
        metrics.session_added();
        metrics.session_added();
        metrics.sessions_removed(1);
        assert_eq!(metrics.sessions_current.get(), 1);
        assert_eq!(metrics.subscriptions_total.get(), 2);
        assert_eq!(metrics.unsubscriptions_total.get(), 1);

        metrics.sessions_replaced(7);
        assert_eq!(metrics.sessions_current.get(), 7);
    }

    #[test]
    fn test_lookup_outcomes() {
        let metrics = Metrics::new();
        metrics.lookup(LookupKind::Wildcard, &Ok(3));
        metrics.lookup(LookupKind::Exact, &Err(TrieError::NoMatch));
        metrics.lookup(LookupKind::Exact, &Err(TrieError::InvalidTopic("empty")));

        assert_eq!(
            metrics.lookups_total.with_label_values(&["wildcard"]).get(),
            1
        );
        assert_eq!(metrics.lookups_total.with_label_values(&["exact"]).get(), 2);
        assert_eq!(metrics.lookup_no_match_total.get(), 1);
        assert_eq!(metrics.lookup_invalid_total.get(), 1);
        assert_eq!(metrics.lookup_fanout.get_sample_count(), 1);
    }

    #[test]
    fn test_encode_text() {
        let metrics = Metrics::new();
        metrics.session_added();
        let text = metrics.encode_text().unwrap();
        assert!(text.contains("meshsub_sessions_current 1"));
        assert!(text.contains("meshsub_subscriptions_total 1"));
    }
}
