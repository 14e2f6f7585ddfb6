//! Matching tests for the subscription trie
//!
//! Cover wildcard resolution, hierarchical fan-out, group rotation and
//! pruning through the public `SubTrie` API.

use pretty_assertions::assert_eq;
use test_case::test_case;

use meshsub::{PeerName, Session, SubTrie, TrieError, TrieStats};

struct Sub {
    topic: &'static str,
    group: &'static str,
    client_id: u64,
    addr: u64,
}

const fn sub(topic: &'static str, group: &'static str, client_id: u64, addr: u64) -> Sub {
    Sub {
        topic,
        group,
        client_id,
        addr,
    }
}

fn sess(addr: u64, client_id: u64) -> Session<PeerName> {
    Session::new(PeerName(addr), client_id)
}

fn trie_with(subs: &[Sub]) -> SubTrie<PeerName> {
    let st = SubTrie::new();
    for s in subs {
        st.subscribe(s.topic, s.group, s.client_id, PeerName(s.addr))
            .unwrap();
    }
    st
}

const WIDE: [Sub; 9] = [
    sub("/a1/b1/c1", "test1", 1, 1),
    sub("/a1/b1/c1", "test1", 2, 2),
    sub("/a1/b1/c1", "test2", 3, 1),
    sub("/a1/b1/c1", "test2", 4, 2),
    sub("/a1/b1/c1/d1/e1", "test1", 5, 1),
    sub("/a1/b1/c1/d1/e2", "test1", 5, 2),
    sub("/a1/b2/c1", "test2", 6, 2),
    sub("/a1/b2/c2", "test1", 7, 2),
    sub("/a2/b1/c1", "test1", 8, 1),
];

#[test]
fn test_wildcard_lookup_with_fan_out() {
    let st = trie_with(&WIDE);

    assert_eq!(
        st.lookup("/a1/+/c1").unwrap(),
        vec![sess(2, 2), sess(2, 4), sess(1, 5), sess(2, 5), sess(2, 6)]
    );
}

#[test]
fn test_exact_lookup() {
    let st = trie_with(&[
        sub("/a1/b1/c1", "test1", 1, 1),
        sub("/a1/b1/c1", "test1", 2, 2),
        sub("/a1/b1/c1", "test2", 3, 1),
        sub("/a1/b1/c1", "test2", 4, 2),
        sub("/a1/b1/c1/d1", "test1", 5, 1),
        sub("/a1/b2/c2", "test1", 6, 2),
        sub("/a2/b1/c1", "test1", 7, 1),
    ]);

    assert_eq!(
        st.lookup_exactly("/a1/b1/c1").unwrap(),
        vec![sess(2, 2), sess(2, 4)]
    );
}

#[test]
fn test_unsubscribe_then_lookup() {
    let st = trie_with(&WIDE);

    st.unsubscribe("/a1/b1/c1/d1/e1", "test1", 5, &PeerName(1))
        .unwrap();
    st.unsubscribe("/a1/b1/c1", "test2", 4, &PeerName(2))
        .unwrap();

    assert_eq!(
        st.lookup("/a1/+/c1").unwrap(),
        vec![sess(2, 2), sess(1, 3), sess(2, 5), sess(2, 6)]
    );
}

#[test]
fn test_groups_collapse_to_one_member_each() {
    let st = trie_with(&[
        sub("/a1/b1/c1", "test1", 1, 1),
        sub("/a1/b1/c1", "test1", 2, 2),
        sub("/a1/b1/c1", "test2", 3, 1),
        sub("/a1/b1/c1", "test2", 4, 2),
        sub("/a1/b1/c1/d1/e1", "test1", 5, 1),
        sub("/a1/b2/c1", "test2", 6, 2),
    ]);

    let first = st.lookup("/a1/+/c1").unwrap();
    assert_eq!(first, vec![sess(2, 2), sess(2, 4), sess(1, 5), sess(2, 6)]);

    // Multi-member groups rotate, single-member groups repeat
    assert_eq!(
        st.lookup("/a1/+/c1").unwrap(),
        vec![sess(1, 1), sess(1, 3), sess(1, 5), sess(2, 6)]
    );
    assert_eq!(st.lookup("/a1/+/c1").unwrap(), first);
}

#[test]
fn test_same_state_same_result() {
    let build = || {
        trie_with(&WIDE)
            .lookup("/+/+/c1")
            .unwrap()
    };
    assert_eq!(build(), build());
}

#[test]
fn test_descendants_included_only_by_lookup() {
    let st = trie_with(&[sub("/a/b/c", "g", 1, 1), sub("/a/b/c/d/e", "g", 2, 1)]);

    assert_eq!(st.lookup("/a/+/c").unwrap(), vec![sess(1, 1), sess(1, 2)]);
    assert_eq!(st.lookup_exactly("/a/b/c").unwrap(), vec![sess(1, 1)]);
}

#[test]
fn test_exact_lookup_one_per_group() {
    let groups = ["alpha", "beta", "gamma"];
    let st = SubTrie::new();
    let mut client_id = 0;
    for group in groups {
        for addr in 1..=4 {
            client_id += 1;
            st.subscribe("/orders/eu", group, client_id, PeerName(addr))
                .unwrap();
        }
    }

    let sessions = st.lookup_exactly("/orders/eu").unwrap();
    assert_eq!(sessions.len(), groups.len());
    // Members of group i have client ids 4i+1 ..= 4i+4
    for (i, session) in sessions.iter().enumerate() {
        let first = 4 * i as u64 + 1;
        assert!((first..first + 4).contains(&session.client_id));
    }
}

#[test_case(1 ; "single member")]
#[test_case(2 ; "two members")]
#[test_case(3 ; "three members")]
#[test_case(8 ; "eight members")]
fn test_rotation_is_fair(members: u64) {
    let st = SubTrie::new();
    for client_id in 0..members {
        st.subscribe("/jobs", "workers", client_id, PeerName(client_id % 3))
            .unwrap();
    }

    let mut picked: Vec<u64> = (0..members)
        .map(|_| st.lookup("/jobs").unwrap()[0].client_id)
        .collect();
    picked.sort_unstable();
    assert_eq!(picked, (0..members).collect::<Vec<_>>());
}

#[test]
fn test_duplicate_subscribe_is_idempotent() {
    let st = SubTrie::new();
    st.subscribe("/a/b", "g", 1, PeerName(1)).unwrap();
    let once = (st.stats(), st.snapshot());

    st.subscribe("/a/b", "g", 1, PeerName(1)).unwrap();
    assert_eq!((st.stats(), st.snapshot()), once);
}

#[test]
fn test_unsubscribe_prunes_leaf_chain() {
    let st = trie_with(&[
        sub("/a1/b1/c1", "test1", 1, 1),
        sub("/a1/b1/c1/d1/e1", "test1", 5, 1),
    ]);
    assert_eq!(st.stats().nodes, 5);

    st.unsubscribe("/a1/b1/c1/d1/e1", "test1", 5, &PeerName(1))
        .unwrap();
    assert_eq!(
        st.stats(),
        TrieStats {
            nodes: 3,
            groups: 1,
            sessions: 1
        }
    );
    assert_eq!(st.lookup("/a1/+/c1/+"), Err(TrieError::NoMatch));
    assert_eq!(st.lookup("/a1/+/c1").unwrap(), vec![sess(1, 1)]);

    st.unsubscribe("/a1/b1/c1", "test1", 1, &PeerName(1))
        .unwrap();
    assert!(st.is_empty());
    assert_eq!(st.lookup("/+"), Err(TrieError::NoMatch));
}

#[test]
fn test_subscribe_then_unsubscribe_restores_state() {
    let st = trie_with(&WIDE);
    let before = (st.stats(), st.snapshot());

    st.subscribe("/a1/b3/c9/x", "fresh", 42, PeerName(9)).unwrap();
    st.unsubscribe("/a1/b3/c9/x", "fresh", 42, &PeerName(9))
        .unwrap();

    assert_eq!((st.stats(), st.snapshot()), before);
}

#[test_case("/+" ; "single wildcard")]
#[test_case("/+/+" ; "two wildcards")]
#[test_case("/a1/+" ; "trailing wildcard")]
fn test_all_wildcard_patterns_resolve(pattern: &str) {
    let st = trie_with(&WIDE);
    assert!(!st.lookup(pattern).unwrap().is_empty());
}

#[test_case("" ; "empty pattern")]
#[test_case("/" ; "separator only")]
#[test_case("/a1//c1" ; "empty segment")]
fn test_invalid_patterns(pattern: &str) {
    let st = trie_with(&WIDE);
    assert!(matches!(st.lookup(pattern), Err(TrieError::InvalidTopic(_))));
    assert!(matches!(
        st.lookup_exactly(pattern),
        Err(TrieError::InvalidTopic(_))
    ));
}

#[test]
fn test_subscription_rejects_wildcard() {
    let st = SubTrie::new();
    let err = st.subscribe("/a/+", "g", 1, PeerName(1)).unwrap_err();
    assert!(matches!(err, TrieError::InvalidTopic(_)));
    assert!(!err.is_no_match());
    assert!(st.is_empty());
}

#[test]
fn test_no_match_is_cheap_signal() {
    let st = trie_with(&WIDE);
    let err = st.lookup("/zz/+").unwrap_err();
    assert!(err.is_no_match());
    assert_eq!(err.to_string(), "no matching subscribers");
}

#[test]
fn test_callback_lookup_counts() {
    let st = trie_with(&WIDE);
    let mut seen = Vec::new();
    let count = st.lookup_with("/a1/+/c1", |s| seen.push(s.client_id)).unwrap();
    assert_eq!(count, 5);
    assert_eq!(seen, vec![2, 4, 5, 5, 6]);
}

#[test]
fn test_deepest_accepted_topic() {
    // Longest "/a/a/..." topic within the default length limit
    let levels = 65535 / 2;
    let topic = "/a".repeat(levels);
    let st = SubTrie::new();
    assert!(st.subscribe(&topic, "g", 1, PeerName(1)).unwrap());
    assert!(st.subscribe(&topic, "g", 2, PeerName(2)).unwrap());
    assert!(st.subscribe(&format!("{}/a", topic), "g", 3, PeerName(1)).is_err());

    assert_eq!(st.stats().nodes, levels);
    assert_eq!(st.lookup("/a").unwrap(), vec![sess(2, 2)]);
    assert_eq!(st.lookup("/+/a").unwrap(), vec![sess(1, 1)]);
    assert_eq!(st.lookup_exactly(&topic).unwrap(), vec![sess(2, 2)]);

    let snapshot = st.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].topic, topic);

    assert_eq!(st.remove_peer(&PeerName(2)), 1);
    assert!(st
        .unsubscribe(&topic, "g", 1, &PeerName(1))
        .unwrap());
    assert!(st.is_empty());

    // Tear down a full-depth trie as well
    st.subscribe(&topic, "g", 1, PeerName(1)).unwrap();
    drop(st);
}
