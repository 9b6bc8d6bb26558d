//! Deterministic synthetic data generators.
//!
//! Names, descriptions, timestamps and shape arithmetic are fully
//! deterministic; only identities (UUIDv7) differ between runs. Time-series
//! shapes start at [`epoch`] and advance one calendar day per generated unit,
//! which makes "all records in calendar year Y" a predictable subset.

use crate::entities::{Artifact, Edge, GraphBatch, Timestamp};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

/// Seconds between the Unix epoch and 2000-01-01T00:00:00Z.
const EPOCH_2000_SECS: i64 = 946_684_800;

/// Fixed starting timestamp for time-series generators.
pub fn epoch() -> Timestamp {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(EPOCH_2000_SECS)
}

/// Timestamp of the `day`-th generated unit.
pub fn day(day: usize) -> Timestamp {
    epoch() + Duration::days(day as i64)
}

fn name(i: usize) -> String {
    format!("artifact-{}", i)
}

fn description(i: usize) -> String {
    format!("description-{}", i)
}

fn body(i: usize) -> String {
    format!("body-{}", i)
}

/// `n` independent artifacts stamped with `now`.
pub fn flat_batch(n: usize, now: Timestamp) -> Vec<Artifact> {
    (0..n)
        .map(|i| Artifact::new(name(i), description(i), now))
        .collect()
}

/// `n` connected pairs: 2n artifacts and n edges, pair `i` stamped with day `i`.
pub fn pairs(n: usize) -> GraphBatch {
    let mut batch = GraphBatch {
        artifacts: Vec::with_capacity(n * 2),
        edges: Vec::with_capacity(n),
        roots: Vec::with_capacity(n),
    };

    for i in 0..n {
        let tm = day(i);
        let from = Artifact::new(format!("artifact-from-{}", i), description(i), tm);
        let to = Artifact::new(format!("artifact-to-{}", i), description(i), tm);

        batch.edges.push(Edge::new(from.id, to.id, body(i)));
        batch.roots.push(from.id);
        batch.artifacts.push(from);
        batch.artifacts.push(to);
    }

    batch
}

/// `repeat` independent chains of `len` artifacts each (`len - 1` edges per
/// chain). Node `k` of every chain is named `artifact-<k>` and carries
/// `item = 1`.
pub fn chains(len: usize, repeat: usize) -> GraphBatch {
    let mut batch = GraphBatch::default();
    if len == 0 {
        return batch;
    }

    batch.artifacts.reserve(len * repeat);
    batch.edges.reserve((len - 1) * repeat);

    for _ in 0..repeat {
        let head = Artifact::new(name(0), description(0), day(0));
        let mut last = head.id;
        batch.roots.push(head.id);
        batch.artifacts.push(head);

        for k in 1..len {
            let node = Artifact::new(name(k), description(k), day(k));
            batch.edges.push(Edge::new(last, node.id, body(k - 1)));
            last = node.id;
            batch.artifacts.push(node);
        }
    }

    batch
}

/// One parent artifact with `n - 1` direct children (n artifacts, n - 1 edges).
pub fn star(n: usize) -> GraphBatch {
    let mut batch = GraphBatch::default();
    if n == 0 {
        return batch;
    }

    let parent = Artifact::new(name(0), description(0), day(0));
    let parent_id = parent.id;
    batch.roots.push(parent_id);
    batch.artifacts.reserve(n);
    batch.edges.reserve(n - 1);
    batch.artifacts.push(parent);

    for i in 1..n {
        let child = Artifact::new(name(i), description(i), day(i));
        batch.edges.push(Edge::new(parent_id, child.id, body(i - 1)));
        batch.artifacts.push(child);
    }

    batch
}

/// Sum of `item` over hops `0..=max_hop` of a chain of `len` unit items.
pub fn chain_item_sum(len: usize, max_hop: usize) -> i64 {
    if len == 0 {
        return 0;
    }
    (max_hop.saturating_add(1)).min(len) as i64
}

/// How many of the first `n` generated days fall within calendar `year`.
pub fn days_in_year_within(n: usize, year: i32) -> u64 {
    let Some(start) = NaiveDate::from_ymd_opt(year, 1, 1) else {
        return 0;
    };
    let Some(end) = NaiveDate::from_ymd_opt(year + 1, 1, 1) else {
        return 0;
    };
    let origin = epoch().date_naive();

    let lo = (start - origin).num_days().max(0);
    let hi = (end - origin).num_days().min(n as i64);
    (hi - lo).max(0) as u64
}

/// Calendar year of the `i`-th generated day.
pub fn year_of_day(i: usize) -> i32 {
    day(i).year()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_epoch_is_2000_01_01() {
        let e = epoch();
        assert_eq!((e.year(), e.month(), e.day()), (2000, 1, 1));
        assert_eq!((e.hour(), e.minute(), e.second()), (0, 0, 0));
    }

    #[test]
    fn test_flat_batch_names() {
        let batch = flat_batch(3, epoch());
        let names: Vec<_> = batch.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["artifact-0", "artifact-1", "artifact-2"]);
        assert_eq!(batch[2].description, "description-2");
        assert!(batch.iter().all(|a| a.item == 1));
    }

    #[test]
    fn test_pairs_link_from_to() {
        let batch = pairs(2);
        assert_eq!(batch.artifacts.len(), 4);
        assert_eq!(batch.edges.len(), 2);
        assert_eq!(batch.edges[1].from, batch.artifacts[2].id);
        assert_eq!(batch.edges[1].to, batch.artifacts[3].id);
        assert_eq!(batch.artifacts[2].name, "artifact-from-1");
        assert_eq!(batch.artifacts[3].name, "artifact-to-1");
        assert_eq!(batch.artifacts[3].create_time, day(1));
        assert_eq!(batch.roots, vec![batch.artifacts[0].id, batch.artifacts[2].id]);
    }

    #[test]
    fn test_chain_is_linked_list() {
        let batch = chains(4, 1);
        assert_eq!(batch.edges.len(), 3);
        for (k, edge) in batch.edges.iter().enumerate() {
            assert_eq!(edge.from, batch.artifacts[k].id);
            assert_eq!(edge.to, batch.artifacts[k + 1].id);
            assert_eq!(edge.body, format!("body-{}", k));
        }
        assert_eq!(batch.roots, vec![batch.artifacts[0].id]);
    }

    #[test]
    fn test_star_children_hang_off_parent() {
        let batch = star(5);
        let parent = batch.artifacts[0].id;
        assert!(batch.edges.iter().all(|e| e.from == parent));
        let targets: HashSet<_> = batch.edges.iter().map(|e| e.to).collect();
        assert_eq!(targets.len(), 4);
        assert!(!targets.contains(&parent));
    }

    #[test]
    fn test_empty_shapes() {
        assert!(pairs(0).is_empty());
        assert!(chains(0, 3).is_empty());
        assert!(star(0).is_empty());
        assert_eq!(star(1).artifacts.len(), 1);
        assert!(star(1).edges.is_empty());
    }

    #[test]
    fn test_days_in_year_within() {
        assert_eq!(days_in_year_within(10_000, 2000), 366);
        assert_eq!(days_in_year_within(10_000, 2022), 365);
        assert_eq!(days_in_year_within(10_000, 1999), 0);
        assert_eq!(days_in_year_within(10, 2000), 10);
        assert_eq!(days_in_year_within(366 + 365, 2001), 365);
        assert_eq!(days_in_year_within(366 + 364, 2001), 364);
        assert_eq!(days_in_year_within(10_000, 2030), 0);
    }

    #[test]
    fn test_chain_item_sum() {
        assert_eq!(chain_item_sum(10_000, 4_999), 5_000);
        assert_eq!(chain_item_sum(10, 0), 1);
        assert_eq!(chain_item_sum(10, 50), 10);
        assert_eq!(chain_item_sum(0, 5), 0);
    }

    proptest! {
        #[test]
        fn prop_pair_arithmetic(n in 0usize..300) {
            let batch = pairs(n);
            prop_assert_eq!(batch.artifacts.len(), 2 * n);
            prop_assert_eq!(batch.edges.len(), n);
        }

        #[test]
        fn prop_chain_arithmetic(len in 1usize..200, repeat in 0usize..5) {
            let batch = chains(len, repeat);
            prop_assert_eq!(batch.artifacts.len(), len * repeat);
            prop_assert_eq!(batch.edges.len(), (len - 1) * repeat);
            prop_assert_eq!(batch.roots.len(), repeat);
        }

        #[test]
        fn prop_star_arithmetic(n in 1usize..300) {
            let batch = star(n);
            prop_assert_eq!(batch.artifacts.len(), n);
            prop_assert_eq!(batch.edges.len(), n - 1);
        }

        #[test]
        fn prop_ids_globally_unique(n in 1usize..200) {
            let batch = pairs(n);
            let mut seen = HashSet::new();
            for id in batch.artifact_ids().into_iter().chain(batch.edge_ids()) {
                prop_assert!(seen.insert(id));
            }
        }

        #[test]
        fn prop_year_count_matches_generated_days(n in 0usize..3000, year in 1999i32..2010) {
            let expected = (0..n).filter(|&i| year_of_day(i) == year).count() as u64;
            prop_assert_eq!(days_in_year_within(n, year), expected);
        }
    }
}
