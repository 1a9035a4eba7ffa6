//! Weighted consistent-hash ring.
//!
//! Vnode positions are MD5-128 hashes of `"<backend.name>-<i>"`, kept as a sorted
//! `Vec<(u128, usize)>` where the second element indexes into the ring's own backend
//! list (no back-pointers into the registry, see SPEC_FULL.md §9). Lookup is a strict
//! next-greater search with wraparound: preserved for wire compatibility even though it
//! means a key that exactly equals a vnode's hash is NOT owned by that vnode.

use md5::{Digest, Md5};
use std::ops::Bound::Excluded;

use crate::types::{Backend, VnodeSnapshot};

/// Default virtual-node density per unit of weight.
pub const DEFAULT_VNODES_PER_WEIGHT: u32 = 10;

fn hash_key(key: &str) -> u128 {
    let digest = Md5::digest(key.as_bytes());
    u128::from_be_bytes(digest.into())
}

/// An immutable, built ring. Cheap to hold behind an `Arc`; rebuilding produces a new
/// value rather than mutating this one.
#[derive(Debug, Clone)]
pub struct Ring {
    backends: Vec<Backend>,
    positions: Vec<(u128, usize)>,
    vnodes_per_weight: u32,
}

impl Ring {
    /// Build a ring from a snapshot that is assumed already filtered to eligible
    /// (healthy, weight > 0) backends. Iterates backends in name order so that
    /// hash collisions resolve deterministically (last-write-wins within the build).
    pub fn build(mut healthy: Vec<Backend>) -> Self {
        Self::build_with_density(
            {
                healthy.sort_by(|a, b| a.name.cmp(&b.name));
                healthy
            },
            DEFAULT_VNODES_PER_WEIGHT,
        )
    }

    pub fn build_with_density(backends: Vec<Backend>, vnodes_per_weight: u32) -> Self {
        let mut positions: Vec<(u128, usize)> = Vec::new();

        for (idx, backend) in backends.iter().enumerate() {
            let count = backend.weight.max(1) * vnodes_per_weight;
            for i in 0..count {
                let vnode_key = format!("{}-{}", backend.name, i);
                let h = hash_key(&vnode_key);
                positions.push((h, idx));
            }
        }

        positions.sort_by(|a, b| a.0.cmp(&b.0));
        // Last-write-wins on exact hash collision: keep the entry that sorted last
        // among equal hashes. `sort_by` is stable, so among equal hashes, dedup from
        // the end keeps the one whose originating backend came later in iteration order.
        positions.dedup_by(|a, b| {
            if a.0 == b.0 {
                b.1 = a.1;
                true
            } else {
                false
            }
        });

        Ring {
            backends,
            positions,
            vnodes_per_weight,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Owner of `key`: the backend at the smallest position strictly greater than
    /// `hash(key)`, wrapping to the first position when `hash(key)` exceeds all of them.
    pub fn get(&self, key: &str) -> Option<&Backend> {
        if self.positions.is_empty() {
            return None;
        }
        let h = hash_key(key);
        let idx = self.next_index(h);
        self.positions.get(idx).map(|&(_, bi)| &self.backends[bi])
    }

    fn next_index(&self, h: u128) -> usize {
        // binary search for the first position strictly greater than h
        let partition = self.positions.partition_point(|&(pos, _)| pos <= h);
        if partition == self.positions.len() {
            0
        } else {
            partition
        }
    }

    /// Used by tests/callers that want the literal sorted-position view (e.g. to
    /// exercise `BTreeMap`-range semantics directly); not on the hot path.
    #[cfg(test)]
    fn get_via_btree(&self, h: u128) -> Option<usize> {
        use std::collections::BTreeMap;
        let map: BTreeMap<u128, usize> = self.positions.iter().copied().collect();
        map.range((Excluded(h), std::ops::Bound::Unbounded))
            .next()
            .map(|(_, &bi)| bi)
            .or_else(|| map.values().next().copied())
    }

    pub fn snapshot(&self) -> Vec<VnodeSnapshot> {
        self.positions
            .iter()
            .map(|&(h, bi)| VnodeSnapshot {
                hash: format!("{:032x}", h),
                server: self.backends[bi].name.clone(),
                angle: (h % 360) as u32,
            })
            .collect()
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metrics, Status};

    fn backend(name: &str, weight: u32) -> Backend {
        Backend {
            instance_id: format!("i-{name}"),
            name: name.to_string(),
            address: "127.0.0.1".to_string(),
            port: 8080,
            status: Status::Healthy,
            weight,
            metrics: Metrics::default(),
            load_count: 0,
            last_checked: None,
        }
    }

    #[test]
    fn empty_ring_has_no_owner() {
        let ring = Ring::build(vec![]);
        assert!(ring.is_empty());
        assert!(ring.get("anything").is_none());
    }

    #[test]
    fn single_backend_owns_every_key() {
        let ring = Ring::build(vec![backend("only", 1)]);
        assert_eq!(ring.len(), DEFAULT_VNODES_PER_WEIGHT as usize);
        for key in ["a", "b", "zzz", "1234"] {
            assert_eq!(ring.get(key).unwrap().name, "only");
        }
    }

    #[test]
    fn vnode_cardinality_matches_weight() {
        let ring = Ring::build(vec![backend("b1", 1), backend("b2", 10)]);
        assert_eq!(ring.len(), 11 * DEFAULT_VNODES_PER_WEIGHT as usize);
    }

    #[test]
    fn build_is_deterministic() {
        let r1 = Ring::build(vec![backend("b1", 3), backend("b2", 5)]);
        let r2 = Ring::build(vec![backend("b2", 5), backend("b1", 3)]);
        assert_eq!(r1.snapshot().len(), r2.snapshot().len());
        for key in ["x", "y", "z", "key-with-dashes"] {
            assert_eq!(r1.get(key).unwrap().name, r2.get(key).unwrap().name);
        }
    }

    #[test]
    fn lookup_stable_across_repeated_calls() {
        let ring = Ring::build(vec![backend("b1", 2), backend("b2", 3)]);
        let first = ring.get("stable-key").unwrap().name.clone();
        for _ in 0..50 {
            assert_eq!(ring.get("stable-key").unwrap().name, first);
        }
    }

    #[test]
    fn exact_hash_match_advances_to_next_position() {
        let backends = vec![backend("b0", 1), backend("b1", 1)];
        let two = Ring {
            backends,
            positions: vec![(10u128, 0), (20u128, 1)],
            vnodes_per_weight: 1,
        };
        // a key hashing to exactly 10 must NOT be owned by position 10's backend (b0);
        // it advances to the next position, 20, owned by b1.
        assert_eq!(two.next_index(10), 1);
        assert_eq!(two.get_via_btree(10), Some(1));
        // a key past every position wraps to the first.
        assert_eq!(two.next_index(25), 0);
    }

    #[test]
    fn weighted_remap_fraction_matches_expectation() {
        let before = Ring::build(vec![backend("b1", 1), backend("b2", 1)]);
        let after = Ring::build(vec![backend("b1", 1), backend("b2", 10)]);

        let sample: Vec<String> = (0..2000).map(|i| format!("k{i}")).collect();
        let remapped = sample
            .iter()
            .filter(|k| before.get(k).unwrap().name != after.get(k).unwrap().name)
            .count();

        let total_after = after.len();
        let added_vnodes = 9 * DEFAULT_VNODES_PER_WEIGHT as usize;
        let expected_fraction = added_vnodes as f64 / total_after as f64;
        let observed_fraction = remapped as f64 / sample.len() as f64;

        assert!(
            (observed_fraction - expected_fraction).abs() < 0.08,
            "observed {observed_fraction} expected ~{expected_fraction}"
        );
    }
}
