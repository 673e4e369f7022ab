//! # Timelock Extraction and Reachability
//!
//! Answers the question "which transactions of this contract can never
//! become valid by a given future time/height horizon?".
//!
//! Per-node timelock facts are extracted once from sequence numbers (BIP 68)
//! and the locktime field (BIP 65 semantics, median-past-time approximated
//! by the raw field) and memoized by txid. Descendant closures are memoized
//! the same way, as txid-keyed cache slots rather than pointers between
//! nodes, so the mutually recursive closure computation never forms
//! reference cycles.
//!
//! Per-base results are combined by randomized pairwise merging: bases can
//! share large descendant sets through alternative spend paths, and merging
//! random pairs keeps the cost bounded where a naive flatten-then-sort
//! degrades quadratically on adversarial overlaps. The random choice affects
//! performance only; the merged set is identical for every merge order.

use std::collections::HashMap;

use bitcoin::{absolute, relative, Sequence, Txid};
use rand::Rng;

use super::index::{SpendIndex, TxidIndex};
use super::node::{NodeId, TxNode};

/// Timelock characteristics of one transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingData {
    /// Earliest UNIX time the locktime field allows, 0 when inactive
    pub unlock_time: u64,
    /// Earliest block height the locktime field allows, 0 when inactive
    pub unlock_height: u64,
    /// Largest relative time requirement across inputs, seconds
    pub unlock_at_relative_time: u64,
    /// Largest relative height requirement across inputs, blocks
    pub unlock_at_relative_height: u64,
}

/// Memoized per-node timing facts and descendant closures, keyed by txid.
///
/// Owned by one loaded contract and filled monotonically; queries may run
/// repeatedly against the same contract and see a consistent, growing cache.
#[derive(Debug, Default)]
pub struct TimingCache {
    entries: HashMap<Txid, (TimingData, Option<Vec<NodeId>>)>,
}

impl TimingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions with cached timing facts
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn descendants_cached(&self, txid: &Txid) -> bool {
        matches!(self.entries.get(txid), Some((_, Some(_))))
    }
}

/// Extract (or fetch from cache) the timelock characteristics of a node.
///
/// A sequence of 0xffffffff imposes no constraint and does not enable the
/// locktime field; any other value enables it. The disable flag (bit 31)
/// voids the relative value while still enabling locktime. Otherwise the low
/// 16 bits count in units of 512 seconds when bit 22 is set, in blocks when
/// clear. Every input must clear its own constraint, so the binding relative
/// requirement per axis is the maximum across inputs.
pub fn compute_timing(node: &TxNode, cache: &mut TimingCache) -> TimingData {
    if let Some((timing, _)) = cache.entries.get(&node.txid()) {
        return *timing;
    }

    let mut unlock_at_relative_height = 0u64;
    let mut unlock_at_relative_time = 0u64;
    let mut locktime_enabled = false;
    for input in &node.tx().input {
        if input.sequence == Sequence::MAX {
            continue;
        }
        locktime_enabled = true;
        match input.sequence.to_relative_lock_time() {
            Some(relative::LockTime::Blocks(height)) => {
                unlock_at_relative_height =
                    unlock_at_relative_height.max(height.value() as u64);
            }
            Some(relative::LockTime::Time(time)) => {
                unlock_at_relative_time =
                    unlock_at_relative_time.max(time.value() as u64 * 512);
            }
            // Disable flag set: no relative meaning, locktime stays enabled.
            None => {}
        }
    }

    // Below 500,000,000 the locktime field is a height, at or above a UNIX
    // time; it only binds when at least one input enabled it.
    let (unlock_time, unlock_height) = if locktime_enabled {
        match node.tx().lock_time {
            absolute::LockTime::Blocks(height) => (0, height.to_consensus_u32() as u64),
            absolute::LockTime::Seconds(time) => (time.to_consensus_u32() as u64, 0),
        }
    } else {
        (0, 0)
    };

    let timing = TimingData {
        unlock_time,
        unlock_height,
        unlock_at_relative_time,
        unlock_at_relative_height,
    };
    cache.entries.insert(node.txid(), (timing, None));
    timing
}

/// Nodes none of whose inputs are explained by another node in the graph.
///
/// After placeholder synthesis this is the placeholder set, but it is
/// recomputed structurally rather than assumed.
pub fn base_transactions(nodes: &[TxNode], index: &TxidIndex) -> Vec<NodeId> {
    nodes
        .iter()
        .filter(|node| {
            node.tx()
                .input
                .iter()
                .all(|input| !index.contains_txid(&input.previous_output.txid))
        })
        .map(|node| node.id())
        .collect()
}

/// All spenders of any output of `txid`, in ascending output order
fn spending_children(txid: Txid, spends: &SpendIndex) -> Vec<NodeId> {
    spends
        .get_grouped(&txid)
        .map(|grouped| grouped.values().flatten().copied().collect())
        .unwrap_or_default()
}

/// The memoized descendant closure of a node: itself plus every transitive
/// spender, txid-sorted and duplicate-free.
fn all_descendants(
    id: NodeId,
    nodes: &[TxNode],
    spends: &SpendIndex,
    cache: &mut TimingCache,
) -> Vec<NodeId> {
    let txid = nodes[id.index()].txid();
    if let Some((_, Some(descendants))) = cache.entries.get(&txid) {
        return descendants.clone();
    }
    // Ensure the timing slot exists before filling the closure half.
    compute_timing(&nodes[id.index()], cache);

    let mut closure = vec![id];
    for child in spending_children(txid, spends) {
        closure.extend(all_descendants(child, nodes, spends, cache));
    }
    closure.sort_by_key(|n| nodes[n.index()].txid());
    closure.dedup_by_key(|n| nodes[n.index()].txid());

    let slot = cache
        .entries
        .get_mut(&txid)
        .expect("timing slot inserted above");
    slot.1 = Some(closure.clone());
    closure
}

/// Walk the spenders of `from`, accumulating the earliest moment each child
/// could be valid; a child that overshoots the horizon contributes its whole
/// descendant closure, a child within it is recursed into with the updated
/// elapsed state.
#[allow(clippy::too_many_arguments)]
fn unreachable_inner(
    from: NodeId,
    max_time: u64,
    max_height: u64,
    elapsed_time: u64,
    elapsed_height: u64,
    nodes: &[TxNode],
    spends: &SpendIndex,
    cache: &mut TimingCache,
    out: &mut Vec<NodeId>,
) {
    for child in spending_children(nodes[from.index()].txid(), spends) {
        let timing = compute_timing(&nodes[child.index()], cache);
        // The soonest moment satisfying both the absolute and the relative
        // constraint on each axis.
        let time_when_spendable = timing
            .unlock_time
            .max(elapsed_time.saturating_add(timing.unlock_at_relative_time));
        let height_when_spendable = timing
            .unlock_height
            .max(elapsed_height.saturating_add(timing.unlock_at_relative_height));
        // Strict comparison: a block at exactly the horizon still accepts.
        if time_when_spendable > max_time || height_when_spendable > max_height {
            out.extend(all_descendants(child, nodes, spends, cache));
        } else {
            unreachable_inner(
                child,
                max_time,
                max_height,
                time_when_spendable,
                height_when_spendable,
                nodes,
                spends,
                cache,
                out,
            );
        }
    }
}

/// Txid-sorted, duplicate-free unreachable set below one base node
fn unreachable_from(
    base: NodeId,
    max_time: u64,
    max_height: u64,
    start_time: u64,
    start_height: u64,
    nodes: &[TxNode],
    spends: &SpendIndex,
    cache: &mut TimingCache,
) -> Vec<NodeId> {
    let mut out = Vec::new();
    unreachable_inner(
        base, max_time, max_height, start_time, start_height, nodes, spends, cache, &mut out,
    );
    out.sort_by_key(|n| nodes[n.index()].txid());
    out.dedup_by_key(|n| nodes[n.index()].txid());
    out
}

/// Linear merge of two txid-sorted lists, keeping one copy on ties
fn merge_dedup(a: &[NodeId], b: &[NodeId], nodes: &[TxNode]) -> Vec<NodeId> {
    let key = |n: &NodeId| nodes[n.index()].txid();
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        match key(&a[i]).cmp(&key(&b[j])) {
            std::cmp::Ordering::Less => {
                merged.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                merged.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                merged.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}

/// The set of transactions that cannot be valid by the given horizon,
/// starting from the given elapsed state.
///
/// Per-base results may overlap through shared descendants; they are
/// combined by merging two lists picked uniformly at random until one
/// remains, swapping the last list into the freed slot each round.
#[allow(clippy::too_many_arguments)]
pub fn unreachable_within(
    bases: &[NodeId],
    max_time: u64,
    max_height: u64,
    start_time: u64,
    start_height: u64,
    nodes: &[TxNode],
    spends: &SpendIndex,
    cache: &mut TimingCache,
    rng: &mut impl Rng,
) -> Vec<NodeId> {
    let mut lists: Vec<Vec<NodeId>> = bases
        .iter()
        .map(|&base| {
            unreachable_from(
                base,
                max_time,
                max_height,
                start_time,
                start_height,
                nodes,
                spends,
                cache,
            )
        })
        .collect();

    while lists.len() > 1 {
        let a = rng.random_range(0..lists.len());
        let mut b = rng.random_range(0..lists.len());
        // Rejection sample until the pair is distinct.
        while b == a {
            b = rng.random_range(0..lists.len());
        }
        let merged = merge_dedup(&lists[a], &lists[b], nodes);
        lists[a] = merged;
        let last = lists.pop().expect("at least two lists");
        if b != lists.len() {
            lists[b] = last;
        }
    }
    lists.pop().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractModel;
    use crate::graph::testutil::{data, op, seq_height, seq_time, spend_tx, txid_n};
    use bitcoin::Transaction;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const INF: u64 = u64::MAX;

    fn model(paths: &[(&str, Vec<Transaction>)]) -> ContractModel {
        ContractModel::from_data(&data(paths)).expect("contract loads")
    }

    fn txids(model: &ContractModel, ids: &[NodeId]) -> Vec<Txid> {
        let mut out: Vec<Txid> = ids.iter().map(|&id| model.node(id).txid()).collect();
        out.sort();
        out
    }

    #[test]
    fn test_sequence_decoding() {
        // Final sequence: no constraint, locktime stays disabled even when
        // the field is set.
        let final_seq = spend_tx(&[(op(txid_n(1), 0), 0xffff_ffff)], &[1_000], 700_000);
        // Relative height of 10 blocks; locktime (a height here) binds too.
        let rel_height = spend_tx(&[(op(txid_n(1), 1), seq_height(10))], &[1_000], 650_000);
        // Relative time, 6 * 512 seconds; disable-flag input on the side.
        let rel_time = spend_tx(
            &[
                (op(txid_n(1), 2), seq_time(6)),
                (op(txid_n(1), 3), 0x8000_0005),
            ],
            &[1_000],
            0,
        );
        let m = model(&[
            ("p0", vec![final_seq.clone()]),
            ("p1", vec![rel_height.clone()]),
            ("p2", vec![rel_time.clone()]),
        ]);

        let t = m.timing_of(m.lookup_node(&final_seq.compute_txid()).unwrap().id());
        assert_eq!(t, TimingData::default());

        let t = m.timing_of(m.lookup_node(&rel_height.compute_txid()).unwrap().id());
        assert_eq!(t.unlock_at_relative_height, 10);
        assert_eq!(t.unlock_at_relative_time, 0);
        assert_eq!(t.unlock_height, 650_000);
        assert_eq!(t.unlock_time, 0);

        let t = m.timing_of(m.lookup_node(&rel_time.compute_txid()).unwrap().id());
        assert_eq!(t.unlock_at_relative_time, 6 * 512);
        assert_eq!(t.unlock_at_relative_height, 0);
    }

    #[test]
    fn test_locktime_threshold_splits_height_and_time() {
        let by_height = spend_tx(&[(op(txid_n(1), 0), 0)], &[1_000], 499_999_999);
        let by_time = spend_tx(&[(op(txid_n(1), 1), 0)], &[1_000], 500_000_000);
        let m = model(&[("p0", vec![by_height.clone()]), ("p1", vec![by_time.clone()])]);

        let t = m.timing_of(m.lookup_node(&by_height.compute_txid()).unwrap().id());
        assert_eq!((t.unlock_height, t.unlock_time), (499_999_999, 0));

        let t = m.timing_of(m.lookup_node(&by_time.compute_txid()).unwrap().id());
        assert_eq!((t.unlock_height, t.unlock_time), (0, 500_000_000));
    }

    #[test]
    fn test_relative_maximum_across_inputs() {
        let tx = spend_tx(
            &[
                (op(txid_n(1), 0), seq_height(4)),
                (op(txid_n(1), 1), seq_height(9)),
                (op(txid_n(1), 2), seq_time(3)),
                (op(txid_n(1), 3), seq_time(7)),
            ],
            &[1_000],
            0,
        );
        let m = model(&[("p0", vec![tx.clone()])]);
        let t = m.timing_of(m.lookup_node(&tx.compute_txid()).unwrap().id());
        assert_eq!(t.unlock_at_relative_height, 9);
        assert_eq!(t.unlock_at_relative_time, 7 * 512);
    }

    #[test]
    fn test_timing_cache_is_idempotent() {
        let tx = spend_tx(&[(op(txid_n(1), 0), seq_height(10))], &[1_000], 0);
        let m = model(&[("p0", vec![tx.clone()])]);
        let id = m.lookup_node(&tx.compute_txid()).unwrap().id();

        let first = m.timing_of(id);
        let cached_len = m.timing.borrow().len();
        let second = m.timing_of(id);
        assert_eq!(first, second);
        assert_eq!(m.timing.borrow().len(), cached_len);
    }

    #[test]
    fn test_descendant_closure_cached_after_query() {
        let a = spend_tx(&[(op(txid_n(1), 0), 0xffff_ffff)], &[5_000], 0);
        let b = spend_tx(&[(op(a.compute_txid(), 0), seq_height(10))], &[4_000], 0);
        let m = model(&[("p0", vec![a]), ("p1", vec![b.clone()])]);

        // Horizon of 5 blocks forces B's closure to be computed and cached.
        let unreachable = m.unreachable_within_with_rng(
            INF,
            5,
            0,
            0,
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(txids(&m, &unreachable), vec![b.compute_txid()]);
        assert!(m.timing.borrow().descendants_cached(&b.compute_txid()));

        // Second query is answered out of the cache and agrees.
        let again = m.unreachable_within_with_rng(
            INF,
            5,
            0,
            0,
            &mut StdRng::seed_from_u64(2),
        );
        assert_eq!(txids(&m, &again), vec![b.compute_txid()]);
    }

    #[test]
    fn test_relative_height_horizon_scenario() {
        // A has two outputs; B spends output 0 behind a 10-block relative
        // lock, output 1 stays unspent.
        let a = spend_tx(&[(op(txid_n(1), 0), 0xffff_ffff)], &[5_000, 5_000], 0);
        let b = spend_tx(&[(op(a.compute_txid(), 0), seq_height(10))], &[4_000], 0);
        let m = model(&[("p0", vec![a]), ("p1", vec![b.clone()])]);

        let at_5 =
            m.unreachable_within_with_rng(INF, 5, 0, 0, &mut StdRng::seed_from_u64(1));
        assert_eq!(txids(&m, &at_5), vec![b.compute_txid()]);

        let at_10 =
            m.unreachable_within_with_rng(INF, 10, 0, 0, &mut StdRng::seed_from_u64(1));
        assert!(at_10.is_empty());
    }

    #[test]
    fn test_unreachable_prunes_whole_subtree() {
        // B is locked 10 blocks behind A; C spends B without a lock of its
        // own but falls with B's subtree.
        let a = spend_tx(&[(op(txid_n(1), 0), 0xffff_ffff)], &[5_000], 0);
        let b = spend_tx(&[(op(a.compute_txid(), 0), seq_height(10))], &[4_000], 0);
        let c = spend_tx(&[(op(b.compute_txid(), 0), 0xffff_ffff)], &[3_000], 0);
        let m = model(&[("p0", vec![a]), ("p1", vec![b.clone()]), ("p2", vec![c.clone()])]);

        let got = m.unreachable_within_with_rng(INF, 5, 0, 0, &mut StdRng::seed_from_u64(3));
        let mut want = vec![b.compute_txid(), c.compute_txid()];
        want.sort();
        assert_eq!(txids(&m, &got), want);
    }

    #[test]
    fn test_relative_locks_accumulate_along_chain() {
        // B at +10 blocks, C a further +5: C is first valid at height 15.
        let a = spend_tx(&[(op(txid_n(1), 0), 0xffff_ffff)], &[5_000], 0);
        let b = spend_tx(&[(op(a.compute_txid(), 0), seq_height(10))], &[4_000], 0);
        let c = spend_tx(&[(op(b.compute_txid(), 0), seq_height(5))], &[3_000], 0);
        let m = model(&[("p0", vec![a]), ("p1", vec![b.clone()]), ("p2", vec![c.clone()])]);

        let at_12 =
            m.unreachable_within_with_rng(INF, 12, 0, 0, &mut StdRng::seed_from_u64(1));
        assert_eq!(txids(&m, &at_12), vec![c.compute_txid()]);

        let at_15 =
            m.unreachable_within_with_rng(INF, 15, 0, 0, &mut StdRng::seed_from_u64(1));
        assert!(at_15.is_empty());

        // Starting 10 blocks in shifts every relative lock by the same
        // amount: B unlocks at 20, C at 25.
        let from_10 =
            m.unreachable_within_with_rng(INF, 19, 0, 10, &mut StdRng::seed_from_u64(1));
        let mut want = vec![b.compute_txid(), c.compute_txid()];
        want.sort();
        assert_eq!(txids(&m, &from_10), want);

        let from_10 =
            m.unreachable_within_with_rng(INF, 24, 0, 10, &mut StdRng::seed_from_u64(1));
        assert_eq!(txids(&m, &from_10), vec![c.compute_txid()]);

        let from_10 =
            m.unreachable_within_with_rng(INF, 25, 0, 10, &mut StdRng::seed_from_u64(1));
        assert!(from_10.is_empty());
    }

    #[test]
    fn test_horizon_monotonicity() {
        let a = spend_tx(&[(op(txid_n(1), 0), 0xffff_ffff)], &[5_000], 0);
        let b = spend_tx(&[(op(a.compute_txid(), 0), seq_height(10))], &[4_000], 0);
        let c = spend_tx(&[(op(b.compute_txid(), 0), seq_height(5))], &[3_000], 0);
        let d = spend_tx(&[(op(c.compute_txid(), 0), seq_time(4))], &[2_000], 0);
        let m = model(&[
            ("p0", vec![a]),
            ("p1", vec![b]),
            ("p2", vec![c]),
            ("p3", vec![d]),
        ]);

        let mut previous = usize::MAX;
        for max_height in [0u64, 5, 9, 10, 14, 15, 20] {
            let got = m.unreachable_within_with_rng(
                INF,
                max_height,
                0,
                0,
                &mut StdRng::seed_from_u64(max_height),
            );
            assert!(
                got.len() <= previous,
                "raising the height horizon to {max_height} grew the unreachable set"
            );
            previous = got.len();
        }

        let mut previous = usize::MAX;
        for max_time in [0u64, 1_000, 2_047, 2_048, 10_000] {
            let got = m.unreachable_within_with_rng(
                max_time,
                INF,
                0,
                0,
                &mut StdRng::seed_from_u64(max_time),
            );
            assert!(
                got.len() <= previous,
                "raising the time horizon to {max_time} grew the unreachable set"
            );
            previous = got.len();
        }
    }

    #[test]
    fn test_merge_order_independence() {
        // Four externally-funded branches converge on one locked spender, so
        // every per-base list contains the same descendants and the pairwise
        // merge has real overlap to chew through.
        let branches: Vec<Transaction> = (0..4)
            .map(|i| spend_tx(&[(op(txid_n(10 + i), 0), 0xffff_ffff)], &[5_000], 0))
            .collect();
        let joined = spend_tx(
            &branches
                .iter()
                .map(|b| (op(b.compute_txid(), 0), seq_height(100)))
                .collect::<Vec<_>>(),
            &[2_000],
            0,
        );
        let tail = spend_tx(&[(op(joined.compute_txid(), 0), 0xffff_ffff)], &[1_000], 0);

        let mut paths: Vec<(&str, Vec<Transaction>)> = vec![
            ("p0", vec![branches[0].clone()]),
            ("p1", vec![branches[1].clone()]),
            ("p2", vec![branches[2].clone()]),
            ("p3", vec![branches[3].clone()]),
            ("p4", vec![joined.clone()]),
        ];
        paths.push(("p5", vec![tail.clone()]));
        let m = model(&paths);

        let mut want = vec![joined.compute_txid(), tail.compute_txid()];
        want.sort();
        for seed in [1u64, 7, 42, 1337] {
            let got =
                m.unreachable_within_with_rng(INF, 50, 0, 0, &mut StdRng::seed_from_u64(seed));
            assert_eq!(txids(&m, &got), want, "seed {seed} changed the result set");
        }
    }

    #[test]
    fn test_merge_dedup_keeps_single_copy_on_ties() {
        let a = spend_tx(&[(op(txid_n(1), 0), 0xffff_ffff)], &[1_000], 0);
        let b = spend_tx(&[(op(txid_n(2), 0), 0xffff_ffff)], &[1_000], 0);
        let m = model(&[("p0", vec![a.clone()]), ("p1", vec![b.clone()])]);

        let id_a = m.lookup_node(&a.compute_txid()).unwrap().id();
        let id_b = m.lookup_node(&b.compute_txid()).unwrap().id();
        let mut sorted = vec![id_a, id_b];
        sorted.sort_by_key(|n| m.node(*n).txid());

        let merged = merge_dedup(&sorted, &sorted[1..], &m.nodes);
        assert_eq!(merged, sorted);
        let merged = merge_dedup(&sorted, &[], &m.nodes);
        assert_eq!(merged, sorted);
    }
}
