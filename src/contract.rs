//! # Loaded Contract
//!
//! [`ContractModel`] owns everything derived from one contract payload: the
//! node and output arenas, both lookup indices, the timing cache and the
//! passthrough maps. A reload builds a fresh instance instead of mutating an
//! existing one; the indices assume monotonic, non-retracting insertion.
//!
//! The model is built for single-threaded use. Graph construction and
//! queries run to completion without suspension, and the timing cache sits
//! behind a `RefCell` so repeated reachability queries against the same
//! contract see a consistent, monotonically-growing cache.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

use bitcoin::{Txid, Wtxid};
use rand::Rng;

use crate::error::GraphResult;
use crate::graph::{
    builder, timing, NodeId, SpendIndex, TimingCache, TimingData, TxNode, TxidIndex, UtxoId,
    UtxoNode,
};
use crate::program::ContractData;

/// One loaded contract: the closed transaction graph plus its indices
#[derive(Debug)]
pub struct ContractModel {
    pub(crate) nodes: Vec<TxNode>,
    pub(crate) utxos: Vec<UtxoNode>,
    /// Output nodes visible to consumers; excludes unspent placeholder
    /// outputs, which only pad the synthetic sentinel bodies.
    pub(crate) utxo_set: Vec<UtxoId>,
    pub(crate) txid_index: TxidIndex,
    pub(crate) spend_index: SpendIndex,
    pub(crate) timing: RefCell<TimingCache>,
    /// Per-path continuation APIs, keyed by the path's `out` key
    continuations: BTreeMap<String, serde_json::Value>,
    /// Per-path metadata, keyed like `continuations`
    object_metadata: BTreeMap<String, serde_json::Value>,
}

impl ContractModel {
    /// Build the full graph from a contract payload.
    ///
    /// Fatal construction errors (malformed records, grouping violations,
    /// unlinkable spenders) abort the load; a partial graph is never
    /// returned.
    pub fn from_data(data: &ContractData) -> GraphResult<Self> {
        let records = builder::parse_records(data)?;
        let (mut nodes, txid_index) = builder::build_nodes(records)?;
        let spend_index = SpendIndex::build(&nodes);
        let (utxos, utxo_set) = builder::link_outputs(&mut nodes, &spend_index)?;

        let mut continuations = BTreeMap::new();
        let mut object_metadata = BTreeMap::new();
        for (path, entry) in &data.program {
            let key = entry.out.clone().unwrap_or_else(|| path.clone());
            continuations.insert(key.clone(), entry.continue_apis.clone());
            object_metadata.insert(key, entry.metadata.clone());
        }

        log::info!(
            "loaded contract: {} transactions ({} placeholders), {} outputs",
            nodes.len(),
            nodes.iter().filter(|n| n.is_placeholder()).count(),
            utxo_set.len()
        );

        Ok(Self {
            nodes,
            utxos,
            utxo_set,
            txid_index,
            spend_index,
            timing: RefCell::new(TimingCache::new()),
            continuations,
            object_metadata,
        })
    }

    /// All transaction nodes, placeholders included
    pub fn transactions(&self) -> &[TxNode] {
        &self.nodes
    }

    /// The node behind a handle
    pub fn node(&self, id: NodeId) -> &TxNode {
        &self.nodes[id.index()]
    }

    /// The output node behind a handle
    pub fn utxo(&self, id: UtxoId) -> &UtxoNode {
        &self.utxos[id.index()]
    }

    /// All visible output nodes, in creation order
    pub fn outputs(&self) -> impl Iterator<Item = &UtxoNode> + '_ {
        self.utxo_set.iter().map(|&id| &self.utxos[id.index()])
    }

    /// Look up a node by its witness-independent identifier
    pub fn lookup_node(&self, txid: &Txid) -> Option<&TxNode> {
        self.txid_index.get(txid).map(|id| self.node(id))
    }

    /// Look up a node by the witness identifier of any of its variants
    pub fn lookup_node_by_wtxid(&self, wtxid: &Wtxid) -> Option<&TxNode> {
        self.txid_index.get_by_wtxid(wtxid).map(|id| self.node(id))
    }

    /// Look up one output of one transaction. Absent txids and out-of-range
    /// indices are normal lookup misses, not errors.
    pub fn lookup_output(&self, txid: &Txid, vout: u32) -> Option<&UtxoNode> {
        let node = self.lookup_node(txid)?;
        node.outputs()
            .get(vout as usize)
            .map(|&id| &self.utxos[id.index()])
    }

    /// Timelock characteristics of a node (cached after the first call)
    pub fn timing_of(&self, id: NodeId) -> TimingData {
        timing::compute_timing(self.node(id), &mut self.timing.borrow_mut())
    }

    /// Nodes none of whose inputs are explained by another node in the graph
    pub fn base_transactions(&self) -> Vec<NodeId> {
        timing::base_transactions(&self.nodes, &self.txid_index)
    }

    /// The transactions that cannot be valid by the given horizon, starting
    /// from the given elapsed state. Randomness only steers the merge order
    /// of partial results; the returned set is deterministic.
    pub fn unreachable_within(
        &self,
        max_time: u64,
        max_height: u64,
        start_time: u64,
        start_height: u64,
    ) -> Vec<NodeId> {
        self.unreachable_within_with_rng(
            max_time,
            max_height,
            start_time,
            start_height,
            &mut rand::rng(),
        )
    }

    /// [`Self::unreachable_within`] with a caller-provided random source,
    /// for deterministic runs
    pub fn unreachable_within_with_rng(
        &self,
        max_time: u64,
        max_height: u64,
        start_time: u64,
        start_height: u64,
        rng: &mut impl Rng,
    ) -> Vec<NodeId> {
        let bases = self.base_transactions();
        timing::unreachable_within(
            &bases,
            max_time,
            max_height,
            start_time,
            start_height,
            &self.nodes,
            &self.spend_index,
            &mut self.timing.borrow_mut(),
            rng,
        )
    }

    /// The transactions that could be broadcast right now, given the set of
    /// already-confirmed txids: not yet confirmed themselves, and either
    /// externally funded (no input resolves to a local node) or with every
    /// input confirmed. Placeholders have no concrete body to broadcast and
    /// are never included.
    pub fn broadcastable(&self, confirmed: &HashSet<Txid>) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| !node.is_placeholder())
            .filter(|node| {
                if confirmed.contains(&node.txid()) {
                    return false;
                }
                let inputs_not_local = node
                    .tx()
                    .input
                    .iter()
                    .all(|inp| !self.txid_index.contains_txid(&inp.previous_output.txid));
                let all_inputs_confirmed = node
                    .tx()
                    .input
                    .iter()
                    .all(|inp| confirmed.contains(&inp.previous_output.txid));
                inputs_not_local || all_inputs_confirmed
            })
            .map(|node| node.id())
            .collect()
    }

    /// Per-path continuation APIs, passed through from the data source
    pub fn continuations(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.continuations
    }

    /// Per-path metadata, passed through from the data source
    pub fn object_metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.object_metadata
    }
}
