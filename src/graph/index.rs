//! # Lookup Indices
//!
//! Pure lookup structures over the node arena, built in linear passes during
//! graph construction. Neither index supports removal; a reload constructs a
//! fresh contract instance instead of mutating these.

use std::collections::{BTreeMap, HashMap};

use bitcoin::{Txid, Wtxid};

use super::node::{NodeId, TxNode};

/// Dual index from transaction identifier and witness identifier to a node
#[derive(Debug, Default)]
pub struct TxidIndex {
    by_txid: HashMap<Txid, NodeId>,
    by_wtxid: HashMap<Wtxid, NodeId>,
}

impl TxidIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under its txid and every witness identifier of every
    /// signature variant
    pub fn insert(&mut self, node: &TxNode) {
        self.by_txid.insert(node.txid(), node.id());
        for wtxid in node.wtxids() {
            self.by_wtxid.insert(wtxid, node.id());
        }
    }

    pub fn contains_txid(&self, txid: &Txid) -> bool {
        self.by_txid.contains_key(txid)
    }

    pub fn get(&self, txid: &Txid) -> Option<NodeId> {
        self.by_txid.get(txid).copied()
    }

    pub fn get_by_wtxid(&self, wtxid: &Wtxid) -> Option<NodeId> {
        self.by_wtxid.get(wtxid).copied()
    }

    /// Number of distinct transaction identifiers registered
    pub fn len(&self) -> usize {
        self.by_txid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_txid.is_empty()
    }
}

/// Index from (txid, vout) to the nodes spending that outpoint
#[derive(Debug, Default)]
pub struct SpendIndex {
    spends: HashMap<Txid, BTreeMap<u32, Vec<NodeId>>>,
}

impl SpendIndex {
    /// Build the index in one pass: every node is recorded under every
    /// outpoint its inputs reference.
    pub fn build(nodes: &[TxNode]) -> Self {
        let mut spends: HashMap<Txid, BTreeMap<u32, Vec<NodeId>>> = HashMap::new();
        for node in nodes {
            for input in &node.tx().input {
                let prev = input.previous_output;
                spends
                    .entry(prev.txid)
                    .or_default()
                    .entry(prev.vout)
                    .or_default()
                    .push(node.id());
            }
        }
        Self { spends }
    }

    /// Nodes spending the given outpoint, in construction order
    pub fn get(&self, txid: &Txid, vout: u32) -> Option<&[NodeId]> {
        self.spends
            .get(txid)
            .and_then(|outs| outs.get(&vout))
            .map(|v| v.as_slice())
    }

    /// All spenders of any output of the given transaction, grouped by
    /// output index (ascending)
    pub fn get_grouped(&self, txid: &Txid) -> Option<&BTreeMap<u32, Vec<NodeId>>> {
        self.spends.get(txid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::hashes::Hash;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

    fn txid(byte: u8) -> Txid {
        Txid::from_byte_array([byte; 32])
    }

    fn node_spending(id: usize, node_txid: Txid, from: &[(Txid, u32)]) -> TxNode {
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: from
                .iter()
                .map(|&(prev_txid, vout)| TxIn {
                    previous_output: OutPoint {
                        txid: prev_txid,
                        vout,
                    },
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::default(),
                })
                .collect(),
            output: vec![TxOut {
                value: Amount::from_sat(1_000),
                script_pubkey: ScriptBuf::new(),
            }],
        };
        TxNode::new(NodeId(id), node_txid, tx, Vec::new(), false)
    }

    #[test]
    fn test_spend_index_lookup_and_grouping() {
        let funding = txid(1);
        let a = node_spending(0, txid(2), &[(funding, 0)]);
        let b = node_spending(1, txid(3), &[(funding, 0), (funding, 2)]);
        let nodes = vec![a, b];
        let index = SpendIndex::build(&nodes);

        assert_eq!(index.get(&funding, 0), Some(&[NodeId(0), NodeId(1)][..]));
        assert_eq!(index.get(&funding, 2), Some(&[NodeId(1)][..]));
        assert_eq!(index.get(&funding, 1), None);
        assert_eq!(index.get(&txid(9), 0), None);

        let grouped = index.get_grouped(&funding).expect("funding is spent");
        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_txid_index_registers_all_identifiers() {
        let node = node_spending(0, txid(7), &[(txid(1), 0)]);
        let mut index = TxidIndex::new();
        index.insert(&node);

        assert!(index.contains_txid(&txid(7)));
        assert_eq!(index.get(&txid(7)), Some(NodeId(0)));
        assert_eq!(index.get(&txid(8)), None);
        assert_eq!(index.len(), 1);
    }
}
