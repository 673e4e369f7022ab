//! # Graph Builder
//!
//! Turns raw contract records into a closed transaction graph:
//!
//! 1. Parse every record (finalized hex + base64 PSBT), enforcing that all
//!    records of one program path spend the same coin with their first input.
//! 2. Group records by witness-independent txid; each group becomes one
//!    canonical node carrying every member's witness stacks as signature
//!    variants.
//! 3. Synthesize a placeholder ancestor for every referenced txid the loaded
//!    data does not explain, so that every input resolves to some node.
//! 4. Materialize one output node per transaction output and wire
//!    bidirectional spend links through the spend index, inferring
//!    script/value for placeholder outputs from their spenders' witnesses.
//!
//! Grouping-invariant violations and unlinkable spenders are fatal for the
//! load; partial graphs are never returned.

use std::collections::HashMap;
use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::consensus;
use bitcoin::hashes::{sha256, Hash};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, Psbt, ScriptBuf, Transaction, TxOut, Txid, Witness};

use crate::config::graph::PLACEHOLDER_OUTPUT_SATS;
use crate::error::{GraphError, GraphResult};
use crate::program::ContractData;

use super::index::{SpendIndex, TxidIndex};
use super::node::{NodeId, SignatureVariant, SpendLink, TxNode};
use super::utxo::{UtxoId, UtxoNode};

/// One decoded record: the finalized transaction and its signing artifact
#[derive(Debug, Clone)]
pub(crate) struct ParsedRecord {
    pub tx: Transaction,
    pub psbt: Psbt,
}

/// Decode every record of every program path.
///
/// Within one path entry, all records must spend the same outpoint with
/// input 0 (they are alternative completions of the same spend); a mismatch
/// signals upstream data corruption.
pub(crate) fn parse_records(data: &ContractData) -> GraphResult<Vec<ParsedRecord>> {
    let mut records = Vec::new();
    for (path, entry) in &data.program {
        let mut anchor: Option<OutPoint> = None;
        for raw in &entry.txs {
            let tx: Transaction = consensus::deserialize(&hex::decode(&raw.hex)?)?;
            let first = tx
                .input
                .first()
                .ok_or_else(|| GraphError::NoInputs { path: path.clone() })?;
            match anchor {
                None => anchor = Some(first.previous_output),
                Some(expected) if expected != first.previous_output => {
                    return Err(GraphError::group_mismatch(path));
                }
                Some(_) => {}
            }
            let psbt = Psbt::from_str(&raw.psbt)?;
            records.push(ParsedRecord { tx, psbt });
        }
    }
    log::debug!("parsed {} contract records", records.len());
    Ok(records)
}

/// Group parsed records into canonical nodes and synthesize placeholder
/// ancestors for unexplained inputs. Returns the node arena and the
/// identifier index covering it.
pub(crate) fn build_nodes(
    records: Vec<ParsedRecord>,
) -> GraphResult<(Vec<TxNode>, TxidIndex)> {
    // Group by txid, keeping first-seen order for determinism.
    let mut order: Vec<Txid> = Vec::new();
    let mut groups: HashMap<Txid, Vec<ParsedRecord>> = HashMap::new();
    for record in records {
        let txid = record.tx.compute_txid();
        groups
            .entry(txid)
            .or_insert_with(|| {
                order.push(txid);
                Vec::new()
            })
            .push(record);
    }

    let mut nodes: Vec<TxNode> = Vec::new();
    let mut index = TxidIndex::new();
    for txid in order {
        let group = groups.remove(&txid).unwrap_or_default();
        // Unreachable under correct grouping, but asserted: an empty group
        // means the grouping machinery itself is corrupt.
        if group.is_empty() {
            return Err(GraphError::EmptyGroup {
                txid: txid.to_string(),
            });
        }

        // Members of a group are witness-identical apart from their
        // signatures; any member works as the representative body.
        let mut base = group[0].tx.clone();
        for input in &mut base.input {
            input.witness = Witness::default();
        }

        let variants: Vec<SignatureVariant> = group
            .into_iter()
            .map(|record| SignatureVariant {
                wtxid: record.tx.compute_wtxid(),
                witnesses: record.tx.input.iter().map(|i| i.witness.clone()).collect(),
                psbt: record.psbt,
            })
            .collect();

        let node = TxNode::new(NodeId(nodes.len()), txid, base, variants, false);
        index.insert(&node);
        nodes.push(node);
    }

    synthesize_placeholders(&mut nodes, &mut index);
    Ok((nodes, index))
}

/// Create one placeholder node per referenced txid the index cannot explain,
/// with enough sentinel outputs to cover the highest referenced index.
fn synthesize_placeholders(nodes: &mut Vec<TxNode>, index: &mut TxidIndex) {
    let mut missing_order: Vec<Txid> = Vec::new();
    let mut max_vout: HashMap<Txid, u32> = HashMap::new();
    for node in nodes.iter() {
        for input in &node.tx().input {
            let prev = input.previous_output;
            if index.contains_txid(&prev.txid) {
                continue;
            }
            let entry = max_vout.entry(prev.txid).or_insert_with(|| {
                missing_order.push(prev.txid);
                0
            });
            *entry = (*entry).max(prev.vout);
        }
    }

    for txid in missing_order {
        let n_outputs = max_vout[&txid] + 1;
        let body = Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: Vec::new(),
            output: (0..n_outputs)
                .map(|_| TxOut {
                    value: Amount::from_sat(PLACEHOLDER_OUTPUT_SATS),
                    script_pubkey: ScriptBuf::new(),
                })
                .collect(),
        };
        log::debug!("synthesizing placeholder {txid} with {n_outputs} outputs");
        let node = TxNode::new(NodeId(nodes.len()), txid, body, Vec::new(), true);
        index.insert(&node);
        nodes.push(node);
    }
}

/// Materialize one output node per transaction output and wire spend links.
///
/// Returns the output arena plus the visible output list: placeholder-owned
/// outputs nobody spends are materialized (so the output-count invariant
/// holds) but excluded from the visible list, since they only exist to pad
/// the synthetic sentinel body.
pub(crate) fn link_outputs(
    nodes: &mut [TxNode],
    spends: &SpendIndex,
) -> GraphResult<(Vec<UtxoNode>, Vec<UtxoId>)> {
    let mut utxos: Vec<UtxoNode> = Vec::new();
    let mut visible: Vec<UtxoId> = Vec::new();

    for i in 0..nodes.len() {
        let txid = nodes[i].txid();
        let is_placeholder = nodes[i].is_placeholder();
        let n_outputs = nodes[i].tx().output.len();

        for vout in 0..n_outputs as u32 {
            let outpoint = OutPoint { txid, vout };
            let spenders: Vec<NodeId> = spends
                .get(&txid, vout)
                .map(|s| s.to_vec())
                .unwrap_or_default();

            // Resolve each spender's matching input up front; a spender the
            // spend index knows about must reference this outpoint.
            let mut matched_inputs = Vec::with_capacity(spenders.len());
            for &spender in &spenders {
                let input_index = nodes[spender.index()]
                    .tx()
                    .input
                    .iter()
                    .position(|inp| inp.previous_output == outpoint)
                    .ok_or_else(|| GraphError::MissingSpender {
                        txid: txid.to_string(),
                        vout,
                    })?;
                matched_inputs.push(input_index);
            }

            if is_placeholder && !spenders.is_empty() {
                if let Some((value, script)) =
                    infer_funding(nodes, &spenders, matched_inputs[0])
                {
                    let out = &mut nodes[i].tx.output[vout as usize];
                    out.value = value;
                    out.script_pubkey = script;
                }
            }

            let utxo_id = UtxoId(utxos.len());
            let out = &nodes[i].tx().output[vout as usize];
            let mut utxo = UtxoNode {
                id: utxo_id,
                owner: NodeId(i),
                outpoint,
                value: out.value,
                script_pubkey: out.script_pubkey.clone(),
                spenders: spenders.clone(),
                spent_by: Vec::new(),
            };

            for (spend_variant, (&spender, &input_index)) in
                spenders.iter().zip(&matched_inputs).enumerate()
            {
                let link = SpendLink {
                    utxo: utxo_id,
                    spender,
                    spend_variant,
                    input_index,
                };
                utxo.spent_by.push(link);
                nodes[spender.index()].input_links.push(link);
            }

            if !is_placeholder || !spenders.is_empty() {
                visible.push(utxo_id);
            }
            nodes[i].outputs.push(utxo_id);
            utxos.push(utxo);
        }
    }

    Ok((utxos, visible))
}

/// Speculative inference of a placeholder output's script and value from its
/// spenders.
///
/// The last witness element of the first spender's first variant stack for
/// the matching input is taken as the segwit-v0 commitment program; the
/// value is the maximum total output value across all spenders, an upper
/// bound since the true funding amount is unknown before broadcast. Returns
/// `None` when no witness data is available, leaving the sentinel body
/// untouched.
fn infer_funding(
    nodes: &[TxNode],
    spenders: &[NodeId],
    input_index: usize,
) -> Option<(Amount, ScriptBuf)> {
    let first = &nodes[spenders[0].index()];
    let stack = first.variants().first()?.witnesses.get(input_index)?;
    let item = stack.last()?;
    let program: [u8; 32] = match <[u8; 32]>::try_from(item) {
        Ok(program) => program,
        // Longer/shorter elements are witness scripts, not programs; hash
        // them down to the v0 program they commit to.
        Err(_) => sha256::Hash::hash(item).to_byte_array(),
    };
    let mut script = Vec::with_capacity(34);
    script.push(0x00);
    script.push(0x20);
    script.extend_from_slice(&program);

    let max_total = spenders
        .iter()
        .map(|&sp| {
            nodes[sp.index()]
                .tx()
                .output
                .iter()
                .map(|o| o.value.to_sat())
                .sum::<u64>()
        })
        .max()
        .unwrap_or(0);

    Some((Amount::from_sat(max_total), ScriptBuf::from_bytes(script)))
}
