//! Dressing: enrichment of already-loaded transactions and addresses.
//!
//! A single output row is both "an output of the transaction that created
//! it" and, once redeemed, "an input of the transaction that redeemed it".
//! Transactions are therefore dressed from two loads (outputs created by
//! the batch, outputs redeemed by the batch) merged into one record list
//! and walked once to rebuild both sides, their addresses, credentials and
//! per-asset totals.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use crate::amount::{accumulate, AssetTokenCounts, TokenAmount};
use crate::context::QueryContext;
use crate::db::models::OutputRecord;
use crate::db::{LedgerStore, OutputSide};
use crate::error::Result;
use crate::models::{AddressInfo, AssetInfo, Input, InputCredential, Output, Transaction};

use super::Reader;

/// Inputs, outputs and totals rebuilt from output records, keyed by
/// transaction id.
#[derive(Default)]
struct TransactionGraph {
    /// output id -> distinct addresses entitled to redeem it
    output_addresses: HashMap<String, BTreeSet<String>>,
    /// owning transaction id -> output id -> output
    outputs: HashMap<String, BTreeMap<String, Output>>,
    /// redeeming transaction id -> output id -> input
    inputs: HashMap<String, BTreeMap<String, Input>>,
    output_totals: HashMap<String, AssetTokenCounts>,
    input_totals: HashMap<String, AssetTokenCounts>,
}

impl TransactionGraph {
    /// Builds the graph from merged records. Fails on the first malformed
    /// amount.
    fn build(records: Vec<OutputRecord>) -> Result<Self> {
        let mut graph = Self::default();

        // An output created and redeemed inside the same batch comes back
        // from both loads.
        let mut seen: HashSet<(String, Option<String>)> = HashSet::with_capacity(records.len());
        let records: Vec<OutputRecord> = records
            .into_iter()
            .filter(|r| seen.insert((r.output.id.clone(), r.address.clone())))
            .collect();

        for record in &records {
            graph.collect(record)?;
        }
        graph.attach_addresses();
        for record in &records {
            graph.add_credential(record);
        }
        Ok(graph)
    }

    fn collect(&mut self, record: &OutputRecord) -> Result<()> {
        let row = &record.output;
        let amount: TokenAmount = row.amount.parse()?;

        if let Some(address) = &record.address {
            self.output_addresses
                .entry(row.id.clone())
                .or_default()
                .insert(address.clone());
        }

        // Each output counts once per role however many address rows it has.
        let created = self.outputs.entry(row.transaction_id.clone()).or_default();
        if !created.contains_key(&row.id) {
            created.insert(row.id.clone(), Output::try_from(row.clone())?);
            accumulate(
                self.output_totals
                    .entry(row.transaction_id.clone())
                    .or_default(),
                &row.asset_id,
                &amount,
            );
        }

        if let Some(redeemer) = row.redeemed_by() {
            let redeemed = self.inputs.entry(redeemer.to_string()).or_default();
            if !redeemed.contains_key(&row.id) {
                let input = Input {
                    output: Output::try_from(row.clone())?,
                    creds: Vec::new(),
                };
                redeemed.insert(row.id.clone(), input);
                accumulate(
                    self.input_totals.entry(redeemer.to_string()).or_default(),
                    &row.asset_id,
                    &amount,
                );
            }
        }
        Ok(())
    }

    fn attach_addresses(&mut self) {
        let addresses_of = |id: &str| -> Vec<String> {
            self.output_addresses
                .get(id)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default()
        };

        let outputs = self.outputs.values_mut().flat_map(|m| m.values_mut());
        let inputs = self
            .inputs
            .values_mut()
            .flat_map(|m| m.values_mut())
            .map(|input| &mut input.output);
        for output in outputs.chain(inputs) {
            output.addresses = addresses_of(&output.id);
        }
    }

    fn add_credential(&mut self, record: &OutputRecord) {
        let Some(signature) = record.signature.as_ref().filter(|s| !s.is_empty()) else {
            return;
        };
        let Some(address) = &record.address else {
            return;
        };
        let input = record
            .output
            .redeemed_by()
            .and_then(|redeemer| self.inputs.get_mut(redeemer))
            .and_then(|inputs| inputs.get_mut(&record.output.id));
        match input {
            Some(input) => input.creds.push(InputCredential {
                address: address.clone(),
                public_key: record.public_key.clone(),
                signature: signature.clone(),
            }),
            None => warn!(
                "Output {} carries a signature from {} but has no redeeming transaction",
                record.output.id, address
            ),
        }
    }

    fn dress(&mut self, tx: &mut Transaction) {
        if let Some(outputs) = self.outputs.remove(&tx.id) {
            tx.outputs = outputs.into_values().collect();
            tx.outputs.sort_by_key(|o| o.output_index);
        }
        if let Some(inputs) = self.inputs.remove(&tx.id) {
            tx.inputs = inputs.into_values().collect();
            tx.inputs.sort_by(|a, b| {
                (&a.output.transaction_id, a.output.output_index)
                    .cmp(&(&b.output.transaction_id, b.output.output_index))
            });
        }
        tx.output_totals = self.output_totals.remove(&tx.id).unwrap_or_default();
        tx.input_totals = self.input_totals.remove(&tx.id).unwrap_or_default();
    }
}

impl<S: LedgerStore> Reader<S> {
    /// Attaches inputs, outputs, credentials and per-asset totals to each
    /// transaction. Either every transaction is dressed or an error is
    /// returned.
    pub(crate) fn dress_transactions(
        &self,
        ctx: &QueryContext,
        txs: &mut [Transaction],
    ) -> Result<()> {
        if txs.is_empty() {
            return Ok(());
        }

        let tx_ids: Vec<String> = txs.iter().map(|tx| tx.id.clone()).collect();
        let mut records = self
            .store
            .load_output_records(ctx, OutputSide::Created, &tx_ids)?;
        records.extend(
            self.store
                .load_output_records(ctx, OutputSide::Redeemed, &tx_ids)?,
        );
        debug!(
            "Dressing {} transactions from {} output records",
            txs.len(),
            records.len()
        );

        let mut graph = TransactionGraph::build(records)?;
        for tx in txs.iter_mut() {
            graph.dress(tx);
        }
        Ok(())
    }

    /// Attaches per-asset activity to each address. Addresses without
    /// outputs keep an empty asset map.
    pub(crate) fn dress_addresses(
        &self,
        ctx: &QueryContext,
        addrs: &mut [AddressInfo],
    ) -> Result<()> {
        if addrs.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = addrs.iter().map(|a| a.address.clone()).collect();
        let by_address: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        for row in self.store.load_address_assets(ctx, &ids)? {
            let Some(&i) = by_address.get(&row.address) else {
                continue;
            };
            let info = AssetInfo::try_from(&row)?;
            addrs[i].assets.insert(row.asset_id, info);
        }
        Ok(())
    }
}
