use std::sync::Mutex;

use chrono::NaiveDateTime;

use crate::context::QueryContext;
use crate::error::Result;
use crate::params::{
    AddressFilter, AggregateQuery, AssetFilter, OutputFilter, Page, TransactionFilter,
    TransactionSort,
};

use super::models::{
    AddressAssetRow, AddressRow, AggregateRow, AssetRow, OutputAddressRow, OutputRecord,
    OutputRow, TransactionRow,
};
use super::{LedgerStore, OutputSide};

/// An in-memory [`LedgerStore`] for tests. Serves canned rows populated via
/// the builder and records every round-trip it receives.
#[derive(Default)]
pub struct MockStore {
    transactions: Vec<TransactionRow>,
    assets: Vec<AssetRow>,
    addresses: Vec<AddressRow>,
    outputs: Vec<OutputRow>,
    output_addresses: Vec<OutputAddressRow>,
    records: Vec<OutputRecord>,
    address_assets: Vec<AddressAssetRow>,
    buckets: Vec<AggregateRow>,
    calls: Mutex<Vec<String>>,
    aggregate_queries: Mutex<Vec<AggregateQuery>>,
    transaction_orders: Mutex<Vec<Option<TransactionSort>>>,
}

impl MockStore {
    pub fn builder() -> MockStoreBuilder {
        MockStoreBuilder(MockStore::default())
    }

    /// Names of the round-trips issued so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| *c == name).count()
    }

    pub fn aggregate_queries(&self) -> Vec<AggregateQuery> {
        self.aggregate_queries.lock().unwrap().clone()
    }

    pub fn transaction_orders(&self) -> Vec<Option<TransactionSort>> {
        self.transaction_orders.lock().unwrap().clone()
    }

    fn record_call(&self, ctx: &QueryContext, name: &str) -> Result<()> {
        ctx.check()?;
        self.calls.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

pub struct MockStoreBuilder(MockStore);

impl MockStoreBuilder {
    pub fn with_transaction(mut self, row: TransactionRow) -> Self {
        self.0.transactions.push(row);
        self
    }

    pub fn with_transactions(mut self, rows: impl IntoIterator<Item = TransactionRow>) -> Self {
        self.0.transactions.extend(rows);
        self
    }

    pub fn with_asset(mut self, row: AssetRow) -> Self {
        self.0.assets.push(row);
        self
    }

    pub fn with_address(mut self, row: AddressRow) -> Self {
        self.0.addresses.push(row);
        self
    }

    pub fn with_output(mut self, row: OutputRow) -> Self {
        self.0.outputs.push(row);
        self
    }

    pub fn with_output_address(mut self, row: OutputAddressRow) -> Self {
        self.0.output_addresses.push(row);
        self
    }

    pub fn with_record(mut self, record: OutputRecord) -> Self {
        self.0.records.push(record);
        self
    }

    pub fn with_address_asset(mut self, row: AddressAssetRow) -> Self {
        self.0.address_assets.push(row);
        self
    }

    pub fn with_bucket(mut self, row: AggregateRow) -> Self {
        self.0.buckets.push(row);
        self
    }

    pub fn build(self) -> MockStore {
        self.0
    }
}

fn paginate<T: Clone>(rows: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    rows.skip(page.offset).take(page.limit).collect()
}

fn matches_query(query: &Option<String>, fields: &[&str]) -> bool {
    match query.as_deref().filter(|q| !q.is_empty()) {
        Some(q) => {
            let q = q.to_lowercase();
            fields.iter().any(|f| f.to_lowercase().contains(&q))
        }
        None => true,
    }
}

fn matches_id<T: ToString>(wanted: &Option<T>, actual: &str) -> bool {
    wanted.as_ref().map_or(true, |w| w.to_string() == actual)
}

fn matches_chain(chain_ids: &[String], actual: &str) -> bool {
    chain_ids.is_empty() || chain_ids.iter().any(|c| c == actual)
}

impl MockStore {
    fn filter_transactions(&self, filter: &TransactionFilter) -> impl Iterator<Item = &TransactionRow> {
        let filter = filter.clone();
        self.transactions.iter().filter(move |tx| {
            matches_id(&filter.id, &tx.id)
                && matches_chain(&filter.chain_ids, &tx.chain_id)
                && matches_query(&filter.query, &[&tx.id, &String::from_utf8_lossy(&tx.memo)])
        })
    }

    fn filter_assets(&self, filter: &AssetFilter) -> impl Iterator<Item = &AssetRow> {
        let filter = filter.clone();
        self.assets.iter().filter(move |a| {
            matches_id(&filter.id, &a.id)
                && filter.alias.as_ref().map_or(true, |alias| *alias == a.alias)
                && matches_chain(&filter.chain_ids, &a.chain_id)
                && matches_query(&filter.query, &[&a.id, &a.name, &a.symbol, &a.alias])
        })
    }

    fn filter_addresses(&self, filter: &AddressFilter) -> impl Iterator<Item = &AddressRow> {
        let filter = filter.clone();
        self.addresses.iter().filter(move |a| {
            matches_id(&filter.address, &a.address) && matches_query(&filter.query, &[&a.address])
        })
    }

    fn filter_outputs(&self, filter: &OutputFilter) -> impl Iterator<Item = &OutputRow> {
        let filter = filter.clone();
        self.outputs.iter().filter(move |o| {
            matches_id(&filter.id, &o.id)
                && matches_id(&filter.transaction_id, &o.transaction_id)
                && matches_id(&filter.asset_id, &o.asset_id)
                && filter.spent.map_or(true, |s| s == o.redeemed_by().is_some())
        })
    }
}

impl LedgerStore for MockStore {
    fn list_transactions(
        &self,
        ctx: &QueryContext,
        filter: &TransactionFilter,
        order: Option<TransactionSort>,
        page: Page,
    ) -> Result<Vec<TransactionRow>> {
        self.record_call(ctx, "list_transactions")?;
        self.transaction_orders.lock().unwrap().push(order);
        let mut rows: Vec<TransactionRow> = self.filter_transactions(filter).cloned().collect();
        match order {
            Some(TransactionSort::TimestampAsc) => rows.sort_by_key(|r| (r.created_at, r.chain_id.clone())),
            Some(TransactionSort::TimestampDesc) => {
                rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.chain_id.cmp(&b.chain_id)))
            }
            None => {}
        }
        Ok(paginate(rows.into_iter(), page))
    }

    fn count_transactions(&self, ctx: &QueryContext, filter: &TransactionFilter) -> Result<u64> {
        self.record_call(ctx, "count_transactions")?;
        Ok(self.filter_transactions(filter).count() as u64)
    }

    fn list_assets(&self, ctx: &QueryContext, filter: &AssetFilter, page: Page) -> Result<Vec<AssetRow>> {
        self.record_call(ctx, "list_assets")?;
        Ok(paginate(self.filter_assets(filter).cloned(), page))
    }

    fn count_assets(&self, ctx: &QueryContext, filter: &AssetFilter) -> Result<u64> {
        self.record_call(ctx, "count_assets")?;
        Ok(self.filter_assets(filter).count() as u64)
    }

    fn list_addresses(
        &self,
        ctx: &QueryContext,
        filter: &AddressFilter,
        page: Page,
    ) -> Result<Vec<AddressRow>> {
        self.record_call(ctx, "list_addresses")?;
        Ok(paginate(self.filter_addresses(filter).cloned(), page))
    }

    fn count_addresses(&self, ctx: &QueryContext, filter: &AddressFilter) -> Result<u64> {
        self.record_call(ctx, "count_addresses")?;
        Ok(self.filter_addresses(filter).count() as u64)
    }

    fn list_outputs(&self, ctx: &QueryContext, filter: &OutputFilter, page: Page) -> Result<Vec<OutputRow>> {
        self.record_call(ctx, "list_outputs")?;
        Ok(paginate(self.filter_outputs(filter).cloned(), page))
    }

    fn count_outputs(&self, ctx: &QueryContext, filter: &OutputFilter) -> Result<u64> {
        self.record_call(ctx, "count_outputs")?;
        Ok(self.filter_outputs(filter).count() as u64)
    }

    fn load_output_addresses(
        &self,
        ctx: &QueryContext,
        output_ids: &[String],
    ) -> Result<Vec<OutputAddressRow>> {
        self.record_call(ctx, "load_output_addresses")?;
        Ok(self
            .output_addresses
            .iter()
            .filter(|row| output_ids.contains(&row.output_id))
            .cloned()
            .collect())
    }

    fn load_output_records(
        &self,
        ctx: &QueryContext,
        side: OutputSide,
        transaction_ids: &[String],
    ) -> Result<Vec<OutputRecord>> {
        let name = match side {
            OutputSide::Created => "load_created_outputs",
            OutputSide::Redeemed => "load_redeemed_outputs",
        };
        self.record_call(ctx, name)?;
        Ok(self
            .records
            .iter()
            .filter(|r| match side {
                OutputSide::Created => transaction_ids.contains(&r.output.transaction_id),
                OutputSide::Redeemed => r
                    .output
                    .redeeming_transaction_id
                    .as_ref()
                    .is_some_and(|id| transaction_ids.contains(id)),
            })
            .cloned()
            .collect())
    }

    fn load_address_assets(
        &self,
        ctx: &QueryContext,
        addresses: &[String],
    ) -> Result<Vec<AddressAssetRow>> {
        self.record_call(ctx, "load_address_assets")?;
        Ok(self
            .address_assets
            .iter()
            .filter(|row| addresses.contains(&row.address))
            .cloned()
            .collect())
    }

    fn first_transaction_time(
        &self,
        ctx: &QueryContext,
        chain_ids: &[String],
    ) -> Result<Option<NaiveDateTime>> {
        self.record_call(ctx, "get_first_transaction_time")?;
        Ok(self
            .transactions
            .iter()
            .filter(|tx| matches_chain(chain_ids, &tx.chain_id))
            .map(|tx| tx.created_at)
            .min())
    }

    fn load_aggregate_buckets(
        &self,
        ctx: &QueryContext,
        query: &AggregateQuery,
    ) -> Result<Vec<AggregateRow>> {
        self.record_call(ctx, "get_transaction_aggregates_histogram")?;
        self.aggregate_queries.lock().unwrap().push(query.clone());
        Ok(self.buckets.clone())
    }
}
