//! Entity list readers and singular accessors.
//!
//! Each `list_*` call loads one page, optionally counts all matching rows,
//! and enriches the page. Transaction and address enrichment live in
//! [`dress`], histograms in [`aggregate`] and the unified search in
//! [`search`].

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::context::QueryContext;
use crate::db::LedgerStore;
use crate::error::Result;
use crate::ids::{Id, ShortId};
use crate::models::{
    AddressInfo, AddressList, Asset, AssetList, ListMetadata, Output, OutputList, Transaction,
    TransactionList,
};
use crate::params::{
    AddressFilter, AssetFilter, ListAddressesParams, ListAssetsParams, ListOutputsParams,
    ListParams, ListTransactionsParams, OutputFilter, TransactionFilter,
};

pub mod aggregate;
mod dress;
pub mod search;

pub use aggregate::MAX_AGGREGATE_INTERVAL_COUNT;
pub use search::MIN_SEARCH_QUERY_LENGTH;

/// Read-only query engine over a [`LedgerStore`].
///
/// Holds no per-request state, so one reader can serve any number of
/// concurrent requests.
pub struct Reader<S> {
    store: S,
}

impl<S: LedgerStore> Reader<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reports the list count, issuing the count round-trip only when the
    /// list params ask for it.
    fn resolve_count(
        list: &ListParams,
        returned: usize,
        count_all: impl FnOnce() -> Result<u64>,
    ) -> Result<u64> {
        if list.should_count(returned) {
            count_all()
        } else {
            Ok(list.approximate_count(returned))
        }
    }

    pub fn list_transactions(
        &self,
        ctx: &QueryContext,
        p: &ListTransactionsParams,
    ) -> Result<TransactionList> {
        let rows = self
            .store
            .list_transactions(ctx, &p.filter, p.order(), p.list.page())?;
        let count = Self::resolve_count(&p.list, rows.len(), || {
            self.store.count_transactions(ctx, &p.filter)
        })?;

        let mut transactions: Vec<Transaction> = rows.into_iter().map(Transaction::from).collect();
        self.dress_transactions(ctx, &mut transactions)?;

        Ok(TransactionList {
            meta: ListMetadata { count },
            transactions,
        })
    }

    pub fn list_assets(&self, ctx: &QueryContext, p: &ListAssetsParams) -> Result<AssetList> {
        let rows = self.store.list_assets(ctx, &p.filter, p.list.page())?;
        let count = Self::resolve_count(&p.list, rows.len(), || {
            self.store.count_assets(ctx, &p.filter)
        })?;

        let assets = rows
            .into_iter()
            .map(Asset::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(AssetList {
            meta: ListMetadata { count },
            assets,
        })
    }

    pub fn list_addresses(
        &self,
        ctx: &QueryContext,
        p: &ListAddressesParams,
    ) -> Result<AddressList> {
        let rows = self.store.list_addresses(ctx, &p.filter, p.list.page())?;
        let count = Self::resolve_count(&p.list, rows.len(), || {
            self.store.count_addresses(ctx, &p.filter)
        })?;

        let mut addresses: Vec<AddressInfo> = rows.into_iter().map(AddressInfo::from).collect();
        self.dress_addresses(ctx, &mut addresses)?;

        Ok(AddressList {
            meta: ListMetadata { count },
            addresses,
        })
    }

    pub fn list_outputs(&self, ctx: &QueryContext, p: &ListOutputsParams) -> Result<OutputList> {
        let rows = self.store.list_outputs(ctx, &p.filter, p.list.page())?;
        let mut outputs = rows
            .into_iter()
            .map(Output::try_from)
            .collect::<Result<Vec<_>>>()?;

        if !outputs.is_empty() {
            let output_ids: Vec<String> = outputs.iter().map(|o| o.id.clone()).collect();
            let mut addresses: HashMap<String, BTreeSet<String>> = HashMap::new();
            for row in self.store.load_output_addresses(ctx, &output_ids)? {
                addresses.entry(row.output_id).or_default().insert(row.address);
            }
            for output in &mut outputs {
                if let Some(addrs) = addresses.remove(&output.id) {
                    output.addresses = addrs.into_iter().collect();
                }
            }
        }

        let count = Self::resolve_count(&p.list, outputs.len(), || {
            self.store.count_outputs(ctx, &p.filter)
        })?;

        Ok(OutputList {
            meta: ListMetadata { count },
            outputs,
        })
    }

    pub fn get_transaction(&self, ctx: &QueryContext, id: &Id) -> Result<Option<Transaction>> {
        let params = ListTransactionsParams {
            list: ListParams::single(),
            filter: TransactionFilter {
                id: Some(*id),
                ..Default::default()
            },
            ..Default::default()
        };
        Ok(self.list_transactions(ctx, &params)?.transactions.into_iter().next())
    }

    /// Looks an asset up by id, or by alias when the argument is not an id.
    pub fn get_asset(&self, ctx: &QueryContext, id_or_alias: &str) -> Result<Option<Asset>> {
        let filter = match id_or_alias.parse::<Id>() {
            Ok(id) => AssetFilter {
                id: Some(id),
                ..Default::default()
            },
            Err(_) => {
                debug!("{:?} is not an asset id, looking it up as an alias", id_or_alias);
                AssetFilter {
                    alias: Some(id_or_alias.to_string()),
                    ..Default::default()
                }
            }
        };
        let params = ListAssetsParams {
            list: ListParams::single(),
            filter,
        };
        Ok(self.list_assets(ctx, &params)?.assets.into_iter().next())
    }

    pub fn get_address(&self, ctx: &QueryContext, address: &ShortId) -> Result<Option<AddressInfo>> {
        let params = ListAddressesParams {
            list: ListParams::single(),
            filter: AddressFilter {
                address: Some(*address),
                ..Default::default()
            },
        };
        Ok(self.list_addresses(ctx, &params)?.addresses.into_iter().next())
    }

    pub fn get_output(&self, ctx: &QueryContext, id: &Id) -> Result<Option<Output>> {
        let params = ListOutputsParams {
            list: ListParams::single(),
            filter: OutputFilter {
                id: Some(*id),
                ..Default::default()
            },
        };
        Ok(self.list_outputs(ctx, &params)?.outputs.into_iter().next())
    }
}
