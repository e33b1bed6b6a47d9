//! Unified search over assets, addresses and transactions.
//!
//! A query that parses as a short identifier only ever matches an address;
//! a full identifier matches an asset or a transaction by id. Anything else
//! is treated as free text and matched against all three entity kinds.

use tracing::debug;

use crate::context::QueryContext;
use crate::db::LedgerStore;
use crate::error::{Error, Result};
use crate::ids::{Id, ShortId};
use crate::models::{AddressInfo, Asset, SearchResult, SearchResults, Transaction};
use crate::params::{
    AddressFilter, AssetFilter, ListAddressesParams, ListAssetsParams, ListParams,
    ListTransactionsParams, SearchParams, TransactionFilter, PAGINATION_MAX_LIMIT,
};

use super::Reader;

pub const MIN_SEARCH_QUERY_LENGTH: usize = 1;

/// Merges per-kind matches into one tagged list: assets first, then
/// addresses, then transactions.
pub fn collate(
    assets: Vec<Asset>,
    addresses: Vec<AddressInfo>,
    transactions: Vec<Transaction>,
) -> SearchResults {
    let results: Vec<SearchResult> = assets
        .into_iter()
        .map(SearchResult::Asset)
        .chain(addresses.into_iter().map(SearchResult::Address))
        .chain(transactions.into_iter().map(SearchResult::Transaction))
        .collect();
    SearchResults {
        count: results.len().min(PAGINATION_MAX_LIMIT) as u64,
        results,
    }
}

impl<S: LedgerStore> Reader<S> {
    pub fn search(&self, ctx: &QueryContext, p: &SearchParams) -> Result<SearchResults> {
        if p.query.chars().count() < MIN_SEARCH_QUERY_LENGTH {
            return Err(Error::SearchQueryTooShort);
        }

        if let Ok(address) = p.query.parse::<ShortId>() {
            debug!("Searching addresses for {}", address);
            let found = self.get_address(ctx, &address)?;
            return Ok(collate(Vec::new(), found.into_iter().collect(), Vec::new()));
        }

        if let Ok(id) = p.query.parse::<Id>() {
            debug!("Searching assets and transactions for {}", id);
            return self.search_by_id(ctx, &id);
        }

        self.search_text(ctx, &p.query, p.list)
    }

    fn search_by_id(&self, ctx: &QueryContext, id: &Id) -> Result<SearchResults> {
        let assets = self
            .list_assets(
                ctx,
                &ListAssetsParams {
                    list: ListParams::single(),
                    filter: AssetFilter {
                        id: Some(*id),
                        ..Default::default()
                    },
                },
            )?
            .assets;
        if !assets.is_empty() {
            return Ok(collate(assets, Vec::new(), Vec::new()));
        }

        let transactions = self.get_transaction(ctx, id)?.into_iter().collect();
        Ok(collate(Vec::new(), Vec::new(), transactions))
    }

    fn search_text(&self, ctx: &QueryContext, query: &str, list: ListParams) -> Result<SearchResults> {
        let list = list.without_counting();
        let limit = list.limit;
        let query = Some(query.to_string());

        let assets = self
            .list_assets(
                ctx,
                &ListAssetsParams {
                    list,
                    filter: AssetFilter {
                        query: query.clone(),
                        ..Default::default()
                    },
                },
            )?
            .assets;
        if assets.len() >= limit {
            return Ok(collate(assets, Vec::new(), Vec::new()));
        }

        let transactions = self
            .list_transactions(
                ctx,
                &ListTransactionsParams {
                    list,
                    filter: TransactionFilter {
                        query: query.clone(),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )?
            .transactions;
        if assets.len() + transactions.len() >= limit {
            return Ok(collate(assets, Vec::new(), transactions));
        }

        let addresses = self
            .list_addresses(
                ctx,
                &ListAddressesParams {
                    list,
                    filter: AddressFilter {
                        query,
                        ..Default::default()
                    },
                },
            )?
            .addresses;
        Ok(collate(assets, addresses, transactions))
    }
}
