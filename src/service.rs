//! Async front for [`Reader`].
//!
//! Readers do blocking I/O through a connection pool, so every request runs
//! on tokio's blocking pool under a fresh [`QueryContext`]. The request is
//! bounded by the service timeout, and dropping the returned future cancels
//! the context so the worker gives up at its next storage round-trip. The
//! blocking worker may outlive the returned error by up to one statement
//! timeout while its current statement finishes.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::context::QueryContext;
use crate::db::LedgerStore;
use crate::error::{Error, Result};
use crate::ids::{Id, ShortId};
use crate::models::{
    AddressInfo, AddressList, AggregatesHistogram, Asset, AssetList, Output, OutputList,
    SearchResults, Transaction, TransactionList,
};
use crate::params::{
    AggregateParams, ListAddressesParams, ListAssetsParams, ListOutputsParams,
    ListTransactionsParams, SearchParams,
};
use crate::reader::Reader;

pub struct QueryService<S> {
    reader: Arc<Reader<S>>,
    timeout: Duration,
}

impl<S> Clone for QueryService<S> {
    fn clone(&self) -> Self {
        Self {
            reader: Arc::clone(&self.reader),
            timeout: self.timeout,
        }
    }
}

impl<S: LedgerStore + 'static> QueryService<S> {
    pub fn new(reader: Reader<S>, timeout: Duration) -> Self {
        Self {
            reader: Arc::new(reader),
            timeout,
        }
    }

    pub fn reader(&self) -> &Reader<S> {
        &self.reader
    }

    async fn run<T, F>(&self, op: &'static str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Reader<S>, &QueryContext) -> Result<T> + Send + 'static,
    {
        let ctx = QueryContext::with_timeout(self.timeout);
        let _cancel = ctx.cancel_on_drop();

        let reader = Arc::clone(&self.reader);
        let worker_ctx = ctx.clone();
        let task = tokio::task::spawn_blocking(move || work(&reader, &worker_ctx));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(Error::Worker(e.to_string())),
            Err(_) => {
                warn!("{} did not finish within {:?}", op, self.timeout);
                Err(Error::DeadlineExceeded)
            }
        }
    }

    pub async fn search(&self, params: SearchParams) -> Result<SearchResults> {
        self.run("search", move |r, ctx| r.search(ctx, &params)).await
    }

    pub async fn aggregate(&self, params: AggregateParams) -> Result<AggregatesHistogram> {
        self.run("aggregate", move |r, ctx| r.aggregate(ctx, &params))
            .await
    }

    pub async fn list_transactions(&self, params: ListTransactionsParams) -> Result<TransactionList> {
        self.run("list_transactions", move |r, ctx| {
            r.list_transactions(ctx, &params)
        })
        .await
    }

    pub async fn list_assets(&self, params: ListAssetsParams) -> Result<AssetList> {
        self.run("list_assets", move |r, ctx| r.list_assets(ctx, &params))
            .await
    }

    pub async fn list_addresses(&self, params: ListAddressesParams) -> Result<AddressList> {
        self.run("list_addresses", move |r, ctx| r.list_addresses(ctx, &params))
            .await
    }

    pub async fn list_outputs(&self, params: ListOutputsParams) -> Result<OutputList> {
        self.run("list_outputs", move |r, ctx| r.list_outputs(ctx, &params))
            .await
    }

    pub async fn get_transaction(&self, id: Id) -> Result<Option<Transaction>> {
        self.run("get_transaction", move |r, ctx| r.get_transaction(ctx, &id))
            .await
    }

    pub async fn get_asset(&self, id_or_alias: String) -> Result<Option<Asset>> {
        self.run("get_asset", move |r, ctx| r.get_asset(ctx, &id_or_alias))
            .await
    }

    pub async fn get_address(&self, address: ShortId) -> Result<Option<AddressInfo>> {
        self.run("get_address", move |r, ctx| r.get_address(ctx, &address))
            .await
    }

    pub async fn get_output(&self, id: Id) -> Result<Option<Output>> {
        self.run("get_output", move |r, ctx| r.get_output(ctx, &id))
            .await
    }
}
