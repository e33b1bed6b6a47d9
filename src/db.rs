use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::PgConnection;
use tracing::{debug, info};

use crate::config::Settings;
use crate::context::QueryContext;
use crate::error::Result;
use crate::params::{
    AddressFilter, AggregateQuery, AssetFilter, OutputFilter, Page, TransactionFilter,
    TransactionSort,
};

#[cfg(test)]
pub mod mock;
pub mod models;
pub mod query;
pub mod schema;

use models::{
    AddressAssetRow, AddressRow, AggregateRow, AssetRow, OutputAddressRow, OutputRecord,
    OutputRow, TransactionRow,
};

/// Type alias for database connection pool
pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Creates a Postgres connection pool
pub fn create_connection_pool(settings: &Settings) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(&settings.database_url);

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .connection_timeout(Duration::from_secs(settings.connection_timeout_secs))
        .test_on_check_out(true)
        .build(manager)?;
    info!(
        "Database connection pool created (max_size={})",
        settings.pool_max_size
    );
    Ok(pool)
}

/// Which side of a transaction an output row is loaded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSide {
    /// Outputs created by the transactions.
    Created,
    /// Outputs redeemed (spent) by the transactions.
    Redeemed,
}

/// The storage round-trips the query engine needs.
///
/// Every method is one read-only round-trip. List methods take the page
/// and the filter; count methods take the filter alone.
pub trait LedgerStore: Send + Sync {
    fn list_transactions(
        &self,
        ctx: &QueryContext,
        filter: &TransactionFilter,
        order: Option<TransactionSort>,
        page: Page,
    ) -> Result<Vec<TransactionRow>>;

    fn count_transactions(&self, ctx: &QueryContext, filter: &TransactionFilter) -> Result<u64>;

    fn list_assets(
        &self,
        ctx: &QueryContext,
        filter: &AssetFilter,
        page: Page,
    ) -> Result<Vec<AssetRow>>;

    fn count_assets(&self, ctx: &QueryContext, filter: &AssetFilter) -> Result<u64>;

    fn list_addresses(
        &self,
        ctx: &QueryContext,
        filter: &AddressFilter,
        page: Page,
    ) -> Result<Vec<AddressRow>>;

    fn count_addresses(&self, ctx: &QueryContext, filter: &AddressFilter) -> Result<u64>;

    fn list_outputs(
        &self,
        ctx: &QueryContext,
        filter: &OutputFilter,
        page: Page,
    ) -> Result<Vec<OutputRow>>;

    fn count_outputs(&self, ctx: &QueryContext, filter: &OutputFilter) -> Result<u64>;

    /// Address rows for the given outputs.
    fn load_output_addresses(
        &self,
        ctx: &QueryContext,
        output_ids: &[String],
    ) -> Result<Vec<OutputAddressRow>>;

    /// (output, address) records for outputs created or redeemed by the
    /// given transactions.
    fn load_output_records(
        &self,
        ctx: &QueryContext,
        side: OutputSide,
        transaction_ids: &[String],
    ) -> Result<Vec<OutputRecord>>;

    /// Per (address, asset) aggregates for the given addresses.
    fn load_address_assets(
        &self,
        ctx: &QueryContext,
        addresses: &[String],
    ) -> Result<Vec<AddressAssetRow>>;

    /// Creation time of the earliest transaction on the given chains, or on
    /// all chains when `chain_ids` is empty.
    fn first_transaction_time(
        &self,
        ctx: &QueryContext,
        chain_ids: &[String],
    ) -> Result<Option<NaiveDateTime>>;

    /// Histogram buckets ordered by index, or a single ungrouped row when
    /// no interval is set.
    fn load_aggregate_buckets(
        &self,
        ctx: &QueryContext,
        query: &AggregateQuery,
    ) -> Result<Vec<AggregateRow>>;
}

type PgConn = PooledConnection<ConnectionManager<PgConnection>>;

/// [`LedgerStore`] backed by PostgreSQL through an r2d2 pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
    statement_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: DbPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    /// Checks out a connection and bounds its next statement by the
    /// context's remaining time.
    ///
    /// Cancellation is observed here, between round-trips. A statement
    /// already running is not interrupted; it ends on its own or at the
    /// statement timeout set below.
    fn checkout(&self, ctx: &QueryContext) -> Result<PgConn> {
        ctx.check()?;
        let mut conn = self.pool.get()?;

        let timeout = ctx
            .remaining()
            .map_or(self.statement_timeout, |r| r.min(self.statement_timeout));
        let millis = timeout.as_millis().max(1);
        diesel::sql_query(format!("SET statement_timeout = {millis}"))
            .execute(&mut *conn)
            .map_err(|e| ctx.storage_error(e))?;
        Ok(conn)
    }

    /// Runs one round-trip on a checked-out connection.
    fn run<T>(
        &self,
        ctx: &QueryContext,
        session: &'static str,
        work: impl FnOnce(&mut PgConnection) -> QueryResult<T>,
    ) -> Result<T> {
        let mut conn = self.checkout(ctx)?;
        let started = Instant::now();
        let result = work(&mut *conn).map_err(|e| ctx.storage_error(e))?;
        debug!("{} finished in {:?}", session, started.elapsed());
        Ok(result)
    }

    fn count(
        &self,
        ctx: &QueryContext,
        session: &'static str,
        work: impl FnOnce(&mut PgConnection) -> QueryResult<i64>,
    ) -> Result<u64> {
        let count = self.run(ctx, session, work)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

impl LedgerStore for PgStore {
    fn list_transactions(
        &self,
        ctx: &QueryContext,
        filter: &TransactionFilter,
        order: Option<TransactionSort>,
        page: Page,
    ) -> Result<Vec<TransactionRow>> {
        let query = query::transactions_page(filter, order, page);
        self.run(ctx, "list_transactions", |conn| query.load(conn))
    }

    fn count_transactions(&self, ctx: &QueryContext, filter: &TransactionFilter) -> Result<u64> {
        let query = query::transactions_count(filter);
        self.count(ctx, "count_transactions", |conn| query.get_result(conn))
    }

    fn list_assets(
        &self,
        ctx: &QueryContext,
        filter: &AssetFilter,
        page: Page,
    ) -> Result<Vec<AssetRow>> {
        let query = query::assets_page(filter, page);
        self.run(ctx, "list_assets", |conn| query.load(conn))
    }

    fn count_assets(&self, ctx: &QueryContext, filter: &AssetFilter) -> Result<u64> {
        let query = query::assets_count(filter);
        self.count(ctx, "count_assets", |conn| query.get_result(conn))
    }

    fn list_addresses(
        &self,
        ctx: &QueryContext,
        filter: &AddressFilter,
        page: Page,
    ) -> Result<Vec<AddressRow>> {
        let query = query::addresses_page(filter, page);
        self.run(ctx, "list_addresses", |conn| query.load(conn))
    }

    fn count_addresses(&self, ctx: &QueryContext, filter: &AddressFilter) -> Result<u64> {
        let query = query::addresses_count(filter);
        self.count(ctx, "count_addresses", |conn| query.get_result(conn))
    }

    fn list_outputs(
        &self,
        ctx: &QueryContext,
        filter: &OutputFilter,
        page: Page,
    ) -> Result<Vec<OutputRow>> {
        let query = query::outputs_page(filter, page);
        self.run(ctx, "list_outputs", |conn| query.load(conn))
    }

    fn count_outputs(&self, ctx: &QueryContext, filter: &OutputFilter) -> Result<u64> {
        let query = query::outputs_count(filter);
        self.count(ctx, "count_outputs", |conn| query.get_result(conn))
    }

    fn load_output_addresses(
        &self,
        ctx: &QueryContext,
        output_ids: &[String],
    ) -> Result<Vec<OutputAddressRow>> {
        let query = query::output_addresses_of(output_ids);
        self.run(ctx, "load_output_addresses", |conn| query.load(conn))
    }

    fn load_output_records(
        &self,
        ctx: &QueryContext,
        side: OutputSide,
        transaction_ids: &[String],
    ) -> Result<Vec<OutputRecord>> {
        let session = match side {
            OutputSide::Created => "load_created_outputs",
            OutputSide::Redeemed => "load_redeemed_outputs",
        };
        let query = query::output_records(side, transaction_ids);
        self.run(ctx, session, |conn| query.load(conn))
    }

    fn load_address_assets(
        &self,
        ctx: &QueryContext,
        addresses: &[String],
    ) -> Result<Vec<AddressAssetRow>> {
        let query = query::address_assets(addresses);
        self.run(ctx, "load_address_assets", |conn| query.load(conn))
    }

    fn first_transaction_time(
        &self,
        ctx: &QueryContext,
        chain_ids: &[String],
    ) -> Result<Option<NaiveDateTime>> {
        let query = query::first_transaction_time(chain_ids);
        self.run(ctx, "get_first_transaction_time", |conn| query.get_result(conn))
    }

    fn load_aggregate_buckets(
        &self,
        ctx: &QueryContext,
        query: &AggregateQuery,
    ) -> Result<Vec<AggregateRow>> {
        let histogram = query::histogram(query);
        let rows: Vec<AggregateRow> = self.run(ctx, "get_transaction_aggregates_histogram", |conn| {
            histogram.load(conn)
        })?;
        debug!("Histogram returned {} buckets", rows.len());
        Ok(rows)
    }
}
