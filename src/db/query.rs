//! Queries for the PostgreSQL store.
//!
//! Entity lists, counts and the dressing loads are built with diesel's
//! boxed query DSL, so filters from [`crate::params`] compose onto the
//! same typed statement for both the page and its count. The address
//! rollup and the histogram need `FILTER` aggregates and window functions;
//! those two are fixed SQL strings with typed binds.

use diesel::dsl::{count, count_distinct, min, sql, SqlTypeOf};
use diesel::expression::SqlLiteral;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::QueryFragment;
use diesel::query_dsl::methods;
use diesel::query_dsl::LoadQuery;
use diesel::sql_types::{Array, BigInt, Bytea, Double, Nullable, Text, Timestamp};
use diesel::PgTextExpressionMethods;

use crate::params::{
    AddressFilter, AggregateQuery, AssetFilter, OutputFilter, Page, TransactionFilter,
    TransactionSort,
};

use super::models::{AddressAssetRow, AddressRow, AggregateRow, OutputRecord};
use super::schema::{addresses, assets, output_addresses, outputs, transactions};
use super::OutputSide;

diesel::sql_function! {
    /// Postgres `encode(bytea, format)`.
    fn encode(data: Bytea, format: Text) -> Text;
}

pub(crate) type TransactionColumns = (
    transactions::id,
    transactions::chain_id,
    transactions::tx_type,
    transactions::memo,
    transactions::created_at,
);

pub(crate) const TRANSACTION_COLUMNS: TransactionColumns = (
    transactions::id,
    transactions::chain_id,
    transactions::tx_type,
    transactions::memo,
    transactions::created_at,
);

pub(crate) type AssetColumns = (
    assets::id,
    assets::chain_id,
    assets::name,
    assets::symbol,
    assets::alias,
    assets::denomination,
    SqlLiteral<Text>,
    assets::created_at,
);

// Numeric columns are read as text and parsed into big integers.
fn asset_columns() -> AssetColumns {
    (
        assets::id,
        assets::chain_id,
        assets::name,
        assets::symbol,
        assets::alias,
        assets::denomination,
        sql::<Text>("CAST(assets.current_supply AS TEXT)"),
        assets::created_at,
    )
}

pub(crate) type OutputColumns = (
    outputs::id,
    outputs::transaction_id,
    outputs::output_index,
    outputs::asset_id,
    outputs::output_type,
    SqlLiteral<Text>,
    outputs::locktime,
    outputs::threshold,
    outputs::created_at,
    outputs::redeeming_transaction_id,
    outputs::group_id,
    outputs::payload,
);

fn output_columns() -> OutputColumns {
    (
        outputs::id,
        outputs::transaction_id,
        outputs::output_index,
        outputs::asset_id,
        outputs::output_type,
        sql::<Text>("CAST(outputs.amount AS TEXT)"),
        outputs::locktime,
        outputs::threshold,
        outputs::created_at,
        outputs::redeeming_transaction_id,
        outputs::group_id,
        outputs::payload,
    )
}

pub(crate) type TransactionQuery<'a, ST = SqlTypeOf<TransactionColumns>> =
    transactions::BoxedQuery<'a, Pg, ST>;
pub(crate) type AssetQuery<'a, ST = SqlTypeOf<AssetColumns>> = assets::BoxedQuery<'a, Pg, ST>;
pub(crate) type OutputQuery<'a, ST = SqlTypeOf<OutputColumns>> = outputs::BoxedQuery<'a, Pg, ST>;

/// Escapes LIKE wildcards so user text matches literally.
pub fn like_escape(q: &str) -> String {
    let mut out = String::with_capacity(q.len());
    for ch in q.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn prefix_pattern(q: &str) -> String {
    format!("{}%", like_escape(q))
}

fn contains_pattern(q: &str) -> String {
    format!("%{}%", like_escape(q))
}

fn non_empty(q: &Option<String>) -> Option<&str> {
    q.as_deref().filter(|q| !q.is_empty())
}

fn limit(page: Page) -> i64 {
    i64::try_from(page.limit).unwrap_or(i64::MAX)
}

fn offset(page: Page) -> i64 {
    i64::try_from(page.offset).unwrap_or(i64::MAX)
}

pub(crate) fn transactions_page<'a>(
    filter: &TransactionFilter,
    order: Option<TransactionSort>,
    page: Page,
) -> TransactionQuery<'a> {
    let mut query = filter.apply(transactions::table.select(TRANSACTION_COLUMNS).into_boxed());
    if filter.needs_distinct() {
        query = query.distinct();
    }
    if let Some(order) = order {
        query = order.apply(query);
    }
    query.limit(limit(page)).offset(offset(page))
}

pub(crate) fn transactions_count<'a>(filter: &TransactionFilter) -> TransactionQuery<'a, BigInt> {
    let query = if filter.needs_distinct() {
        transactions::table
            .select(count_distinct(transactions::id))
            .into_boxed()
    } else {
        transactions::table.select(count(transactions::id)).into_boxed()
    };
    filter.apply(query)
}

pub(crate) fn first_transaction_time<'a>(
    chain_ids: &'a [String],
) -> TransactionQuery<'a, Nullable<Timestamp>> {
    let mut query = transactions::table
        .select(min(transactions::created_at))
        .into_boxed();
    if !chain_ids.is_empty() {
        query = query.filter(transactions::chain_id.eq_any(chain_ids));
    }
    query
}

pub(crate) fn assets_page<'a>(filter: &AssetFilter, page: Page) -> AssetQuery<'a> {
    filter
        .apply(assets::table.select(asset_columns()).into_boxed())
        .order(assets::created_at.asc())
        .then_order_by(assets::id.asc())
        .limit(limit(page))
        .offset(offset(page))
}

pub(crate) fn assets_count<'a>(filter: &AssetFilter) -> AssetQuery<'a, BigInt> {
    filter.apply(assets::table.select(count(assets::id)).into_boxed())
}

pub(crate) fn addresses_page<'a>(
    filter: &AddressFilter,
    page: Page,
) -> impl LoadQuery<'a, PgConnection, AddressRow> + QueryFragment<Pg> + 'a {
    let query = output_addresses::table
        .left_join(addresses::table.on(addresses::address.eq(output_addresses::address)))
        .select((output_addresses::address, addresses::public_key.nullable()))
        .distinct()
        .into_boxed::<Pg>();
    filter
        .apply(query)
        .order(output_addresses::address.asc())
        .limit(limit(page))
        .offset(offset(page))
}

pub(crate) fn addresses_count<'a>(filter: &AddressFilter) -> output_addresses::BoxedQuery<'a, Pg, BigInt> {
    filter.apply(
        output_addresses::table
            .select(count_distinct(output_addresses::address))
            .into_boxed(),
    )
}

pub(crate) fn outputs_page<'a>(filter: &OutputFilter, page: Page) -> OutputQuery<'a> {
    filter
        .apply(outputs::table.select(output_columns()).into_boxed())
        .order(outputs::created_at.asc())
        .then_order_by(outputs::transaction_id.asc())
        .then_order_by(outputs::output_index.asc())
        .limit(limit(page))
        .offset(offset(page))
}

pub(crate) fn outputs_count<'a>(filter: &OutputFilter) -> OutputQuery<'a, BigInt> {
    filter.apply(outputs::table.select(count(outputs::id)).into_boxed())
}

pub(crate) fn output_addresses_of(output_ids: &[String]) -> output_addresses::BoxedQuery<'_, Pg> {
    output_addresses::table
        .filter(output_addresses::output_id.eq_any(output_ids))
        .into_boxed()
}

/// One row per (output, address) for outputs created or redeemed by the
/// given transactions. Outputs without addresses come back once with NULL
/// address columns.
pub(crate) fn output_records(
    side: OutputSide,
    transaction_ids: &[String],
) -> impl LoadQuery<'_, PgConnection, OutputRecord> + QueryFragment<Pg> + '_ {
    let query = outputs::table
        .left_join(output_addresses::table.on(output_addresses::output_id.eq(outputs::id)))
        .left_join(addresses::table.on(addresses::address.eq(output_addresses::address)))
        .select((
            output_columns(),
            output_addresses::address.nullable(),
            output_addresses::redeeming_signature.nullable(),
            addresses::public_key.nullable(),
        ))
        .into_boxed::<Pg>();
    match side {
        OutputSide::Created => query.filter(outputs::transaction_id.eq_any(transaction_ids)),
        OutputSide::Redeemed => query.filter(
            outputs::redeeming_transaction_id
                .assume_not_null()
                .eq_any(transaction_ids),
        ),
    }
}

pub(crate) const ADDRESS_ASSETS_SQL: &str = "\
SELECT output_addresses.address AS address, outputs.asset_id AS asset_id, \
COUNT(DISTINCT outputs.transaction_id) AS transaction_count, \
CAST(COALESCE(SUM(outputs.amount), 0) AS TEXT) AS total_received, \
CAST(COALESCE(SUM(outputs.amount) FILTER (WHERE COALESCE(outputs.redeeming_transaction_id, '') <> ''), 0) AS TEXT) AS total_sent, \
CAST(COALESCE(SUM(outputs.amount) FILTER (WHERE COALESCE(outputs.redeeming_transaction_id, '') = ''), 0) AS TEXT) AS balance, \
COUNT(*) FILTER (WHERE COALESCE(outputs.redeeming_transaction_id, '') = '') AS utxo_count \
FROM outputs JOIN output_addresses ON output_addresses.output_id = outputs.id \
WHERE output_addresses.address = ANY($1) \
GROUP BY output_addresses.address, outputs.asset_id";

pub(crate) fn address_assets(
    addresses: &[String],
) -> impl LoadQuery<'static, PgConnection, AddressAssetRow> + QueryFragment<Pg> {
    diesel::sql_query(ADDRESS_ASSETS_SQL).bind::<Array<Text>, _>(addresses.to_vec())
}

// Outputs with several addresses appear once per address in `scoped`; only
// the first row of each output contributes volume and output count. A zero
// width puts every row in bucket 0.
pub(crate) const HISTOGRAM_SQL: &str = "\
WITH scoped AS (\
SELECT outputs.transaction_id, outputs.asset_id, outputs.amount, output_addresses.address, \
ROW_NUMBER() OVER (PARTITION BY outputs.id) = 1 AS first_row, \
COALESCE(CAST(FLOOR((EXTRACT(EPOCH FROM outputs.created_at) - $5) / NULLIF($6, 0)) AS BIGINT), 0) AS idx \
FROM outputs LEFT JOIN output_addresses ON output_addresses.output_id = outputs.id \
WHERE outputs.created_at >= $1 AND outputs.created_at < $2 \
AND ($3::text IS NULL OR outputs.asset_id = $3) \
AND (cardinality($4::text[]) = 0 OR outputs.transaction_id IN \
(SELECT transactions.id FROM transactions WHERE transactions.chain_id = ANY($4)))\
) \
SELECT scoped.idx AS idx, \
CAST(COALESCE(SUM(scoped.amount) FILTER (WHERE scoped.first_row), 0) AS TEXT) AS transaction_volume, \
COUNT(DISTINCT scoped.transaction_id) AS transaction_count, \
COUNT(DISTINCT scoped.address) AS address_count, \
COUNT(DISTINCT scoped.asset_id) AS asset_count, \
COUNT(*) FILTER (WHERE scoped.first_row) AS output_count \
FROM scoped GROUP BY scoped.idx ORDER BY scoped.idx ASC LIMIT $7";

pub(crate) fn histogram(
    query: &AggregateQuery,
) -> impl LoadQuery<'static, PgConnection, AggregateRow> + QueryFragment<Pg> {
    let start_epoch = query.start_time.timestamp_micros() as f64 / 1_000_000.0;
    diesel::sql_query(HISTOGRAM_SQL)
        .bind::<Timestamp, _>(query.start_time.naive_utc())
        .bind::<Timestamp, _>(query.end_time.naive_utc())
        .bind::<Nullable<Text>, _>(query.asset_id.as_ref().map(|id| id.to_string()))
        .bind::<Array<Text>, _>(query.chain_ids.clone())
        .bind::<Double, _>(start_epoch)
        .bind::<BigInt, _>(query.interval_seconds.unwrap_or(0))
        .bind::<BigInt, _>(i64::try_from(query.bucket_count).unwrap_or(i64::MAX))
}

impl TransactionFilter {
    pub(crate) fn apply<'a, ST>(
        &self,
        mut query: TransactionQuery<'a, ST>,
    ) -> TransactionQuery<'a, ST> {
        if let Some(id) = &self.id {
            query = query.filter(transactions::id.eq(id.to_string()));
        }
        if !self.chain_ids.is_empty() {
            query = query.filter(transactions::chain_id.eq_any(self.chain_ids.clone()));
        }
        if self.needs_distinct() {
            let created = self.touched_outputs().select(outputs::transaction_id);
            let redeemed = self
                .touched_outputs()
                .select(outputs::redeeming_transaction_id.assume_not_null());
            query = query.filter(
                transactions::id
                    .eq_any(created)
                    .or(transactions::id.eq_any(redeemed)),
            );
        }
        if let Some(start) = &self.start_time {
            query = query.filter(transactions::created_at.ge(start.naive_utc()));
        }
        if let Some(end) = &self.end_time {
            query = query.filter(transactions::created_at.lt(end.naive_utc()));
        }
        if let Some(q) = non_empty(&self.query) {
            query = query.filter(
                transactions::id
                    .like(prefix_pattern(q))
                    .or(encode(transactions::memo, "escape").ilike(contains_pattern(q))),
            );
        }
        query
    }

    /// Outputs matching the asset and address filters; a transaction
    /// qualifies when it created or redeemed one of them.
    fn touched_outputs<'a>(&self) -> outputs::BoxedQuery<'a, Pg> {
        let mut query = outputs::table.into_boxed();
        if let Some(asset_id) = &self.asset_id {
            query = query.filter(outputs::asset_id.eq(asset_id.to_string()));
        }
        if let Some(address) = &self.address {
            query = query.filter(outputs::id.eq_any(outputs_of_address(address.to_string())));
        }
        query
    }
}

fn outputs_of_address(
    address: String,
) -> diesel::dsl::Filter<
    diesel::dsl::Select<output_addresses::table, output_addresses::output_id>,
    diesel::dsl::Eq<output_addresses::address, String>,
> {
    output_addresses::table
        .select(output_addresses::output_id)
        .filter(output_addresses::address.eq(address))
}

impl TransactionSort {
    pub(crate) fn apply<'a, ST>(self, query: TransactionQuery<'a, ST>) -> TransactionQuery<'a, ST> {
        match self {
            TransactionSort::TimestampAsc => query.order(transactions::created_at.asc()),
            TransactionSort::TimestampDesc => query.order(transactions::created_at.desc()),
        }
        .then_order_by(transactions::chain_id.asc())
    }
}

impl AssetFilter {
    pub(crate) fn apply<'a, ST>(&self, mut query: AssetQuery<'a, ST>) -> AssetQuery<'a, ST> {
        if let Some(id) = &self.id {
            query = query.filter(assets::id.eq(id.to_string()));
        }
        if let Some(alias) = &self.alias {
            query = query.filter(assets::alias.eq(alias.clone()));
        }
        if !self.chain_ids.is_empty() {
            query = query.filter(assets::chain_id.eq_any(self.chain_ids.clone()));
        }
        if let Some(q) = non_empty(&self.query) {
            query = query.filter(
                assets::id
                    .like(prefix_pattern(q))
                    .or(assets::name.ilike(contains_pattern(q)))
                    .or(assets::symbol.ilike(contains_pattern(q)))
                    .or(assets::alias.ilike(contains_pattern(q))),
            );
        }
        query
    }
}

impl AddressFilter {
    /// Applies to any query over `output_addresses`, joined or not.
    pub(crate) fn apply<Q>(&self, mut query: Q) -> Q
    where
        Q: methods::FilterDsl<diesel::dsl::Eq<output_addresses::address, String>, Output = Q>
            + methods::FilterDsl<diesel::dsl::Like<output_addresses::address, String>, Output = Q>,
    {
        if let Some(address) = &self.address {
            let exact = output_addresses::address.eq(address.to_string());
            query = methods::FilterDsl::filter(query, exact);
        }
        if let Some(q) = non_empty(&self.query) {
            let prefix = output_addresses::address.like(prefix_pattern(q));
            query = methods::FilterDsl::filter(query, prefix);
        }
        query
    }
}

impl OutputFilter {
    pub(crate) fn apply<'a, ST>(&self, mut query: OutputQuery<'a, ST>) -> OutputQuery<'a, ST> {
        if let Some(id) = &self.id {
            query = query.filter(outputs::id.eq(id.to_string()));
        }
        if let Some(tx_id) = &self.transaction_id {
            query = query.filter(outputs::transaction_id.eq(tx_id.to_string()));
        }
        if let Some(asset_id) = &self.asset_id {
            query = query.filter(outputs::asset_id.eq(asset_id.to_string()));
        }
        if let Some(address) = &self.address {
            query = query.filter(outputs::id.eq_any(outputs_of_address(address.to_string())));
        }
        // NULL and '' both mean unspent.
        let redeemer = outputs::redeeming_transaction_id;
        match self.spent {
            Some(true) => query = query.filter(redeemer.assume_not_null().ne("")),
            Some(false) => {
                query = query.filter(redeemer.is_null().or(redeemer.assume_not_null().eq("")))
            }
            None => {}
        }
        query
    }
}
