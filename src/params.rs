//! Query parameters.
//!
//! Each query kind has its own immutable parameter value: an entity filter,
//! pagination and a counting policy (plus a sort for transactions). The
//! store receives the page and the filter separately, so a list round-trip
//! and its count round-trip are built from two distinct values.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::ids::{Id, ShortId};

pub const PAGINATION_DEFAULT_LIMIT: usize = 500;
pub const PAGINATION_MAX_LIMIT: usize = 500;

/// When a list call issues a second query to count all matching rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CountPolicy {
    /// Count only when the page came back full.
    #[default]
    WhenSaturated,
    /// Always count.
    Always,
    /// Never count; only list membership matters.
    Disabled,
}

/// Limit and offset of one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    pub limit: usize,
    pub offset: usize,
    pub count: CountPolicy,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: PAGINATION_DEFAULT_LIMIT,
            offset: 0,
            count: CountPolicy::WhenSaturated,
        }
    }
}

impl ListParams {
    /// Builds list params, clamping the limit to `1..=PAGINATION_MAX_LIMIT`.
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: limit.clamp(1, PAGINATION_MAX_LIMIT),
            offset,
            count: CountPolicy::WhenSaturated,
        }
    }

    /// Single-row lookup used by the `get_*` accessors.
    pub fn single() -> Self {
        Self::new(1, 0).without_counting()
    }

    pub fn without_counting(mut self) -> Self {
        self.count = CountPolicy::Disabled;
        self
    }

    pub fn with_count_policy(mut self, count: CountPolicy) -> Self {
        self.count = count;
        self
    }

    pub fn page(&self) -> Page {
        Page {
            limit: self.limit,
            offset: self.offset,
        }
    }

    pub(crate) fn should_count(&self, returned: usize) -> bool {
        match self.count {
            CountPolicy::Always => true,
            CountPolicy::WhenSaturated => returned >= self.limit,
            CountPolicy::Disabled => false,
        }
    }

    /// Count reported when no count query runs. Only exact when the page
    /// was not saturated.
    pub(crate) fn approximate_count(&self, returned: usize) -> u64 {
        (self.offset + returned) as u64
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionSort {
    #[default]
    TimestampAsc,
    TimestampDesc,
}

impl TransactionSort {
    /// Parses a sort name from a request. Unknown names fall back to the
    /// default order.
    pub fn from_param(s: &str) -> Self {
        match s {
            "timestamp-asc" => TransactionSort::TimestampAsc,
            "timestamp-desc" => TransactionSort::TimestampDesc,
            _ => TransactionSort::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub id: Option<Id>,
    pub chain_ids: Vec<String>,
    pub asset_id: Option<Id>,
    pub address: Option<ShortId>,
    pub query: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    /// Asset and address filters match through outputs. Such queries
    /// select and count distinct ids so the page and its count agree.
    pub fn needs_distinct(&self) -> bool {
        self.asset_id.is_some() || self.address.is_some()
    }

    pub fn has_query(&self) -> bool {
        self.query.as_deref().is_some_and(|q| !q.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTransactionsParams {
    pub list: ListParams,
    pub filter: TransactionFilter,
    pub sort: TransactionSort,
}

impl ListTransactionsParams {
    /// Explicit order for the list query. A free-text query leaves the
    /// ordering to the filter.
    pub fn order(&self) -> Option<TransactionSort> {
        if self.filter.has_query() {
            None
        } else {
            Some(self.sort)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetFilter {
    pub id: Option<Id>,
    pub alias: Option<String>,
    pub chain_ids: Vec<String>,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListAssetsParams {
    pub list: ListParams,
    pub filter: AssetFilter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressFilter {
    pub address: Option<ShortId>,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListAddressesParams {
    pub list: ListParams,
    pub filter: AddressFilter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputFilter {
    pub id: Option<Id>,
    pub transaction_id: Option<Id>,
    pub asset_id: Option<Id>,
    pub address: Option<ShortId>,
    pub spent: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOutputsParams {
    pub list: ListParams,
    pub filter: OutputFilter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub query: String,
    pub list: ListParams,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            list: ListParams::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateParams {
    /// Defaults to the creation time of the first transaction.
    pub start_time: Option<DateTime<Utc>>,
    /// Defaults to now.
    pub end_time: Option<DateTime<Utc>>,
    /// Zero requests a single bucket covering the whole range.
    pub interval_size: Duration,
    pub chain_ids: Vec<String>,
    pub asset_id: Option<Id>,
}

/// A resolved, validated histogram request as handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateQuery {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// `None` asks for one ungrouped row.
    pub interval_seconds: Option<i64>,
    pub bucket_count: usize,
    pub chain_ids: Vec<String>,
    pub asset_id: Option<Id>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(ListParams::new(0, 0).limit, 1);
        assert_eq!(ListParams::new(10_000, 0).limit, PAGINATION_MAX_LIMIT);
    }

    #[test]
    fn counting_follows_policy() {
        let list = ListParams::new(10, 20);
        assert!(list.should_count(10));
        assert!(!list.should_count(9));
        assert_eq!(list.approximate_count(9), 29);

        assert!(list.with_count_policy(CountPolicy::Always).should_count(0));
        assert!(!list.without_counting().should_count(10));
    }

    #[test]
    fn unknown_sort_falls_back_to_default() {
        assert_eq!(TransactionSort::from_param("timestamp-desc"), TransactionSort::TimestampDesc);
        assert_eq!(TransactionSort::from_param("by-size"), TransactionSort::TimestampAsc);
    }

    #[test]
    fn query_suppresses_explicit_sort() {
        let mut params = ListTransactionsParams {
            sort: TransactionSort::TimestampDesc,
            ..Default::default()
        };
        assert_eq!(params.order(), Some(TransactionSort::TimestampDesc));

        params.filter.query = Some("memo".into());
        assert_eq!(params.order(), None);
    }
}
