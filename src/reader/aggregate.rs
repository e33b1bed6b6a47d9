use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::amount::TokenAmount;
use crate::context::QueryContext;
use crate::db::models::AggregateRow;
use crate::db::LedgerStore;
use crate::error::{Error, Result};
use crate::models::{utc, utc_from_unix, AggregateInterval, AggregatesHistogram};
use crate::params::{AggregateParams, AggregateQuery};

use super::Reader;

/// Upper bound on the number of buckets a single histogram may request.
pub const MAX_AGGREGATE_INTERVAL_COUNT: u64 = 20_000;

/// Number of `interval_seconds` wide buckets needed to cover
/// `[start, end)`, never less than one.
pub fn requested_interval_count(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval_seconds: u64,
) -> u64 {
    let span = end.signed_duration_since(start);
    if interval_seconds == 0 || span <= TimeDelta::zero() {
        return 1;
    }
    // A trailing partial second still needs a bucket.
    let seconds = span.num_seconds().unsigned_abs() + u64::from(span.subsec_nanos() > 0);
    seconds.div_ceil(interval_seconds).max(1)
}

/// `start` moved forward by `seconds`, saturating at the latest
/// representable instant.
fn shifted(start: DateTime<Utc>, seconds: Option<i64>) -> DateTime<Utc> {
    seconds
        .and_then(TimeDelta::try_seconds)
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl AggregateInterval {
    fn absorb(&mut self, row: &AggregateRow, volume: &TokenAmount) {
        self.transaction_volume += volume;
        self.transaction_count += row.transaction_count.max(0) as u64;
        self.address_count += row.address_count.max(0) as u64;
        self.asset_count += row.asset_count.max(0) as u64;
        self.output_count += row.output_count.max(0) as u64;
    }
}

impl<S: LedgerStore> Reader<S> {
    /// Builds a time-bucketed activity histogram plus its grand total.
    pub fn aggregate(&self, ctx: &QueryContext, p: &AggregateParams) -> Result<AggregatesHistogram> {
        let start_time = match p.start_time {
            Some(start) => start,
            None => self
                .store
                .first_transaction_time(ctx, &p.chain_ids)?
                .map(utc)
                .unwrap_or_else(|| utc_from_unix(0)),
        };
        let end_time = p.end_time.unwrap_or_else(Utc::now);

        let interval_seconds = p.interval_size.as_secs();
        let requested = requested_interval_count(start_time, end_time, interval_seconds);
        if requested > MAX_AGGREGATE_INTERVAL_COUNT {
            return Err(Error::AggregateIntervalCountTooLarge {
                requested,
                max: MAX_AGGREGATE_INTERVAL_COUNT,
            });
        }

        // Widths past i64 cover any representable range in one bucket.
        let width = i64::try_from(interval_seconds).unwrap_or(i64::MAX);
        let query = AggregateQuery {
            start_time,
            end_time,
            interval_seconds: (interval_seconds > 0).then_some(width),
            bucket_count: requested as usize,
            chain_ids: p.chain_ids.clone(),
            asset_id: p.asset_id,
        };
        let rows = self.store.load_aggregate_buckets(ctx, &query)?;
        debug!(
            "Histogram {} .. {} every {}s: {} non-empty buckets",
            start_time,
            end_time,
            interval_seconds,
            rows.len()
        );

        match query.interval_seconds {
            None => Self::ungrouped(start_time, end_time, &rows),
            Some(width) => Self::grouped(&query, width, interval_seconds, &rows),
        }
    }

    fn ungrouped(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        rows: &[AggregateRow],
    ) -> Result<AggregatesHistogram> {
        let mut total = AggregateInterval::empty(0, start_time, end_time);
        for row in rows {
            let volume: TokenAmount = row.transaction_volume.parse()?;
            total.absorb(row, &volume);
        }
        Ok(AggregatesHistogram {
            interval_size: 0,
            intervals: vec![total.clone()],
            aggregates: total,
        })
    }

    fn grouped(
        query: &AggregateQuery,
        width: i64,
        interval_size: u64,
        rows: &[AggregateRow],
    ) -> Result<AggregatesHistogram> {
        let bounds = |idx: usize| {
            let offset = i64::try_from(idx).ok().and_then(|i| i.checked_mul(width));
            let from = shifted(query.start_time, offset);
            (from, shifted(from, Some(width - 1)))
        };
        let empty = |idx: usize| {
            let (from, to) = bounds(idx);
            AggregateInterval::empty(idx, from, to)
        };

        let mut total = AggregateInterval::empty(0, query.start_time, query.end_time);
        let mut intervals = Vec::with_capacity(query.bucket_count);
        for row in rows {
            let idx = match usize::try_from(row.idx) {
                Ok(idx) if idx >= intervals.len() && idx < query.bucket_count => idx,
                _ => {
                    warn!("Dropping histogram bucket with out-of-range index {}", row.idx);
                    continue;
                }
            };
            let volume: TokenAmount = row.transaction_volume.parse()?;

            while intervals.len() < idx {
                intervals.push(empty(intervals.len()));
            }
            let mut interval = empty(idx);
            interval.absorb(row, &volume);
            total.absorb(row, &volume);
            intervals.push(interval);
        }
        while intervals.len() < query.bucket_count {
            intervals.push(empty(intervals.len()));
        }

        Ok(AggregatesHistogram {
            interval_size,
            intervals,
            aggregates: total,
        })
    }
}
