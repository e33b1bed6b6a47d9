use r2d2::Error as PoolError;

/// Errors returned by the query engine.
///
/// Validation errors are raised before any storage access. Storage errors
/// are passed through untouched; nothing at this layer retries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("requesting too many intervals: {requested} exceeds the maximum of {max}")]
    AggregateIntervalCountTooLarge { requested: u64, max: u64 },

    #[error("search query too short")]
    SearchQueryTooShort,

    #[error("failed to parse {0:?} as an integer amount")]
    InvalidAmount(String),

    #[error("column {column} holds {value}, which is out of range")]
    ColumnOutOfRange { column: &'static str, value: i64 },

    #[error("query cancelled")]
    Cancelled,

    #[error("query deadline exceeded")]
    DeadlineExceeded,

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("query worker failed: {0}")]
    Worker(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
