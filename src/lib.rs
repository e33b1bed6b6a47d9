//! Read-side query engine over a relational projection of a UTXO ledger.
//!
//! [`reader::Reader`] serves paginated entity lists, dresses transactions
//! with their inputs, outputs and per-asset totals, builds activity
//! histograms and resolves free-form search. [`service::QueryService`]
//! runs those calls on a blocking pool under a per-request deadline.

pub mod amount;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod ids;
pub mod models;
pub mod params;
pub mod reader;
pub mod service;

#[cfg(test)]
mod test_util;

pub use amount::{AssetTokenCounts, TokenAmount};
pub use context::QueryContext;
pub use db::{LedgerStore, PgStore};
pub use error::{Error, Result};
pub use ids::{Id, ShortId};
pub use reader::Reader;
pub use service::QueryService;
