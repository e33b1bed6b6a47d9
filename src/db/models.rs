use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};

// Row for the 'transactions' table
#[derive(Queryable, Debug, Clone, PartialEq)]
pub struct TransactionRow {
    pub id: String,
    pub chain_id: String,
    pub tx_type: String,
    pub memo: Vec<u8>,
    pub created_at: NaiveDateTime,
}

// Row for the 'assets' table; current_supply is selected as text
#[derive(Queryable, Debug, Clone, PartialEq)]
pub struct AssetRow {
    pub id: String,
    pub chain_id: String,
    pub name: String,
    pub symbol: String,
    pub alias: String,
    pub denomination: i16,
    pub current_supply: String,
    pub created_at: NaiveDateTime,
}

// Distinct address from 'output_addresses' with its public key, if known
#[derive(Queryable, Debug, Clone, PartialEq)]
pub struct AddressRow {
    pub address: String,
    pub public_key: Option<Vec<u8>>,
}

// Row for the 'outputs' table; amount is selected as text
#[derive(Queryable, Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub id: String,
    pub transaction_id: String,
    pub output_index: i32,
    pub asset_id: String,
    pub output_type: i32,
    pub amount: String,
    pub locktime: i64,
    pub threshold: i32,
    pub created_at: NaiveDateTime,
    pub redeeming_transaction_id: Option<String>,
    pub group_id: i32,
    pub payload: Option<Vec<u8>>,
}

impl OutputRow {
    /// The redeeming transaction, treating NULL and '' alike as unspent.
    pub fn redeemed_by(&self) -> Option<&str> {
        self.redeeming_transaction_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

// Row for the 'output_addresses' table
#[derive(Queryable, Debug, Clone, PartialEq)]
pub struct OutputAddressRow {
    pub output_id: String,
    pub address: String,
    pub redeeming_signature: Option<Vec<u8>>,
    pub created_at: NaiveDateTime,
}

/// One (output, address) pair loaded for transaction dressing.
///
/// Outputs with several addresses come back as several records. The
/// address columns are NULL for an output without addresses.
#[derive(Queryable, Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub output: OutputRow,
    pub address: Option<String>,
    pub signature: Option<Vec<u8>>,
    pub public_key: Option<Vec<u8>>,
}

// Per (address, asset) aggregate used to dress addresses
#[derive(QueryableByName, Debug, Clone, PartialEq)]
pub struct AddressAssetRow {
    #[diesel(sql_type = Text)]
    pub address: String,
    #[diesel(sql_type = Text)]
    pub asset_id: String,
    #[diesel(sql_type = BigInt)]
    pub transaction_count: i64,
    #[diesel(sql_type = Text)]
    pub total_received: String,
    #[diesel(sql_type = Text)]
    pub total_sent: String,
    #[diesel(sql_type = Text)]
    pub balance: String,
    #[diesel(sql_type = BigInt)]
    pub utxo_count: i64,
}

// One histogram bucket; idx is 0 for an ungrouped total
#[derive(QueryableByName, Debug, Clone, PartialEq)]
pub struct AggregateRow {
    #[diesel(sql_type = BigInt)]
    pub idx: i64,
    #[diesel(sql_type = Text)]
    pub transaction_volume: String,
    #[diesel(sql_type = BigInt)]
    pub transaction_count: i64,
    #[diesel(sql_type = BigInt)]
    pub address_count: i64,
    #[diesel(sql_type = BigInt)]
    pub asset_count: i64,
    #[diesel(sql_type = BigInt)]
    pub output_count: i64,
}
