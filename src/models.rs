//! API-facing views assembled from storage rows.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::{AssetTokenCounts, TokenAmount};
use crate::db::models::{AddressAssetRow, AddressRow, AssetRow, OutputRow, TransactionRow};
use crate::error::{Error, Result};

pub(crate) fn utc(ts: NaiveDateTime) -> DateTime<Utc> {
    ts.and_utc()
}

pub(crate) fn utc_from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Narrows a signed column into its unsigned API type.
fn column<T: TryFrom<i64>>(column: &'static str, value: impl Into<i64>) -> Result<T> {
    let value = value.into();
    T::try_from(value).map_err(|_| Error::ColumnOutOfRange { column, value })
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(b) => serializer.serialize_some(&hex::encode(b)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMetadata {
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub chain_id: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    #[serde(with = "hex_bytes")]
    pub memo: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub input_totals: AssetTokenCounts,
    pub output_totals: AssetTokenCounts,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            chain_id: row.chain_id,
            tx_type: row.tx_type,
            memo: row.memo,
            created_at: utc(row.created_at),
            inputs: Vec::new(),
            outputs: Vec::new(),
            input_totals: AssetTokenCounts::new(),
            output_totals: AssetTokenCounts::new(),
        }
    }
}

/// Proof that `address` authorised the redemption of an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputCredential {
    pub address: String,
    #[serde(with = "hex_bytes::option")]
    pub public_key: Option<Vec<u8>>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

/// A redeemed output seen from the redeeming transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub output: Output,
    pub creds: Vec<InputCredential>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub id: String,
    pub transaction_id: String,
    pub output_index: u32,
    pub asset_id: String,
    pub output_type: u32,
    pub amount: TokenAmount,
    pub locktime: u64,
    pub threshold: u32,
    pub created_at: DateTime<Utc>,
    pub redeeming_transaction_id: Option<String>,
    pub group_id: u32,
    #[serde(with = "hex_bytes::option")]
    pub payload: Option<Vec<u8>>,
    pub addresses: Vec<String>,
}

impl TryFrom<OutputRow> for Output {
    type Error = crate::error::Error;

    fn try_from(row: OutputRow) -> Result<Self> {
        let amount = row.amount.parse()?;
        let redeeming_transaction_id = row.redeemed_by().map(str::to_string);
        Ok(Self {
            id: row.id,
            transaction_id: row.transaction_id,
            output_index: column("outputs.output_index", row.output_index)?,
            asset_id: row.asset_id,
            output_type: column("outputs.output_type", row.output_type)?,
            amount,
            locktime: column("outputs.locktime", row.locktime)?,
            threshold: column("outputs.threshold", row.threshold)?,
            created_at: utc(row.created_at),
            redeeming_transaction_id,
            group_id: column("outputs.group_id", row.group_id)?,
            payload: row.payload,
            addresses: Vec::new(),
        })
    }
}

/// Activity of one address in one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub transaction_count: u64,
    pub total_received: TokenAmount,
    pub total_sent: TokenAmount,
    pub balance: TokenAmount,
    pub utxo_count: u64,
}

impl TryFrom<&AddressAssetRow> for AssetInfo {
    type Error = crate::error::Error;

    fn try_from(row: &AddressAssetRow) -> Result<Self> {
        Ok(Self {
            transaction_count: column("transaction_count", row.transaction_count)?,
            total_received: row.total_received.parse()?,
            total_sent: row.total_sent.parse()?,
            balance: row.balance.parse()?,
            utxo_count: column("utxo_count", row.utxo_count)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub address: String,
    #[serde(with = "hex_bytes::option")]
    pub public_key: Option<Vec<u8>>,
    pub assets: BTreeMap<String, AssetInfo>,
}

impl From<AddressRow> for AddressInfo {
    fn from(row: AddressRow) -> Self {
        Self {
            address: row.address,
            public_key: row.public_key,
            assets: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub chain_id: String,
    pub name: String,
    pub symbol: String,
    pub alias: String,
    pub denomination: u8,
    pub current_supply: TokenAmount,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AssetRow> for Asset {
    type Error = crate::error::Error;

    fn try_from(row: AssetRow) -> Result<Self> {
        Ok(Self {
            current_supply: row.current_supply.parse()?,
            id: row.id,
            chain_id: row.chain_id,
            name: row.name,
            symbol: row.symbol,
            alias: row.alias,
            denomination: column("assets.denomination", row.denomination)?,
            created_at: utc(row.created_at),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionList {
    #[serde(flatten)]
    pub meta: ListMetadata,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetList {
    #[serde(flatten)]
    pub meta: ListMetadata,
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressList {
    #[serde(flatten)]
    pub meta: ListMetadata,
    pub addresses: Vec<AddressInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputList {
    #[serde(flatten)]
    pub meta: ListMetadata,
    pub outputs: Vec<Output>,
}

/// Activity inside one histogram window, or over the whole range for the
/// histogram total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateInterval {
    pub idx: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub transaction_volume: TokenAmount,
    pub transaction_count: u64,
    pub address_count: u64,
    pub asset_count: u64,
    pub output_count: u64,
}

impl AggregateInterval {
    pub fn empty(idx: usize, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            idx,
            start_time,
            end_time,
            transaction_volume: TokenAmount::zero(),
            transaction_count: 0,
            address_count: 0,
            asset_count: 0,
            output_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatesHistogram {
    /// Interval width in seconds; 0 for a single ungrouped interval.
    pub interval_size: u64,
    pub intervals: Vec<AggregateInterval>,
    pub aggregates: AggregateInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Asset,
    Address,
    Transaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum SearchResult {
    Asset(Asset),
    Address(AddressInfo),
    Transaction(Transaction),
}

impl SearchResult {
    pub fn result_type(&self) -> ResultType {
        match self {
            SearchResult::Asset(_) => ResultType::Asset,
            SearchResult::Address(_) => ResultType::Address,
            SearchResult::Transaction(_) => ResultType::Transaction,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub count: u64,
    pub results: Vec<SearchResult>,
}
