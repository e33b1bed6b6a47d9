//! Shared builders for unit tests: storage rows with sane defaults that
//! tests override field by field.

use chrono::{DateTime, NaiveDateTime};

use crate::db::models::{
    AddressAssetRow, AddressRow, AggregateRow, AssetRow, OutputRecord, OutputRow, TransactionRow,
};

/// Naive UTC timestamp from unix seconds.
pub fn ts(secs: i64) -> NaiveDateTime {
    DateTime::from_timestamp(secs, 0).unwrap().naive_utc()
}

pub fn tx_row(id: &str, created_at: i64) -> TransactionRow {
    TransactionRow {
        id: id.to_string(),
        chain_id: "chain-x".to_string(),
        tx_type: "base".to_string(),
        memo: Vec::new(),
        created_at: ts(created_at),
    }
}

pub fn asset_row(id: &str, name: &str) -> AssetRow {
    AssetRow {
        id: id.to_string(),
        chain_id: "chain-x".to_string(),
        name: name.to_string(),
        symbol: name.chars().take(4).collect::<String>().to_uppercase(),
        alias: String::new(),
        denomination: 9,
        current_supply: "1000".to_string(),
        created_at: ts(0),
    }
}

pub fn address_row(address: &str) -> AddressRow {
    AddressRow {
        address: address.to_string(),
        public_key: None,
    }
}

pub fn output_row(id: &str, tx: &str, index: i32, asset: &str, amount: &str) -> OutputRow {
    OutputRow {
        id: id.to_string(),
        transaction_id: tx.to_string(),
        output_index: index,
        asset_id: asset.to_string(),
        output_type: 7,
        amount: amount.to_string(),
        locktime: 0,
        threshold: 1,
        created_at: ts(0),
        redeeming_transaction_id: None,
        group_id: 0,
        payload: None,
    }
}

/// An output row marked as redeemed by `redeemer`.
pub fn spent(mut row: OutputRow, redeemer: &str) -> OutputRow {
    row.redeeming_transaction_id = Some(redeemer.to_string());
    row
}

/// One (output, address) record; `signature` marks the address as a signer.
pub fn record(output: &OutputRow, address: &str, signature: Option<&str>) -> OutputRecord {
    OutputRecord {
        output: output.clone(),
        address: Some(address.to_string()),
        signature: signature.map(|s| s.as_bytes().to_vec()),
        public_key: signature.map(|_| vec![0x02; 33]),
    }
}

pub fn address_asset_row(address: &str, asset: &str, received: &str, sent: &str) -> AddressAssetRow {
    let received_n: u128 = received.parse().unwrap_or(0);
    let sent_n: u128 = sent.parse().unwrap_or(0);
    AddressAssetRow {
        address: address.to_string(),
        asset_id: asset.to_string(),
        transaction_count: 1,
        total_received: received.to_string(),
        total_sent: sent.to_string(),
        balance: received_n.saturating_sub(sent_n).to_string(),
        utxo_count: 1,
    }
}

pub fn bucket(idx: i64, volume: &str, transactions: i64) -> AggregateRow {
    AggregateRow {
        idx,
        transaction_volume: volume.to_string(),
        transaction_count: transactions,
        address_count: 1,
        asset_count: 1,
        output_count: transactions * 2,
    }
}
