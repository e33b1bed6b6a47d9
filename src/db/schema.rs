// Mirrors sql/schema.sql. The indexer owns these tables; this crate only reads them.

diesel::table! {
    addresses (address) {
        #[max_length = 50]
        address -> Varchar,
        public_key -> Nullable<Bytea>,
    }
}

diesel::table! {
    assets (id) {
        #[max_length = 50]
        id -> Varchar,
        #[max_length = 50]
        chain_id -> Varchar,
        #[max_length = 255]
        name -> Varchar,
        #[max_length = 16]
        symbol -> Varchar,
        #[max_length = 64]
        alias -> Varchar,
        denomination -> Int2,
        current_supply -> Numeric,
        created_at -> Timestamp,
    }
}

diesel::table! {
    output_addresses (output_id, address) {
        #[max_length = 50]
        output_id -> Varchar,
        #[max_length = 50]
        address -> Varchar,
        redeeming_signature -> Nullable<Bytea>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    outputs (id) {
        #[max_length = 50]
        id -> Varchar,
        #[max_length = 50]
        transaction_id -> Varchar,
        output_index -> Int4,
        #[max_length = 50]
        asset_id -> Varchar,
        output_type -> Int4,
        amount -> Numeric,
        locktime -> Int8,
        threshold -> Int4,
        created_at -> Timestamp,
        #[max_length = 50]
        redeeming_transaction_id -> Nullable<Varchar>,
        group_id -> Int4,
        payload -> Nullable<Bytea>,
    }
}

diesel::table! {
    transactions (id) {
        #[max_length = 50]
        id -> Varchar,
        #[max_length = 50]
        chain_id -> Varchar,
        #[sql_name = "type"]
        #[max_length = 16]
        tx_type -> Varchar,
        memo -> Bytea,
        created_at -> Timestamp,
    }
}

diesel::joinable!(output_addresses -> outputs (output_id));

diesel::allow_tables_to_appear_in_same_query!(
    addresses,
    assets,
    output_addresses,
    outputs,
    transactions,
);
