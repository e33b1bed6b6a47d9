//! End-to-end checks of the PostgreSQL store against a throwaway container.
//!
//! Needs a local Docker daemon: `cargo test -- --ignored`.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use diesel::connection::SimpleConnection;
use testcontainers::{clients, images::postgres::Postgres};

use ledger_query::config::Settings;
use ledger_query::db::{create_connection_pool, PgStore};
use ledger_query::params::{AggregateParams, ListTransactionsParams, SearchParams, TransactionSort};
use ledger_query::{Id, QueryContext, Reader, ShortId, TokenAmount};

const SCHEMA: &str = include_str!("../sql/schema.sql");

struct Fixture {
    t1: Id,
    t2: Id,
    alice: ShortId,
    bob: ShortId,
    asset: Id,
}

fn fixture() -> Fixture {
    Fixture {
        t1: Id::from_bytes([1; 32]),
        t2: Id::from_bytes([2; 32]),
        alice: ShortId::from_bytes([0xa1; 20]),
        bob: ShortId::from_bytes([0xb0; 20]),
        asset: Id::from_bytes([0xaa; 32]),
    }
}

fn seed_sql(f: &Fixture) -> String {
    let carol = ShortId::from_bytes([0xc0; 20]);
    let (o1, o2, o3) = (
        Id::from_bytes([11; 32]),
        Id::from_bytes([12; 32]),
        Id::from_bytes([13; 32]),
    );
    format!(
        "INSERT INTO assets VALUES ('{asset}', 'chain-x', 'Gold', 'GOLD', 'GLD', 9, 1000000, '2023-12-31 00:00:00');
         INSERT INTO transactions VALUES
            ('{t1}', 'chain-x', 'base', ''::bytea, '2024-01-01 00:00:00'),
            ('{t2}', 'chain-x', 'base', 'rent'::bytea, '2024-01-01 01:00:00');
         INSERT INTO outputs (id, transaction_id, output_index, asset_id, output_type, amount, created_at, redeeming_transaction_id) VALUES
            ('{o1}', '{t1}', 0, '{asset}', 7, 5, '2024-01-01 00:00:00', '{t2}'),
            ('{o2}', '{t1}', 1, '{asset}', 7, 7, '2024-01-01 00:00:00', ''),
            ('{o3}', '{t2}', 0, '{asset}', 7, 5, '2024-01-01 01:00:00', NULL);
         INSERT INTO output_addresses VALUES
            ('{o1}', '{alice}', '\\x5151', '2024-01-01 00:00:00'),
            ('{o1}', '{bob}', NULL, '2024-01-01 00:00:00'),
            ('{o2}', '{alice}', NULL, '2024-01-01 00:00:00'),
            ('{o3}', '{carol}', NULL, '2024-01-01 01:00:00');
         INSERT INTO addresses VALUES ('{alice}', '\\x02aa');",
        asset = f.asset,
        t1 = f.t1,
        t2 = f.t2,
        alice = f.alice,
        bob = f.bob,
    )
}

#[test]
#[ignore = "requires docker"]
fn reads_dressed_ledger_from_postgres() {
    let docker = clients::Cli::default();
    let node = docker.run(Postgres::default());
    let settings = Settings {
        database_url: format!(
            "postgres://postgres@127.0.0.1:{}/postgres",
            node.get_host_port_ipv4(5432)
        ),
        pool_max_size: 4,
        connection_timeout_secs: 10,
        statement_timeout_ms: 5_000,
        request_timeout_ms: 10_000,
    };
    let pool = create_connection_pool(&settings).unwrap();
    let f = fixture();
    {
        let mut conn = pool.get().unwrap();
        conn.batch_execute(SCHEMA).unwrap();
        conn.batch_execute(&seed_sql(&f)).unwrap();
    }

    let reader = Reader::new(PgStore::new(pool, settings.statement_timeout()));
    let ctx = QueryContext::with_timeout(Duration::from_secs(30));
    let asset = f.asset.to_string();

    // Transactions and their two sides.
    let t1 = reader.get_transaction(&ctx, &f.t1).unwrap().unwrap();
    assert_eq!(t1.outputs.len(), 2);
    assert_eq!(t1.output_totals[&asset], TokenAmount::from(12));
    assert!(t1.input_totals.is_empty());
    assert_eq!(
        t1.outputs[0].addresses,
        {
            let mut both = vec![f.alice.to_string(), f.bob.to_string()];
            both.sort();
            both
        }
    );
    assert_eq!(t1.outputs[1].redeeming_transaction_id, None);

    let t2 = reader.get_transaction(&ctx, &f.t2).unwrap().unwrap();
    assert_eq!(t2.input_totals[&asset], TokenAmount::from(5));
    assert_eq!(t2.inputs.len(), 1);
    assert_eq!(t2.inputs[0].creds.len(), 1);
    assert_eq!(t2.inputs[0].creds[0].address, f.alice.to_string());
    assert_eq!(t2.inputs[0].creds[0].public_key, Some(vec![0x02, 0xaa]));

    let newest_first = reader
        .list_transactions(
            &ctx,
            &ListTransactionsParams {
                sort: TransactionSort::TimestampDesc,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(newest_first.meta.count, 2);
    assert_eq!(newest_first.transactions[0].id, f.t2.to_string());

    // Address activity.
    let alice = reader.get_address(&ctx, &f.alice).unwrap().unwrap();
    let gold = &alice.assets[&asset];
    assert_eq!(gold.total_received, TokenAmount::from(12));
    assert_eq!(gold.total_sent, TokenAmount::from(5));
    assert_eq!(gold.balance, TokenAmount::from(7));
    assert_eq!(gold.utxo_count, 1);
    assert_eq!(gold.transaction_count, 1);

    // Hourly histogram.
    let histogram = reader
        .aggregate(
            &ctx,
            &AggregateParams {
                start_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                end_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap()),
                interval_size: Duration::from_secs(3600),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(histogram.intervals.len(), 2);
    assert_eq!(histogram.intervals[0].transaction_volume, TokenAmount::from(12));
    assert_eq!(histogram.intervals[0].output_count, 2);
    assert_eq!(histogram.intervals[0].address_count, 2);
    assert_eq!(histogram.intervals[1].transaction_volume, TokenAmount::from(5));
    assert_eq!(histogram.aggregates.transaction_volume, TokenAmount::from(17));
    assert_eq!(histogram.aggregates.transaction_count, 2);

    // Search by id, by name and by memo.
    let by_id = reader.search(&ctx, &SearchParams::new(f.t2.to_string())).unwrap();
    assert_eq!(by_id.count, 1);
    let by_name = reader.search(&ctx, &SearchParams::new("gol")).unwrap();
    assert_eq!(by_name.count, 1);
    let by_memo = reader.search(&ctx, &SearchParams::new("RENT")).unwrap();
    assert_eq!(by_memo.count, 1);

    let by_alias = reader.get_asset(&ctx, "GLD").unwrap().unwrap();
    assert_eq!(by_alias.current_supply, TokenAmount::from(1_000_000));
}
