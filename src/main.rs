use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ledger_query::config::Settings;
use ledger_query::db::{self, PgStore};
use ledger_query::params::{
    AggregateParams, ListAddressesParams, ListAssetsParams, ListOutputsParams, ListParams,
    ListTransactionsParams, SearchParams, TransactionSort,
};
use ledger_query::{Id, QueryService, Reader, ShortId};

const USAGE: &str = "usage: ledger-query <command> [args]

  search <query>
  aggregate [interval-secs] [start-unix] [end-unix]
  transactions [limit] [offset] [timestamp-asc|timestamp-desc]
  assets [limit] [offset]
  addresses [limit] [offset]
  outputs [limit] [offset]
  tx <id> | asset <id-or-alias> | address <address> | output <id>";

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn arg<'a>(args: &'a [String], i: usize, what: &str) -> Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .with_context(|| format!("missing {what}\n\n{USAGE}"))
}

fn list_params(args: &[String]) -> Result<ListParams> {
    let limit = match args.get(1) {
        Some(s) => s.parse().context("limit must be an integer")?,
        None => ledger_query::params::PAGINATION_DEFAULT_LIMIT,
    };
    let offset = match args.get(2) {
        Some(s) => s.parse().context("offset must be an integer")?,
        None => 0,
    };
    Ok(ListParams::new(limit, offset))
}

fn unix_arg(args: &[String], i: usize) -> Result<Option<DateTime<chrono::Utc>>> {
    args.get(i)
        .map(|s| {
            let secs: i64 = s.parse().context("timestamps are unix seconds")?;
            DateTime::from_timestamp(secs, 0).context("timestamp out of range")
        })
        .transpose()
}

async fn dispatch(svc: &QueryService<PgStore>, args: &[String]) -> Result<()> {
    let command = arg(args, 0, "command")?;
    info!("Running {}", command);

    match command {
        "search" => print_json(&svc.search(SearchParams::new(arg(args, 1, "query")?)).await?),
        "aggregate" => {
            let interval = match args.get(1) {
                Some(s) => s.parse().context("interval must be whole seconds")?,
                None => 0,
            };
            let params = AggregateParams {
                interval_size: Duration::from_secs(interval),
                start_time: unix_arg(args, 2)?,
                end_time: unix_arg(args, 3)?,
                ..Default::default()
            };
            print_json(&svc.aggregate(params).await?)
        }
        "transactions" => {
            let params = ListTransactionsParams {
                list: list_params(args)?,
                sort: args
                    .get(3)
                    .map_or_else(TransactionSort::default, |s| TransactionSort::from_param(s)),
                ..Default::default()
            };
            print_json(&svc.list_transactions(params).await?)
        }
        "assets" => {
            let params = ListAssetsParams {
                list: list_params(args)?,
                ..Default::default()
            };
            print_json(&svc.list_assets(params).await?)
        }
        "addresses" => {
            let params = ListAddressesParams {
                list: list_params(args)?,
                ..Default::default()
            };
            print_json(&svc.list_addresses(params).await?)
        }
        "outputs" => {
            let params = ListOutputsParams {
                list: list_params(args)?,
                ..Default::default()
            };
            print_json(&svc.list_outputs(params).await?)
        }
        "tx" => {
            let id: Id = arg(args, 1, "transaction id")?.parse()?;
            print_json(&svc.get_transaction(id).await?)
        }
        "asset" => print_json(&svc.get_asset(arg(args, 1, "asset id or alias")?.to_string()).await?),
        "address" => {
            let address: ShortId = arg(args, 1, "address")?.parse()?;
            print_json(&svc.get_address(address).await?)
        }
        "output" => {
            let id: Id = arg(args, 1, "output id")?.parse()?;
            print_json(&svc.get_output(id).await?)
        }
        other => bail!("unknown command {other:?}\n\n{USAGE}"),
    }
}

fn run() -> Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    info!(
        "Settings loaded (pool_max_size={}, statement_timeout={:?}, request_timeout={:?})",
        settings.pool_max_size,
        settings.statement_timeout(),
        settings.request_timeout()
    );

    let pool = db::create_connection_pool(&settings)
        .context("Failed to create database connection pool")?;
    let store = PgStore::new(pool, settings.statement_timeout());
    let service = QueryService::new(Reader::new(store), settings.request_timeout());

    let args: Vec<String> = env::args().skip(1).collect();

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(dispatch(&service, &args))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}
