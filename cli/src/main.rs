//! dynabatch CLI — run chunked batch reads and writes from the terminal.
//!
//! Usage:
//! ```bash
//! # Write a JSON array of objects to a local DynamoDB endpoint
//! ENVIRONMENT=local-db dynabatch write --file users.json
//!
//! # Read records back by key (JSON array of key objects)
//! ENVIRONMENT=local-db dynabatch read --file keys.json
//!
//! # In-memory demonstration of fan-out and partial failure
//! dynabatch demo --count 130 --fail-chunk 2
//! ```

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dynabatch_core::{
    key, marshal, BatchClient, BatchConfig, Item, Operation, OutcomeOrder, StoreClient, StoreError,
};
use dynabatch_http::HttpStore;
use dynabatch_memory::InMemoryStore;

/// Table used when `TABLE_NAME` is unset.
const DEFAULT_TABLE: &str = "ServerlessAWSCDKLocal";

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    init_tracing(has_flag(&args, "--json-logs"));

    let result = match args[1].as_str() {
        "write" => cmd_write(&args[2..]).await,
        "read" => cmd_read(&args[2..]).await,
        "demo" => cmd_demo(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("dynabatch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("dynabatch {}", env!("CARGO_PKG_VERSION"));
    println!("Chunked concurrent batch reads and writes\n");
    println!("USAGE:");
    println!("    dynabatch <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    write      Write a JSON array of objects (25 per store call)");
    println!("    read       Read records for a JSON array of keys (100 per store call)");
    println!("    demo       Run a batch against the in-memory store");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FLAGS:");
    println!("    --file <PATH>            Input JSON file            [write, read]");
    println!("    --table <NAME>           Table (default: $TABLE_NAME or {DEFAULT_TABLE})");
    println!("    --max-concurrency <N>    Cap simultaneous chunk calls");
    println!("    --chunk-timeout-ms <MS>  Fail chunks that run longer than MS");
    println!("    --ordered                Merge results in chunk order");
    println!("    --count <N>              Items to generate           [demo]");
    println!("    --fail-chunk <I>         Make write chunk I fail     [demo]");
    println!("    --json-logs              Emit JSON structured logs\n");
    println!("ENVIRONMENT:");
    println!("    DYNABATCH_ENDPOINT, ENVIRONMENT=local-db, AWS_REGION, AWS_ACCESS_KEY_ID, TABLE_NAME");
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn cmd_write(args: &[String]) -> Result<()> {
    let values = read_json_array(args)?;
    let client = http_client(args)?;

    let outcome = client.write_serialized(values).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "table": client.table(),
            "chunks": outcome.chunks,
            "written": outcome.written,
            "errors": outcome.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
        }))?
    );
    outcome.into_result()?;
    Ok(())
}

async fn cmd_read(args: &[String]) -> Result<()> {
    let keys = read_json_array(args)?
        .iter()
        .map(marshal::to_item)
        .collect::<Result<Vec<Item>, _>>()
        .context("keys must be JSON objects")?;
    let client = http_client(args)?;

    let outcome = client.read_many(keys).await?;
    let records: Vec<Value> = outcome.decode().context("failed to decode records")?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    for err in &outcome.errors {
        eprintln!("  chunk failed: {err}");
    }
    outcome.into_result()?;
    Ok(())
}

async fn cmd_demo(args: &[String]) -> Result<()> {
    let count: usize = parse_number(args, "--count")?.unwrap_or(130);
    let fail_chunk: Option<usize> = parse_number(args, "--fail-chunk")?;

    let store = Arc::new(InMemoryStore::new().with_latency(Duration::from_millis(20)));
    if let Some(target) = fail_chunk {
        let first = format!("USER#{:06}", target * Operation::Write.limit());
        store.set_fault(move |op, items| {
            let starts_chunk = items
                .first()
                .and_then(|i| i.get("pk"))
                .and_then(|v| v.as_key_fragment())
                == Some(first.as_str());
            (op == Operation::Write && starts_chunk)
                .then(|| StoreError::Throttled { message: "injected failure".into() })
        });
    }

    let client = BatchClient::new(store.clone(), table_name(args)).with_config(batch_config(args)?)?;

    let users: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "pk": format!("USER#{i:06}"),
                "sk": "PROFILE",
                "name": format!("user {i}"),
                "email": format!("user{i}@example.com"),
            })
        })
        .collect();

    let written = client.write_serialized(users).await?;
    println!(
        "write: {} items in {} chunks, {} written, {} failed chunk(s)",
        count,
        written.chunks,
        written.written,
        written.errors.len()
    );
    for err in &written.errors {
        println!("  {err}");
    }

    let keys: Vec<Item> = (0..count)
        .map(|i| key(format!("USER#{i:06}"), "PROFILE"))
        .collect();
    let read = client.read_many(keys).await?;
    println!(
        "read:  {} keys in {} chunks, {} records returned, {} failed chunk(s)",
        count,
        read.chunks,
        read.records.len(),
        read.errors.len()
    );
    println!(
        "store: {} calls, peak {} in flight",
        store.call_count(),
        store.peak_in_flight()
    );
    Ok(())
}

fn http_client(args: &[String]) -> Result<BatchClient> {
    let store = HttpStore::from_env()?;
    tracing::info!(endpoint = store.name(), "using HTTP store");
    Ok(BatchClient::new(Arc::new(store), table_name(args)).with_config(batch_config(args)?)?)
}

fn batch_config(args: &[String]) -> Result<BatchConfig> {
    Ok(BatchConfig {
        max_concurrency: parse_number(args, "--max-concurrency")?,
        chunk_timeout_ms: parse_number(args, "--chunk-timeout-ms")?,
        ordering: if has_flag(args, "--ordered") {
            OutcomeOrder::ChunkIndex
        } else {
            OutcomeOrder::Completion
        },
    })
}

fn table_name(args: &[String]) -> String {
    parse_flag(args, "--table")
        .or_else(|| env::var("TABLE_NAME").ok().filter(|t| !t.is_empty()))
        .unwrap_or_else(|| DEFAULT_TABLE.to_string())
}

fn read_json_array(args: &[String]) -> Result<Vec<Value>> {
    let path = parse_flag(args, "--file").ok_or_else(|| anyhow!("--file is required"))?;
    let content = std::fs::read_to_string(&path).with_context(|| format!("cannot read {path}"))?;
    let value: Value =
        serde_json::from_str(&content).with_context(|| format!("{path} is not valid JSON"))?;
    match value {
        Value::Array(values) => Ok(values),
        _ => bail!("{path} must contain a JSON array"),
    }
}

fn parse_number<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>> {
    match parse_flag(args, flag) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{flag} expects a number, got {raw:?}")),
        None => Ok(None),
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}
