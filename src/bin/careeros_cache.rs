//! careeros-cache: 缓存运维命令行工具：清理过期记录、统计、查看配置
//!
//! Usage:
//!   careeros-cache sweep [--dir <path>] [--collection <name>]   Delete expired records
//!   careeros-cache stats [--dir <path>]                         Per-collection record counts
//!   careeros-cache config                                       Print effective configuration

use anyhow::Context;
use careeros_resilience::cache::{DocumentStore, JsonFileDocumentStore};
use careeros_resilience::config::ResilienceConfig;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "sweep" => cmd_sweep(&args[2..]).await,
        "stats" => cmd_stats(&args[2..]).await,
        "config" => cmd_config(),
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"careeros-cache: CareerOS 缓存运维工具

USAGE:
    careeros-cache <COMMAND> [OPTIONS]

COMMANDS:
    sweep [--dir <path>] [--collection <name>]   Delete expired records
    stats [--dir <path>]                         Show record counts per collection
    config                                       Print effective configuration (YAML)
    version                                      Show version information
    help                                         Show this help message

ENVIRONMENT:
    CAREEROS_RESILIENCE_CONFIG    Path to a YAML configuration file
    CAREEROS_DOCUMENT_STORE_DIR   Document store directory
    RUST_LOG                      Log filter (default: info)"#
    );
}

fn cmd_version() {
    println!("careeros-cache {}", env!("CARGO_PKG_VERSION"));
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn open_store(args: &[String]) -> anyhow::Result<JsonFileDocumentStore> {
    let dir = match flag_value(args, "--dir") {
        Some(dir) => PathBuf::from(dir),
        None => {
            ResilienceConfig::from_env()
                .context("loading configuration")?
                .document_store_dir
        }
    };
    Ok(JsonFileDocumentStore::new(dir))
}

fn now_ms() -> anyhow::Result<u64> {
    let since = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the Unix epoch")?;
    Ok(since.as_millis() as u64)
}

async fn cmd_sweep(args: &[String]) -> anyhow::Result<()> {
    let store = open_store(args)?;
    let collections = match flag_value(args, "--collection") {
        Some(name) => vec![name.to_string()],
        None => store.collections().await?,
    };
    let now = now_ms()?;
    let mut total = 0;
    for collection in &collections {
        let removed = store
            .delete_expired(collection, now)
            .await
            .with_context(|| format!("sweeping collection {collection}"))?;
        println!("{collection}: removed {removed}");
        total += removed;
    }
    info!(dir = %store.dir().display(), collections = collections.len(), removed = total, "sweep complete");
    Ok(())
}

async fn cmd_stats(args: &[String]) -> anyhow::Result<()> {
    let store = open_store(args)?;
    let collections = store.collections().await?;
    if collections.is_empty() {
        println!("no collections in {}", store.dir().display());
        return Ok(());
    }
    for collection in collections {
        let count = store.count(&collection).await?;
        println!("{collection:<24} {count:>8}");
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = ResilienceConfig::from_env().context("loading configuration")?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}
