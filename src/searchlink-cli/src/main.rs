//! # Searchlink CLI
//!
//! Issues requests against an Elasticsearch-compatible cluster through the
//! failover client.
//!
//! ```bash
//! # Fetch a document, failing over between two nodes
//! searchlink -H http://es1:9200 -H http://es2:9200 get /docs/doc/1
//!
//! # Index with a query string
//! searchlink post /docs/doc/1 --query refresh=true --body '{"foo":"bar"}'
//!
//! # Check for an index (exit status 1 when missing)
//! searchlink exists /docs
//!
//! # Bulk write from a JSON array of {"action", "metadata", "data"}
//! searchlink bulk / operations.json
//! ```

use anyhow::{Context, Result};
use argh::FromArgs;
use searchlink_core::{BulkOperation, ClientConfig, MultiSearchOperation, QueryString, RequestArgs};
use searchlink_rs::Client;
use serde_json::Value;
use std::process::ExitCode;

mod telemetry;

const DEFAULT_HOST: &str = "http://localhost:9200";

#[derive(FromArgs)]
/// Searchlink - failover client for Elasticsearch-compatible clusters
struct Cli {
    /// cluster node URL; repeat to add failover nodes (default http://localhost:9200)
    #[argh(option, short = 'H')]
    host: Vec<String>,

    /// path to a JSON client configuration file
    #[argh(option, short = 'c')]
    config: Option<String>,

    /// directory for rotated JSON log files
    #[argh(option)]
    log_dir: Option<String>,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Get(GetCommand),
    Post(PostCommand),
    Put(PutCommand),
    Delete(DeleteCommand),
    Exists(ExistsCommand),
    Bulk(BulkCommand),
    Msearch(MultiSearchCommand),
}

#[derive(FromArgs)]
/// Send a GET request
#[argh(subcommand, name = "get")]
struct GetCommand {
    /// request path
    #[argh(positional)]
    path: String,
    /// query parameter as key=value; repeatable
    #[argh(option, short = 'q')]
    query: Vec<String>,
    /// request body
    #[argh(option, short = 'b')]
    body: Option<String>,
}

#[derive(FromArgs)]
/// Send a POST request
#[argh(subcommand, name = "post")]
struct PostCommand {
    /// request path
    #[argh(positional)]
    path: String,
    /// query parameter as key=value; repeatable
    #[argh(option, short = 'q')]
    query: Vec<String>,
    /// request body
    #[argh(option, short = 'b')]
    body: Option<String>,
}

#[derive(FromArgs)]
/// Send a PUT request
#[argh(subcommand, name = "put")]
struct PutCommand {
    /// request path
    #[argh(positional)]
    path: String,
    /// query parameter as key=value; repeatable
    #[argh(option, short = 'q')]
    query: Vec<String>,
    /// request body
    #[argh(option, short = 'b')]
    body: Option<String>,
}

#[derive(FromArgs)]
/// Send a DELETE request
#[argh(subcommand, name = "delete")]
struct DeleteCommand {
    /// request path
    #[argh(positional)]
    path: String,
    /// query parameter as key=value; repeatable
    #[argh(option, short = 'q')]
    query: Vec<String>,
}

#[derive(FromArgs)]
/// Check whether a resource exists
#[argh(subcommand, name = "exists")]
struct ExistsCommand {
    /// resource path
    #[argh(positional)]
    path: String,
    /// query parameter as key=value; repeatable
    #[argh(option, short = 'q')]
    query: Vec<String>,
}

#[derive(FromArgs)]
/// Submit bulk operations from a JSON file
#[argh(subcommand, name = "bulk")]
struct BulkCommand {
    /// base path; `_bulk` is appended
    #[argh(positional)]
    path: String,
    /// file holding a JSON array of operations
    #[argh(positional)]
    file: String,
    /// query parameter as key=value; repeatable
    #[argh(option, short = 'q')]
    query: Vec<String>,
}

#[derive(FromArgs)]
/// Run several searches from a JSON file
#[argh(subcommand, name = "msearch")]
struct MultiSearchCommand {
    /// base path; `_msearch` is appended
    #[argh(positional)]
    path: String,
    /// file holding a JSON array of {"header", "body"} objects
    #[argh(positional)]
    file: String,
    /// query parameter as key=value; repeatable
    #[argh(option, short = 'q')]
    query: Vec<String>,
}

fn main() -> Result<ExitCode> {
    let cli: Cli = argh::from_env();
    let _guard = telemetry::init_telemetry(cli.log_dir.as_deref())?;

    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => ClientConfig::default(),
    };

    let hosts = if cli.host.is_empty() {
        vec![DEFAULT_HOST.to_string()]
    } else {
        cli.host.clone()
    };
    tracing::debug!("Hosts: {:?}, max_retries={}", hosts, config.max_retries);

    let client = Client::new(hosts, config)?;
    run(&client, cli.command)
}

fn run(client: &Client, command: Command) -> Result<ExitCode> {
    let output = match command {
        Command::Get(cmd) => client.get(&cmd.path, &request_args(&cmd.query, cmd.body)?)?,
        Command::Post(cmd) => client.post(&cmd.path, &request_args(&cmd.query, cmd.body)?)?,
        Command::Put(cmd) => client.put(&cmd.path, &request_args(&cmd.query, cmd.body)?)?,
        Command::Delete(cmd) => client.delete(&cmd.path, &request_args(&cmd.query, None)?)?,
        Command::Exists(cmd) => {
            let found = client.exists(&cmd.path, &request_args(&cmd.query, None)?)?;
            println!("{}", found);
            return Ok(if found {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            });
        }
        Command::Bulk(cmd) => {
            let operations: Vec<BulkOperation> = read_json(&cmd.file)?;
            client.bulk(&cmd.path, &operations, &parse_query(&cmd.query)?)?
        }
        Command::Msearch(cmd) => {
            let operations: Vec<MultiSearchOperation> = read_json(&cmd.file)?;
            client.multi_search(&cmd.path, &operations, &parse_query(&cmd.query)?)?
        }
    };

    print_json(&output)?;
    Ok(ExitCode::SUCCESS)
}

fn request_args(query: &[String], body: Option<String>) -> Result<RequestArgs> {
    let args = RequestArgs::new().with_query(parse_query(query)?);
    Ok(match body {
        Some(body) => args.raw(body),
        None => args,
    })
}

fn parse_query(pairs: &[String]) -> Result<QueryString> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow::anyhow!("Invalid query parameter '{}': expected key=value", pair))
        })
        .collect()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
