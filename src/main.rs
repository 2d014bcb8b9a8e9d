//! # Memory Gateway CLI (`memgate`)
//!
//! Runs the HTTP gateway and exposes its local views from the command line.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `memgate serve` | Start the HTTP gateway |
//! | `memgate search "<query>"` | Rank guide index rows for a query |
//! | `memgate brief "<query>"` | Print the budget-capped brief as JSON |
//! | `memgate graph "<query>"` | Print the relationship graph as JSON |
//! | `memgate schema` | Print the capability listing |
//!
//! ## Examples
//!
//! ```bash
//! memgate serve
//! memgate --config ./config/memgate.toml serve
//! memgate search "graph builder" --limit 5
//! memgate brief "graph builder" --max-chars 1200 --no-memory
//! memgate graph "graph builder" --param max_nodes=60
//! ```

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use memory_gateway::brief::build_brief;
use memory_gateway::config::{self, Config};
use memory_gateway::gateway::Gateway;
use memory_gateway::graph::build_graph;
use memory_gateway::guide_search;
use memory_gateway::params::{BriefOptions, GraphOptions, Params};
use memory_gateway::server;

/// Memory Gateway: a JSON HTTP façade over the memory worker with
/// budget-capped briefs and relationship graphs built from local file guides.
#[derive(Parser)]
#[command(name = "memgate", version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    ///
    /// Optional; built-in defaults and `MEMORY_*` environment variables
    /// apply without one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway.
    ///
    /// Serves until SIGINT or SIGTERM.
    Serve,

    /// Search the local guide index.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 8)]
        limit: usize,
    },

    /// Build a budget-capped brief for a query.
    Brief {
        query: String,

        /// Character budget for file summaries.
        #[arg(long)]
        max_chars: Option<u32>,

        /// Maximum number of file summaries.
        #[arg(long)]
        file_limit: Option<u32>,

        /// Skip the upstream memory search.
        #[arg(long)]
        no_memory: bool,

        /// Extra options as `key=value` pairs (e.g. `risk_limit=5`).
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },

    /// Build the relationship graph for a query.
    Graph {
        query: String,

        /// Maximum number of files in the graph.
        #[arg(long)]
        file_limit: Option<u32>,

        /// Skip the upstream memory search.
        #[arg(long)]
        no_memory: bool,

        /// Extra options as `key=value` pairs (e.g. `max_nodes=60`).
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },

    /// Print the endpoint listing.
    Schema,
}

/// Parse a `key=value` pair for `--param` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Merges CLI flags over `--param` pairs into request params.
fn cli_params(
    query: String,
    pairs: Vec<(String, String)>,
    flags: &[(&str, Option<u32>)],
    no_memory: bool,
) -> Params {
    let mut params = Params::new();
    for (key, value) in pairs {
        params.insert(key, Value::String(value));
    }
    params.insert("q".to_string(), Value::String(query));
    for (key, value) in flags {
        if let Some(value) = value {
            params.insert(key.to_string(), Value::from(*value));
        }
    }
    if no_memory {
        params.insert("include_memory".to_string(), Value::Bool(false));
    }
    params
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("memory_gateway=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg: Config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search { query, limit } => {
            guide_search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Brief {
            query,
            max_chars,
            file_limit,
            no_memory,
            params,
        } => {
            let params = cli_params(
                query,
                params,
                &[("max_chars", max_chars), ("file_limit", file_limit)],
                no_memory,
            );
            let opts = BriefOptions::from_params(&params)?;
            let gateway = Gateway::new(cfg)?;
            print_json(&build_brief(&gateway, &opts).await)?;
        }
        Commands::Graph {
            query,
            file_limit,
            no_memory,
            params,
        } => {
            let params = cli_params(query, params, &[("file_limit", file_limit)], no_memory);
            let opts = GraphOptions::from_params(&params)?;
            let gateway = Gateway::new(cfg)?;
            print_json(&build_graph(&gateway, &opts).await)?;
        }
        Commands::Schema => {
            print_json(&server::schema(&cfg.upstream.base_url()))?;
        }
    }

    Ok(())
}
