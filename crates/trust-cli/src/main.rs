//! trustledger - Command-line interface for the trust ledger.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use trust_core::{
    HashAlgorithm, NewEdge, NewVectorEvent, RollupAudit, TracingPublisher, TrustConfig,
    VerifyRequest,
};
use trust_service::TrustService;

/// trustledger - hash commitments, Merkle rollups, reputation and watchdog
#[derive(Parser)]
#[command(name = "trustledger")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database path (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Config file (default: user config dir, then ./trust-ledger.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Log a vector event
    Log {
        object_type: String,
        object_id: String,
        model: String,

        /// Comma-separated vector components
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        vector: Option<Vec<f32>>,

        /// JSON payload
        #[arg(long, value_parser = parse_json)]
        payload: Option<Value>,

        /// Hash algorithm (default from config)
        #[arg(long)]
        algo: Option<HashAlgorithm>,
    },

    /// Show events for an object, newest first
    History {
        object_type: String,
        object_id: String,

        /// Maximum number of events (default from config)
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Verify content against a logged event
    Verify {
        /// Event id
        id: String,

        /// Comma-separated vector components
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        vector: Option<Vec<f32>>,

        /// JSON payload
        #[arg(long, value_parser = parse_json)]
        payload: Option<Value>,
    },

    /// Compute and commit the Merkle root for a UTC day
    Rollup {
        /// Day as YYYY-MM-DD (default: today, UTC)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Show the committed Merkle root for a UTC day
    Root {
        /// Day as YYYY-MM-DD (default: today, UTC)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Recompute a day's root and compare it with the committed one
    Audit {
        /// Day as YYYY-MM-DD (default: today, UTC)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Add or replace a reputation edge
    Edge {
        src: String,
        dst: String,
        kind: String,

        /// Edge weight
        #[arg(short, long, default_value = "1.0", allow_hyphen_values = true)]
        weight: f64,

        /// Optional signature
        #[arg(long)]
        signature: Option<String>,
    },

    /// Show a reputation node, creating it when a type is given
    Node {
        id: String,

        /// Node type for a new node
        #[arg(short = 't', long = "type")]
        node_type: Option<String>,
    },

    /// Recompute every reputation score
    Recompute {
        /// Number of passes (default from config)
        #[arg(short, long)]
        iterations: Option<u32>,

        /// Damping factor in [0, 1] (default from config)
        #[arg(long)]
        damping: Option<f64>,
    },

    /// Show the score of one node
    Score { node_id: String },

    /// Show the highest scored nodes
    Leaderboard {
        /// Maximum number of entries (default from config)
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Fingerprint the watch root and alert on changes
    Snapshot {
        /// Directory to watch (overrides the config file)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Show recent watchdog alerts
    Alerts {
        /// Maximum number of alerts
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// List supported hash algorithms
    Algorithms,
}

fn setup_logging(verbose: bool) {
    let builder = FmtSubscriber::builder().with_target(false);

    if std::env::var_os("RUST_LOG").is_some() {
        let subscriber = builder.with_env_filter(EnvFilter::from_default_env()).finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let level = if verbose { Level::DEBUG } else { Level::WARN };
        let subscriber = builder.with_max_level(level).finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

fn load_config(cli: &Cli) -> Result<TrustConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => TrustConfig::load(path)?,
        None => TrustConfig::load_default()?,
    };
    config.apply_env_overrides()?;

    if let Some(path) = &cli.database {
        config.database.path = path.clone();
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {}", e))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn day_or_today(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Utc::now().date_naive())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut config = load_config(&cli)?;
    if let Commands::Snapshot { root: Some(root) } = &cli.command {
        config.watchdog.root = root.clone();
    }
    debug!("Using database at {:?}", config.database.path);

    let service = TrustService::open_with_publisher(config, Arc::new(TracingPublisher))?;

    match cli.command {
        Commands::Init => {
            print_json(&json!({
                "database": service.config().database.path,
                "service": service.info(),
            }))?;
        }
        Commands::Log {
            object_type,
            object_id,
            model,
            vector,
            payload,
            algo,
        } => {
            let mut input = NewVectorEvent::new(&object_type, &object_id, &model);
            input.vector = vector;
            input.payload = payload;
            input.hash_algo = algo;

            let event = service.ledger().log_event(input).await?;
            print_json(&event)?;
        }
        Commands::History {
            object_type,
            object_id,
            limit,
        } => {
            let events = service
                .ledger()
                .history(&object_type, &object_id, limit)
                .await?;
            print_json(&events)?;
        }
        Commands::Verify {
            id,
            vector,
            payload,
        } => {
            let mut request = VerifyRequest::new(&id);
            request.vector = vector;
            request.payload = payload;

            let result = service.ledger().verify(request).await?;
            print_json(&result)?;
            if !result.is_ok() {
                std::process::exit(1);
            }
        }
        Commands::Rollup { date } => {
            let result = service.rollups().run_rollup(day_or_today(date)).await?;
            print_json(&result)?;
        }
        Commands::Root { date } => {
            let root = service.rollups().get_root(day_or_today(date)).await?;
            print_json(&root)?;
        }
        Commands::Audit { date } => {
            let audit = service.rollups().audit_day(day_or_today(date)).await?;
            print_json(&audit)?;
            if matches!(audit, RollupAudit::Mismatch { .. }) {
                std::process::exit(1);
            }
        }
        Commands::Edge {
            src,
            dst,
            kind,
            weight,
            signature,
        } => {
            let mut edge = NewEdge::new(&src, &dst, &kind).with_weight(weight);
            edge.signature = signature;

            let edge = service.reputation().add_edge(edge).await?;
            print_json(&edge)?;
        }
        Commands::Node { id, node_type } => {
            let reputation = service.reputation();
            if let Some(node_type) = node_type {
                reputation.ensure_node(&id, &node_type).await?;
            }
            let node = reputation.get_node(&id).await?;
            let score = reputation.get_score(&id).await?;
            print_json(&json!({ "node": node, "score": score }))?;
        }
        Commands::Recompute {
            iterations,
            damping,
        } => {
            let defaults = &service.config().reputation;
            let summary = service
                .reputation()
                .recompute_scores(
                    iterations.unwrap_or(defaults.iterations),
                    damping.unwrap_or(defaults.damping),
                )
                .await?;
            print_json(&summary)?;
        }
        Commands::Score { node_id } => {
            let score = service.reputation().get_score(&node_id).await?;
            print_json(&score)?;
        }
        Commands::Leaderboard { limit } => {
            let board = service.reputation().leaderboard(limit).await?;
            print_json(&board)?;
        }
        Commands::Snapshot { .. } => {
            let report = service.watchdog().run_snapshot().await?;
            print_json(&report)?;
        }
        Commands::Alerts { limit } => {
            let alerts = service.watchdog().list_alerts(limit).await?;
            print_json(&alerts)?;
        }
        Commands::Algorithms => {
            print_json(&service.info())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_log_arguments() {
        let cli = Cli::parse_from([
            "trustledger",
            "log",
            "doc",
            "42",
            "m1",
            "--vector",
            "0.1,-0.2,0.3",
            "--payload",
            r#"{"title":"x"}"#,
            "--algo",
            "blake3",
        ]);
        match cli.command {
            Commands::Log {
                vector,
                payload,
                algo,
                ..
            } => {
                assert_eq!(vector, Some(vec![0.1, -0.2, 0.3]));
                assert_eq!(payload, Some(json!({"title": "x"})));
                assert_eq!(algo, Some(HashAlgorithm::Blake3));
            }
            _ => panic!("expected log command"),
        }
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_date("29/02/2024").is_err());
        assert!(parse_json("{not json").is_err());
    }
}
