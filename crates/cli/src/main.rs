use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rules_review::{ReviewConfig, CONFIG_PATH_ENV};
use rules_review_protocol::{DeficiencyKind, EntityId, RequestStatus, RuleAction, SearchScope};
use std::env;
use std::path::PathBuf;

mod commands;

const INVENTORY_PATH_ENV: &str = "RULES_REVIEW_INVENTORY";

#[derive(Parser)]
#[command(name = "rules-review")]
#[command(about = "Reconcile firewall rules against access requests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Inventory file (overrides RULES_REVIEW_INVENTORY)
    #[arg(long, global = true)]
    inventory: Option<PathBuf>,

    /// TOML config file (overrides RULES_REVIEW_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Declared access requests
    #[command(subcommand)]
    Request(RequestCommand),

    /// Implemented firewall rules
    #[command(subcommand)]
    Rule(RuleCommand),

    /// Canonical-text embeddings for rules and requests
    #[command(subcommand)]
    Embeddings(EmbeddingsCommand),

    /// Run a reconciliation and store its deficiencies
    #[command(subcommand)]
    Review(ReviewCommand),

    /// Similarity search over rules and requests
    #[command(subcommand)]
    Search(SearchCommand),

    /// Show deficiencies from the latest run
    Deficiencies(DeficienciesArgs),
}

#[derive(Subcommand)]
enum RequestCommand {
    /// Submit a request (status starts as pending)
    Add(EndpointArgs),

    /// List requests
    List {
        /// Only requests with this status
        #[arg(long)]
        status: Option<RequestStatus>,
    },

    /// Show one request
    Show { id: EntityId },

    /// Change a request's status
    Status { id: EntityId, status: RequestStatus },
}

#[derive(Subcommand)]
enum RuleCommand {
    /// Record an implemented rule
    Add {
        #[command(flatten)]
        endpoints: EndpointArgs,

        /// Firewall device the rule lives on
        #[arg(long)]
        device: String,

        #[arg(long, default_value = "allow")]
        action: RuleAction,
    },

    /// List rules
    List,

    /// Show one rule
    Show { id: EntityId },

    /// Delete a rule and its address entries
    Delete { id: EntityId },
}

#[derive(Args)]
struct EndpointArgs {
    #[arg(long)]
    name: String,

    /// Source address: host, CIDR or dashed range (repeatable, comma-separated)
    #[arg(long = "source", value_delimiter = ',', num_args = 1..)]
    sources: Vec<String>,

    /// Destination address (repeatable, comma-separated)
    #[arg(long = "destination", value_delimiter = ',', num_args = 1..)]
    destinations: Vec<String>,

    /// Port (repeatable, comma-separated)
    #[arg(long = "port", value_delimiter = ',', num_args = 1..)]
    ports: Vec<String>,
}

#[derive(Subcommand)]
enum EmbeddingsCommand {
    /// Embed entities that have no embedding yet
    Generate {
        /// Re-embed everything
        #[arg(long)]
        force: bool,

        /// Texts per provider call (defaults to the configured batch size)
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Embedding coverage per kind
    Status,
}

#[derive(Subcommand)]
enum ReviewCommand {
    /// Match by identical sources, destinations and ports
    Exact,

    /// Match by embedding similarity
    Semantic {
        /// Minimum similarity in [0, 1] (defaults to the configured threshold)
        #[arg(long)]
        threshold: Option<f64>,
    },
}

#[derive(Args)]
struct SearchOptions {
    /// Minimum similarity in [0, 1] (defaults to the configured threshold)
    #[arg(long)]
    threshold: Option<f64>,

    /// Maximum number of results
    #[arg(long, short = 'n', default_value_t = 10)]
    limit: usize,
}

#[derive(Subcommand)]
enum SearchCommand {
    /// Rules similar to a request
    ByRequest {
        id: EntityId,
        #[command(flatten)]
        options: SearchOptions,
    },

    /// Requests similar to a rule
    ByRule {
        id: EntityId,
        #[command(flatten)]
        options: SearchOptions,
    },

    /// Entities similar to free text
    Text {
        query: String,

        /// rules|requests|both
        #[arg(long, default_value = "both")]
        scope: SearchScope,

        #[command(flatten)]
        options: SearchOptions,
    },
}

#[derive(Args)]
struct DeficienciesArgs {
    /// Semantic-track deficiencies instead of exact-track ones
    #[arg(long)]
    semantic: bool,

    /// no_matching_request|no_matching_rule
    #[arg(long)]
    kind: Option<DeficiencyKind>,

    /// Show a single deficiency
    #[arg(long, conflicts_with = "kind")]
    id: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config_path = cli
        .config
        .clone()
        .or_else(|| env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
    let config = ReviewConfig::load(config_path.as_deref())
        .with_context(|| match &config_path {
            Some(path) => format!("Failed to load config from {}", path.display()),
            None => "Invalid configuration".to_string(),
        })?;

    let inventory_path = cli
        .inventory
        .clone()
        .or_else(|| env::var_os(INVENTORY_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("rules-review.json"));

    let ctx = commands::Ctx {
        config,
        inventory_path,
    };
    let output = commands::dispatch(&ctx, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
