use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dbquery",
    about = "Run Databricks SQL queries into newline-delimited JSON and render job task payloads"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short = 'c', long, global = true, env = "DBQUERY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit diagnostics to stderr
    #[arg(short = 'v', long, global = true, env = "DBQUERY_VERBOSE")]
    pub verbose: bool,

    /// Disable credential masking in diagnostics
    #[arg(long, global = true, env = "DBQUERY_SHOW_SECRETS")]
    pub show_secrets: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a SQL query and store every row as one JSON line
    Query(QueryArgs),

    /// Render a run definition into a Jobs API runs/submit payload
    #[command(name = "render-run")]
    RenderRun(RenderRunArgs),
}

#[derive(Parser, Debug)]
pub struct QueryArgs {
    /// SQL query text (may contain {{ }} templates)
    pub sql: Option<String>,

    /// Read SQL from file
    #[arg(short = 'f', long = "file", conflicts_with = "sql")]
    pub sql_file: Option<PathBuf>,

    /// Databricks workspace host
    #[arg(long, env = "DBQUERY_DATABRICKS_HOST")]
    pub host: Option<String>,

    /// HTTP path of the cluster or SQL warehouse
    #[arg(long, env = "DBQUERY_HTTP_PATH")]
    pub http_path: Option<String>,

    /// Initial catalog
    #[arg(long, env = "DBQUERY_CATALOG")]
    pub catalog: Option<String>,

    /// Initial schema
    #[arg(long, env = "DBQUERY_SCHEMA")]
    pub schema: Option<String>,

    /// Databricks access token
    #[arg(long, env = "DBQUERY_DATABRICKS_TOKEN")]
    pub token: Option<String>,

    /// Extra driver property as KEY=VALUE (repeatable, overrides defaults)
    #[arg(short = 'p', long = "property")]
    pub properties: Vec<String>,

    /// Time zone id for timestamps (default: local zone)
    #[arg(long, env = "DBQUERY_TIME_ZONE")]
    pub time_zone: Option<String>,

    /// Driver: statement-api or odbc
    #[arg(long, env = "DBQUERY_DRIVER")]
    pub driver: Option<String>,

    /// Query timeout in seconds (default: 600)
    #[arg(short = 't', long, env = "DBQUERY_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Directory receiving result files
    #[arg(short = 'o', long, env = "DBQUERY_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Template variable as KEY=VALUE (repeatable)
    #[arg(long = "var")]
    pub vars: Vec<String>,

    /// Config file profile name
    #[arg(short = 'P', long, env = "DBQUERY_PROFILE")]
    pub profile: Option<String>,
}

#[derive(Parser, Debug)]
pub struct RenderRunArgs {
    /// Run definition (.toml or .json)
    pub file: PathBuf,

    /// Template variable as KEY=VALUE (repeatable)
    #[arg(long = "var")]
    pub vars: Vec<String>,
}
