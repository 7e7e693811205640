use crate::cli::QueryArgs;
use crate::error::QueryError;
use crate::query::QueryTemplate;
use directories::ProjectDirs;
use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Default query timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    /// Query properties, still unrendered.
    pub query: QueryTemplate,
    pub driver: DriverKind,
    pub timeout_secs: u64,
    pub output_dir: PathBuf,
    pub verbose: bool,
    pub show_secrets: bool,
}

/// SQL client used to reach the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// SQL Statement Execution REST API (SQL warehouses).
    StatementApi,
    /// ODBC driver manager with the Databricks ODBC driver.
    Odbc,
}

impl DriverKind {
    pub fn parse(name: &str) -> Result<Self, QueryError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "statement-api" | "rest" => Ok(DriverKind::StatementApi),
            "odbc" => Ok(DriverKind::Odbc),
            other => Err(QueryError::config(format!(
                "unknown driver: '{other}' (expected 'statement-api' or 'odbc')"
            ))),
        }
    }
}

// --- TOML config file structs ---

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    defaults: TomlDefaults,
    #[serde(default)]
    profiles: HashMap<String, TomlProfile>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlDefaults {
    timeout: Option<u64>,
    verbose: Option<bool>,
    output_dir: Option<PathBuf>,
    time_zone: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct TomlProfile {
    host: Option<String>,
    http_path: Option<String>,
    catalog: Option<String>,
    schema: Option<String>,
    token: Option<String>,
    token_env: Option<String>,
    driver: Option<String>,
    time_zone: Option<String>,
    #[serde(default)]
    properties: IndexMap<String, String>,
}

/// Config path resolution result. Distinguishes explicit from auto-resolved paths.
struct ResolvedConfigPath {
    path: PathBuf,
    /// true if user explicitly specified via --config or DBQUERY_CONFIG
    explicit: bool,
}

/// Resolve the config file path: --config flag > env var > platform default.
fn resolve_config_path(cli_config: Option<&PathBuf>) -> Option<ResolvedConfigPath> {
    if let Some(path) = cli_config {
        return Some(ResolvedConfigPath { path: path.clone(), explicit: true });
    }
    if let Some(path) = env_non_empty("DBQUERY_CONFIG") {
        return Some(ResolvedConfigPath { path: PathBuf::from(path), explicit: true });
    }
    project_dirs().map(|dirs| ResolvedConfigPath {
        path: dirs.config_dir().join("config.toml"),
        explicit: false,
    })
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "dbquery")
}

/// Load and parse the TOML config file (if it exists).
fn load_toml_config(resolved: Option<&ResolvedConfigPath>) -> Result<TomlConfig, QueryError> {
    let resolved = match resolved {
        Some(r) => r,
        None => return Ok(TomlConfig::default()),
    };

    if !resolved.path.exists() {
        if resolved.explicit {
            return Err(QueryError::config(format!(
                "config file not found: {}",
                resolved.path.display()
            )));
        }
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&resolved.path).map_err(|e| {
        QueryError::config(format!("cannot read config file {}: {}", resolved.path.display(), e))
    })?;

    toml::from_str(&content).map_err(|e| {
        QueryError::config(format!("invalid config file {}: {}", resolved.path.display(), e))
    })
}

/// Treat empty strings as absent.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Read an environment variable, treating empty values as unset.
pub fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve a token from direct value, env indirection, or env var.
fn resolve_secret(
    direct: Option<&str>,
    env_key: Option<&str>,
    fallback_env: &str,
) -> Option<SecretString> {
    if let Some(val) = non_empty(direct) {
        return Some(SecretString::from(val.to_string()));
    }
    // Env indirection (e.g., token_env = "MY_TOKEN")
    if let Some(key) = env_key
        && let Some(val) = env_non_empty(key)
    {
        return Some(SecretString::from(val));
    }
    env_non_empty(fallback_env).map(SecretString::from)
}

/// Split a `KEY=VALUE` command-line pair.
pub fn parse_key_value(pair: &str) -> Result<(String, String), QueryError> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(QueryError::config(format!(
            "invalid property '{pair}' (expected KEY=VALUE)"
        ))),
    }
}

fn default_output_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("results"))
        .unwrap_or_else(|| PathBuf::from("dbquery-results"))
}

/// Build AppConfig from `query` CLI args. The SQL text is set by the caller.
pub fn load_from_query_args(
    args: &QueryArgs,
    verbose: bool,
    show_secrets: bool,
    config_path: Option<&PathBuf>,
) -> Result<AppConfig, QueryError> {
    let resolved_path = resolve_config_path(config_path);
    let toml_config = load_toml_config(resolved_path.as_ref())?;

    let profile = args
        .profile
        .as_ref()
        .map(|name| {
            toml_config.profiles.get(name).cloned().ok_or_else(|| {
                QueryError::config(format!("profile '{}' not found in config file", name))
            })
        })
        .transpose()?
        .unwrap_or_default();

    let pick = |cli: &Option<String>, file: &Option<String>| -> Option<String> {
        non_empty(cli.as_deref())
            .or(non_empty(file.as_deref()))
            .map(str::to_string)
    };

    let access_token = resolve_secret(
        args.token.as_deref(),
        profile.token_env.as_deref(),
        "DBQUERY_DATABRICKS_TOKEN",
    )
    .or_else(|| {
        non_empty(profile.token.as_deref()).map(|t| SecretString::from(t.to_string()))
    });

    // Profile properties first, command-line properties override them.
    let mut properties = profile.properties.clone();
    for pair in &args.properties {
        let (key, value) = parse_key_value(pair)?;
        properties.insert(key, value);
    }

    let time_zone_id = pick(&args.time_zone, &profile.time_zone)
        .or_else(|| toml_config.defaults.time_zone.clone());

    let driver = match pick(&args.driver, &profile.driver) {
        Some(name) => DriverKind::parse(&name)?,
        None => DriverKind::StatementApi,
    };

    let query = QueryTemplate {
        host: pick(&args.host, &profile.host),
        http_path: pick(&args.http_path, &profile.http_path),
        catalog: pick(&args.catalog, &profile.catalog),
        schema: pick(&args.schema, &profile.schema),
        access_token,
        properties,
        sql: None,
        time_zone_id,
    };

    // timeout: CLI/ENV > TOML > 600
    let timeout_secs = args
        .timeout
        .unwrap_or_else(|| toml_config.defaults.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS));

    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| toml_config.defaults.output_dir.clone())
        .unwrap_or_else(default_output_dir);

    let verbose = verbose || toml_config.defaults.verbose.unwrap_or(false);

    Ok(AppConfig {
        query,
        driver,
        timeout_secs,
        output_dir,
        verbose,
        show_secrets,
    })
}
