use clap::Parser;
use dbquery::cli::{self, Cli, Command};
use dbquery::config::{self, DriverKind};
use dbquery::driver::statement_api::StatementApiClient;
use dbquery::error::QueryError;
use dbquery::job::RunSubmit;
use dbquery::output;
use dbquery::query::{CancelToken, QueryExecutor, QuerySpec, ResultSummary};
use dbquery::storage::LocalStorage;
use dbquery::template::TemplateContext;
use dbquery::verbose::{self, Timer};
use std::process;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    // Load .env file (optional, ignore if missing)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Query(ref args) => {
            run_query(args, cli.verbose, cli.show_secrets, cli.config.as_ref()).await
        }
        Command::RenderRun(ref args) => render_run(args, cli.verbose),
    };

    if let Err(err) = result {
        output::print_error(&err);
        process::exit(1);
    }
}

async fn run_query(
    args: &cli::QueryArgs,
    verbose: bool,
    show_secrets: bool,
    config_path: Option<&std::path::PathBuf>,
) -> Result<(), QueryError> {
    let mut app_config = config::load_from_query_args(args, verbose, show_secrets, config_path)?;
    verbose::init(app_config.verbose);

    app_config.query.sql = Some(resolve_sql(args)?);
    let context = TemplateContext::from_pairs(args.vars.iter().map(String::as_str))?;
    let spec = app_config.query.render(&context)?;

    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let storage = LocalStorage::new(app_config.output_dir.clone());
    let driver = app_config.driver;
    let timeout_secs = app_config.timeout_secs;

    let timer = Timer::start();
    let mut handle = tokio::task::spawn_blocking(move || {
        execute_query(driver, timeout_secs, storage, worker_cancel, show_secrets, &spec)
    });

    // The worker observes the token while the statement is pending and between
    // rows, and still releases its connection before returning.
    let finished = tokio::select! {
        joined = &mut handle => Some(joined),
        _ = tokio::signal::ctrl_c() => None,
    };
    let joined = match finished {
        Some(joined) => joined,
        None => {
            warn!("interrupt received, cancelling query");
            cancel.cancel();
            handle.await
        }
    };

    let summary = joined.map_err(|e| QueryError::query(format!("query worker failed: {e}")))??;
    info!(elapsed_ms = timer.elapsed_ms() as u64, "query finished");
    output::print_summary(&summary)
}

fn render_run(args: &cli::RenderRunArgs, verbose: bool) -> Result<(), QueryError> {
    verbose::init(verbose);

    let definition = RunSubmit::from_path(&args.file)?;
    let context = TemplateContext::from_pairs(args.vars.iter().map(String::as_str))?;
    let request = definition.to_request(&context)?;
    output::print_json(&request)
}

// --- Helpers ---

fn resolve_sql(args: &cli::QueryArgs) -> Result<String, QueryError> {
    if let Some(ref sql) = args.sql {
        return Ok(sql.clone());
    }
    if let Some(ref path) = args.sql_file {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::config(format!("cannot read SQL file {}: {}", path.display(), e))
        })?;
        return Ok(content);
    }
    Err(QueryError::config(
        "no SQL provided (use positional argument or --file)",
    ))
}

fn execute_query(
    driver: DriverKind,
    timeout_secs: u64,
    storage: LocalStorage,
    cancel: CancelToken,
    show_secrets: bool,
    spec: &QuerySpec,
) -> Result<ResultSummary, QueryError> {
    match driver {
        DriverKind::StatementApi => {
            let client = StatementApiClient::new(timeout_secs).with_cancel_token(cancel.clone());
            QueryExecutor::new(client, storage)
                .with_cancel_token(cancel)
                .show_secrets(show_secrets)
                .execute(spec)
        }
        #[cfg(feature = "odbc")]
        DriverKind::Odbc => {
            QueryExecutor::new(dbquery::driver::odbc::OdbcClient::new(timeout_secs), storage)
                .with_cancel_token(cancel)
                .show_secrets(show_secrets)
                .execute(spec)
        }
        #[cfg(not(feature = "odbc"))]
        DriverKind::Odbc => Err(QueryError::config(
            "driver 'odbc' requires a build with the 'odbc' feature",
        )),
    }
}
