mod config;
mod dedup;
mod engine;
mod format;
mod query;
mod search;

pub const USER_AGENT: &str = concat!("placeseek/", env!("CARGO_PKG_VERSION"));

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use config::{Config, ConfigError};
use engine::ElasticClient;
use query::{QueryBuilder, TemplateError};
use search::{SearchParams, SearchService, ServiceError, ValidationError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Search a place index and print the formatted results as JSON.
#[derive(Parser, Debug)]
#[command(name = "placeseek", version, about)]
struct Cli {
    /// Search text
    q: Option<String>,

    /// Result language
    #[arg(long)]
    lang: Option<String>,

    /// Longitude to bias results towards (requires --lat)
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<String>,

    /// Latitude to bias results towards (requires --lon)
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<String>,

    /// Spatial reference id reported with the results
    #[arg(long)]
    srid: Option<String>,

    /// Maximum number of results
    #[arg(long, allow_hyphen_values = true)]
    limit: Option<String>,

    /// Engine base URL (overrides PLACESEEK_ENGINE_URL)
    #[arg(long)]
    engine_url: Option<String>,

    /// Index name (overrides PLACESEEK_INDEX)
    #[arg(long)]
    index: Option<String>,

    /// Query template directory (overrides PLACESEEK_TEMPLATE_DIR)
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Pretty-print the result list
    #[arg(long, alias = "pretty")]
    debug: bool,

    /// Decode a result id back to its OSM id and exit
    #[arg(long, value_name = "ID", conflicts_with = "q")]
    decode_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Search(#[from] ServiceError),

    #[error("cannot build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cannot serialize results: {0}")]
    Output(#[from] serde_json::Error),

    #[error("'{0}' is not a valid result id")]
    InvalidId(String),
}

impl AppError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Validation(_) | Self::InvalidId(_) => ExitCode::from(2),
            _ => ExitCode::FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("placeseek=info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            e.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    if let Some(id) = cli.decode_id {
        let osm_id = format::decode_id(&id).ok_or(AppError::InvalidId(id))?;
        println!("{osm_id}");
        return Ok(());
    }

    let mut config = Config::from_env();
    if let Some(url) = cli.engine_url {
        config.engine_url = url;
    }
    if let Some(index) = cli.index {
        config.index = index;
    }
    if let Some(dir) = cli.templates {
        config.template_dir = dir;
    }
    config.validate()?;

    let queries = QueryBuilder::load(&config.template_dir)?;
    let http = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?;
    let index = ElasticClient::new(http, &config)?;
    let service = SearchService::new(index, queries, &config);

    let request = SearchParams {
        q: cli.q,
        lang: cli.lang,
        lon: cli.lon,
        lat: cli.lat,
        srid: cli.srid,
        limit: cli.limit,
    }
    .into_request(&config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, cancelling search");
            on_interrupt.cancel();
        }
    });

    let outcome = service.search_cancellable(&request, &cancel).await?;
    debug!(pass = ?outcome.pass, srid = outcome.srid, "writing results");
    let body = if cli.debug {
        serde_json::to_string_pretty(&outcome.results)?
    } else {
        serde_json::to_string(&outcome.results)?
    };
    println!("{body}");
    Ok(())
}
