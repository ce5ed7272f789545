use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pullbox_engine::{CacheResolver, ResolverConfig};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use pullbox_server::cli::CliArgs;
use pullbox_server::error::StartupError;
use pullbox_server::state::{AppState, RegistryConfig};

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "server failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), StartupError> {
    let args = CliArgs::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| StartupError::Initialization(e.to_string()))?;

    tokio::fs::create_dir_all(&args.cache_dir).await?;

    let resolver = CacheResolver::new(ResolverConfig {
        cache_root: args.cache_dir.clone(),
        request_timeout: Duration::from_secs(args.timeout),
        max_retries: args.max_retries,
        retry_delay_base: Duration::from_millis(250),
    })?;

    let registries = RegistryConfig::from_args(&args);
    info!(
        cache_dir = %args.cache_dir.display(),
        maven = %registries.maven_upstream,
        pypi = %registries.pypi_upstream,
        npm = %registries.npm_upstream,
        "starting pullbox"
    );
    info!(
        timeout_s = args.timeout,
        max_retries = args.max_retries,
        maven_ttl_h = args.maven_ttl_hours,
        pypi_ttl_h = args.pypi_ttl_hours,
        npm_ttl_h = args.npm_ttl_hours,
        "upstream configuration"
    );

    let state = AppState {
        resolver: Arc::new(resolver),
        registries: Arc::new(registries),
    };
    let app = pullbox_server::app(state);

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!(addr = %args.listen, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
