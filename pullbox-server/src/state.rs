use std::sync::Arc;
use std::time::Duration;

use pullbox_engine::CacheResolver;

use crate::cli::CliArgs;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<CacheResolver>,
    pub registries: Arc<RegistryConfig>,
}

/// Per-registry upstream bases and metadata TTLs.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub maven_upstream: String,
    pub pypi_upstream: String,
    pub pypi_files_upstream: String,
    pub npm_upstream: String,
    pub maven_ttl: Duration,
    pub pypi_ttl: Duration,
    pub npm_ttl: Duration,
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

impl RegistryConfig {
    pub fn from_args(args: &CliArgs) -> Self {
        Self {
            maven_upstream: trim_base(&args.maven_upstream),
            pypi_upstream: trim_base(&args.pypi_upstream),
            pypi_files_upstream: trim_base(&args.pypi_files_upstream),
            npm_upstream: trim_base(&args.npm_upstream),
            maven_ttl: Duration::from_secs(args.maven_ttl_hours * 3600),
            pypi_ttl: Duration::from_secs(args.pypi_ttl_hours * 3600),
            npm_ttl: Duration::from_secs(args.npm_ttl_hours * 3600),
        }
    }
}
