use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Define CLI arguments. Every option falls back to an environment
/// variable so the server can be configured entirely from the environment
/// in container deployments.
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Pull-through cache proxy for Maven, PyPI and npm registries",
    long_about = "A local caching proxy for package registries.\n\
                  \n\
                  Point your build tools at this server instead of the public\n\
                  registries: cached artifacts are served directly, misses are\n\
                  fetched from the real upstream and stored for future requests.\n\
                  Binary artifacts are cached forever; metadata is refreshed on\n\
                  a per-registry TTL."
)]
pub struct CliArgs {
    /// Address to listen on
    #[arg(long, env = "PULLBOX_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Base directory for the cache tree
    #[arg(long, env = "PULLBOX_CACHE_DIR", default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Upstream Maven repository
    #[arg(
        long,
        env = "MAVEN_UPSTREAM",
        default_value = "https://repo1.maven.org/maven2"
    )]
    pub maven_upstream: String,

    /// Upstream PyPI index host
    #[arg(long, env = "PYPI_UPSTREAM", default_value = "https://pypi.org")]
    pub pypi_upstream: String,

    /// Upstream PyPI package-file host
    #[arg(
        long,
        env = "PYPI_FILES_UPSTREAM",
        default_value = "https://files.pythonhosted.org"
    )]
    pub pypi_files_upstream: String,

    /// Upstream npm registry
    #[arg(
        long,
        env = "NPM_UPSTREAM",
        default_value = "https://registry.npmjs.org"
    )]
    pub npm_upstream: String,

    /// Maven metadata TTL in hours (0 = never refresh)
    #[arg(long, env = "MAVEN_METADATA_TTL_HOURS", default_value = "24")]
    pub maven_ttl_hours: u64,

    /// PyPI metadata TTL in hours (0 = never refresh)
    #[arg(long, env = "PYPI_METADATA_TTL_HOURS", default_value = "24")]
    pub pypi_ttl_hours: u64,

    /// npm metadata TTL in hours (0 = never refresh)
    #[arg(long, env = "NPM_METADATA_TTL_HOURS", default_value = "24")]
    pub npm_ttl_hours: u64,

    /// Per-attempt upstream request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECONDS", default_value = "30")]
    pub timeout: u64,

    /// Retries after a failed upstream attempt
    #[arg(long, env = "MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    /// Enable detailed debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
