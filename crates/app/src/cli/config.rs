//! CLI configuration

use std::path::PathBuf;

use clap::Args;

/// Log output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub(crate) struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Shop API settings.
#[derive(Debug, Args)]
pub(crate) struct ApiConfig {
    /// Shop API base URL
    #[arg(long, env = "LP_SHOP_API_URL", default_value = "http://localhost:5000/api")]
    pub api_url: String,

    /// Bearer credential; takes precedence over the saved session
    #[arg(long, env = "LP_SHOP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Local snapshot storage settings.
#[derive(Debug, Args)]
pub(crate) struct StorageConfig {
    /// Directory for cart snapshots and the saved session
    #[arg(long, env = "LP_SHOP_DATA_DIR", default_value = ".lp-shop")]
    pub data_dir: PathBuf,
}
