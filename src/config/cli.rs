use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the catalog server binary.
#[derive(Debug, Parser)]
#[command(name = "catalog-server", version, about = "Catalog JSON server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CATALOG_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Env file with `KEY=VALUE` lines (defaults to `.env` when present).
    #[arg(
        long = "env-file",
        env = "CATALOG_ENV_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the catalog HTTP service.
    Serve(Box<ServeArgs>),
    /// Load every catalog source once and report record counts.
    Check(CheckArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub sources: SourceOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SourceOverrides {
    /// Override the leaf categories source file.
    #[arg(long = "category-leaf-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub category_leaf_path: Option<PathBuf>,

    /// Override the top-level categories source file.
    #[arg(long = "category-top-level-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub category_top_level_path: Option<PathBuf>,

    /// Override the all-categories source file.
    #[arg(long = "category-all-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub category_all_path: Option<PathBuf>,

    /// Override the products source file.
    #[arg(long = "product-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub product_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub sources: SourceOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Load every cache before accepting requests.
    #[arg(
        long = "warm-on-startup",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub warm_on_startup: Option<bool>,
}
