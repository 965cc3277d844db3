//! Configuration layer: typed settings with layered precedence
//! (file → env → legacy env vars → CLI).

mod cli;
pub mod env_file;

use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{CheckArgs, CliArgs, Command, ServeArgs, ServeOverrides, SourceOverrides};
pub use env_file::EnvFileError;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "catalog";
const DEFAULT_ENV_FILE: &str = ".env";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 10;

/// Variable names used by earlier deployments to point at the source files.
pub const LEGACY_CATEGORY_LEAF_VAR: &str = "CATEGORY_JSON_PATH";
pub const LEGACY_CATEGORY_TOP_LEVEL_VAR: &str = "CATEGORY_JSON_PATH_TOP_LEVEL";
pub const LEGACY_CATEGORY_ALL_VAR: &str = "CATEGORY_JSON_PATH_ALL";
pub const LEGACY_PRODUCT_VAR: &str = "PRODUCT_JSON_PATH";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub catalog: CatalogSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Source files of the four catalog caches.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub category_leaf_path: PathBuf,
    pub category_top_level_path: PathBuf,
    pub category_all_path: PathBuf,
    pub product_path: PathBuf,
    pub warm_on_startup: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error(transparent)]
    EnvFile(#[from] EnvFileError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence.
///
/// Config files and `CATALOG__*` variables come first. The legacy
/// `CATEGORY_JSON_PATH*` / `PRODUCT_JSON_PATH` variables, read from the
/// process environment or else the env file, only fill paths still unset.
/// CLI flags override everything.
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("CATALOG").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    let env_vars = match cli.env_file.as_ref() {
        Some(path) => env_file::load(path)?,
        None => env_file::load_optional(DEFAULT_ENV_FILE.as_ref())?,
    };
    raw.apply_legacy_paths(|key| {
        env::var(key)
            .ok()
            .or_else(|| env_vars.get(key).cloned())
    });

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Check(args)) => raw.apply_source_overrides(&args.sources),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    catalog: RawCatalogSettings,
}

impl RawSettings {
    fn apply_legacy_paths<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let legacy = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };

        let catalog = &mut self.catalog;
        if catalog.category_leaf_path.is_none() {
            catalog.category_leaf_path = legacy(LEGACY_CATEGORY_LEAF_VAR);
        }
        if catalog.category_top_level_path.is_none() {
            catalog.category_top_level_path = legacy(LEGACY_CATEGORY_TOP_LEVEL_VAR);
        }
        if catalog.category_all_path.is_none() {
            catalog.category_all_path = legacy(LEGACY_CATEGORY_ALL_VAR);
        }
        if catalog.product_path.is_none() {
            catalog.product_path = legacy(LEGACY_PRODUCT_VAR);
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(warm) = overrides.warm_on_startup {
            self.catalog.warm_on_startup = Some(warm);
        }

        self.apply_source_overrides(&overrides.sources);
    }

    fn apply_source_overrides(&mut self, overrides: &SourceOverrides) {
        if let Some(path) = overrides.category_leaf_path.as_ref() {
            self.catalog.category_leaf_path = Some(path.clone());
        }
        if let Some(path) = overrides.category_top_level_path.as_ref() {
            self.catalog.category_top_level_path = Some(path.clone());
        }
        if let Some(path) = overrides.category_all_path.as_ref() {
            self.catalog.category_all_path = Some(path.clone());
        }
        if let Some(path) = overrides.product_path.as_ref() {
            self.catalog.product_path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            catalog,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let catalog = build_catalog_settings(catalog)?;

        Ok(Self {
            server,
            logging,
            catalog,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_catalog_settings(catalog: RawCatalogSettings) -> Result<CatalogSettings, LoadError> {
    Ok(CatalogSettings {
        category_leaf_path: required_path(
            catalog.category_leaf_path,
            "catalog.category_leaf_path",
            LEGACY_CATEGORY_LEAF_VAR,
        )?,
        category_top_level_path: required_path(
            catalog.category_top_level_path,
            "catalog.category_top_level_path",
            LEGACY_CATEGORY_TOP_LEVEL_VAR,
        )?,
        category_all_path: required_path(
            catalog.category_all_path,
            "catalog.category_all_path",
            LEGACY_CATEGORY_ALL_VAR,
        )?,
        product_path: required_path(
            catalog.product_path,
            "catalog.product_path",
            LEGACY_PRODUCT_VAR,
        )?,
        warm_on_startup: catalog.warm_on_startup.unwrap_or(true),
    })
}

fn required_path(
    value: Option<PathBuf>,
    key: &'static str,
    legacy_var: &str,
) -> Result<PathBuf, LoadError> {
    match value {
        Some(path) if !path.as_os_str().is_empty() => Ok(path),
        Some(_) => Err(LoadError::invalid(key, "path must not be empty")),
        None => Err(LoadError::invalid(
            key,
            format!("path is not set (also accepted from `{legacy_var}`)"),
        )),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCatalogSettings {
    category_leaf_path: Option<PathBuf>,
    category_top_level_path: Option<PathBuf>,
    category_all_path: Option<PathBuf>,
    product_path: Option<PathBuf>,
    warm_on_startup: Option<bool>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
