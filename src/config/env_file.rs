//! `KEY=VALUE` env files, parsed with `dotenvy`.
//!
//! The usual dotenv syntax applies: comments, quoted values and `export`
//! prefixes. Values are returned to the caller rather than written into the
//! process environment.

use std::{
    collections::BTreeMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvFileError {
    #[error("could not open env file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid env file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

impl EnvFileError {
    fn from_dotenvy(path: &Path, err: dotenvy::Error) -> Self {
        match err {
            dotenvy::Error::Io(source) => Self::Io {
                path: path.to_path_buf(),
                source,
            },
            source => Self::Parse {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == ErrorKind::NotFound)
    }
}

pub type EnvVars = BTreeMap<String, String>;

/// Parse the env file at `path`, which must exist.
pub fn load(path: &Path) -> Result<EnvVars, EnvFileError> {
    let iter = dotenvy::from_path_iter(path).map_err(|err| EnvFileError::from_dotenvy(path, err))?;
    collect(iter, path)
}

/// Like [`load`], but a missing file yields no variables.
pub fn load_optional(path: &Path) -> Result<EnvVars, EnvFileError> {
    match load(path) {
        Err(err) if err.is_not_found() => Ok(EnvVars::new()),
        other => other,
    }
}

/// Parse env file contents already in memory; `path` only labels errors.
pub fn parse(contents: &str, path: &Path) -> Result<EnvVars, EnvFileError> {
    collect(dotenvy::from_read_iter(contents.as_bytes()), path)
}

fn collect<I>(iter: I, path: &Path) -> Result<EnvVars, EnvFileError>
where
    I: Iterator<Item = dotenvy::Result<(String, String)>>,
{
    let mut vars = EnvVars::new();
    for item in iter {
        let (key, value) = item.map_err(|err| EnvFileError::from_dotenvy(path, err))?;
        vars.insert(key, value);
    }
    Ok(vars)
}
