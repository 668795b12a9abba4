//! Target registry: the named endpoints probed every cycle.

use crate::config::ServerConfig;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

/// Registry error types.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("target list is empty")]
    Empty,
    #[error("target at position {0} has an empty name")]
    EmptyName(usize),
    #[error("duplicate target name: {0}")]
    DuplicateName(String),
    #[error("target {name} has an invalid url {url:?}")]
    InvalidUrl { name: String, url: String },
}

/// A monitored endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub url: String,
}

impl Target {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Where the target list comes from.
#[derive(Debug, Clone)]
pub enum TargetRegistry {
    /// A `sites.json`-style file, re-read on every load.
    File(PathBuf),
    /// A fixed list supplied at construction.
    Static(Vec<Target>),
}

impl TargetRegistry {
    pub fn from_config(cfg: &ServerConfig) -> Self {
        match &cfg.targets_file {
            Some(path) => TargetRegistry::File(path.clone()),
            None => TargetRegistry::Static(vec![Target::new(&cfg.target_name, &cfg.target_url)]),
        }
    }

    /// Load and validate the current target list.
    pub fn load(&self) -> Result<Vec<Target>, RegistryError> {
        let targets = match self {
            TargetRegistry::File(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
                    path: path.clone(),
                    source,
                })?;
                serde_json::from_str::<Vec<Target>>(&raw).map_err(|source| RegistryError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
            TargetRegistry::Static(targets) => targets.clone(),
        };

        validate_targets(&targets)?;
        Ok(targets)
    }
}

/// Validate a target list: non-empty, unique non-empty names, http(s) urls.
pub fn validate_targets(targets: &[Target]) -> Result<(), RegistryError> {
    if targets.is_empty() {
        return Err(RegistryError::Empty);
    }

    let mut seen = HashSet::new();
    for (i, target) in targets.iter().enumerate() {
        if target.name.trim().is_empty() {
            return Err(RegistryError::EmptyName(i));
        }
        if !seen.insert(target.name.as_str()) {
            return Err(RegistryError::DuplicateName(target.name.clone()));
        }

        let valid_url = Url::parse(&target.url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !valid_url {
            return Err(RegistryError::InvalidUrl {
                name: target.name.clone(),
                url: target.url.clone(),
            });
        }
    }

    Ok(())
}
