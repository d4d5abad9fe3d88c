//! Runtime configuration, read from environment-style key/value pairs.
//!
//! Only the credential, the actor and the image path are required. Everything
//! else falls back to the defaults used by the GitHub Actions workflow.

use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
const DEFAULT_OUTPUT_DIR: &str = "generated";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a personal access token is required (set ACCESS_TOKEN)")]
    MissingToken,
    #[error("GITHUB_ACTOR must be set")]
    MissingActor,
    #[error("GENERATED_IMAGE_PATH must be set")]
    MissingImagePath,
    #[error("GENERATED_IMAGE_PATH must end with .svg, got {0:?}")]
    InvalidImagePath(String),
    #[error("MAX_CONNECTIONS must be a positive integer, got {0:?}")]
    InvalidMaxConnections(String),
}

/// Repo and language filters applied while aggregating.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub exclude_repos: HashSet<String>,
    pub exclude_langs: HashSet<String>,
    pub exclude_forked_repos: bool,
    pub exclude_private_repos: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub access_token: String,
    pub actor: String,
    pub filters: Filters,
    pub image_path: String,
    pub output_dir: PathBuf,
    pub template_dir: Option<PathBuf>,
    pub max_connections: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_token = lookup("ACCESS_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;
        let actor = lookup("GITHUB_ACTOR")
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or(ConfigError::MissingActor)?;

        let image_path = lookup("GENERATED_IMAGE_PATH")
            .ok_or(ConfigError::MissingImagePath)?
            .trim()
            .to_string();
        if !image_path.ends_with(".svg") {
            return Err(ConfigError::InvalidImagePath(image_path));
        }

        let max_connections = match lookup("MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidMaxConnections(raw))?,
        };

        let filters = Filters {
            exclude_repos: string_to_list(lookup("EXCLUDED").as_deref())
                .into_iter()
                .collect(),
            exclude_langs: string_to_list(lookup("EXCLUDED_LANGS").as_deref())
                .into_iter()
                .collect(),
            exclude_forked_repos: truthy(lookup("EXCLUDE_FORKED_REPOS").as_deref(), true),
            exclude_private_repos: truthy(lookup("EXCLUDE_PRIVATE_REPOS").as_deref(), true),
        };

        Ok(Self {
            access_token,
            actor,
            filters,
            image_path,
            output_dir: lookup("OUTPUT_DIR")
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            template_dir: lookup("TEMPLATE_DIR")
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from),
            max_connections,
        })
    }
}

/// Split a comma-separated value into trimmed, non-empty entries.
pub fn string_to_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

pub fn truthy(raw: Option<&str>, default: bool) -> bool {
    match raw {
        Some(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "y"
        ),
        None => default,
    }
}
