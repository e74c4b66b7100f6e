use crate::aggregate::IdentityMap;
use crate::error::Result;
use crate::github::DEFAULT_API_URL;
use crate::report::default_fields;
use crate::store::Backend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = ".cogitate.toml";

/// Settings loaded from `.cogitate.toml`. CLI flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub report: ReportConfig,
    /// Platform login -> commit author name.
    #[serde(default)]
    pub identities: IdentityMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub backend: Backend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".cogitate")
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            backend: Backend::default(),
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            fields: default_fields(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// An explicit path must exist; otherwise `.cogitate.toml` is used when
    /// present and built-in defaults when not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    debug!(path = %path.display(), "loading configuration");
                    Self::from_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}
