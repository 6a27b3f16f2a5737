//! Run configuration
//!
//! Loaded from a TOML file (`--config` or `./dec-renta.toml`), with defaults
//! for every field. The FX section is handed explicitly to the rate source and
//! cache; nothing reads a process-wide cache directory.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "dec-renta.toml";
pub const ECB_BASE_URL: &str = "https://data-api.ecb.europa.eu/service/data";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub out_dir: Option<PathBuf>,
    pub fx: FxConfig,
    pub metadata: MetadataConfig,
}

/// Where and how USD/EUR reference rates are fetched and cached
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FxConfig {
    pub cache_dir: PathBuf,
    pub ecb_base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub path: PathBuf,
    pub remote_enrichment: bool,
    pub timeout_secs: u64,
}

impl Default for FxConfig {
    fn default() -> Self {
        let cache_dir = default_cache_dir().unwrap_or_else(|_| PathBuf::from(".cache/dec-renta/fx"));
        Self {
            cache_dir,
            ecb_base_url: ECB_BASE_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl FxConfig {
    pub fn with_cache_dir<P: Into<PathBuf>>(cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data").join("ticker_metadata.csv"),
            remote_enrichment: true,
            timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load the configuration file, or the defaults when there is none.
    ///
    /// An explicitly requested file must exist; the implicit
    /// `./dec-renta.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(anyhow!("Config file not found: {}", p.display()));
                }
                p.to_path_buf()
            }
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                default
            }
        };

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.out_dir.clone().unwrap_or_else(|| PathBuf::from("out"))
    }
}

fn default_cache_dir() -> Result<PathBuf> {
    let cache_dir = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(dir_spec::cache_home)
        .ok_or_else(|| anyhow!("Could not determine cache directory"))?;
    Ok(cache_dir.join("dec-renta").join("fx"))
}
