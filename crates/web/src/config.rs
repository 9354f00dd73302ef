//! Web server configuration

use orgahome_common::{resolver_for, StaticMode, StaticResolver};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source assets shipped with the crate
pub const DEFAULT_STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

/// Output of `orgahome static compile`
pub const DEFAULT_SERVING_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/dist");

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebServerConfig {
    /// Hash assets on the fly (development) or serve the compiled manifest
    pub static_mode: StaticMode,

    /// Source asset directory
    pub static_dir: PathBuf,

    /// Compiled asset directory holding `.staticmanifest.json`
    pub serving_dir: PathBuf,

    /// URL prefix static files are mounted under
    pub static_route: String,

    /// Trust `X-Forwarded-*` headers from a fronting nginx
    pub behind_nginx: bool,

    /// PuppetDB configuration
    pub puppetdb: PuppetDbConfig,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            static_mode: StaticMode::Development,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            serving_dir: PathBuf::from(DEFAULT_SERVING_DIR),
            static_route: "/static".to_string(),
            behind_nginx: false,
            puppetdb: PuppetDbConfig::default(),
        }
    }
}

/// PuppetDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PuppetDbConfig {
    /// Base URL, e.g. `http://puppetdb:8080`
    pub url: Option<String>,

    /// JSON file with canned query results, used when no URL is set
    pub fixture: Option<PathBuf>,

    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for PuppetDbConfig {
    fn default() -> Self {
        Self {
            url: None,
            fixture: None,
            timeout_secs: 10,
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let v = v.trim();
        if v.is_empty() { None } else { Some(v.to_string()) }
    })
}

impl WebServerConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Defaults overridden by `ORGAHOME_*` environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::default().with_env()
    }

    /// Apply `ORGAHOME_*` environment variables on top of `self`
    pub fn with_env(mut self) -> anyhow::Result<Self> {
        if let Some(mode) = env_nonempty("ORGAHOME_STATIC_MODE") {
            self.static_mode = mode.parse()?;
        }
        if let Some(dir) = env_nonempty("ORGAHOME_STATIC_DIR") {
            self.static_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_nonempty("ORGAHOME_SERVING_DIR") {
            self.serving_dir = PathBuf::from(dir);
        }
        if let Some(url) = env_nonempty("ORGAHOME_PUPPETDB_URL") {
            self.puppetdb.url = Some(url);
        }
        if let Some(fixture) = env_nonempty("ORGAHOME_PUPPETDB_FIXTURE") {
            self.puppetdb.fixture = Some(PathBuf::from(fixture));
        }
        if let Some(flag) = env_nonempty("ORGAHOME_BEHIND_NGINX") {
            self.behind_nginx = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        Ok(self)
    }

    /// Static route without a trailing slash, always starting with `/`
    pub fn static_prefix(&self) -> String {
        let trimmed = self.static_route.trim_matches('/');
        if trimmed.is_empty() {
            "/static".to_string()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Build the static resolver for the configured mode
    pub fn resolver(&self) -> anyhow::Result<Arc<dyn StaticResolver>> {
        Ok(resolver_for(
            self.static_mode,
            &self.static_dir,
            &self.serving_dir,
        )?)
    }
}
