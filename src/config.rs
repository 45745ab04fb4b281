//! Configuration management

use std::{env, fmt, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "DATOCMS_MCP_";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before applying environment overrides.
    /// Later files override earlier ones; missing files are skipped.
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Content Management API configuration
    pub cma: CmaConfig,
    /// Client cache configuration
    pub clients: ClientsConfig,
    /// Debug tracing configuration
    pub debug: DebugConfig,
}

/// Which transport the MCP server speaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Newline-delimited JSON-RPC on stdin/stdout
    #[default]
    Stdio,
    /// JSON-RPC over `POST /mcp`
    Http,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        })
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Transport to serve on
    pub transport: TransportKind,
    /// Host to bind to (HTTP transport)
    pub host: String,
    /// Port to listen on (HTTP transport)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stdio,
            host: "127.0.0.1".to_string(),
            port: 39_500,
        }
    }
}

/// Content Management API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CmaConfig {
    /// API root URL
    pub base_url: String,
    /// Value of the `X-Api-Version` header
    pub api_version: String,
    /// Per-request timeout enforced by the HTTP client
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Polling of asynchronous job results
    pub job_poll: JobPollConfig,
}

impl Default for CmaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://site-api.datocms.com".to_string(),
            api_version: "3".to_string(),
            timeout: Duration::from_secs(60),
            job_poll: JobPollConfig::default(),
        }
    }
}

/// Job-result polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobPollConfig {
    /// Delay between polls
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Polls before giving up
    pub max_attempts: usize,
}

impl Default for JobPollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 60,
        }
    }
}

/// Client cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientsConfig {
    /// Maximum number of cached clients before the least recently used is evicted
    pub max_cached: usize,
}

impl Default for ClientsConfig {
    fn default() -> Self {
        Self { max_cached: 256 }
    }
}

/// Debug tracing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Attach `meta.debug` to every response, not only to calls passing `debug: true`
    pub enabled: bool,
}

impl Config {
    /// Load configuration from defaults, an optional YAML file and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or the result fails [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        let env_overrides = || Env::prefixed(ENV_PREFIX).split("__");

        let mut config: Self = figment
            .clone()
            .merge(env_overrides())
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Env files may carry DATOCMS_MCP_* overrides themselves.
        if config.load_env_files() > 0 {
            config = figment
                .merge(env_overrides())
                .extract()
                .map_err(|e| Error::Config(e.to_string()))?;
        }

        config.expand_env_vars();
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.cma.base_url.trim().is_empty() {
            return Err(Error::Config("cma.base_url must not be empty".to_string()));
        }
        if self.clients.max_cached == 0 {
            return Err(Error::Config("clients.max_cached must be at least 1".to_string()));
        }
        if self.cma.job_poll.max_attempts == 0 {
            return Err(Error::Config(
                "cma.job_poll.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.server.transport == TransportKind::Http && self.server.port == 0 {
            return Err(Error::Config("server.port must be set for the http transport".to_string()));
        }
        Ok(())
    }

    /// Load env files into the process environment; returns how many were loaded.
    fn load_env_files(&self) -> usize {
        let mut loaded = 0;
        for path_str in &self.env_files {
            let path = Path::new(path_str);
            if !path.exists() {
                tracing::debug!("Env file not found (skipped): {path_str}");
                continue;
            }
            match dotenvy::from_path(path) {
                Ok(()) => {
                    tracing::info!("Loaded env file: {path_str}");
                    loaded += 1;
                }
                Err(e) => tracing::warn!("Failed to load env file {path_str}: {e}"),
            }
        }
        loaded
    }

    /// Expand `${VAR}` and `${VAR:-default}` in the API base URL
    fn expand_env_vars(&mut self) {
        let Ok(re) = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") else {
            return;
        };
        self.cma.base_url = re
            .replace_all(&self.cma.base_url, |caps: &regex::Captures| {
                let default = caps.get(2).map_or("", |m| m.as_str());
                env::var(&caps[1]).unwrap_or_else(|_| default.to_string())
            })
            .into_owned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.transport, TransportKind::Stdio);
        assert_eq!(config.cma.base_url, "https://site-api.datocms.com");
        assert_eq!(config.clients.max_cached, 256);
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datocms-mcp.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "server:\n  transport: http\n  port: 8123\ncma:\n  timeout: 5s\n  job_poll:\n    interval: 250ms\nclients:\n  max_cached: 4\ndebug:\n  enabled: true"
        )
        .unwrap();
        drop(f);

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.server.transport, TransportKind::Http);
        assert_eq!(config.server.port, 8123);
        assert_eq!(config.cma.timeout, Duration::from_secs(5));
        assert_eq!(config.cma.job_poll.interval, Duration::from_millis(250));
        assert_eq!(config.clients.max_cached, 4);
        assert!(config.debug.enabled);
        // untouched sections keep their defaults
        assert_eq!(config.cma.api_version, "3");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/datocms-mcp.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn zero_cache_bound_is_rejected() {
        let mut config = Config::default();
        config.clients.max_cached = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn base_url_expands_env_with_default() {
        let mut config = Config::default();
        config.cma.base_url = "${DATOCMS_MCP_TEST_UNSET_URL:-http://localhost:9999}".to_string();
        config.expand_env_vars();
        assert_eq!(config.cma.base_url, "http://localhost:9999");
    }

    #[test]
    fn load_env_files_skips_missing() {
        let config = Config {
            env_files: vec!["/nonexistent/path/.env".to_string()],
            ..Default::default()
        };
        assert_eq!(config.load_env_files(), 0);
    }
}
