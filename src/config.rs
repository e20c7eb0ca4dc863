//! usermig YAML configuration
//!
//! ```yaml
//! usermig:
//!     name: UserMig
//!     loglevel: INFO
//!     tsv: users.tsv
//!     api_key: NRAK-...
//!     source_domain_id: 7c6e...
//!     destination_domain_id: 91f2...
//!     # optional
//!     endpoint: https://api.eu.newrelic.com/graphql
//!     timeout_secs: 30
//!     confirm_secs: 10
//! ```

use crate::error::ConfigError;
use crate::migration::{MigrationSettings, DEFAULT_CONFIRM_DELAY};
use crate::nerdgraph::client::{DEFAULT_TIMEOUT_SECS, NERDGRAPH_ENDPOINT};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Environment variable consulted when the file has no `api_key`.
pub const API_KEY_ENV: &str = "NEW_RELIC_API_KEY";

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Root configuration structure
#[derive(Debug, Deserialize)]
struct ConfigFile {
    usermig: UserMigConfig,
}

/// The `usermig` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMigConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Python-style level name: DEBUG, INFO, WARNING, ERROR or CRITICAL.
    #[serde(default)]
    pub loglevel: Option<String>,

    /// Roster to read.
    #[serde(default)]
    pub tsv: Option<PathBuf>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub source_domain_id: Option<String>,

    #[serde(default)]
    pub destination_domain_id: Option<String>,

    /// NerdGraph URL, e.g. the EU region endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Length of the abort window before changes are committed.
    #[serde(default)]
    pub confirm_secs: Option<u64>,
}

fn default_name() -> String {
    "UserMig".to_string()
}

/// Boilerplate written when no configuration exists yet.
pub fn sample_config() -> String {
    format!(
        "usermig:\n    name: {}\n    loglevel: {}\n    tsv: filename.tsv\n    api_key: NRAK-BlahBlah\n    source_domain_id: \n    destination_domain_id: \n",
        default_name(),
        "INFO"
    )
}

/// Write the boilerplate configuration to `path`, never overwriting.
pub fn write_sample_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| match source.kind() {
            std::io::ErrorKind::AlreadyExists => ConfigError::AlreadyExists {
                path: display.clone(),
            },
            _ => ConfigError::Write {
                path: display.clone(),
                source,
            },
        })?;

    file.write_all(sample_config().as_bytes())
        .map_err(|source| ConfigError::Write {
            path: display,
            source,
        })
}

impl UserMigConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string (for testing)
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        Ok(file.usermig)
    }

    /// Log level override, if one is configured.
    pub fn log_level(&self) -> Result<Option<Level>, ConfigError> {
        let Some(level) = self.loglevel.as_deref().map(str::trim).filter(|l| !l.is_empty()) else {
            return Ok(None);
        };
        let level = match level.to_uppercase().as_str() {
            "TRACE" => Level::TRACE,
            "DEBUG" => Level::DEBUG,
            "INFO" => Level::INFO,
            "WARN" | "WARNING" => Level::WARN,
            "ERROR" | "CRITICAL" | "FATAL" => Level::ERROR,
            _ => return Err(ConfigError::InvalidLogLevel(level.to_string())),
        };
        Ok(Some(level))
    }

    pub fn roster_path(&self) -> Result<&Path, ConfigError> {
        self.tsv
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::MissingRoster)
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(NERDGRAPH_ENDPOINT)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn confirm_delay(&self) -> Duration {
        self.confirm_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONFIRM_DELAY)
    }

    /// Resolve run settings. `env_api_key` is used when the file has no key.
    pub fn settings(&self, env_api_key: Option<String>) -> Result<MigrationSettings, ConfigError> {
        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or(env_api_key.filter(|k| !k.trim().is_empty()))
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(MigrationSettings {
            api_key,
            source_domain_id: self.source_domain_id.clone(),
            destination_domain_id: self.destination_domain_id.clone(),
        })
    }
}
