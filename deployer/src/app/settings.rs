//! Process settings read from the environment

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::errors::DeployError;
use crate::logs::LogLevel;

/// Deployment environment selector (`ENVIRONMENT`)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Host label prefixed to operator notifications
    pub fn default_host_label(&self) -> &'static str {
        match self {
            Environment::Local => "localhost",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(DeployError::Config(format!("Unknown environment: {}", s))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Datastore connection settings
#[derive(Debug)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub name: String,
}

/// Settings of one deployer process
#[derive(Debug)]
pub struct Settings {
    pub environment: Environment,

    /// Prefix of notification messages, identifies the installation
    pub host_label: String,

    /// Image tag of the running release (`RELEASE_VERSION`)
    pub release_version: String,

    pub log_level: LogLevel,
    pub log_json: bool,

    /// Operator channel webhook, notifications are only logged when absent
    pub webhook_url: Option<SecretString>,

    /// Only required by the in-job `run` command
    pub database: Option<DatabaseSettings>,

    /// Upper bound of one provisioning call
    pub provisioning_timeout: Duration,

    /// Directory holding one executable per component
    pub hooks_dir: PathBuf,
}

fn default_provisioning_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_hooks_dir() -> PathBuf {
    PathBuf::from("/opt/project-deployer/components")
}

fn default_db_user() -> String {
    "apioperator".to_string()
}

fn default_db_name() -> String {
    "pyk8s".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            host_label: Environment::default().default_host_label().to_string(),
            release_version: "latest".to_string(),
            log_level: LogLevel::Info,
            log_json: false,
            webhook_url: None,
            database: None,
            provisioning_timeout: default_provisioning_timeout(),
            hooks_dir: default_hooks_dir(),
        }
    }
}

impl Settings {
    /// Read settings from the process environment, after loading `.env` if present
    pub fn from_env() -> Result<Self, DeployError> {
        // A missing .env file is the normal case inside the cluster
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DeployError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match var("ENVIRONMENT") {
            Some(value) => value.parse()?,
            None => Environment::default(),
        };

        let host_label = var("PUBLIC_HOST")
            .unwrap_or_else(|| environment.default_host_label().to_string());

        let release_version = var("RELEASE_VERSION").unwrap_or_else(|| "latest".to_string());

        let log_level = match var("LOG_LEVEL") {
            Some(value) => value.parse().map_err(DeployError::Config)?,
            None => LogLevel::default(),
        };

        let log_json = var("LOG_JSON")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let webhook_url = match var("TEAMS_WEBHOOK_URL") {
            Some(value) => {
                Url::parse(&value)
                    .map_err(|e| DeployError::Config(format!("Invalid TEAMS_WEBHOOK_URL: {}", e)))?;
                Some(SecretString::from(value))
            }
            None => None,
        };

        let database = match var("DB_IP") {
            Some(host) => {
                let port = match var("DB_PORT") {
                    Some(port) => port
                        .parse()
                        .map_err(|_| DeployError::Config(format!("Invalid DB_PORT: {}", port)))?,
                    None => 5432,
                };
                let password = var("DB_PASSWORD")
                    .ok_or_else(|| DeployError::Config("DB_PASSWORD is not set".to_string()))?;
                Some(DatabaseSettings {
                    host,
                    port,
                    user: var("DB_USER").unwrap_or_else(default_db_user),
                    password: SecretString::from(password),
                    name: var("DB_NAME").unwrap_or_else(default_db_name),
                })
            }
            None => None,
        };

        let provisioning_timeout = match var("PROVISIONING_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(secs.parse().map_err(|_| {
                DeployError::Config(format!("Invalid PROVISIONING_TIMEOUT_SECS: {}", secs))
            })?),
            None => default_provisioning_timeout(),
        };

        let hooks_dir = var("COMPONENT_HOOKS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_hooks_dir);

        Ok(Self {
            environment,
            host_label,
            release_version,
            log_level,
            log_json,
            webhook_url,
            database,
            provisioning_timeout,
            hooks_dir,
        })
    }
}
