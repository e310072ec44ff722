use crate::edit_throttle::DEFAULT_EDIT_INTERVAL;
use crate::error::{Result, WikiError};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

const ENV_PREFIX: &str = "WIKIGATE";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_USER_AGENT: &str = "wikigate/0.1.0 (MediaWiki API client) reqwest/0.12";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Configuration {
    api_url: String,
    #[serde(default = "default_user_agent")]
    user_agent: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_edit_interval_secs")]
    edit_interval_secs: f64,
    #[serde(skip)]
    edit_interval: Duration,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_edit_interval_secs() -> f64 {
    DEFAULT_EDIT_INTERVAL.as_secs_f64()
}

impl Configuration {
    /// Minimal configuration for an anonymous client.
    pub fn new(api_url: &str) -> Result<Self> {
        let ret = Self {
            api_url: api_url.to_string(),
            user_agent: default_user_agent(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            edit_interval_secs: default_edit_interval_secs(),
            edit_interval: DEFAULT_EDIT_INTERVAL,
            username: None,
            password: None,
        };
        ret.validate()
    }

    /// Reads a config file (JSON, TOML, YAML... by extension); `WIKIGATE_*` environment variables override it.
    pub fn new_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        settings.try_deserialize::<Self>()?.validate()
    }

    /// Configuration from `WIKIGATE_*` environment variables only.
    pub fn new_from_env() -> Result<Self> {
        let settings = Config::builder()
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        settings.try_deserialize::<Self>()?.validate()
    }

    fn validate(mut self) -> Result<Self> {
        let url = Url::parse(&self.api_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(WikiError::Config(config::ConfigError::Message(format!(
                "api_url must be http(s): {}",
                self.api_url
            ))));
        }
        self.edit_interval = Duration::try_from_secs_f64(self.edit_interval_secs).map_err(|e| {
            WikiError::Config(config::ConfigError::Message(format!(
                "edit_interval_secs {} is not a usable interval: {e}",
                self.edit_interval_secs
            )))
        })?;
        Ok(self)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Points the configuration at another wiki; the URL is checked like one read from a file.
    pub fn set_api_url(&mut self, api_url: &str) -> Result<()> {
        let mut changed = self.clone();
        changed.api_url = api_url.to_string();
        *self = changed.validate()?;
        Ok(())
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub const fn edit_interval(&self) -> Duration {
        self.edit_interval
    }

    pub fn set_edit_interval(&mut self, interval: Duration) {
        self.edit_interval = interval;
        self.edit_interval_secs = interval.as_secs_f64();
    }

    /// Username and password, if both are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    pub fn set_credentials(&mut self, username: &str, password: &str) {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
    }
}
