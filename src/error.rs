//! Error type shared by every wiki call.

use serde_json::Value;

#[derive(thiserror::Error, Debug)]
pub enum WikiError {
    #[error("Could not get token: {0}")]
    TokenGet(String),
    #[error("Edit failed: {0}")]
    Edit(String),
    #[error("Login failed: {0}")]
    LoginFailure(String),
    #[error("Could not create account: {0}")]
    CreateAccount(String),
    #[error("Invalid user group: {0}")]
    InvalidGroup(String),
    #[error("User rights not changed: {0}")]
    UserRightsNotChanged(String),
    #[error("No such user: {0}")]
    NoSuchUser(String),
    #[error("Page not found: {0}")]
    PageNotFound(String),
    #[error("API error {code}: {info}")]
    Api { code: String, info: String },
    #[error("Unexpected API response: {0}")]
    UnexpectedResponse(String),
    #[error("Network I/O error {0}")]
    Http(#[from] reqwest::Error),
    #[error("Error parsing JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, WikiError>;

impl WikiError {
    /// Reads `error.info` from an API response, for messages that should carry the server's explanation.
    pub(crate) fn info_from(j: &Value) -> Option<String> {
        j["error"]["info"].as_str().map(|s| s.to_string())
    }

    /// Builds a generic API error from a top-level `error` object, if there is one.
    pub(crate) fn api_from(j: &Value) -> Option<Self> {
        let error = j["error"].as_object()?;
        Some(Self::Api {
            code: error
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("unknown")
                .to_string(),
            info: error
                .get("info")
                .and_then(|i| i.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }
}
