//! Request gateway for a single MediaWiki `api.php` endpoint.
//!
//! Read-only actions are plain GET requests and run concurrently. Everything that
//! changes the wiki goes through [`HttpClient::submit`], which serializes and paces
//! submissions via the client's [`EditThrottle`].

use crate::configuration::Configuration;
use crate::edit_throttle::EditThrottle;
use crate::error::{Result, WikiError};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Token MediaWiki accepts for edits by logged-out users, on wikis that allow those.
pub const ANONYMOUS_TOKEN: &str = "+\\";

pub type Params = HashMap<String, String>;

/// View and edit URL of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiUrls {
    pub view: String,
    pub edit: String,
}

#[derive(Debug)]
pub struct HttpClient {
    url: String,
    client: reqwest::Client,
    logged_in: AtomicBool,
    throttle: EditThrottle,
}

/// Convert a slice of string tuples to owned request parameters
pub fn params_from(v: &[(&str, &str)]) -> Params {
    v.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl HttpClient {
    /// Anonymous client with default settings.
    pub fn new(api_url: &str) -> Result<Self> {
        Self::from_configuration(&Configuration::new(api_url)?)
    }

    pub fn from_configuration(config: &Configuration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent())
            .cookie_store(true)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;
        Ok(Self::with_client(
            config.api_url(),
            client,
            config.edit_interval(),
        ))
    }

    /// Uses an existing reqwest client, which should keep cookies if you want to log in.
    pub fn with_client(api_url: &str, client: reqwest::Client, edit_interval: Duration) -> Self {
        Self {
            url: api_url.to_string(),
            client,
            logged_in: AtomicBool::new(false),
            throttle: EditThrottle::new(edit_interval),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        self.logged_in.store(logged_in, Ordering::SeqCst);
    }

    pub const fn throttle(&self) -> &EditThrottle {
        &self.throttle
    }

    async fn get_json(&self, params: &[(&str, &str)]) -> Result<Value> {
        let mut query = params.to_vec();
        query.push(("format", "json"));
        debug!("GET {} {:?}", self.url, query);
        let j = self
            .client
            .get(&self.url)
            .query(&query)
            .send()
            .await?
            .json::<Value>()
            .await?;
        Ok(j)
    }

    async fn post_json(&self, params: &Params) -> Result<Value> {
        debug!(
            "POST {} action={}",
            self.url,
            params.get("action").map(|s| s.as_str()).unwrap_or("?")
        );
        let j = self
            .client
            .post(&self.url)
            .form(params)
            .send()
            .await?
            .json::<Value>()
            .await?;
        Ok(j)
    }

    /// Gets a fresh token of the given type ("csrf", "login", "createaccount", "userrights"...).
    pub async fn get_token(&self, kind: &str) -> Result<String> {
        let j = self
            .get_json(&[("action", "query"), ("meta", "tokens"), ("type", kind)])
            .await?;
        let key = format!("{kind}token");
        match j["query"]["tokens"][key.as_str()].as_str() {
            Some(token) => Ok(token.to_string()),
            None => {
                let info = WikiError::info_from(&j)
                    .unwrap_or_else(|| format!("No {key} in API response"));
                warn!("Could not get {kind} token: {info}");
                Err(WikiError::TokenGet(info))
            }
        }
    }

    /// Submits a state-changing action. Waits for the edit throttle, then
    /// attaches a fresh token and `action`/`format`, leaving all other fields as given.
    pub async fn submit(&self, action: &str, mut params: Params) -> Result<Value> {
        let _pass = self.throttle.pass(action).await;
        let token = if self.is_logged_in() {
            self.get_token("csrf").await?
        } else {
            ANONYMOUS_TOKEN.to_string()
        };
        params.insert("action".to_string(), action.to_string());
        params.insert("format".to_string(), "json".to_string());
        params.insert("token".to_string(), token);
        let j = self.post_json(&params).await?;
        if j["error"].is_object() {
            let info = j["error"]["info"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string();
            warn!("{action} failed: {info}");
            return Err(WikiError::Edit(info));
        }
        info!("{action} done");
        Ok(j)
    }

    pub async fn edit_page(&self, params: Params) -> Result<Value> {
        self.submit("edit", params).await
    }

    pub async fn move_page(&self, params: Params) -> Result<Value> {
        self.submit("move", params).await
    }

    /// Logs in via `clientlogin`; the session cookie is kept by the reqwest client.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let token = self.get_token("login").await?;
        let params = params_from(&[
            ("action", "clientlogin"),
            ("format", "json"),
            ("username", username),
            ("password", password),
            ("loginreturnurl", self.url.as_str()),
            ("rememberMe", "1"),
            ("logintoken", token.as_str()),
        ]);
        let j = self.post_json(&params).await?;
        if let Some(info) = WikiError::info_from(&j) {
            return Err(WikiError::LoginFailure(info));
        }
        let message = j["clientlogin"]["message"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        match j["clientlogin"]["status"].as_str() {
            Some("PASS") => {
                self.set_logged_in(true);
                info!("Logged in as {username}");
                Ok(())
            }
            Some("FAIL") => Err(WikiError::LoginFailure(message)),
            Some(status) => Err(WikiError::LoginFailure(format!(
                "Unsupported login status {status}: {message}"
            ))),
            None => Err(WikiError::UnexpectedResponse(
                "No clientlogin status".to_string(),
            )),
        }
    }

    /// Creates an account. `params` holds `username`, `password`, `retype` etc.
    pub async fn create_account(&self, mut params: Params) -> Result<()> {
        let token = self.get_token("createaccount").await?;
        params.insert("action".to_string(), "createaccount".to_string());
        params.insert("format".to_string(), "json".to_string());
        params.insert("createreturnurl".to_string(), self.url.clone());
        params.insert("createtoken".to_string(), token);
        let j = self.post_json(&params).await?;
        if let Some(e) = WikiError::api_from(&j) {
            return Err(e);
        }
        match j["createaccount"]["status"].as_str() {
            Some("PASS") => Ok(()),
            Some("FAIL") => Err(WikiError::CreateAccount(
                j["createaccount"]["messagecode"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
            )),
            Some(status) => Err(WikiError::CreateAccount(format!(
                "Unsupported status {status}: {}",
                j["createaccount"]["message"].as_str().unwrap_or_default()
            ))),
            None => Err(WikiError::UnexpectedResponse(
                "No createaccount status".to_string(),
            )),
        }
    }

    /// Changes user groups. `params` holds `user`, `add`, `remove`, `reason` etc.
    /// Paced by the edit throttle like `submit`, but with a `userrights` token.
    pub async fn user_rights(&self, mut params: Params) -> Result<()> {
        let _pass = self.throttle.pass("userrights").await;
        let token = self.get_token("userrights").await?;
        params.insert("action".to_string(), "userrights".to_string());
        params.insert("format".to_string(), "json".to_string());
        params.insert("token".to_string(), token);
        let j = self.post_json(&params).await?;
        if let Some(warning) = j["warnings"].get("userrights") {
            let text = warning["warnings"]
                .as_str()
                .or_else(|| warning["*"].as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| warning.to_string());
            return Err(WikiError::InvalidGroup(text));
        }
        if let Some(result) = j["userrights"].as_object() {
            let is_empty = |key: &str| {
                result
                    .get(key)
                    .and_then(|v| v.as_array())
                    .is_none_or(|a| a.is_empty())
            };
            if is_empty("added") && is_empty("removed") {
                return Err(WikiError::UserRightsNotChanged(
                    "User rights are the same after this action or current session is not allowed to change user rights".to_string(),
                ));
            }
            return Ok(());
        }
        match WikiError::api_from(&j) {
            Some(WikiError::Api { code, info }) if code == "nosuchuser" => {
                Err(WikiError::NoSuchUser(info))
            }
            Some(e) => Err(e),
            None => Err(WikiError::UnexpectedResponse(
                "No userrights result".to_string(),
            )),
        }
    }

    /// Random page titles from one namespace.
    pub async fn get_random_pages(&self, num: usize, namespace: i64) -> Result<Vec<String>> {
        let num = num.to_string();
        let namespace = namespace.to_string();
        let j = self
            .get_json(&[
                ("action", "query"),
                ("list", "random"),
                ("rnlimit", num.as_str()),
                ("rnnamespace", namespace.as_str()),
            ])
            .await?;
        let random = j["query"]["random"]
            .as_array()
            .ok_or_else(|| Self::unexpected(&j, "No random pages in response"))?;
        Ok(random
            .iter()
            .filter_map(|p| p["title"].as_str())
            .map(|s| s.to_string())
            .collect())
    }

    /// `prop=info` for a page, with optional `inprop` values. Missing pages come back with a `missing` key.
    pub async fn get_info(&self, title: &str, props: &[&str]) -> Result<Value> {
        let inprop = props.join("|");
        let j = self
            .get_json(&[
                ("action", "query"),
                ("titles", title),
                ("prop", "info"),
                ("inprop", inprop.as_str()),
            ])
            .await?;
        Self::first_page(&j).ok_or_else(|| Self::unexpected(&j, "No pages in response"))
    }

    /// Resolves a redirect. Returns the target title (with `#section` if the redirect points to one) and the target's page info.
    pub async fn get_redirects(&self, title: &str) -> Result<(String, Value)> {
        let j = self
            .get_json(&[
                ("action", "query"),
                ("titles", title),
                ("prop", "info"),
                ("redirects", "1"),
            ])
            .await?;
        let mut title = title.to_string();
        if let Some(normalized) = j["query"]["normalized"].as_array() {
            if let Some(to) = normalized
                .iter()
                .find(|item| item["from"].as_str() == Some(title.as_str()))
                .and_then(|item| item["to"].as_str())
            {
                title = to.to_string();
            }
        }
        let target = j["query"]["redirects"]
            .as_array()
            .and_then(|redirects| {
                redirects
                    .iter()
                    .find(|item| item["from"].as_str() == Some(title.as_str()))
            })
            .and_then(|item| {
                let to = item["to"].as_str()?;
                match item["tofragment"].as_str() {
                    Some(fragment) if !fragment.is_empty() => Some(format!("{to}#{fragment}")),
                    _ => Some(to.to_string()),
                }
            })
            .ok_or_else(|| WikiError::PageNotFound(format!("{title} is not a redirect")))?;
        let page = Self::first_page(&j).ok_or_else(|| Self::unexpected(&j, "No pages in response"))?;
        Ok((target, page))
    }

    /// Rendered page HTML.
    pub async fn get_html(&self, title: &str) -> Result<String> {
        let j = self.get_json(&[("action", "parse"), ("page", title)]).await?;
        j["parse"]["text"]["*"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                WikiError::PageNotFound("Unknown page or error when getting html".to_string())
            })
    }

    /// Current wikitext of a page.
    pub async fn get_markdown(&self, title: &str) -> Result<String> {
        let j = self
            .get_json(&[
                ("action", "query"),
                ("titles", title),
                ("prop", "revisions"),
                ("rvprop", "content"),
                ("formatversion", "2"),
            ])
            .await?;
        j["query"]["pages"][0]["revisions"][0]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                WikiError::PageNotFound(
                    "Unknown page or error when getting markdown".to_string(),
                )
            })
    }

    /// Plain-text intro of a page (TextExtracts).
    pub async fn get_summary(&self, title: &str) -> Result<String> {
        let j = self
            .get_json(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", ""),
                ("explaintext", ""),
                ("titles", title),
            ])
            .await?;
        Self::first_page(&j)
            .and_then(|page| page["extract"].as_str().map(|s| s.to_string()))
            .ok_or_else(|| {
                WikiError::PageNotFound("Unknown page or error when getting summary".to_string())
            })
    }

    /// Title search; returns up to `limit` matching titles.
    pub async fn opensearch(
        &self,
        search: &str,
        limit: usize,
        namespace: i64,
    ) -> Result<Vec<String>> {
        let limit = limit.to_string();
        let namespace = namespace.to_string();
        let j = self
            .get_json(&[
                ("action", "opensearch"),
                ("search", search),
                ("limit", limit.as_str()),
                ("namespace", namespace.as_str()),
            ])
            .await?;
        let titles = j[1]
            .as_array()
            .ok_or_else(|| Self::unexpected(&j, "No titles in opensearch response"))?;
        Ok(titles
            .iter()
            .filter_map(|t| t.as_str())
            .map(|s| s.to_string())
            .collect())
    }

    /// View and edit URL of the first page at or after `title`.
    pub async fn get_urls(&self, title: &str) -> Result<WikiUrls> {
        let j = self
            .get_json(&[
                ("action", "query"),
                ("prop", "info"),
                ("generator", "allpages"),
                ("inprop", "url"),
                ("gapfrom", title),
                ("gaplimit", "1"),
            ])
            .await?;
        let page = Self::first_page(&j).ok_or_else(|| {
            WikiError::PageNotFound("Unknown page or error when getting page URLs".to_string())
        })?;
        match (page["fullurl"].as_str(), page["editurl"].as_str()) {
            (Some(view), Some(edit)) => Ok(WikiUrls {
                view: view.to_string(),
                edit: edit.to_string(),
            }),
            _ => Err(Self::unexpected(&j, "Page has no URLs")),
        }
    }

    /// URLs of all files used on a page. Unknown pages and pages without files give an empty list.
    pub async fn get_media(&self, title: &str) -> Result<Vec<String>> {
        let j = self
            .get_json(&[("action", "query"), ("titles", title), ("prop", "images")])
            .await?;
        let images: Vec<&str> = match Self::first_page_ref(&j).and_then(|p| p["images"].as_array()) {
            Some(images) => images.iter().filter_map(|i| i["title"].as_str()).collect(),
            None => return Ok(vec![]),
        };
        if images.is_empty() {
            return Ok(vec![]);
        }
        let titles = images.join("|");
        let j = self
            .get_json(&[
                ("action", "query"),
                ("titles", titles.as_str()),
                ("prop", "imageinfo"),
                ("iiprop", "url"),
            ])
            .await?;
        Ok(j["query"]["pages"]
            .as_object()
            .map(|pages| {
                pages
                    .values()
                    .filter_map(|p| p["imageinfo"][0]["url"].as_str())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn first_page_ref(j: &Value) -> Option<&Value> {
        match &j["query"]["pages"] {
            Value::Object(pages) => pages.values().next(),
            Value::Array(pages) => pages.first(),
            _ => None,
        }
    }

    fn first_page(j: &Value) -> Option<Value> {
        Self::first_page_ref(j).cloned()
    }

    fn unexpected(j: &Value, message: &str) -> WikiError {
        WikiError::api_from(j).unwrap_or_else(|| WikiError::UnexpectedResponse(message.to_string()))
    }
}
