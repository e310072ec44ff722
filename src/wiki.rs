use crate::configuration::Configuration;
use crate::error::Result;
use crate::http_client::{HttpClient, Params};
use crate::page::Page;
use log::info;
use std::sync::Arc;

/// Entry point for working with one wiki.
#[derive(Debug, Clone)]
pub struct Wiki {
    http: Arc<HttpClient>,
}

impl Wiki {
    /// Anonymous access to the wiki at `api_url` (the full `api.php` URL).
    pub fn new(api_url: &str) -> Result<Self> {
        Ok(Self::from_http(HttpClient::new(api_url)?))
    }

    /// Builds the client from a configuration, logging in if credentials are set.
    pub async fn from_configuration(config: &Configuration) -> Result<Self> {
        let ret = Self::from_http(HttpClient::from_configuration(config)?);
        if let Some((username, password)) = config.credentials() {
            ret.login(username, password).await?;
        }
        Ok(ret)
    }

    pub fn from_http(http: HttpClient) -> Self {
        Self {
            http: Arc::new(http),
        }
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    pub fn is_logged_in(&self) -> bool {
        self.http.is_logged_in()
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        self.http.login(username, password).await
    }

    pub async fn create_account(&self, params: Params) -> Result<()> {
        let username = params.get("username").cloned().unwrap_or_default();
        self.http.create_account(params).await?;
        info!("Created account {username}");
        Ok(())
    }

    pub async fn user_rights(&self, params: Params) -> Result<()> {
        self.http.user_rights(params).await
    }

    pub fn get_page(&self, title: &str) -> Page {
        Page::new(title, self.http.clone())
    }

    pub async fn get_random_pages(&self, num: usize, namespace: i64) -> Result<Vec<Page>> {
        Ok(self
            .http
            .get_random_pages(num, namespace)
            .await?
            .iter()
            .map(|title| self.get_page(title))
            .collect())
    }

    pub async fn opensearch(&self, search: &str, limit: usize, namespace: i64) -> Result<Vec<Page>> {
        Ok(self
            .http
            .opensearch(search, limit, namespace)
            .await?
            .iter()
            .map(|title| self.get_page(title))
            .collect())
    }
}
