use crate::error::Result;
use crate::html_text::clean_html;
use crate::http_client::{HttpClient, params_from};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A page on a wiki. Usually obtained via [`crate::wiki::Wiki::get_page`].
#[derive(Debug, Clone)]
pub struct Page {
    title: String,
    http: Arc<HttpClient>,
    info: OnceCell<Value>,
    redirect_target: OnceCell<Box<Page>>,
}

impl Page {
    pub fn new(title: &str, http: Arc<HttpClient>) -> Self {
        Self {
            title: title.to_string(),
            http,
            info: OnceCell::new(),
            redirect_target: OnceCell::new(),
        }
    }

    /// A page whose `prop=info` data is already known.
    pub fn new_with_info(title: &str, http: Arc<HttpClient>, info: Value) -> Self {
        Self {
            title: title.to_string(),
            http,
            info: OnceCell::new_with(Some(info)),
            redirect_target: OnceCell::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Page info, loaded on first use and cached afterwards.
    pub async fn info(&self) -> Result<&Value> {
        self.info
            .get_or_try_init(|| self.http.get_info(&self.title, &[]))
            .await
    }

    pub async fn exists(&self) -> Result<bool> {
        Ok(self.info().await?.get("missing").is_none())
    }

    pub async fn is_redirected(&self) -> Result<bool> {
        Ok(self.info().await?.get("redirect").is_some())
    }

    /// The page this one redirects to, or `None` for a regular page.
    pub async fn redirect_target(&self) -> Result<Option<Page>> {
        if !self.is_redirected().await? {
            return Ok(None);
        }
        let target = self
            .redirect_target
            .get_or_try_init(|| async {
                let (title, info) = self.http.get_redirects(&self.title).await?;
                Ok::<_, crate::error::WikiError>(Box::new(Page::new_with_info(
                    &title,
                    self.http.clone(),
                    info,
                )))
            })
            .await?;
        Ok(Some(target.as_ref().clone()))
    }

    /// The rendered page without HTML markup.
    pub async fn text(&self) -> Result<String> {
        let raw_html = self.http.get_html(&self.title).await?;
        Ok(clean_html(&raw_html))
    }

    /// Replaces the page content.
    pub async fn edit(&self, content: &str, summary: &str) -> Result<()> {
        let params = params_from(&[
            ("title", self.title.as_str()),
            ("text", content),
            ("summary", summary),
        ]);
        self.http.edit_page(params).await?;
        Ok(())
    }

    /// Moves the page (and its talk page) to `target`; `redirect` leaves a redirect behind.
    pub async fn move_to(&self, target: &str, reason: &str, redirect: bool) -> Result<()> {
        let mut params = params_from(&[
            ("from", self.title.as_str()),
            ("to", target),
            ("reason", reason),
            ("movetalk", ""),
        ]);
        if !redirect {
            params.insert("noredirect".to_string(), String::new());
        }
        self.http.move_page(params).await?;
        Ok(())
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}
