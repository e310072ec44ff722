//! Async client for the MediaWiki action API.
//!
//! Reads go straight to `api.php`; edits, moves and other changes are paced by
//! a per-client [`edit_throttle::EditThrottle`] and carry a freshly fetched token.

#[macro_use]
extern crate lazy_static;

pub mod configuration;
pub mod edit_throttle;
pub mod error;
pub mod html_text;
pub mod http_client;
pub mod page;
pub mod wiki;

pub use configuration::Configuration;
pub use edit_throttle::{DEFAULT_EDIT_INTERVAL, EditThrottle};
pub use error::{Result, WikiError};
pub use http_client::{ANONYMOUS_TOKEN, HttpClient, Params, WikiUrls, params_from};
pub use page::Page;
pub use wiki::Wiki;
