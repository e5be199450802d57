//! Headless CMS access
//!
//! The [`ContentStore`] trait is the seam between page generation and the
//! content source. [`PrismicClient`] talks to the Prismic REST API and
//! [`MemoryStore`] serves documents from memory (fixtures and tests).

mod error;
mod memory;
pub mod predicate;
mod prismic;
pub mod richtext;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use predicate::Predicate;
pub use prismic::PrismicClient;
pub use richtext::RichText;

use crate::config::CmsConfig;

/// A raw CMS document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,

    #[serde(default)]
    pub uid: Option<String>,

    #[serde(rename = "type")]
    pub doc_type: String,

    #[serde(default, deserialize_with = "de_opt_date")]
    pub first_publication_date: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "de_opt_date")]
    pub last_publication_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// One page of search results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPage<T> {
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub results_per_page: usize,
    #[serde(default)]
    pub total_results_size: usize,
    #[serde(default)]
    pub total_pages: usize,
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub prev_page: Option<String>,
    pub results: Vec<T>,
}

impl<T> ApiPage<T> {
    /// Cursor to the following page, if the store reported one
    pub fn next_cursor(&self) -> Option<Cursor> {
        self.next_page
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(Cursor::from)
    }
}

/// Opaque reference to the next page of results
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Cursor(s.to_string())
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        Cursor(s)
    }
}

/// Sort key for a query
#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub field: String,
    pub descending: bool,
}

impl Ordering {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// A search against the content store
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub predicates: Vec<Predicate>,
    /// Projected fields; empty means every field
    pub fetch: Vec<String>,
    pub page_size: usize,
    pub orderings: Vec<Ordering>,
    /// Only return documents ordered after this document id
    pub after: Option<String>,
}

impl Query {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicates: vec![predicate],
            fetch: Vec::new(),
            page_size: 20,
            orderings: Vec::new(),
            after: None,
        }
    }

    pub fn fetch(mut self, fields: Vec<String>) -> Self {
        self.fetch = fields;
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    pub fn order_by(mut self, ordering: Ordering) -> Self {
        self.orderings.push(ordering);
        self
    }

    pub fn after(mut self, id: impl Into<String>) -> Self {
        self.after = Some(id.into());
        self
    }

    /// The `orderings` parameter, e.g. `[document.first_publication_date desc]`
    pub fn orderings_param(&self) -> Option<String> {
        if self.orderings.is_empty() {
            return None;
        }
        let keys: Vec<String> = self
            .orderings
            .iter()
            .map(|o| {
                if o.descending {
                    format!("{} desc", o.field)
                } else {
                    o.field.clone()
                }
            })
            .collect();
        Some(format!("[{}]", keys.join(",")))
    }
}

/// Content source for the generator
#[allow(async_fn_in_trait)]
pub trait ContentStore {
    /// Run a search and return its first page
    async fn query(&self, query: &Query) -> Result<ApiPage<Document>>;

    /// Follow a cursor returned by a previous page
    async fn fetch_page(&self, cursor: &Cursor) -> Result<ApiPage<Document>>;

    /// Fetch a single document by type and uid
    async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Option<Document>>;
}

/// The content store selected by configuration
pub enum Store {
    Prismic(PrismicClient),
    Memory(MemoryStore),
}

impl Store {
    /// Build the store described by `config`; a fixture path wins over the endpoint
    pub fn from_config(config: &CmsConfig, base_dir: &Path) -> anyhow::Result<Self> {
        if let Some(fixture) = &config.fixture {
            let path = base_dir.join(fixture);
            let store = MemoryStore::load(&path)
                .with_context(|| format!("Failed to load CMS fixture {:?}", path))?;
            tracing::info!("Using fixture store {:?} ({} documents)", path, store.len());
            return Ok(Store::Memory(store));
        }

        tracing::debug!("Using Prismic endpoint {}", config.endpoint);
        Ok(Store::Prismic(PrismicClient::new(config)?))
    }
}

impl ContentStore for Store {
    async fn query(&self, query: &Query) -> Result<ApiPage<Document>> {
        match self {
            Store::Prismic(client) => client.query(query).await,
            Store::Memory(store) => store.query(query).await,
        }
    }

    async fn fetch_page(&self, cursor: &Cursor) -> Result<ApiPage<Document>> {
        match self {
            Store::Prismic(client) => client.fetch_page(cursor).await,
            Store::Memory(store) => store.fetch_page(cursor).await,
        }
    }

    async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Option<Document>> {
        match self {
            Store::Prismic(client) => client.get_by_uid(doc_type, uid).await,
            Store::Memory(store) => store.get_by_uid(doc_type, uid).await,
        }
    }
}

/// Prismic timestamps look like `2021-03-25T19:25:28+0000`
fn de_opt_date<'de, D>(deserializer: D) -> core::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => parse_date(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s))),
    }
}

pub(crate) fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z"))
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_prismic_date() {
        let expected = Utc.with_ymd_and_hms(2021, 3, 25, 19, 25, 28).unwrap();
        assert_eq!(parse_date("2021-03-25T19:25:28+0000"), Some(expected));
        assert_eq!(parse_date("2021-03-25T19:25:28Z"), Some(expected));
        assert_eq!(parse_date("2021-03-25T16:25:28-03:00"), Some(expected));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_document_decode() {
        let doc: Document = serde_json::from_value(serde_json::json!({
            "id": "YF1",
            "uid": "como-utilizar-hooks",
            "type": "posts",
            "first_publication_date": "2021-03-15T19:25:28+0000",
            "last_publication_date": null,
            "data": { "title": "Como utilizar Hooks" }
        }))
        .unwrap();
        assert_eq!(doc.uid.as_deref(), Some("como-utilizar-hooks"));
        assert!(doc.first_publication_date.is_some());
        assert!(doc.last_publication_date.is_none());
    }

    #[test]
    fn test_orderings_param() {
        let q = Query::new(Predicate::at("document.type", "posts"))
            .order_by(Ordering::desc("document.first_publication_date"))
            .order_by(Ordering::asc("my.posts.title"));
        assert_eq!(
            q.orderings_param().as_deref(),
            Some("[document.first_publication_date desc,my.posts.title]")
        );
        assert_eq!(
            Query::new(Predicate::at("document.type", "posts")).orderings_param(),
            None
        );
    }

    #[test]
    fn test_next_cursor_ignores_empty() {
        let page: ApiPage<Document> = serde_json::from_value(serde_json::json!({
            "next_page": "",
            "results": []
        }))
        .unwrap();
        assert!(page.next_cursor().is_none());
    }
}
