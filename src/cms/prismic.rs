//! Prismic REST API client

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::predicate::{self, Predicate};
use super::{ApiPage, ContentStore, Cursor, Document, Error, Query, Result};
use crate::config::CmsConfig;

/// How long a resolved master ref is reused before asking the API again
const REF_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct ApiInfo {
    #[serde(default)]
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

/// Client for a Prismic repository
pub struct PrismicClient {
    client: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
    master_ref: Mutex<Option<(String, Instant)>>,
}

impl PrismicClient {
    pub fn new(config: &CmsConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(Error::MissingEndpoint);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .default_headers({
                let mut headers = HeaderMap::new();
                headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
                headers
            })
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
            master_ref: Mutex::new(None),
        })
    }

    /// Resolve the ref pointing at the currently published content
    async fn master_ref(&self) -> Result<String> {
        let mut cached = self.master_ref.lock().await;
        if let Some((reference, fetched_at)) = cached.as_ref() {
            if fetched_at.elapsed() < REF_TTL {
                return Ok(reference.clone());
            }
        }

        let mut url = Url::parse(&self.endpoint).map_err(|_| Error::MissingEndpoint)?;
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        let info: ApiInfo = self.get_json(url).await?;
        let reference = info
            .refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or(Error::MissingMasterRef)?;

        tracing::debug!("Resolved master ref {}", reference);
        *cached = Some((reference.clone(), Instant::now()));
        Ok(reference)
    }

    /// Build the search URL for a query against a given ref
    fn search_url(&self, query: &Query, reference: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/documents/search", self.endpoint))
            .map_err(|_| Error::MissingEndpoint)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("ref", reference);
            pairs.append_pair("q", &predicate::to_query_param(&query.predicates));
            if !query.fetch.is_empty() {
                pairs.append_pair("fetch", &query.fetch.join(","));
            }
            pairs.append_pair("pageSize", &query.page_size.to_string());
            if let Some(orderings) = query.orderings_param() {
                pairs.append_pair("orderings", &orderings);
            }
            if let Some(after) = &query.after {
                pairs.append_pair("after", after);
            }
            if let Some(token) = &self.access_token {
                pairs.append_pair("access_token", token);
            }
        }
        Ok(url)
    }

    /// Cursor URLs carry the original parameters; make sure the token travels too
    fn cursor_url(&self, cursor: &Cursor) -> Result<Url> {
        let mut url =
            Url::parse(cursor.as_str()).map_err(|_| Error::UnknownCursor(cursor.as_str().into()))?;
        if let Some(token) = &self.access_token {
            if !url.query_pairs().any(|(k, _)| k == "access_token") {
                url.query_pairs_mut().append_pair("access_token", token);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::debug!("GET {}", redact(&url));
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                status,
                url: redact(&url),
            });
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl ContentStore for PrismicClient {
    async fn query(&self, query: &Query) -> Result<ApiPage<Document>> {
        let reference = self.master_ref().await?;
        let url = self.search_url(query, &reference)?;
        self.get_json(url).await
    }

    async fn fetch_page(&self, cursor: &Cursor) -> Result<ApiPage<Document>> {
        let url = self.cursor_url(cursor)?;
        self.get_json(url).await
    }

    async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Option<Document>> {
        let query = Query::new(Predicate::uid(doc_type, uid)).page_size(1);
        let page = self.query(&query).await?;
        Ok(page.results.into_iter().next())
    }
}

/// Strip the access token before a URL reaches logs or error messages
fn redact(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "access_token") {
        return url.to_string();
    }
    let mut clean = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "access_token" {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    clean.query_pairs_mut().clear().extend_pairs(pairs);
    clean.to_string()
}
