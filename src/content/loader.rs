//! Content loader - fetches listing pages, paths and posts from the store

use chrono::{DateTime, Utc};

use super::pagination::Accumulator;
use super::siblings::Siblings;
use super::{PostDetail, PostSummary, SiblingPost};
use crate::cms::{self, ContentStore, Document, Ordering, Predicate, Query};
use crate::config::{OnError, SiteConfig};

const PUBLICATION_DATE: &str = "document.first_publication_date";

/// A post known ahead of time, with enough data to decide whether its page is stale
#[derive(Debug, Clone)]
pub struct StaticPath {
    pub summary: PostSummary,
    pub last_publication_date: Option<DateTime<Utc>>,
}

/// Chronological neighbour direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The next older post
    Prior,
    /// The next newer post
    Next,
}

/// Loads content from the configured store
pub struct ContentLoader<'a, S> {
    config: &'a SiteConfig,
    store: &'a S,
}

impl<'a, S: ContentStore> ContentLoader<'a, S> {
    pub fn new(config: &'a SiteConfig, store: &'a S) -> Self {
        Self { config, store }
    }

    fn posts_query(&self, page_size: usize) -> Query {
        Query::new(Predicate::at("document.type", &self.config.cms.document_type))
            .fetch(self.config.cms.projected_fields())
            .page_size(page_size)
            .order_by(Ordering::desc(PUBLICATION_DATE))
    }

    /// First listing page, newest first
    pub async fn listing(&self) -> cms::Result<Accumulator> {
        let query = self.posts_query(self.config.cms.page_size);
        let first = self.store.query(&query).await?;
        tracing::debug!(
            "Listing page 1: {} results, next page: {}",
            first.results.len(),
            first.next_page.is_some()
        );
        Ok(Accumulator::new(first, self.config.pagination.on_error))
    }

    /// Every post, following cursors to the end
    pub async fn all_posts(&self) -> cms::Result<Vec<PostSummary>> {
        let query = self.posts_query(self.config.cms.paths_page_size);
        let first = self.store.query(&query).await?;
        let mut acc = Accumulator::new(first, OnError::Report);
        while acc.has_more() {
            acc.load_more(self.store).await?;
        }
        Ok(acc.into_posts())
    }

    /// Posts rendered ahead of time; bounded to one page of `paths_page_size`
    pub async fn static_paths(&self) -> cms::Result<Vec<StaticPath>> {
        let query = self.posts_query(self.config.cms.paths_page_size);
        let page = self.store.query(&query).await?;
        if page.next_page.is_some() {
            tracing::info!(
                "More than {} posts; the rest are rendered on first request",
                self.config.cms.paths_page_size
            );
        }
        Ok(page
            .results
            .iter()
            .filter_map(|doc| {
                Some(StaticPath {
                    summary: PostSummary::from_document(doc)?,
                    last_publication_date: doc.last_publication_date,
                })
            })
            .collect())
    }

    /// Fetch a post document and its parsed form
    pub async fn post(&self, uid: &str) -> cms::Result<Option<(Document, PostDetail)>> {
        let doc = self
            .store
            .get_by_uid(&self.config.cms.document_type, uid)
            .await?;
        Ok(doc.and_then(|doc| {
            let detail = PostDetail::from_document(&doc)?;
            Some((doc, detail))
        }))
    }

    /// Indexed neighbour lookup: one query of page size 1 positioned after `doc`
    pub async fn adjacent(
        &self,
        doc: &Document,
        direction: Direction,
    ) -> cms::Result<Option<PostSummary>> {
        let ordering = match direction {
            Direction::Prior => Ordering::desc(PUBLICATION_DATE),
            Direction::Next => Ordering::asc(PUBLICATION_DATE),
        };
        let query = Query::new(Predicate::at("document.type", &self.config.cms.document_type))
            .fetch(self.config.cms.projected_fields())
            .page_size(1)
            .order_by(ordering)
            .after(&doc.id);
        let page = self.store.query(&query).await?;
        Ok(page.results.first().and_then(PostSummary::from_document))
    }

    /// Prior and next post resolved by the store
    pub async fn remote_siblings(&self, doc: &Document) -> cms::Result<Siblings> {
        let prior = self.adjacent(doc, Direction::Prior).await?;
        let next = self.adjacent(doc, Direction::Next).await?;
        Ok(Siblings {
            prior: prior.as_ref().map(SiblingPost::from),
            next: next.as_ref().map(SiblingPost::from),
        })
    }
}
