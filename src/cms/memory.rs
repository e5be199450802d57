//! In-memory content store
//!
//! Serves documents loaded from a JSON fixture. Cursors are synthetic
//! (`memory://page/<n>`); a query page always gets the same cursor, so
//! repeated listings reuse them.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use super::predicate::resolve_path;
use super::{ApiPage, ContentStore, Cursor, Document, Error, Query, Result};

const CURSOR_PREFIX: &str = "memory://page/";

#[derive(Deserialize)]
#[serde(untagged)]
enum Fixture {
    List(Vec<Document>),
    Page { results: Vec<Document> },
}

/// Documents held in memory, in store order
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Vec<Document>,
    cursors: Mutex<HashMap<String, (Query, usize)>>,
}

impl MemoryStore {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Load a fixture: either a document array or a search response body
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let documents = match serde_json::from_str(&content)? {
            Fixture::List(docs) => docs,
            Fixture::Page { results } => results,
        };
        Ok(Self::new(documents))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// All matching documents, sorted and positioned after `query.after`
    fn matching(&self, query: &Query) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .documents
            .iter()
            .filter(|d| query.predicates.iter().all(|p| p.matches(d)))
            .cloned()
            .collect();

        // Stable sort, applied from the least significant key
        for ordering in query.orderings.iter().rev() {
            docs.sort_by(|a, b| {
                let ord = sort_key(a, &ordering.field).cmp(&sort_key(b, &ordering.field));
                if ordering.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        if let Some(after) = &query.after {
            match docs.iter().position(|d| &d.id == after) {
                Some(pos) => docs.drain(..=pos).for_each(drop),
                None => docs.clear(),
            }
        }

        docs
    }

    /// Cursor of `page` of `query`, registered on first use
    fn cursor_for(&self, query: &Query, page: usize) -> String {
        let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
        let known = cursors
            .iter()
            .find(|(_, (q, p))| *p == page && q == query)
            .map(|(key, _)| key.clone());
        known.unwrap_or_else(|| {
            let key = format!("{}{}", CURSOR_PREFIX, cursors.len() + 1);
            cursors.insert(key.clone(), (query.clone(), page));
            key
        })
    }

    /// Slice one page out of a query and register the cursor for the next
    fn page(&self, query: &Query, page: usize) -> ApiPage<Document> {
        let docs = self.matching(query);
        let per_page = query.page_size.max(1);
        let total = docs.len();
        let total_pages = total.div_ceil(per_page);

        let results: Vec<Document> = docs
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .map(|d| project(d, &query.fetch))
            .collect();

        let next_page = (page < total_pages).then(|| self.cursor_for(query, page + 1));

        ApiPage {
            page,
            results_per_page: per_page,
            total_results_size: total,
            total_pages,
            next_page,
            prev_page: None,
            results,
        }
    }
}

impl ContentStore for MemoryStore {
    async fn query(&self, query: &Query) -> Result<ApiPage<Document>> {
        Ok(self.page(query, 1))
    }

    async fn fetch_page(&self, cursor: &Cursor) -> Result<ApiPage<Document>> {
        let entry = {
            let cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
            cursors.get(cursor.as_str()).cloned()
        };
        let (query, page) = entry.ok_or_else(|| Error::UnknownCursor(cursor.as_str().into()))?;
        Ok(self.page(&query, page))
    }

    async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Option<Document>> {
        Ok(self
            .documents
            .iter()
            .find(|d| d.doc_type == doc_type && d.uid.as_deref() == Some(uid))
            .cloned())
    }
}

/// Sort key; dates compare correctly as RFC 3339 strings in UTC
fn sort_key(doc: &Document, field: &str) -> Option<String> {
    match field {
        "document.first_publication_date" => doc.first_publication_date.map(|d| d.to_rfc3339()),
        "document.last_publication_date" => doc.last_publication_date.map(|d| d.to_rfc3339()),
        _ => resolve_path(doc, field),
    }
}

/// Keep only the projected `type.field` entries of `data`
fn project(mut doc: Document, fetch: &[String]) -> Document {
    if fetch.is_empty() {
        return doc;
    }
    let prefix = format!("{}.", doc.doc_type);
    doc.data.retain(|key, _| {
        fetch
            .iter()
            .any(|f| f.strip_prefix(&prefix) == Some(key.as_str()))
    });
    doc
}
