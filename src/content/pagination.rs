//! "Load more" pagination
//!
//! The accumulator owns the posts shown so far and the cursor to the next
//! page. Loading is split in two steps so that a trigger arriving while a
//! fetch is outstanding is refused instead of racing the first one.

use std::collections::HashSet;

use super::PostSummary;
use crate::cms::{self, ApiPage, ContentStore, Cursor, Document};
use crate::config::OnError;

/// Result of a "load more" trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was appended
    Loaded { added: usize },
    /// No cursor left; nothing to do
    Exhausted,
    /// Another load is in flight
    Busy,
    /// The fetch failed and the error was absorbed
    Failed,
}

/// Proof that a load was started; consumed when it completes
#[derive(Debug)]
pub struct Ticket {
    cursor: Cursor,
}

impl Ticket {
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }
}

/// Append-only list of post summaries plus the cursor to the next page
#[derive(Debug)]
pub struct Accumulator {
    cursor: Option<Cursor>,
    posts: Vec<PostSummary>,
    seen: HashSet<Cursor>,
    in_flight: bool,
    on_error: OnError,
}

impl Accumulator {
    /// Start from the first page of a listing query
    pub fn new(first: ApiPage<Document>, on_error: OnError) -> Self {
        let mut acc = Self {
            cursor: None,
            posts: Vec::new(),
            seen: HashSet::new(),
            in_flight: false,
            on_error,
        };
        acc.append(first);
        acc
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.posts
    }

    pub fn into_posts(self) -> Vec<PostSummary> {
        self.posts
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// Claim the cursor for a fetch. Refused while busy or exhausted.
    pub fn begin_load(&mut self) -> Result<Ticket, LoadOutcome> {
        if self.in_flight {
            return Err(LoadOutcome::Busy);
        }
        let cursor = self.cursor.clone().ok_or(LoadOutcome::Exhausted)?;
        self.in_flight = true;
        Ok(Ticket { cursor })
    }

    /// Apply the result of a fetch started with [`Accumulator::begin_load`].
    ///
    /// On failure the posts and cursor are left untouched; the error is
    /// returned or absorbed depending on the configured policy.
    pub fn complete_load(
        &mut self,
        ticket: Ticket,
        result: cms::Result<ApiPage<Document>>,
    ) -> cms::Result<LoadOutcome> {
        self.in_flight = false;

        match result {
            Ok(page) => {
                self.seen.insert(ticket.cursor);
                let added = self.append(page);
                Ok(LoadOutcome::Loaded { added })
            }
            Err(e) => match self.on_error {
                OnError::Ignore => {
                    tracing::warn!("Failed to load page {}: {}", ticket.cursor.as_str(), e);
                    Ok(LoadOutcome::Failed)
                }
                OnError::Report => Err(e),
            },
        }
    }

    /// Follow the cursor once
    pub async fn load_more<S: ContentStore>(&mut self, store: &S) -> cms::Result<LoadOutcome> {
        let ticket = match self.begin_load() {
            Ok(ticket) => ticket,
            Err(outcome) => return Ok(outcome),
        };
        let result = store.fetch_page(ticket.cursor()).await;
        self.complete_load(ticket, result)
    }

    /// Append a page's results in order and take over its cursor
    fn append(&mut self, page: ApiPage<Document>) -> usize {
        let next = page.next_cursor();
        let before = self.posts.len();

        for doc in &page.results {
            match PostSummary::from_document(doc) {
                Some(post) => self.posts.push(post),
                None => tracing::warn!("Skipping document {} without uid", doc.id),
            }
        }

        self.cursor = match next {
            Some(cursor) if self.seen.contains(&cursor) => {
                tracing::warn!("Cursor {} was already followed, stopping", cursor.as_str());
                None
            }
            other => other,
        };

        self.posts.len() - before
    }
}
