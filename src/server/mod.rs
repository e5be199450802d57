//! Local server with on-demand rendering and background revalidation
//!
//! Post pages that were never rendered are answered with the loading page
//! while they render in the background; slugs the store does not know end
//! up as 404s. Stale pages are served as they are and regenerated behind
//! the response.

use anyhow::Result;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Response},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::cache::CacheDb;
use crate::cms::Store;
use crate::generator::{Generator, FALLBACK_PAGE, NOT_FOUND_PAGE};
use crate::helpers::is_valid_slug;
use crate::Blog;

/// How a post request is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PostState {
    /// The page exists; `stale` pages are regenerated after being served
    Ready { stale: bool },
    /// Not rendered yet; the loading page is served meanwhile
    Pending,
    /// The store has no such post
    Missing,
    /// Not a usable slug
    Invalid,
}

/// Server state
struct ServerState {
    blog: Blog,
    store: Store,
    generator: Generator,
    cache: tokio::sync::Mutex<CacheDb>,
    /// Slugs with a render in progress
    rendering: Mutex<HashSet<String>>,
    /// Slugs the store reported as absent, with the time of the lookup
    missing: Mutex<HashMap<String, DateTime<Utc>>>,
    listing_busy: AtomicBool,
    revalidate: bool,
}

/// Start the server on `ip:port`. With `revalidate` off the public dir is
/// served as it is.
pub async fn start(blog: &Blog, ip: &str, port: u16, revalidate: bool) -> Result<()> {
    let state = Arc::new(ServerState::new(blog, blog.store()?, revalidate)?);

    let app = Router::new()
        .fallback(fallback_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}", ip, port);
    if revalidate {
        println!(
            "Pages are revalidated after {}s.",
            blog.config.revalidate_secs
        );
    }
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

impl ServerState {
    fn new(blog: &Blog, store: Store, revalidate: bool) -> Result<Self> {
        Ok(Self {
            blog: blog.clone(),
            store,
            generator: Generator::new(blog)?,
            cache: tokio::sync::Mutex::new(CacheDb::load(&blog.base_dir)),
            rendering: Mutex::new(HashSet::new()),
            missing: Mutex::new(HashMap::new()),
            listing_busy: AtomicBool::new(false),
            revalidate,
        })
    }

    fn max_age(&self) -> Duration {
        self.blog.config.max_age()
    }

    async fn post_state(&self, slug: &str) -> PostState {
        if !is_valid_slug(slug) {
            return PostState::Invalid;
        }
        if self.generator.post_output(slug).exists() {
            let stale = self.revalidate
                && !self
                    .cache
                    .lock()
                    .await
                    .is_fresh(slug, Utc::now(), self.max_age());
            return PostState::Ready { stale };
        }
        if self.known_missing(slug, Utc::now()) {
            return PostState::Missing;
        }
        if self.revalidate {
            PostState::Pending
        } else {
            PostState::Missing
        }
    }

    /// Whether the store reported `slug` absent less than `max_age` ago
    fn known_missing(&self, slug: &str, now: DateTime<Utc>) -> bool {
        lock(&self.missing)
            .get(slug)
            .is_some_and(|at| now - *at < self.max_age())
    }

    fn mark_missing(&self, slug: &str, now: DateTime<Utc>) {
        let max_age = self.max_age();
        let mut missing = lock(&self.missing);
        missing.retain(|_, at| now - *at < max_age);
        missing.insert(slug.to_string(), now);
    }

    /// Render one post and record the outcome
    async fn render(&self, slug: &str) {
        match self.generator.render_post(&self.store, slug, None).await {
            Ok(Some(entry)) => {
                lock(&self.missing).remove(slug);
                let mut cache = self.cache.lock().await;
                cache.record(slug, entry);
                if let Err(e) = cache.save(&self.blog.base_dir) {
                    tracing::warn!("Failed to save cache: {}", e);
                }
                tracing::info!("Rendered post {}", slug);
            }
            Ok(None) => {
                tracing::info!("Post {} not found", slug);
                self.mark_missing(slug, Utc::now());
                if let Err(e) = self.generator.remove_post(slug) {
                    tracing::warn!("Failed to remove post {}: {}", slug, e);
                }
                let mut cache = self.cache.lock().await;
                if cache.remove(slug).is_some() {
                    if let Err(e) = cache.save(&self.blog.base_dir) {
                        tracing::warn!("Failed to save cache: {}", e);
                    }
                }
            }
            Err(e) => tracing::error!("Failed to render post {}: {:#}", slug, e),
        }
    }

    async fn render_listing(&self) {
        match self.generator.generate_listing(&self.store).await {
            Ok(listing) => {
                tracing::info!(
                    "Listing revalidated: {} posts, {} pages",
                    listing.posts.len(),
                    listing.pages
                );
                let mut cache = self.cache.lock().await;
                cache.listing_rendered_at = Some(Utc::now());
                if let Err(e) = cache.save(&self.blog.base_dir) {
                    tracing::warn!("Failed to save cache: {}", e);
                }
            }
            Err(e) => tracing::error!("Failed to revalidate listing: {:#}", e),
        }
    }
}

/// Start a background render of `slug` unless one is already running
fn spawn_render(state: &Arc<ServerState>, slug: &str) {
    if !lock(&state.rendering).insert(slug.to_string()) {
        tracing::debug!("Render of {} already in progress", slug);
        return;
    }

    let state = Arc::clone(state);
    let slug = slug.to_string();
    tokio::spawn(async move {
        state.render(&slug).await;
        lock(&state.rendering).remove(&slug);
    });
}

fn spawn_listing(state: &Arc<ServerState>) {
    if state.listing_busy.swap(true, Ordering::AcqRel) {
        return;
    }

    let state = Arc::clone(state);
    tokio::spawn(async move {
        state.render_listing().await;
        state.listing_busy.store(false, Ordering::Release);
    });
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Slug of a request for a post page (`/post/<slug>/`)
fn post_slug(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/post/")?;
    let rest = rest.strip_suffix("index.html").unwrap_or(rest);
    let slug = rest.strip_suffix('/').unwrap_or(rest);
    (!slug.is_empty() && !slug.contains('/')).then_some(slug)
}

fn is_listing(path: &str) -> bool {
    path == "/" || path == "/index.html" || path.starts_with("/posts/page/")
}

/// Serves post pages through the render state, everything else from disk
async fn fallback_handler(
    State(state): State<Arc<ServerState>>,
    request: Request<Body>,
) -> Response {
    let path = request.uri().path().to_string();

    if let Some(slug) = post_slug(&path) {
        if slug != "_fallback.html" {
            return serve_post(&state, slug).await;
        }
    }

    if state.revalidate && is_listing(&path) {
        let fresh = state
            .cache
            .lock()
            .await
            .listing_is_fresh(Utc::now(), state.max_age());
        if !fresh {
            spawn_listing(&state);
        }
    }

    let public_dir = state.generator.public_dir();
    let mut service = ServeDir::new(public_dir).append_index_html_on_directories(true);
    match service.try_call(request).await {
        Ok(response) if response.status() == StatusCode::NOT_FOUND => {
            not_found(public_dir).await
        }
        Ok(response) => response.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

async fn serve_post(state: &Arc<ServerState>, slug: &str) -> Response {
    let public_dir = state.generator.public_dir();

    match state.post_state(slug).await {
        PostState::Ready { stale } => {
            if stale {
                tracing::debug!("Serving stale post {}", slug);
                spawn_render(state, slug);
            }
            match tokio::fs::read_to_string(state.generator.post_output(slug)).await {
                Ok(html) => Html(html).into_response(),
                Err(_) => not_found(public_dir).await,
            }
        }
        PostState::Pending => {
            spawn_render(state, slug);
            page(public_dir, FALLBACK_PAGE, StatusCode::OK, "Carregando...").await
        }
        PostState::Missing | PostState::Invalid => not_found(public_dir).await,
    }
}

async fn not_found(public_dir: &Path) -> Response {
    page(public_dir, NOT_FOUND_PAGE, StatusCode::NOT_FOUND, "Not found").await
}

/// A generated page, or a plain-text stand-in when it was never written
async fn page(public_dir: &Path, name: &str, status: StatusCode, stand_in: &str) -> Response {
    let path: PathBuf = public_dir.join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => (status, Html(html)).into_response(),
        Err(_) => (status, stand_in.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{Document, MemoryStore};
    use crate::config::SiteConfig;
    use tempfile::TempDir;

    fn doc(id: &str, uid: &str, date: &str) -> Document {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "uid": uid,
            "type": "posts",
            "first_publication_date": date,
            "last_publication_date": date,
            "data": { "title": format!("Post {}", uid), "author": "Ana", "content": [] }
        }))
        .unwrap()
    }

    fn state(dir: &TempDir, revalidate: bool) -> Arc<ServerState> {
        let blog = Blog::with_config(dir.path(), SiteConfig::default());
        let store = Store::Memory(MemoryStore::new(vec![
            doc("1", "a", "2021-01-01T10:00:00+0000"),
            doc("2", "b", "2021-02-01T10:00:00+0000"),
        ]));
        Arc::new(ServerState::new(&blog, store, revalidate).unwrap())
    }

    #[test]
    fn test_post_slug() {
        assert_eq!(post_slug("/post/como-usar/"), Some("como-usar"));
        assert_eq!(post_slug("/post/como-usar"), Some("como-usar"));
        assert_eq!(post_slug("/post/como-usar/index.html"), Some("como-usar"));
        assert_eq!(post_slug("/post/"), None);
        assert_eq!(post_slug("/post/a/b/"), None);
        assert_eq!(post_slug("/css/style.css"), None);
    }

    #[test]
    fn test_is_listing() {
        assert!(is_listing("/"));
        assert!(is_listing("/posts/page/2.json"));
        assert!(!is_listing("/post/a/"));
    }

    #[tokio::test]
    async fn test_unrendered_post_becomes_ready() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, true);

        assert_eq!(state.post_state("a").await, PostState::Pending);
        state.render("a").await;
        assert_eq!(state.post_state("a").await, PostState::Ready { stale: false });
        assert!(dir.path().join(".spacetraveling-cache/db.json").exists());
    }

    #[tokio::test]
    async fn test_unknown_post_becomes_missing() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, true);

        assert_eq!(state.post_state("zzz").await, PostState::Pending);
        state.render("zzz").await;
        assert_eq!(state.post_state("zzz").await, PostState::Missing);
    }

    #[tokio::test]
    async fn test_missing_post_is_retried_after_max_age() {
        let dir = TempDir::new().unwrap();
        let blog = Blog::with_config(dir.path(), SiteConfig::default());
        let mut state = ServerState::new(&blog, Store::Memory(MemoryStore::new(vec![])), true)
            .unwrap();

        state.render("new-post").await;
        assert_eq!(state.post_state("new-post").await, PostState::Missing);

        let published = doc("9", "new-post", "2021-04-01T10:00:00+0000");
        state.store = Store::Memory(MemoryStore::new(vec![published]));
        assert_eq!(state.post_state("new-post").await, PostState::Missing);

        let looked_up = Utc::now() - Duration::hours(1);
        lock(&state.missing).insert("new-post".to_string(), looked_up);
        assert_eq!(state.post_state("new-post").await, PostState::Pending);

        state.render("new-post").await;
        assert_eq!(state.post_state("new-post").await, PostState::Ready { stale: false });
    }

    #[tokio::test]
    async fn test_expired_missing_slugs_are_pruned() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, true);
        let now = Utc::now();

        state.mark_missing("old", now - Duration::hours(1));
        state.mark_missing("gone", now);
        let missing = lock(&state.missing);
        assert_eq!(missing.len(), 1);
        assert!(missing.contains_key("gone"));
    }

    #[tokio::test]
    async fn test_invalid_slug() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, true);
        assert_eq!(state.post_state("..").await, PostState::Invalid);
        assert_eq!(state.post_state("_fallback").await, PostState::Invalid);
    }

    #[tokio::test]
    async fn test_stale_post_is_served_and_flagged() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, true);
        state.render("b").await;

        if let Some(entry) = state.cache.lock().await.posts.get_mut("b") {
            entry.rendered_at = entry.rendered_at - Duration::hours(1);
        }
        assert_eq!(state.post_state("b").await, PostState::Ready { stale: true });
    }

    #[tokio::test]
    async fn test_static_mode_never_renders() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, false);
        assert_eq!(state.post_state("a").await, PostState::Missing);
    }

    #[tokio::test]
    async fn test_deleted_post_is_removed() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, true);
        state.render("a").await;

        let blog = Blog::with_config(dir.path(), SiteConfig::default());
        let emptied = ServerState::new(&blog, Store::Memory(MemoryStore::new(vec![])), true)
            .unwrap();
        emptied.render("a").await;
        assert!(!emptied.generator.post_output("a").exists());
        assert_eq!(emptied.post_state("a").await, PostState::Missing);
        assert!(!CacheDb::load(dir.path()).posts.contains_key("a"));
    }
}
