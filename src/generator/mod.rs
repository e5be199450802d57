//! Generator module - renders the blog to static files with the built-in Tera templates

use anyhow::{Context as _, Result};
use chrono::{Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use tera::Context;
use walkdir::WalkDir;

use crate::cache::{CacheDb, CacheEntry};
use crate::cms::ContentStore;
use crate::content::{
    reading_time, siblings, ContentLoader, LoadOutcome, PostDetail, PostSummary, SiblingPost,
};
use crate::helpers::{date_xml, format_date, is_valid_slug, post_path, url_for, was_edited};
use crate::templates::{
    CommentsData, FragmentData, NavPost, PostCard, PostPageData, SectionData, SiteData,
    TemplateRenderer, STYLESHEET,
};
use crate::Blog;

/// Directory of "load more" fragments, relative to the public dir
const FRAGMENT_DIR: &str = "posts/page";

/// Loading page served for posts that are not rendered yet
pub const FALLBACK_PAGE: &str = "post/_fallback.html";

pub const NOT_FOUND_PAGE: &str = "404.html";

/// What a generation run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    /// Posts on the listing
    pub listed: usize,
    /// Listing pages written (index plus fragments)
    pub listing_pages: usize,
    pub rendered: usize,
    /// Fresh pages left as they were
    pub skipped: usize,
    /// Enumerated posts the store no longer returns
    pub missing: usize,
}

/// Posts gathered for the listing
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Listed posts, newest first
    pub posts: Vec<PostSummary>,
    /// Listing pages written (index plus fragments)
    pub pages: usize,
    /// The cursor chain was followed to its end
    pub complete: bool,
}

impl Listing {
    /// The posts, when they are the whole ordered sequence
    pub fn full(&self) -> Option<&[PostSummary]> {
        self.complete.then_some(self.posts.as_slice())
    }
}

/// Static site generator using Tera templates
pub struct Generator {
    blog: Blog,
    renderer: TemplateRenderer,
}

impl Generator {
    /// Create a new generator
    pub fn new(blog: &Blog) -> Result<Self> {
        Ok(Self {
            blog: blog.clone(),
            renderer: TemplateRenderer::new()?,
        })
    }

    pub fn public_dir(&self) -> &Path {
        &self.blog.public_dir
    }

    fn max_age(&self) -> Duration {
        self.blog.config.max_age()
    }

    /// Generate the whole site.
    ///
    /// The listing is always rebuilt; post pages are rendered when missing,
    /// stale or edited, or unconditionally with `force`.
    pub async fn generate<S: ContentStore>(
        &self,
        store: &S,
        cache: &mut CacheDb,
        force: bool,
    ) -> Result<GenerateReport> {
        fs::create_dir_all(self.public_dir())?;

        self.copy_static_assets()?;
        self.write_stylesheet()?;
        self.write_fallback()?;
        self.write_not_found()?;

        let listing = self.generate_listing(store).await?;
        cache.listing_rendered_at = Some(Utc::now());

        let mut report = GenerateReport {
            listed: listing.posts.len(),
            listing_pages: listing.pages,
            ..Default::default()
        };

        let loader = ContentLoader::new(&self.blog.config, store);
        let paths = loader
            .static_paths()
            .await
            .context("Failed to enumerate post paths")?;

        for path in paths {
            let uid = &path.summary.uid;
            if !is_valid_slug(uid) {
                tracing::warn!("Skipping post with unusable uid {:?}", uid);
                continue;
            }

            let last_published = path.last_publication_date.as_ref();
            let fresh = self.post_output(uid).exists()
                && !cache.needs_render(uid, last_published, Utc::now(), self.max_age());
            if fresh && !force {
                tracing::debug!("Fresh: {}", uid);
                report.skipped += 1;
                continue;
            }

            match self.render_post(store, uid, listing.full()).await? {
                Some(entry) => {
                    cache.record(uid, entry);
                    report.rendered += 1;
                }
                None => {
                    tracing::warn!("Post {} was enumerated but could not be fetched", uid);
                    report.missing += 1;
                }
            }
        }

        Ok(report)
    }

    /// Render `index.html` and the "load more" fragments by following the
    /// listing cursor.
    ///
    /// Each file is replaced in place, fragments before the index, so a
    /// concurrent reader never finds a page missing.
    pub async fn generate_listing<S: ContentStore>(&self, store: &S) -> Result<Listing> {
        let loader = ContentLoader::new(&self.blog.config, store);
        let mut acc = loader
            .listing()
            .await
            .context("Failed to fetch the first listing page")?;

        let mut pages: Vec<Vec<PostSummary>> = vec![acc.posts().to_vec()];
        let mut complete = true;
        while acc.has_more() {
            let before = acc.posts().len();
            match acc.load_more(store).await? {
                LoadOutcome::Loaded { .. } => pages.push(acc.posts()[before..].to_vec()),
                LoadOutcome::Failed | LoadOutcome::Busy => {
                    tracing::warn!("Listing truncated after {} pages", pages.len());
                    complete = false;
                    break;
                }
                LoadOutcome::Exhausted => break,
            }
        }

        let fragment_dir = self.public_dir().join(FRAGMENT_DIR);
        let total = pages.len();
        let mut cards: Vec<Vec<PostCard>> = pages
            .iter()
            .map(|page| page.iter().map(|p| self.post_card(p)).collect())
            .collect();

        for number in (2..=total).rev() {
            let fragment = FragmentData {
                results: std::mem::take(&mut cards[number - 1]),
                next_page: (number < total).then(|| self.fragment_url(number + 1)),
            };
            let path = fragment_dir.join(format!("{}.json", number));
            replace_file(&path, &serde_json::to_string(&fragment)?)?;
        }

        let mut context = self.base_context();
        context.insert("posts", &cards[0]);
        context.insert("next_page", &(total > 1).then(|| self.fragment_url(2)));
        let html = self.renderer.render("index.html", &context)?;
        replace_file(&self.public_dir().join("index.html"), &html)?;

        prune_fragments(&fragment_dir, total)?;

        tracing::info!("Listing: {} posts on {} pages", acc.posts().len(), total);
        Ok(Listing {
            posts: acc.into_posts(),
            pages: total,
            complete,
        })
    }

    /// Render the page of one post.
    ///
    /// Siblings come from `listing` when it contains the post, otherwise
    /// from the store. `listing` must be the whole ordered sequence. Returns `None` when the store has no such post.
    pub async fn render_post<S: ContentStore>(
        &self,
        store: &S,
        uid: &str,
        listing: Option<&[PostSummary]>,
    ) -> Result<Option<CacheEntry>> {
        let loader = ContentLoader::new(&self.blog.config, store);
        let Some((doc, detail)) = loader
            .post(uid)
            .await
            .with_context(|| format!("Failed to fetch post {}", uid))?
        else {
            return Ok(None);
        };

        let nav = match listing {
            Some(listing) if listing.iter().any(|p| p.uid == uid) => {
                siblings::resolve_chronological(listing, uid)
            }
            _ => loader.remote_siblings(&doc).await?,
        };

        let data = self.post_page_data(&detail, nav.prior, nav.next);
        let mut context = self.base_context();
        context.insert("post", &data);
        context.insert("comments", &self.comments_data());

        let html = self.renderer.render("post.html", &context)?;
        let output = self.post_output(uid);
        write_file(&output, &html)?;
        tracing::debug!("Rendered: {:?}", output);

        Ok(Some(CacheEntry {
            rendered_at: Utc::now(),
            last_publication_date: detail.last_publication_date,
            output_path: format!("{}index.html", post_path(uid)),
        }))
    }

    /// Delete the page of a post the store no longer has
    pub fn remove_post(&self, uid: &str) -> Result<()> {
        if !is_valid_slug(uid) {
            return Ok(());
        }
        let dir = self.public_dir().join("post").join(uid);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            tracing::info!("Deleted: {:?}", dir);
        }
        Ok(())
    }

    /// Output file of a post page
    pub fn post_output(&self, uid: &str) -> PathBuf {
        self.public_dir().join("post").join(uid).join("index.html")
    }

    pub fn write_fallback(&self) -> Result<()> {
        let html = self.renderer.render("fallback.html", &self.base_context())?;
        write_file(&self.public_dir().join(FALLBACK_PAGE), &html)
    }

    pub fn write_not_found(&self) -> Result<()> {
        let html = self.renderer.render("404.html", &self.base_context())?;
        write_file(&self.public_dir().join(NOT_FOUND_PAGE), &html)
    }

    fn write_stylesheet(&self) -> Result<()> {
        write_file(&self.public_dir().join("css/style.css"), STYLESHEET)
    }

    /// Copy everything under the static dir into the public dir
    fn copy_static_assets(&self) -> Result<()> {
        let static_dir = &self.blog.static_dir;
        if !static_dir.exists() {
            return Ok(());
        }

        for entry in WalkDir::new(static_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(static_dir)?;
            if relative
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
            {
                continue;
            }

            let dest = self.public_dir().join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &dest)?;
        }

        Ok(())
    }

    fn site_data(&self) -> SiteData {
        let config = &self.blog.config;
        SiteData {
            title: config.title.clone(),
            description: config.description.clone(),
            language: config.language.clone(),
            root: url_for(config, ""),
            url: config.url.clone(),
            stylesheet: url_for(config, "css/style.css"),
            logo: url_for(config, "images/logo.svg"),
        }
    }

    fn base_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("site", &self.site_data());
        context
    }

    fn fragment_url(&self, number: usize) -> String {
        url_for(&self.blog.config, &format!("{}/{}.json", FRAGMENT_DIR, number))
    }

    fn comments_data(&self) -> Option<CommentsData> {
        let comments = &self.blog.config.comments;
        comments.is_active().then(|| CommentsData {
            repo: comments.repo.clone(),
            issue_term: comments.issue_term.clone(),
            theme: comments.theme.clone(),
        })
    }

    fn post_card(&self, post: &PostSummary) -> PostCard {
        let config = &self.blog.config;
        let (date, datetime) = match &post.first_publication_date {
            Some(d) => (
                format_date(d, &config.date_format, config.locale(), config.tz()),
                date_xml(d),
            ),
            None => (String::new(), String::new()),
        };

        PostCard {
            uid: post.uid.clone(),
            path: url_for(config, &post_path(&post.uid)),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            date,
            datetime,
        }
    }

    fn nav_post(&self, sibling: SiblingPost) -> NavPost {
        NavPost {
            path: url_for(&self.blog.config, &post_path(&sibling.slug)),
            title: sibling.title,
        }
    }

    fn post_page_data(
        &self,
        detail: &PostDetail,
        prior: Option<SiblingPost>,
        next: Option<SiblingPost>,
    ) -> PostPageData {
        let config = &self.blog.config;
        let (locale, tz) = (config.locale(), config.tz());

        let (date, datetime) = match &detail.first_publication_date {
            Some(d) => (format_date(d, &config.date_format, locale, tz), date_xml(d)),
            None => (String::new(), String::new()),
        };

        let edited = if was_edited(
            detail.first_publication_date.as_ref(),
            detail.last_publication_date.as_ref(),
        ) {
            detail
                .last_publication_date
                .as_ref()
                .map(|d| format_date(d, &config.edited_format, locale, tz))
        } else {
            None
        };

        let sections = detail
            .sections_html()
            .into_iter()
            .map(|(heading, html)| SectionData { heading, html })
            .collect();

        PostPageData {
            uid: detail.uid.clone(),
            path: url_for(config, &post_path(&detail.uid)),
            title: detail.title.clone(),
            author: detail.author.clone(),
            banner_url: detail.banner_url.clone(),
            date,
            datetime,
            edited,
            reading_time: reading_time::estimate(&detail.content, config.words_per_minute),
            sections,
            prior: prior.map(|s| self.nav_post(s)),
            next: next.map(|s| self.nav_post(s)),
        }
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}

/// Write next to `path` and rename over it, so readers see either version
fn replace_file(path: &Path, content: &str) -> Result<()> {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    let staged = PathBuf::from(staged);
    write_file(&staged, content)?;
    fs::rename(&staged, path).with_context(|| format!("Failed to replace {:?}", path))
}

/// Delete fragments numbered past `total`, left over from a longer listing
fn prune_fragments(dir: &Path, total: usize) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let number = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".json"))
            .and_then(|n| n.parse::<usize>().ok());
        if number.is_some_and(|n| n > total) {
            fs::remove_file(&path)?;
            tracing::debug!("Deleted: {:?}", path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{self, ApiPage, Cursor, Document, MemoryStore, Query};
    use crate::config::SiteConfig;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(id: &str, uid: &str, first: &str, last: &str) -> Document {
        serde_json::from_value(json!({
            "id": id,
            "uid": uid,
            "type": "posts",
            "first_publication_date": first,
            "last_publication_date": last,
            "data": {
                "title": format!("Post {}", uid),
                "subtitle": "Pensando em sincronização",
                "author": "Joseph Oliveira",
                "banner": { "url": "https://images.prismic.io/banner.png" },
                "content": [{
                    "heading": "Intro",
                    "body": [{ "type": "paragraph", "text": "hello <world>", "spans": [] }]
                }]
            }
        }))
        .unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::new(vec![
            doc("1", "a", "2021-01-01T10:00:00+0000", "2021-01-01T10:00:00+0000"),
            doc("2", "b", "2021-02-01T10:00:00+0000", "2021-02-03T18:49:00+0000"),
            doc("3", "c", "2021-03-01T10:00:00+0000", "2021-03-01T10:00:00+0000"),
        ])
    }

    /// Answers first pages but fails every cursor
    struct FlakyStore(MemoryStore);

    impl ContentStore for FlakyStore {
        async fn query(&self, query: &Query) -> cms::Result<ApiPage<Document>> {
            self.0.query(query).await
        }

        async fn fetch_page(&self, cursor: &Cursor) -> cms::Result<ApiPage<Document>> {
            Err(cms::Error::UnknownCursor(cursor.as_str().to_string()))
        }

        async fn get_by_uid(&self, doc_type: &str, uid: &str) -> cms::Result<Option<Document>> {
            self.0.get_by_uid(doc_type, uid).await
        }
    }

    fn blog(dir: &TempDir) -> Blog {
        let mut config = SiteConfig::default();
        config.cms.page_size = 2;
        config.comments.repo = "someone/comments".to_string();
        Blog::with_config(dir.path(), config)
    }

    fn read(dir: &TempDir, path: &str) -> String {
        fs::read_to_string(dir.path().join("public").join(path)).unwrap()
    }

    #[tokio::test]
    async fn test_generate_site() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("static/images")).unwrap();
        fs::write(dir.path().join("static/images/logo.svg"), "<svg/>").unwrap();

        let blog = blog(&dir);
        let generator = Generator::new(&blog).unwrap();
        let mut cache = CacheDb::new();
        let report = generator.generate(&store(), &mut cache, false).await.unwrap();

        assert_eq!(report.listed, 3);
        assert_eq!(report.listing_pages, 2);
        assert_eq!(report.rendered, 3);
        assert!(cache.listing_rendered_at.is_some());
        assert_eq!(cache.posts.len(), 3);

        let index = read(&dir, "index.html");
        assert!(index.contains("Post c"));
        assert!(index.contains("Post b"));
        assert!(!index.contains("Post a"));
        assert!(index.contains("/posts/page/2.json"));

        let fragment: serde_json::Value =
            serde_json::from_str(&read(&dir, "posts/page/2.json")).unwrap();
        assert_eq!(fragment["results"][0]["uid"], "a");
        assert_eq!(fragment["results"][0]["path"], "/post/a/");
        assert!(fragment["next_page"].is_null());

        let post = read(&dir, "post/b/index.html");
        assert!(post.contains("Post b"));
        assert!(post.contains("hello &lt;world&gt;"));
        assert!(post.contains("1 min"));
        assert!(post.contains("/post/a/"));
        assert!(post.contains("/post/c/"));
        assert!(post.contains("às 15:49"));
        assert!(post.contains("utteranc.es"));

        let oldest = read(&dir, "post/a/index.html");
        assert!(!oldest.contains("Post anterior"));
        assert!(oldest.contains("Próximo post"));

        assert!(dir.path().join("public").join(FALLBACK_PAGE).exists());
        assert!(dir.path().join("public").join(NOT_FOUND_PAGE).exists());
        assert!(dir.path().join("public/css/style.css").exists());
        assert_eq!(read(&dir, "images/logo.svg"), "<svg/>");
    }

    #[tokio::test]
    async fn test_fresh_pages_are_skipped() {
        let dir = TempDir::new().unwrap();
        let generator = Generator::new(&blog(&dir)).unwrap();
        let store = store();
        let mut cache = CacheDb::new();
        generator.generate(&store, &mut cache, false).await.unwrap();

        let second = generator.generate(&store, &mut cache, false).await.unwrap();
        assert_eq!(second.rendered, 0);
        assert_eq!(second.skipped, 3);

        let forced = generator.generate(&store, &mut cache, true).await.unwrap();
        assert_eq!(forced.rendered, 3);
    }

    #[tokio::test]
    async fn test_stale_and_edited_pages_are_rendered() {
        let dir = TempDir::new().unwrap();
        let generator = Generator::new(&blog(&dir)).unwrap();
        let store = store();
        let mut cache = CacheDb::new();
        generator.generate(&store, &mut cache, false).await.unwrap();

        if let Some(entry) = cache.posts.get_mut("a") {
            entry.rendered_at = entry.rendered_at - Duration::hours(1);
        }
        if let Some(entry) = cache.posts.get_mut("b") {
            entry.last_publication_date = Some(Utc.with_ymd_and_hms(2021, 2, 1, 10, 0, 0).unwrap());
        }

        let report = generator.generate(&store, &mut cache, false).await.unwrap();
        assert_eq!(report.rendered, 2);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_unlisted_post_uses_store_siblings() {
        let dir = TempDir::new().unwrap();
        let generator = Generator::new(&blog(&dir)).unwrap();
        let entry = generator
            .render_post(&store(), "b", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.output_path, "post/b/index.html");

        let post = read(&dir, "post/b/index.html");
        assert!(post.contains("/post/a/"));
        assert!(post.contains("/post/c/"));
    }

    #[tokio::test]
    async fn test_truncated_listing_uses_store_siblings() {
        let dir = TempDir::new().unwrap();
        let generator = Generator::new(&blog(&dir)).unwrap();
        let store = FlakyStore(store());

        let listing = generator.generate_listing(&store).await.unwrap();
        assert_eq!(listing.posts.len(), 2);
        assert!(listing.full().is_none());

        let mut cache = CacheDb::new();
        let report = generator.generate(&store, &mut cache, false).await.unwrap();
        assert_eq!(report.listing_pages, 1);
        assert_eq!(report.rendered, 3);
        assert!(!read(&dir, "index.html").contains("/posts/page/2.json"));

        let post = read(&dir, "post/b/index.html");
        assert!(post.contains("/post/a/"));
        assert!(post.contains("/post/c/"));
    }

    #[tokio::test]
    async fn test_shorter_listing_prunes_fragments() {
        let dir = TempDir::new().unwrap();
        let generator = Generator::new(&blog(&dir)).unwrap();
        let listing = generator.generate_listing(&store()).await.unwrap();
        assert!(listing.complete);
        assert!(dir.path().join("public/posts/page/2.json").exists());

        let only_a = doc("1", "a", "2021-01-01T10:00:00+0000", "2021-01-01T10:00:00+0000");
        let listing = generator.generate_listing(&MemoryStore::new(vec![only_a])).await.unwrap();
        assert_eq!(listing.pages, 1);
        assert!(!dir.path().join("public/posts/page/2.json").exists());
        assert!(!dir.path().join("public/index.html.tmp").exists());
        assert!(read(&dir, "index.html").contains("Post a"));
    }

    #[tokio::test]
    async fn test_missing_post() {
        let dir = TempDir::new().unwrap();
        let generator = Generator::new(&blog(&dir)).unwrap();
        let entry = generator.render_post(&store(), "nope", None).await.unwrap();
        assert!(entry.is_none());
        assert!(!generator.post_output("nope").exists());
    }

    #[tokio::test]
    async fn test_remove_post() {
        let dir = TempDir::new().unwrap();
        let generator = Generator::new(&blog(&dir)).unwrap();
        generator.render_post(&store(), "a", None).await.unwrap();
        assert!(generator.post_output("a").exists());

        generator.remove_post("a").unwrap();
        assert!(!generator.post_output("a").exists());
    }
}
