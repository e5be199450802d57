//! List site content

use anyhow::Result;

use crate::cms::ContentStore;
use crate::content::{ContentLoader, PostSummary};
use crate::helpers::{format_date, full_url_for, post_path};
use crate::Blog;

/// List site content by type
pub async fn run(blog: &Blog, content_type: &str) -> Result<()> {
    match content_type {
        "post" | "posts" => {
            let store = blog.store()?;
            for line in post_lines(blog, &store).await? {
                println!("{}", line);
            }
        }
        _ => {
            anyhow::bail!("Unknown type: {}. Available: post", content_type);
        }
    }

    Ok(())
}

/// Every post on the listing, newest first
async fn post_lines<S: ContentStore>(blog: &Blog, store: &S) -> Result<Vec<String>> {
    let loader = ContentLoader::new(&blog.config, store);
    let posts = loader.all_posts().await?;

    let mut lines = vec![format!("Posts ({}):", posts.len())];
    lines.extend(posts.iter().map(|post| describe(blog, post)));
    Ok(lines)
}

fn describe(blog: &Blog, post: &PostSummary) -> String {
    let config = &blog.config;
    let date = post
        .first_publication_date
        .as_ref()
        .map(|d| format_date(d, "%Y-%m-%d", config.locale(), config.tz()))
        .unwrap_or_else(|| "----------".to_string());
    format!(
        "  {} - {} [{}]",
        date,
        post.title,
        full_url_for(config, &post_path(&post.uid))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{Document, MemoryStore};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lists_every_page() {
        let docs: Vec<Document> = (1..=3)
            .map(|i| {
                serde_json::from_value(serde_json::json!({
                    "id": format!("{}", i),
                    "uid": format!("post-{}", i),
                    "type": "posts",
                    "first_publication_date": format!("2021-0{}-10T12:00:00+0000", i),
                    "data": { "title": format!("Post {}", i) }
                }))
                .unwrap()
            })
            .collect();
        let store = MemoryStore::new(docs);

        let dir = TempDir::new().unwrap();
        let mut blog = Blog::new(dir.path()).unwrap();
        blog.config.cms.paths_page_size = 2;

        let lines = post_lines(&blog, &store).await.unwrap();
        assert_eq!(lines[0], "Posts (3):");
        assert_eq!(
            lines[1],
            "  2021-03-10 - Post 3 [http://example.com/post/post-3/]"
        );
        assert!(lines[3].contains("Post 1"));
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let dir = TempDir::new().unwrap();
        let blog = Blog::new(dir.path()).unwrap();
        assert!(run(&blog, "tags").await.is_err());
    }
}
