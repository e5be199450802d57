//! Built-in theme templates using the Tera template engine
//!
//! Templates and the stylesheet are embedded in the binary. Autoescaping is
//! off: CMS text goes through the `escape` filter in the templates, while
//! paths and pre-rendered rich text are emitted as they are.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

/// Stylesheet written to `css/style.css`
pub const STYLESHEET: &str = include_str!("theme/assets/style.css");

/// Template renderer with the embedded theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("theme/layout.html")),
            ("index.html", include_str!("theme/index.html")),
            ("post.html", include_str!("theme/post.html")),
            ("fallback.html", include_str!("theme/fallback.html")),
            ("404.html", include_str!("theme/404.html")),
            // Partials
            (
                "partials/header.html",
                include_str!("theme/partials/header.html"),
            ),
            (
                "partials/icons.html",
                include_str!("theme/partials/icons.html"),
            ),
        ])?;

        tera.register_filter("minutes", minutes_filter);

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Tera filter: reading time label (`4 min`)
fn minutes_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let minutes = tera::try_get_value!("minutes", "value", u64, value);
    Ok(tera::Value::String(format!("{} min", minutes)))
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub description: String,
    pub language: String,
    pub root: String,
    pub url: String,
    pub stylesheet: String,
    pub logo: String,
}

/// A post on the listing page (also the shape of "load more" fragments)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostCard {
    pub uid: String,
    pub path: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub date: String,
    pub datetime: String,
}

/// Body of a `posts/page/<n>.json` continuation file
#[derive(Debug, Clone, Serialize)]
pub struct FragmentData {
    pub results: Vec<PostCard>,
    pub next_page: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionData {
    pub heading: String,
    pub html: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavPost {
    pub title: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostPageData {
    pub uid: String,
    pub path: String,
    pub title: String,
    pub author: String,
    pub banner_url: Option<String>,
    pub date: String,
    pub datetime: String,
    pub edited: Option<String>,
    pub reading_time: usize,
    pub sections: Vec<SectionData>,
    pub prior: Option<NavPost>,
    pub next: Option<NavPost>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentsData {
    pub repo: String,
    pub issue_term: String,
    pub theme: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteData {
        SiteData {
            title: "spacetraveling".to_string(),
            description: String::new(),
            language: "pt-BR".to_string(),
            root: "/".to_string(),
            url: "http://example.com".to_string(),
            stylesheet: "/css/style.css".to_string(),
            logo: "/images/logo.svg".to_string(),
        }
    }

    fn card(uid: &str) -> PostCard {
        PostCard {
            uid: uid.to_string(),
            path: format!("/post/{}/", uid),
            title: format!("Title <{}>", uid),
            subtitle: "Sub".to_string(),
            author: "Ana".to_string(),
            date: "15 mar 2021".to_string(),
            datetime: "2021-03-15T12:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_index_escapes_and_shows_load_more() {
        let renderer = TemplateRenderer::new().unwrap();
        let mut context = Context::new();
        context.insert("site", &site());
        context.insert("posts", &vec![card("a")]);
        context.insert("next_page", &Some("/posts/page/2.json"));

        let html = renderer.render("index.html", &context).unwrap();
        assert!(html.contains("Title &lt;a&gt;"));
        assert!(html.contains(r#"href="/post/a/""#));
        assert!(html.contains("Carregar mais posts"));
        assert!(html.contains("/posts/page/2.json"));
    }

    #[test]
    fn test_index_without_cursor_has_no_button() {
        let renderer = TemplateRenderer::new().unwrap();
        let mut context = Context::new();
        context.insert("site", &site());
        context.insert("posts", &vec![card("a")]);
        context.insert("next_page", &None::<String>);

        let html = renderer.render("index.html", &context).unwrap();
        assert!(!html.contains("Carregar mais posts"));
    }

    #[test]
    fn test_post_page() {
        let renderer = TemplateRenderer::new().unwrap();
        let post = PostPageData {
            uid: "a".to_string(),
            path: "/post/a/".to_string(),
            title: "Como utilizar Hooks".to_string(),
            author: "Joseph".to_string(),
            banner_url: Some("https://images.prismic.io/b.png".to_string()),
            date: "15 mar 2021".to_string(),
            datetime: "2021-03-15T12:00:00.000Z".to_string(),
            edited: Some("19 mar 2021, às 15:49".to_string()),
            reading_time: 4,
            sections: vec![SectionData {
                heading: "Intro".to_string(),
                html: "<p>hello <strong>world</strong></p>".to_string(),
            }],
            prior: Some(NavPost {
                title: "Older".to_string(),
                path: "/post/older/".to_string(),
            }),
            next: None,
        };
        let mut context = Context::new();
        context.insert("site", &site());
        context.insert("post", &post);
        context.insert(
            "comments",
            &Some(CommentsData {
                repo: "someone/comments".to_string(),
                issue_term: "pathname".to_string(),
                theme: "github-dark".to_string(),
            }),
        );

        let html = renderer.render("post.html", &context).unwrap();
        assert!(html.contains("4 min"));
        assert!(html.contains("<p>hello <strong>world</strong></p>"));
        assert!(html.contains("19 mar 2021, às 15:49"));
        assert!(html.contains("/post/older/"));
        assert!(html.contains(r#"data-repo="someone&#x2F;comments""#));
        assert!(html.contains("utteranc.es"));
    }
}
