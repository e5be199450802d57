//! Initialize a new blog

use anyhow::Result;
use std::fs;
use std::path::Path;

const CONFIG: &str = r#"# spacetraveling configuration

# Site
title: spacetraveling
description: ''
author: ''
language: pt-BR
timezone: America/Sao_Paulo

# URL
url: http://example.com
root: /

# Directory
public_dir: public
static_dir: static

# Dates (chrono format strings, localized by `language`)
date_format: '%d %b %Y'
edited_format: '%d %b %Y, às %H:%M'

# Seconds before a rendered page is regenerated
revalidate_secs: 1800
words_per_minute: 200

# Content store
cms:
  # Prismic API endpoint, e.g. https://your-repo.cdn.prismic.io/api/v2
  endpoint: ''
  # Prefer the SPACETRAVELING_ACCESS_TOKEN environment variable
  access_token:
  document_type: posts
  fields: [title, subtitle, author]
  page_size: 2
  paths_page_size: 100
  timeout_secs: 30
  # Local documents used instead of the endpoint; remove to use Prismic
  fixture: posts.json

pagination:
  # ignore: keep the current list when a page fails to load; report: fail
  on_error: ignore

# utterances comments
comments:
  enable: true
  repo: ''
  issue_term: pathname
  theme: github-dark
"#;

const LOGO: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="239" height="27" viewBox="0 0 239 27"><text x="0" y="22" font-family="Inter, sans-serif" font-size="24" font-weight="700" fill="#F8F8F8">spacetraveling<tspan fill="#FF57B2">.</tspan></text></svg>
"##;

const SAMPLE_POSTS: &str = r#"[
  {
    "id": "sample-1",
    "uid": "hello-world",
    "type": "posts",
    "first_publication_date": "2021-03-15T19:25:28+0000",
    "last_publication_date": "2021-03-15T19:25:28+0000",
    "data": {
      "title": "Hello World",
      "subtitle": "Your first post",
      "author": "spacetraveling",
      "banner": { "url": "" },
      "content": [
        {
          "heading": "Welcome",
          "body": [
            {
              "type": "paragraph",
              "text": "This post comes from posts.json. Point cms.endpoint at a Prismic repository to publish real content.",
              "spans": [{ "start": 10, "end": 15, "type": "strong" }]
            }
          ]
        }
      ]
    }
  }
]
"#;

/// Initialize a new blog in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    fs::create_dir_all(target_dir.join("static/images"))?;

    write_new(&target_dir.join("_config.yml"), CONFIG)?;
    write_new(&target_dir.join("static/images/logo.svg"), LOGO)?;
    write_new(&target_dir.join("posts.json"), SAMPLE_POSTS)?;

    Ok(())
}

/// Write `content` unless the file already exists
fn write_new(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        tracing::warn!("{:?} already exists, leaving it as is", path);
        return Ok(());
    }
    fs::write(path, content)?;
    tracing::debug!("Created {:?}", path);
    Ok(())
}
