//! Post models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cms::{Document, RichText};

/// A post as shown on the listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    /// Unique slug
    pub uid: String,

    pub first_publication_date: Option<DateTime<Utc>>,

    pub title: String,
    pub subtitle: String,
    pub author: String,
}

impl PostSummary {
    /// Build a summary from a document; documents without a uid are unusable
    pub fn from_document(doc: &Document) -> Option<Self> {
        let uid = doc.uid.clone().filter(|u| !u.is_empty())?;
        Some(Self {
            uid,
            first_publication_date: doc.first_publication_date,
            title: text_field(&doc.data, "title"),
            subtitle: text_field(&doc.data, "subtitle"),
            author: text_field(&doc.data, "author"),
        })
    }
}

/// A full post
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostDetail {
    pub uid: String,

    pub first_publication_date: Option<DateTime<Utc>>,

    pub last_publication_date: Option<DateTime<Utc>>,

    pub title: String,

    /// Banner image URL
    pub banner_url: Option<String>,

    pub author: String,

    /// Ordered content sections
    pub content: Vec<ContentSection>,
}

/// A heading followed by rich text body blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSection {
    #[serde(default, deserialize_with = "de_heading")]
    pub heading: String,
    #[serde(default)]
    pub body: RichText,
}

impl ContentSection {
    pub fn new(heading: impl Into<String>, body: RichText) -> Self {
        Self {
            heading: heading.into(),
            body,
        }
    }
}

impl PostDetail {
    /// Build a post from a document. Missing fields fall back to empty values.
    pub fn from_document(doc: &Document) -> Option<Self> {
        let uid = doc.uid.clone().filter(|u| !u.is_empty())?;

        let content = match doc.data.get("content") {
            Some(Value::Array(sections)) => sections
                .iter()
                .filter_map(|s| match serde_json::from_value(s.clone()) {
                    Ok(section) => Some(section),
                    Err(e) => {
                        tracing::warn!("Skipping malformed section in {}: {}", uid, e);
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        Some(Self {
            first_publication_date: doc.first_publication_date,
            last_publication_date: doc.last_publication_date,
            title: text_field(&doc.data, "title"),
            banner_url: banner_url(&doc.data),
            author: text_field(&doc.data, "author"),
            content,
            uid,
        })
    }

    /// Body of every section rendered to HTML
    pub fn sections_html(&self) -> Vec<(String, String)> {
        self.content
            .iter()
            .map(|s| (s.heading.clone(), s.body.as_html()))
            .collect()
    }
}

/// A neighbouring post, used for prior/next navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiblingPost {
    pub title: String,
    pub slug: String,
}

impl From<&PostSummary> for SiblingPost {
    fn from(post: &PostSummary) -> Self {
        Self {
            title: post.title.clone(),
            slug: post.uid.clone(),
        }
    }
}

/// Read a key text or rich text field as plain text
fn text_field(data: &Map<String, Value>, key: &str) -> String {
    data.get(key)
        .cloned()
        .and_then(|v| serde_json::from_value::<RichText>(v).ok())
        .map(|t| t.as_text())
        .unwrap_or_default()
}

/// Image fields are objects with a `url`; a bare string is accepted too
fn banner_url(data: &Map<String, Value>) -> Option<String> {
    match data.get("banner")? {
        Value::String(url) => Some(url.clone()),
        Value::Object(image) => image.get("url")?.as_str().map(String::from),
        _ => None,
    }
    .filter(|u| !u.is_empty())
}

fn de_heading<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(RichText::deserialize(deserializer)?.as_text())
}
