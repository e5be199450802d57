//! Structured text fields
//!
//! Prismic stores rich text as a list of blocks, each with a type, its plain
//! text and a list of inline spans. Offsets in spans count UTF-16 code
//! units. Rendering escapes all text, so the output is safe to embed.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::helpers::{html_escape, is_safe_url, post_path};

/// A rich text field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RichText(pub Vec<Block>);

/// One block of a rich text field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oembed: Option<Value>,
}

/// Inline markup over a range of a block's text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr {
    Missing,
    Plain(String),
    Blocks(Vec<Value>),
}

impl<'de> Deserialize<'de> for RichText {
    /// Accepts block lists, plain strings (key text fields) and null
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Missing => RichText::default(),
            Repr::Plain(text) => RichText::plain(text),
            // Unknown or malformed blocks are dropped rather than failing the document
            Repr::Blocks(values) => RichText(
                values
                    .into_iter()
                    .filter_map(|v| serde_json::from_value(v).ok())
                    .collect(),
            ),
        })
    }
}

impl RichText {
    /// A single paragraph holding `text`
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return RichText::default();
        }
        RichText(vec![Block {
            kind: "paragraph".to_string(),
            text,
            spans: Vec::new(),
            url: None,
            alt: None,
            oembed: None,
        }])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.0
    }

    /// Plain text of every block, joined with spaces
    pub fn as_text(&self) -> String {
        self.0
            .iter()
            .map(|b| b.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Render to sanitized HTML
    pub fn as_html(&self) -> String {
        let mut html = String::new();
        let mut open_list: Option<&'static str> = None;

        for block in &self.0 {
            let list = match block.kind.as_str() {
                "list-item" => Some("ul"),
                "o-list-item" => Some("ol"),
                _ => None,
            };

            if open_list != list {
                if let Some(tag) = open_list {
                    html.push_str(&format!("</{}>", tag));
                }
                if let Some(tag) = list {
                    html.push_str(&format!("<{}>", tag));
                }
                open_list = list;
            }

            html.push_str(&render_block(block));
        }

        if let Some(tag) = open_list {
            html.push_str(&format!("</{}>", tag));
        }

        html
    }
}

fn render_block(block: &Block) -> String {
    let inner = || render_spans(&block.text, &block.spans);
    match block.kind.as_str() {
        "paragraph" => format!("<p>{}</p>", inner()),
        "preformatted" => format!("<pre>{}</pre>", inner()),
        "list-item" | "o-list-item" => format!("<li>{}</li>", inner()),
        kind if is_heading(kind) => {
            let level = &kind["heading".len()..];
            format!("<h{level}>{}</h{level}>", inner())
        }
        "image" => match block.url.as_deref().filter(|u| is_safe_url(u)) {
            Some(url) => format!(
                r#"<p class="block-img"><img src="{}" alt="{}"></p>"#,
                html_escape(url),
                html_escape(block.alt.as_deref().unwrap_or(""))
            ),
            None => String::new(),
        },
        "embed" => {
            let url = block
                .oembed
                .as_ref()
                .and_then(|o| o.get("embed_url"))
                .and_then(|u| u.as_str())
                .filter(|u| is_safe_url(u));
            match url {
                Some(url) => format!(
                    r#"<div class="embed"><a href="{0}" target="_blank" rel="noopener">{0}</a></div>"#,
                    html_escape(url)
                ),
                None => String::new(),
            }
        }
        other => {
            tracing::debug!("Skipping unsupported rich text block {:?}", other);
            String::new()
        }
    }
}

fn is_heading(kind: &str) -> bool {
    matches!(
        kind,
        "heading1" | "heading2" | "heading3" | "heading4" | "heading5" | "heading6"
    )
}

/// Render text with its spans. The text is cut at every span boundary and
/// each segment is wrapped in the spans covering it, so overlapping spans
/// still produce well-formed markup.
fn render_spans(text: &str, spans: &[Span]) -> String {
    let mut bounds: Vec<usize> = vec![0, text.len()];
    let spans: Vec<(usize, usize, &Span)> = spans
        .iter()
        .filter_map(|s| {
            let start = utf16_to_byte(text, s.start);
            let end = utf16_to_byte(text, s.end);
            (start < end).then_some((start, end, s))
        })
        .collect();
    for (start, end, _) in &spans {
        bounds.push(*start);
        bounds.push(*end);
    }
    bounds.sort_unstable();
    bounds.dedup();

    let mut html = String::new();
    for window in bounds.windows(2) {
        let (from, to) = (window[0], window[1]);
        let mut segment = escape_with_breaks(&text[from..to]);
        for (_, _, span) in spans
            .iter()
            .rev()
            .filter(|(start, end, _)| *start <= from && *end >= to)
        {
            segment = wrap_span(span, segment);
        }
        html.push_str(&segment);
    }
    html
}

fn wrap_span(span: &Span, inner: String) -> String {
    match span.kind.as_str() {
        "strong" => format!("<strong>{}</strong>", inner),
        "em" => format!("<em>{}</em>", inner),
        "label" => {
            let label = span
                .data
                .as_ref()
                .and_then(|d| d.get("label"))
                .and_then(|l| l.as_str())
                .unwrap_or("");
            format!(r#"<span class="{}">{}</span>"#, html_escape(label), inner)
        }
        "hyperlink" => match span.data.as_ref().and_then(link_href) {
            Some(href) => {
                let external = href.starts_with("http://") || href.starts_with("https://");
                if external {
                    format!(
                        r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                        html_escape(&href),
                        inner
                    )
                } else {
                    format!(r#"<a href="{}">{}</a>"#, html_escape(&href), inner)
                }
            }
            None => inner,
        },
        _ => inner,
    }
}

/// Resolve a hyperlink span's target; document links point at post pages
fn link_href(data: &Value) -> Option<String> {
    match data.get("link_type").and_then(|t| t.as_str()) {
        Some("Document") => {
            let uid = data.get("uid")?.as_str()?;
            Some(format!("/{}", post_path(uid)))
        }
        _ => data
            .get("url")
            .and_then(|u| u.as_str())
            .filter(|u| is_safe_url(u))
            .map(String::from),
    }
}

fn escape_with_breaks(text: &str) -> String {
    html_escape(text).replace('\n', "<br />")
}

/// Map a UTF-16 offset onto a byte offset in `text`, clamped to its length
fn utf16_to_byte(text: &str, offset: usize) -> usize {
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        if units >= offset {
            return idx;
        }
        units += ch.len_utf16();
    }
    text.len()
}
