//! Query predicates in the Prismic predicate language

use std::fmt;

use super::Document;

/// A single filter on documents
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Exact match on a path: `at(document.type, "posts")`
    At { path: String, value: String },
}

impl Predicate {
    pub fn at(path: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::At {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Match on a document's uid: `at(my.posts.uid, "slug")`
    pub fn uid(doc_type: &str, uid: impl Into<String>) -> Self {
        Self::at(format!("my.{}.uid", doc_type), uid)
    }

    /// Evaluate the predicate against a document held locally
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Predicate::At { path, value } => resolve_path(doc, path).as_deref() == Some(value),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::At { path, value } => write!(f, "[at({}, {})]", path, quote(value)),
        }
    }
}

/// Render a predicate list as the `q` query parameter
pub fn to_query_param(predicates: &[Predicate]) -> String {
    let inner: String = predicates.iter().map(|p| p.to_string()).collect();
    format!("[{}]", inner)
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Look up `document.*` or `my.<type>.<field>` on a document
pub(crate) fn resolve_path(doc: &Document, path: &str) -> Option<String> {
    let mut parts = path.splitn(3, '.');
    match (parts.next()?, parts.next()?, parts.next()) {
        ("document", "type", None) => Some(doc.doc_type.clone()),
        ("document", "id", None) => Some(doc.id.clone()),
        ("my", doc_type, Some(field)) if doc_type == doc.doc_type => {
            if field == "uid" {
                return doc.uid.clone();
            }
            match doc.data.get(field)? {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                serde_json::Value::Bool(b) => Some(b.to_string()),
                _ => None,
            }
        }
        _ => None,
    }
}
