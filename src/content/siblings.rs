//! Prior/next post resolution

use serde::Serialize;

use super::{PostSummary, SiblingPost};

/// The posts around a given post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Siblings {
    pub prior: Option<SiblingPost>,
    pub next: Option<SiblingPost>,
}

/// Find the neighbours of `uid` in an ordered list.
///
/// The first exact match wins; an unknown uid has no neighbours.
pub fn resolve(ordered: &[PostSummary], uid: &str) -> Siblings {
    let Some(pos) = ordered.iter().position(|p| p.uid == uid) else {
        return Siblings::default();
    };

    Siblings {
        prior: pos
            .checked_sub(1)
            .and_then(|i| ordered.get(i))
            .map(SiblingPost::from),
        next: ordered.get(pos + 1).map(SiblingPost::from),
    }
}

/// Siblings in chronological order (prior = older, next = newer) from a
/// listing sorted newest first
pub fn resolve_chronological(newest_first: &[PostSummary], uid: &str) -> Siblings {
    let oldest_first: Vec<PostSummary> = newest_first.iter().rev().cloned().collect();
    resolve(&oldest_first, uid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(uid: &str) -> PostSummary {
        PostSummary {
            uid: uid.to_string(),
            first_publication_date: None,
            title: format!("Title {}", uid),
            subtitle: String::new(),
            author: String::new(),
        }
    }

    fn sibling(uid: &str) -> Option<SiblingPost> {
        Some(SiblingPost {
            title: format!("Title {}", uid),
            slug: uid.to_string(),
        })
    }

    #[test]
    fn test_middle_has_both() {
        let posts = vec![post("a"), post("b"), post("c")];
        let s = resolve(&posts, "b");
        assert_eq!(s.prior, sibling("a"));
        assert_eq!(s.next, sibling("c"));
    }

    #[test]
    fn test_edges() {
        let posts = vec![post("a"), post("b"), post("c")];
        let first = resolve(&posts, "a");
        assert_eq!(first.prior, None);
        assert_eq!(first.next, sibling("b"));

        let last = resolve(&posts, "c");
        assert_eq!(last.prior, sibling("b"));
        assert_eq!(last.next, None);
    }

    #[test]
    fn test_absent_target() {
        let posts = vec![post("a"), post("b"), post("c")];
        assert_eq!(resolve(&posts, "zzz"), Siblings::default());
        assert_eq!(resolve(&[], "a"), Siblings::default());
    }

    #[test]
    fn test_single_post() {
        assert_eq!(resolve(&[post("a")], "a"), Siblings::default());
    }

    #[test]
    fn test_first_match_wins() {
        let posts = vec![post("a"), post("b"), post("x"), post("b"), post("z")];
        let s = resolve(&posts, "b");
        assert_eq!(s.prior, sibling("a"));
        assert_eq!(s.next, sibling("x"));
    }

    #[test]
    fn test_chronological() {
        // listing order: newest first
        let posts = vec![post("c"), post("b"), post("a")];
        let s = resolve_chronological(&posts, "b");
        assert_eq!(s.prior, sibling("a"));
        assert_eq!(s.next, sibling("c"));
    }
}
