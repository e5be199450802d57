//! URL helper functions

use lazy_static::lazy_static;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;

use crate::config::SiteConfig;

/// Characters escaped inside a single path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

lazy_static! {
    static ref SLUG_RE: Regex = Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("valid slug pattern");
}

/// Whether `uid` can be used as a post directory and URL segment as is
pub fn is_valid_slug(uid: &str) -> bool {
    SLUG_RE.is_match(uid)
}

/// Generate a URL with the root path
///
/// # Examples
/// ```ignore
/// url_for(&config, "/post/hello/") // -> "/blog/post/hello/"
/// ```
pub fn url_for(config: &SiteConfig, path: &str) -> String {
    let root = config.root.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, path)
    }
}

/// Generate a full URL including the domain
pub fn full_url_for(config: &SiteConfig, path: &str) -> String {
    let base = config.url.trim_end_matches('/');
    format!("{}{}", base, url_for(config, path))
}

/// Path of a post page relative to the site root
pub fn post_path(uid: &str) -> String {
    format!("post/{}/", encode_url(uid))
}

/// Encode a single URL path segment
pub fn encode_url(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SiteConfig {
        SiteConfig {
            url: "https://example.com/".to_string(),
            root: "/blog/".to_string(),
            ..SiteConfig::default()
        }
    }

    #[test]
    fn test_url_for() {
        let config = test_config();
        assert_eq!(url_for(&config, "/css/style.css"), "/blog/css/style.css");
        assert_eq!(url_for(&config, ""), "/blog/");
    }

    #[test]
    fn test_full_url_for() {
        let config = test_config();
        assert_eq!(
            full_url_for(&config, "post/a/"),
            "https://example.com/blog/post/a/"
        );
    }

    #[test]
    fn test_post_path_encodes_segment() {
        assert_eq!(post_path("como-utilizar-hooks"), "post/como-utilizar-hooks/");
        assert_eq!(post_path("a/b c"), "post/a%2Fb%20c/");
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("como-utilizar-hooks"));
        assert!(is_valid_slug("post_2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("_fallback"));
        assert!(!is_valid_slug("../etc"));
        assert!(!is_valid_slug("Upper"));
    }
}
