//! Site configuration (_config.yml)

use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Environment variable that overrides `cms.access_token`
pub const ACCESS_TOKEN_ENV: &str = "SPACETRAVELING_ACCESS_TOKEN";

/// Largest whole number of seconds a `TimeDelta` holds
const MAX_AGE_SECS: i64 = i64::MAX / 1000;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub timezone: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub public_dir: String,
    pub static_dir: String,

    // Date / Time format (strftime, localized by `language`)
    pub date_format: String,
    pub edited_format: String,

    /// Seconds after which a generated page is considered stale
    pub revalidate_secs: u64,

    /// Reading speed used by the reading-time estimate
    pub words_per_minute: usize,

    #[serde(default)]
    pub cms: CmsConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub comments: CommentsConfig,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            description: String::new(),
            author: String::new(),
            language: "pt-BR".to_string(),
            timezone: "America/Sao_Paulo".to_string(),

            url: "http://example.com".to_string(),
            root: "/".to_string(),

            public_dir: "public".to_string(),
            static_dir: "static".to_string(),

            date_format: "%d %b %Y".to_string(),
            edited_format: "%d %b %Y, às %H:%M".to_string(),

            revalidate_secs: 30 * 60,
            words_per_minute: 200,

            cms: CmsConfig::default(),
            pagination: PaginationConfig::default(),
            comments: CommentsConfig::default(),
            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a YAML or TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;

        let mut config: SiteConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply environment overrides (currently only the CMS access token)
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                tracing::debug!("Using CMS access token from {}", ACCESS_TOKEN_ENV);
                self.cms.access_token = Some(token);
            }
        }
    }

    /// Age after which a generated page is stale, saturating at the
    /// largest span chrono can represent
    pub fn max_age(&self) -> TimeDelta {
        let secs = i64::try_from(self.revalidate_secs)
            .unwrap_or(i64::MAX)
            .min(MAX_AGE_SECS);
        TimeDelta::try_seconds(secs).unwrap_or_else(TimeDelta::max_value)
    }

    /// Locale used for month and weekday names
    pub fn locale(&self) -> chrono::Locale {
        let name = self.language.replace('-', "_");
        chrono::Locale::try_from(name.as_str()).unwrap_or(chrono::Locale::POSIX)
    }

    /// Timezone used when displaying publication dates
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or_else(|_| {
            if !self.timezone.is_empty() {
                tracing::warn!("Unknown timezone {:?}, falling back to UTC", self.timezone);
            }
            chrono_tz::UTC
        })
    }
}

/// Headless CMS connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    /// Prismic API endpoint, e.g. `https://my-repo.cdn.prismic.io/api/v2`
    pub endpoint: String,
    pub access_token: Option<String>,
    /// Custom type holding blog posts
    pub document_type: String,
    /// Fields projected on listing queries
    pub fields: Vec<String>,
    /// Listing page size
    pub page_size: usize,
    /// Upper bound of paths generated ahead of time
    pub paths_page_size: usize,
    pub timeout_secs: u64,
    /// JSON file with documents, used instead of the remote API when set
    pub fixture: Option<String>,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: None,
            document_type: "posts".to_string(),
            fields: vec![
                "title".to_string(),
                "subtitle".to_string(),
                "author".to_string(),
            ],
            page_size: 2,
            paths_page_size: 100,
            timeout_secs: 30,
            fixture: None,
        }
    }
}

impl CmsConfig {
    /// Field names qualified with the document type (`posts.title`)
    pub fn projected_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| format!("{}.{}", self.document_type, f))
            .collect()
    }
}

/// What to do when following a pagination cursor fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Log and keep the current state
    #[default]
    Ignore,
    /// Return the error to the caller
    Report,
}

/// Listing pagination settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PaginationConfig {
    pub on_error: OnError,
}

/// Utterances comment widget settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentsConfig {
    pub enable: bool,
    /// GitHub repository receiving the comment issues (`owner/name`)
    pub repo: String,
    pub issue_term: String,
    pub theme: String,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            enable: true,
            repo: String::new(),
            issue_term: "pathname".to_string(),
            theme: "github-dark".to_string(),
        }
    }
}

impl CommentsConfig {
    /// The widget is only injected once a repository is configured
    pub fn is_active(&self) -> bool {
        self.enable && !self.repo.trim().is_empty()
    }
}
