//! spacetraveling: a static blog generator backed by a headless CMS
//!
//! Posts are fetched from a Prismic repository (or a local JSON fixture),
//! rendered with embedded Tera templates and written to the public
//! directory. Pages are revalidated after a configurable interval.

pub mod cache;
pub mod cms;
pub mod commands;
pub mod config;
pub mod content;
pub mod generator;
pub mod helpers;
pub mod server;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Config file names, in lookup order
const CONFIG_FILES: [&str; 2] = ["_config.yml", "_config.toml"];

/// A blog rooted at a base directory
#[derive(Debug, Clone)]
pub struct Blog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
    /// Static assets copied verbatim into the public directory
    pub static_dir: PathBuf,
}

impl Blog {
    /// Open the blog in `base_dir`, reading its config file if there is one
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let config_path = CONFIG_FILES
            .iter()
            .map(|name| base_dir.join(name))
            .find(|path| path.exists());

        let config = match config_path {
            Some(path) => config::SiteConfig::load(&path)?,
            None => {
                tracing::debug!("No config file in {:?}, using defaults", base_dir);
                let mut config = config::SiteConfig::default();
                config.apply_env();
                config
            }
        };

        Ok(Self::with_config(base_dir, config))
    }

    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let public_dir = base_dir.join(&config.public_dir);
        let static_dir = base_dir.join(&config.static_dir);

        Self {
            config,
            base_dir,
            public_dir,
            static_dir,
        }
    }

    /// The content store described by the config
    pub fn store(&self) -> Result<cms::Store> {
        cms::Store::from_config(&self.config.cms, &self.base_dir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.base_dir.join(cache::CACHE_DIR)
    }

    /// Generate the site, rendering only stale pages unless `force` is set
    pub async fn generate(&self, force: bool) -> Result<()> {
        commands::generate::run(self, force).await
    }

    /// Remove the public directory and the manifest
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}
