//! Clean the public directory

use anyhow::Result;
use std::fs;

use crate::Blog;

/// Remove the public directory and the revalidation manifest
pub fn run(blog: &Blog) -> Result<()> {
    if blog.public_dir.exists() {
        fs::remove_dir_all(&blog.public_dir)?;
        tracing::info!("Deleted: {:?}", blog.public_dir);
    }

    let cache_dir = blog.cache_dir();
    if cache_dir.exists() {
        fs::remove_dir_all(&cache_dir)?;
        tracing::info!("Deleted: {:?}", cache_dir);
    }

    Ok(())
}
