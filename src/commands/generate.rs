//! Generate static files

use anyhow::Result;
use std::time::{Duration, Instant};

use crate::cache::CacheDb;
use crate::cms::ContentStore;
use crate::generator::{GenerateReport, Generator};
use crate::Blog;

/// Generate the site, rendering only stale pages unless `force` is set
pub async fn run(blog: &Blog, force: bool) -> Result<()> {
    let store = blog.store()?;
    run_with_store(blog, &store, force).await?;
    Ok(())
}

/// Generate from a given store and persist the manifest
pub async fn run_with_store<S: ContentStore>(
    blog: &Blog,
    store: &S,
    force: bool,
) -> Result<GenerateReport> {
    let start = Instant::now();

    let mut cache = CacheDb::load(&blog.base_dir);
    let generator = Generator::new(blog)?;
    let report = generator.generate(store, &mut cache, force).await?;
    cache.save(&blog.base_dir)?;

    tracing::info!(
        "Generated {} posts ({} fresh, {} missing) in {:.2}s",
        report.rendered,
        report.skipped,
        report.missing,
        start.elapsed().as_secs_f64()
    );

    Ok(report)
}

/// Revalidate on a fixed interval until interrupted
pub async fn watch(blog: &Blog) -> Result<()> {
    let store = blog.store()?;
    let period = Duration::from_secs(blog.config.revalidate_secs.max(1));
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    tracing::info!(
        "Revalidating every {}s. Press Ctrl+C to stop.",
        period.as_secs()
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                tracing::info!("Revalidating...");
                if let Err(e) = run_with_store(blog, &store, false).await {
                    tracing::error!("Generation failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
