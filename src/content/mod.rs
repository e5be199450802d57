//! Content module - post models and the logic built on top of the CMS

pub mod loader;
pub mod pagination;
mod post;
pub mod reading_time;
pub mod siblings;

pub use loader::ContentLoader;
pub use pagination::{Accumulator, LoadOutcome};
pub use post::{ContentSection, PostDetail, PostSummary, SiblingPost};
pub use siblings::Siblings;
