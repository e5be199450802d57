//! Helper functions shared by the generator, templates and rich text renderer

mod date;
mod html;
mod url;

pub use date::*;
pub use html::*;
pub use url::*;
