//! Configuration module

mod site;

pub use site::CmsConfig;
pub use site::CommentsConfig;
pub use site::OnError;
pub use site::PaginationConfig;
pub use site::SiteConfig;
