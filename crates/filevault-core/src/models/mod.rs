pub mod file;
pub mod share_link;

pub use file::{FileObject, Page, IMAGE_MEDIA_TYPES};
pub use share_link::{ShareDuration, ShareLink, ShareLinkState};
