//! Inbound attachment handling: download, dedup storage, probing and
//! thumbnails.

pub mod fetcher;
pub mod mime;
pub mod probe;
pub mod store;
pub mod thumbnail;

pub use fetcher::{FetchedMedia, GraphMediaFetcher, MediaFetcher};
pub use mime::MediaKind;
pub use store::{MediaStore, StoredMedia};
pub use thumbnail::{ImageThumbnailer, ThumbnailGenerator, ThumbnailSize};
