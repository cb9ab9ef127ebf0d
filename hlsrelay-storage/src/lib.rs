// Storage for published HLS files
//
// `backend` holds the key/value stores, `publisher` turns a local file into
// a locator by writing it to one of them.

pub mod backend;
pub mod publisher;

pub use backend::{FileStorage, HlsStorage, MemoryStorage, OssConfig, OssStorage};
pub use publisher::{KeyLayout, SegmentPublisher, StoragePublisher};
