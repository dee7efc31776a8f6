//! Durable storage primitives: the mmap-backed file abstraction and the
//! bounds-checked binary cursor built on top of it.

pub mod binio;
pub mod idxmap;

pub use binio::Cursor;
pub use idxmap::IdxMap;
