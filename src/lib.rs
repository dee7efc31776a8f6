//! nxsearch: a small embeddable full-text search engine.
//!
//! An inverted index over UTF-8 documents, backed by two append-only
//! memory-mapped files shared across processes. Boolean queries (`AND`,
//! `OR`, `NOT`, parentheses) are evaluated over posting bitmaps and ranked
//! by TF-IDF or BM25, with an optional BK-tree fuzzy fallback for tokens
//! that don't resolve exactly.
//!
//! ## Layout
//! - [`storage`]: the mmap-backed file abstraction and binary cursor.
//! - [`index::fts`]: tokenizer/filters, term and document tables, the two
//!   on-disk files, the query pipeline, ranking, and index lifecycle.
//! - [`support`]: generic data structures (deque, Levenshtein, BK-tree,
//!   capped min-heap) reused across the above.
//! - [`config`]: engine and per-index configuration.
//! - [`error`]: the error taxonomy every fallible call returns.

pub mod config;
pub mod error;
pub mod index;
pub mod storage;
pub mod support;

pub use config::{EngineConfig, IndexParams, SearchParams};
pub use error::{NxsError, Result};
pub use index::fts::{Engine, Hit, Index, SearchResponse};
