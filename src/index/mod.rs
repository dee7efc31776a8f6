//! Index layer: the inverted full-text index and its supporting structures.

pub mod fts;
