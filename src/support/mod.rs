//! Generic data structures reused across the storage, indexing and query
//! layers: a worklist deque, Levenshtein distance, a BK-tree for fuzzy term
//! resolution, and a capped min-heap for top-N ranking.

pub mod bktree;
pub mod deque;
pub mod levenshtein;
pub mod minheap;

pub use bktree::BkTree;
pub use deque::Deque;
pub use levenshtein::LevenshteinContext;
pub use minheap::CappedMinHeap;
