//! BK-tree over an arbitrary keyed type, navigated by a caller-supplied
//! distance function. Nodes live in a flat arena addressed by index rather
//! than by pointer, per the arena-with-integer-indices pattern for
//! parent/child relationships that would otherwise require pointer-to-pointer
//! updates.
//!
//! Each node carries a 64-bit bitmap marking which distance buckets (0..=63)
//! have a child; the child for bucket `d` sits at position
//! `popcount(bitmap & ((1 << d) - 1))` in the node's child list. Distances
//! above 63 are clamped when used as a bucket index, but the exact distance
//! is still what is compared against a caller's tolerance.

use crate::support::deque::Deque;

const MAX_BUCKET: u32 = 63;

struct Node<T> {
    key: T,
    bitmap: u64,
    children: Vec<usize>,
}

pub struct BkTree<T> {
    arena: Vec<Node<T>>,
    root: Option<usize>,
}

/// The key already exists in the tree (distance 0 from an existing node).
#[derive(Debug)]
pub struct Duplicate;

fn bucket_index(bitmap: u64, bucket: u32) -> usize {
    let mask = if bucket == 0 { 0 } else { (1u64 << bucket) - 1 };
    (bitmap & mask).count_ones() as usize
}

impl<T> BkTree<T> {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            root: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn get(&self, idx: usize) -> &T {
        &self.arena[idx].key
    }

    /// Insert `key`, using `dist` to measure distance against existing nodes.
    /// Fails with `Duplicate` if an existing node is at distance 0.
    pub fn insert<F>(&mut self, key: T, mut dist: F) -> Result<usize, Duplicate>
    where
        F: FnMut(&T, &T) -> u32,
    {
        let Some(root) = self.root else {
            self.arena.push(Node {
                key,
                bitmap: 0,
                children: Vec::new(),
            });
            let idx = self.arena.len() - 1;
            self.root = Some(idx);
            return Ok(idx);
        };

        let mut cur = root;
        loop {
            let d = dist(&key, &self.arena[cur].key);
            if d == 0 {
                return Err(Duplicate);
            }
            let bucket = d.min(MAX_BUCKET);
            let bit = 1u64 << bucket;
            let bitmap = self.arena[cur].bitmap;
            let slot = bucket_index(bitmap, bucket);
            if bitmap & bit != 0 {
                cur = self.arena[cur].children[slot];
                continue;
            }
            self.arena.push(Node {
                key,
                bitmap: 0,
                children: Vec::new(),
            });
            let new_idx = self.arena.len() - 1;
            self.arena[cur].children.insert(slot, new_idx);
            self.arena[cur].bitmap |= bit;
            return Ok(new_idx);
        }
    }

    /// All arena indices whose key is within `tolerance` of `query`.
    pub fn search<F>(&self, query: &T, tolerance: u32, mut dist: F) -> Vec<usize>
    where
        F: FnMut(&T, &T) -> u32,
    {
        let mut results = Vec::new();
        let Some(root) = self.root else {
            return results;
        };

        let mut worklist = Deque::new();
        worklist.push_back(root);
        while let Some(idx) = worklist.pop_front() {
            let node = &self.arena[idx];
            let d = dist(query, &node.key);
            if d <= tolerance {
                results.push(idx);
            }
            let lo = d.saturating_sub(tolerance).min(MAX_BUCKET);
            let hi = d.saturating_add(tolerance).min(MAX_BUCKET);
            for bucket in lo..=hi {
                let bit = 1u64 << bucket;
                if node.bitmap & bit != 0 {
                    let slot = bucket_index(node.bitmap, bucket);
                    worklist.push_back(node.children[slot]);
                }
            }
        }
        results
    }
}

impl<T> Default for BkTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::levenshtein::distance;

    #[test]
    fn search_returns_exactly_the_words_within_tolerance() {
        let vocabulary = [
            "the", "quick", "brown", "fox", "jumped", "over", "lazy", "dog",
        ];
        let mut tree: BkTree<String> = BkTree::new();
        for word in vocabulary {
            tree.insert(word.to_string(), |a, b| distance(a, b)).unwrap();
        }

        let queries = [
            ("teh", "the"),
            ("qvick", "quick"),
            ("brawn", "brown"),
            ("fox", "fox"),
            ("jumps", "jumped"),
            ("ovr", "over"),
            ("llazy", "lazy"),
            ("dog", "dog"),
        ];
        for (query, expected) in queries {
            let hits = tree.search(&query.to_string(), 2, |a, b| distance(a, b));
            let found: Vec<&String> = hits.iter().map(|&i| tree.get(i)).collect();
            assert!(
                found.iter().any(|w| w.as_str() == expected),
                "expected {} to match {} within tolerance 2, got {:?}",
                query,
                expected,
                found
            );
        }
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut tree: BkTree<String> = BkTree::new();
        tree.insert("dog".to_string(), |a, b| distance(a, b)).unwrap();
        let err = tree.insert("dog".to_string(), |a, b| distance(a, b));
        assert!(err.is_err());
    }

    #[test]
    fn search_excludes_words_outside_tolerance() {
        let mut tree: BkTree<String> = BkTree::new();
        for word in ["cat", "hat", "elephant"] {
            tree.insert(word.to_string(), |a, b| distance(a, b)).unwrap();
        }
        let hits = tree.search(&"cat".to_string(), 1, |a, b| distance(a, b));
        let found: Vec<&String> = hits.iter().map(|&i| tree.get(i)).collect();
        assert!(found.iter().any(|w| w.as_str() == "cat"));
        assert!(found.iter().any(|w| w.as_str() == "hat"));
        assert!(!found.iter().any(|w| w.as_str() == "elephant"));
    }
}
