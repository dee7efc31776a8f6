//! Top-N response builder: sifts accumulated `{doc_id -> score}` entries
//! into a capped min-heap and drains it into a descending, tie-stable
//! result vector.

use std::cmp::Ordering;

use ahash::AHashMap;
use serde::Serialize;

use crate::support::minheap::CappedMinHeap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hit {
    pub doc_id: u64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub hits: Vec<Hit>,
}

impl SearchResponse {
    /// `cap` all accumulated scores into the top `limit`, descending, ties
    /// broken by first-seen order in `scores`' iteration (non-deterministic
    /// across hash-map implementations, but stable for a given build).
    pub fn build(scores: AHashMap<u64, f64>, limit: u32) -> Self {
        let cap = limit.max(1) as usize;
        let mut heap: CappedMinHeap<Hit> = CappedMinHeap::new(cap, |a: &Hit, b: &Hit| {
            a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal)
        });
        for (doc_id, score) in scores {
            heap.add(Hit { doc_id, score });
        }
        Self {
            hits: heap.into_sorted_vec(),
        }
    }

    pub fn result_count(&self) -> usize {
        self.hits.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "count": self.result_count(),
            "hits": self.hits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_to_limit_and_sorts_descending() {
        let mut scores = AHashMap::new();
        scores.insert(1, 0.5);
        scores.insert(2, 2.0);
        scores.insert(3, 1.0);
        let resp = SearchResponse::build(scores, 2);
        assert_eq!(resp.result_count(), 2);
        assert_eq!(resp.hits[0].doc_id, 2);
        assert_eq!(resp.hits[1].doc_id, 3);
    }

    #[test]
    fn to_json_embeds_count_and_hits() {
        let mut scores = AHashMap::new();
        scores.insert(1, 1.1736);
        let resp = SearchResponse::build(scores, 10);
        let json = resp.to_json();
        assert_eq!(json["count"], 1);
        assert_eq!(json["hits"][0]["doc_id"], 1);
    }
}
