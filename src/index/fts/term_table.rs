//! In-memory term table: text/id interning, per-term posting bitmaps, and a
//! BK-tree over term text for fuzzy resolution. Owned by one index handle;
//! rebuilt by replaying the terms and dtmap files on open.

use ahash::AHashMap;
use roaring::RoaringTreemap;

use crate::support::bktree::BkTree;
use crate::support::levenshtein::LevenshteinContext;

/// One interned term: its id, text, the byte offset of its occurrence
/// counter in the terms file, a locally-tracked occurrence total (used only
/// to break ties in fuzzy resolution), and its posting bitmap.
pub struct TermEntry {
    pub id: u32,
    pub text: String,
    pub counter_offset: u64,
    pub total_count: u64,
    pub postings: RoaringTreemap,
}

/// text -> id, id -> entry, and a BK-tree over term text for fuzzy lookup.
#[derive(Default)]
pub struct TermTable {
    text_to_id: AHashMap<String, u32>,
    terms: Vec<TermEntry>,
    bktree: BkTree<String>,
    lev: LevenshteinContext,
}

impl TermTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The id the next freshly-appended term would receive.
    pub fn next_id(&self) -> u32 {
        self.terms.len() as u32 + 1
    }

    pub fn lookup(&self, text: &str) -> Option<u32> {
        self.text_to_id.get(text).copied()
    }

    pub fn lookup_by_id(&self, id: u32) -> Option<&TermEntry> {
        id.checked_sub(1)
            .and_then(|idx| self.terms.get(idx as usize))
    }

    fn lookup_by_id_mut(&mut self, id: u32) -> Option<&mut TermEntry> {
        id.checked_sub(1)
            .and_then(|idx| self.terms.get_mut(idx as usize))
    }

    /// Insert `text` as term `id`, caller already having verified `id ==
    /// next_id()`. Idempotent: if `text` is already interned, the existing
    /// id is returned and no new entry is created (covers the race where a
    /// peer registered the same text between our lookup and our append).
    pub fn insert(&mut self, text: &str, id: u32, counter_offset: u64, initial_count: u64) -> u32 {
        if let Some(&existing) = self.text_to_id.get(text) {
            return existing;
        }
        self.text_to_id.insert(text.to_string(), id);
        self.terms.push(TermEntry {
            id,
            text: text.to_string(),
            counter_offset,
            total_count: initial_count,
            postings: RoaringTreemap::new(),
        });
        let (bktree, lev) = (&mut self.bktree, &mut self.lev);
        let _ = bktree.insert(text.to_string(), |a, b| lev.distance(a, b));
        id
    }

    /// Resolve `text` against the vocabulary within `tolerance` edits,
    /// preferring the candidate with the highest global occurrence count and
    /// breaking ties by first-encountered order.
    pub fn fuzzy_search(&mut self, text: &str, tolerance: u32) -> Option<u32> {
        let query = text.to_string();
        let (bktree, lev) = (&mut self.bktree, &mut self.lev);
        let hits = bktree.search(&query, tolerance, |a, b| lev.distance(a, b));

        let mut best: Option<(u32, u64)> = None;
        for idx in hits {
            let word = bktree.get(idx);
            let Some(&id) = self.text_to_id.get(word) else {
                continue;
            };
            let count = self.terms[(id - 1) as usize].total_count;
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((id, count)),
            }
        }
        best.map(|(id, _)| id)
    }

    pub fn incr_total(&mut self, id: u32, n: u64) {
        if let Some(t) = self.lookup_by_id_mut(id) {
            t.total_count += n;
        }
    }

    pub fn decr_total(&mut self, id: u32, n: u64) {
        if let Some(t) = self.lookup_by_id_mut(id) {
            t.total_count = t.total_count.saturating_sub(n);
        }
    }

    pub fn add_doc(&mut self, id: u32, doc_id: u64) {
        if let Some(t) = self.lookup_by_id_mut(id) {
            t.postings.insert(doc_id);
        }
    }

    pub fn del_doc(&mut self, id: u32, doc_id: u64) {
        if let Some(t) = self.lookup_by_id_mut(id) {
            t.postings.remove(doc_id);
        }
    }

    /// Number of live documents containing `id`, i.e. the cardinality of its
    /// posting bitmap.
    pub fn doc_freq(&self, id: u32) -> u64 {
        self.lookup_by_id(id).map(|t| t.postings.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_assigns_sequential_ids_and_is_idempotent_on_duplicate_text() {
        let mut table = TermTable::new();
        let id1 = table.insert("fox", table.next_id(), 16, 1);
        assert_eq!(id1, 1);
        let id2 = table.insert("dog", table.next_id(), 40, 1);
        assert_eq!(id2, 2);
        let dup = table.insert("fox", 99, 999, 1);
        assert_eq!(dup, 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn postings_and_totals_track_add_remove() {
        let mut table = TermTable::new();
        let fox = table.insert("fox", table.next_id(), 16, 1);
        table.add_doc(fox, 1);
        table.add_doc(fox, 2);
        table.incr_total(fox, 2);
        assert_eq!(table.doc_freq(fox), 2);
        assert_eq!(table.lookup_by_id(fox).unwrap().total_count, 3);

        table.del_doc(fox, 1);
        table.decr_total(fox, 1);
        assert_eq!(table.doc_freq(fox), 1);
        assert_eq!(table.lookup_by_id(fox).unwrap().total_count, 2);

        table.decr_total(fox, 100);
        assert_eq!(table.lookup_by_id(fox).unwrap().total_count, 0);
    }

    #[test]
    fn fuzzy_search_prefers_highest_occurrence_count() {
        let mut table = TermTable::new();
        let fox = table.insert("fox", table.next_id(), 16, 0);
        let fax = table.insert("fax", table.next_id(), 40, 0);
        table.incr_total(fox, 10);
        table.incr_total(fax, 50);

        let hit = table.fuzzy_search("fog", 2).unwrap();
        assert_eq!(hit, fax);
    }

    #[test]
    fn fuzzy_search_returns_none_outside_tolerance() {
        let mut table = TermTable::new();
        table.insert("elephant", table.next_id(), 16, 1);
        assert!(table.fuzzy_search("cat", 1).is_none());
    }
}
