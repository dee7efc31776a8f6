//! In-memory document table: doc id -> byte offset of its record in the
//! dtmap file. Reading a document's length or a term's in-document count
//! decodes the record directly out of the mapped region at that offset
//! rather than caching a copy, so the table stays a thin index.

use std::cmp::Ordering;

use crate::error::{NxsError, Result};
use crate::storage::binio::read_u32_be;

#[derive(Debug, Clone, Copy)]
pub struct DocEntry {
    pub doc_id: u64,
    pub offset: u64,
}

#[derive(Default)]
pub struct DocTable {
    by_id: ahash::AHashMap<u64, DocEntry>,
}

impl DocTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn create(&mut self, doc_id: u64, offset: u64) -> Result<()> {
        if self.by_id.contains_key(&doc_id) {
            return Err(NxsError::Exists(format!("document {doc_id} already indexed")));
        }
        self.by_id.insert(doc_id, DocEntry { doc_id, offset });
        Ok(())
    }

    pub fn destroy(&mut self, doc_id: u64) -> Option<DocEntry> {
        self.by_id.remove(&doc_id)
    }

    pub fn lookup(&self, doc_id: u64) -> Option<&DocEntry> {
        self.by_id.get(&doc_id)
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.by_id.keys().copied()
    }

    /// Document length in tokens (including duplicates), read from the
    /// record at this doc's stored offset: `doc_id(8) | doclen(4) | n(4) | ...`.
    pub fn get_doclen(&self, doc_id: u64, region: &[u8]) -> Result<u32> {
        let entry = self
            .lookup(doc_id)
            .ok_or_else(|| NxsError::Missing(format!("document {doc_id} not found")))?;
        read_u32_be(region, entry.offset as usize + 8)
    }

    /// Binary search the record's sorted `(term_id, count)` pairs for
    /// `term_id`. Returns -1 if the document does not contain that term.
    pub fn get_termcount(&self, doc_id: u64, term_id: u32, region: &[u8]) -> Result<i64> {
        let entry = self
            .lookup(doc_id)
            .ok_or_else(|| NxsError::Missing(format!("document {doc_id} not found")))?;
        let base = entry.offset as usize;
        let n = read_u32_be(region, base + 12)? as usize;
        let pairs_start = base + 16;

        let mut lo = 0usize;
        let mut hi = n;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let pair_off = pairs_start + mid * 8;
            let tid = read_u32_be(region, pair_off)?;
            match tid.cmp(&term_id) {
                Ordering::Equal => {
                    let count = read_u32_be(region, pair_off + 4)?;
                    return Ok(count as i64);
                }
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
            }
        }
        Ok(-1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::binio::Cursor;

    fn build_record(buf: &mut [u8], doc_id: u64, doclen: u32, pairs: &[(u32, u32)]) {
        let mut cur = Cursor::new(buf);
        cur.store_u64(doc_id).unwrap();
        cur.store_u32(doclen).unwrap();
        cur.store_u32(pairs.len() as u32).unwrap();
        for &(tid, count) in pairs {
            cur.store_u32(tid).unwrap();
            cur.store_u32(count).unwrap();
        }
    }

    #[test]
    fn create_rejects_duplicate_doc_id() {
        let mut table = DocTable::new();
        table.create(7, 0).unwrap();
        assert!(table.create(7, 100).is_err());
    }

    #[test]
    fn get_doclen_and_get_termcount_read_from_the_region() {
        let mut buf = vec![0u8; 64];
        build_record(&mut buf, 42, 6, &[(1, 2), (3, 1), (9, 3)]);

        let mut table = DocTable::new();
        table.create(42, 0).unwrap();

        assert_eq!(table.get_doclen(42, &buf).unwrap(), 6);
        assert_eq!(table.get_termcount(42, 1, &buf).unwrap(), 2);
        assert_eq!(table.get_termcount(42, 3, &buf).unwrap(), 1);
        assert_eq!(table.get_termcount(42, 9, &buf).unwrap(), 3);
        assert_eq!(table.get_termcount(42, 5, &buf).unwrap(), -1);
    }

    #[test]
    fn lookup_missing_doc_is_missing_error() {
        let table = DocTable::new();
        let buf = vec![0u8; 16];
        assert!(table.get_doclen(1, &buf).is_err());
    }
}
