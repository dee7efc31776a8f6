//! Append-only document-term-map file: a 32-byte header followed by
//! document records, each listing a document's unique terms and per-term
//! counts, sorted ascending by term id. Deletions are tombstones: a zeroed
//! doc-id field acks a skip, and a zero-length/zero-count record is the
//! tombstone a peer observes to drop its in-memory entry.

use std::path::Path;

use crate::error::{NxsError, Result};
use crate::index::fts::doc_table::DocTable;
use crate::index::fts::term_table::TermTable;
use crate::index::fts::terms_file::TermsFile;
use crate::storage::binio::{read_u32_be, read_u64_be, Cursor};
use crate::storage::idxmap::IdxMap;

const MAGIC: &[u8; 5] = b"NXSDM";
const ABI_VERSION: u8 = 1;
const HEADER_SIZE: usize = 32;
const DATA_LEN_OFFSET: usize = 8;
const TOKEN_COUNT_OFFSET: usize = 16;
const DOC_COUNT_OFFSET: usize = 24;

pub struct DtmapFile {
    map: IdxMap,
    consumed: u64,
}

fn build_block(doc_id: u64, doclen: u32, pairs: &[(u32, u32)]) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; 16 + pairs.len() * 8];
    let mut cur = Cursor::new(&mut buf);
    cur.store_u64(doc_id)?;
    cur.store_u32(doclen)?;
    cur.store_u32(pairs.len() as u32)?;
    for &(term_id, count) in pairs {
        cur.store_u32(term_id)?;
        cur.store_u32(count)?;
    }
    Ok(buf)
}

impl DtmapFile {
    pub fn open(path: &Path, table: &mut TermTable, docs: &mut DocTable) -> Result<Self> {
        let (mut map, created) = IdxMap::open(path)?;
        if created {
            map.lock_excl()?;
            let write_result = (|| -> Result<()> {
                map.map(HEADER_SIZE as u64, true)?;
                let mut cur = Cursor::new(&mut map.region_mut()[..HEADER_SIZE]);
                cur.store_bytes(MAGIC)?;
                cur.store_bytes(&[ABI_VERSION])?;
                cur.store_bytes(&[0, 0])?;
                cur.store_u64(0)?;
                cur.store_u64(0)?;
                cur.store_u32(0)?;
                cur.store_bytes(&[0, 0, 0, 0])?;
                Ok(())
            })();
            map.unlock()?;
            write_result?;
        } else if &map.region()[0..5] != MAGIC {
            return Err(NxsError::Fatal(format!(
                "{}: bad dtmap file magic",
                path.display()
            )));
        }
        let mut file = Self { map, consumed: 0 };
        file.sync(table, docs, false)?;
        Ok(file)
    }

    fn data_length(&self) -> u64 {
        self.map.load_u64_acquire(DATA_LEN_OFFSET)
    }

    pub fn token_count(&self) -> u64 {
        self.map.load_u64_relaxed(TOKEN_COUNT_OFFSET)
    }

    pub fn doc_count(&self) -> u32 {
        self.map.load_u32_relaxed(DOC_COUNT_OFFSET)
    }

    /// Replay document records from our consumed offset to the published
    /// data length. Skipped blocks (doc id 0) and tombstones (doclen==0 &&
    /// n==0) only update bookkeeping/in-memory removal; live records
    /// register the doc and add it to each referenced term's posting
    /// bitmap. An unresolved term id is *fatal* unless `partial_ok`, in
    /// which case sync stops before consuming that record.
    pub fn sync(&mut self, table: &mut TermTable, docs: &mut DocTable, partial_ok: bool) -> Result<()> {
        let published = self.data_length();
        if published <= self.consumed {
            return Ok(());
        }
        self.map.map(HEADER_SIZE as u64 + published, false)?;

        let mut offset = HEADER_SIZE + self.consumed as usize;
        let limit = HEADER_SIZE + published as usize;
        while offset < limit {
            let region = self.map.region();
            let doc_id = read_u64_be(region, offset)?;
            let doclen = read_u32_be(region, offset + 8)?;
            let n = read_u32_be(region, offset + 12)? as usize;
            let record_len = 16 + n * 8;

            if doc_id == 0 {
                offset += record_len;
                self.consumed = (offset - HEADER_SIZE) as u64;
                continue;
            }
            if doclen == 0 && n == 0 {
                docs.destroy(doc_id);
                offset += record_len;
                self.consumed = (offset - HEADER_SIZE) as u64;
                continue;
            }

            let mut resolved = Vec::with_capacity(n);
            let mut unresolved = false;
            for i in 0..n {
                let pair_off = offset + 16 + i * 8;
                let term_id = read_u32_be(region, pair_off)?;
                if table.lookup_by_id(term_id).is_none() {
                    unresolved = true;
                    break;
                }
                resolved.push(term_id);
            }
            if unresolved {
                if partial_ok {
                    return Ok(());
                }
                return Err(NxsError::Fatal(format!(
                    "dtmap record for doc {doc_id} references an unresolved term id"
                )));
            }

            if docs.lookup(doc_id).is_none() {
                docs.create(doc_id, offset as u64)?;
                for term_id in resolved {
                    table.add_doc(term_id, doc_id);
                }
            }
            offset += record_len;
            self.consumed = (offset - HEADER_SIZE) as u64;
        }
        Ok(())
    }

    /// Append a document record for `doc_id` with the given resolved
    /// `(term_id, count)` pairs (any order; sorted here) and total token
    /// count `doclen`. The duplicate-doc-id check and the posting/total
    /// updates happen together under the file lock, so a rejected duplicate
    /// never touches a shared term's postings.
    pub fn add(
        &mut self,
        doc_id: u64,
        mut pairs: Vec<(u32, u32)>,
        doclen: u32,
        terms: &mut TermsFile,
        table: &mut TermTable,
        docs: &mut DocTable,
    ) -> Result<()> {
        if doc_id == 0 {
            return Err(NxsError::Invalid("document id must be nonzero".to_string()));
        }
        terms.sync(table)?;
        self.sync(table, docs, false)?;

        pairs.sort_unstable_by_key(|&(term_id, _)| term_id);
        self.add_locked(doc_id, &pairs, doclen, terms, table, docs)
    }

    fn add_locked(
        &mut self,
        doc_id: u64,
        pairs: &[(u32, u32)],
        doclen: u32,
        terms: &mut TermsFile,
        table: &mut TermTable,
        docs: &mut DocTable,
    ) -> Result<()> {
        self.map.lock_excl()?;
        let result = (|| -> Result<()> {
            loop {
                let published = self.data_length();
                if published > self.consumed {
                    terms.sync(table)?;
                    self.sync(table, docs, false)?;
                    continue;
                }
                break;
            }
            if docs.lookup(doc_id).is_some() {
                return Err(NxsError::Exists(format!("document {doc_id} already indexed")));
            }

            for &(term_id, count) in pairs {
                table.add_doc(term_id, doc_id);
                table.incr_total(term_id, count as u64);
            }

            let block = build_block(doc_id, doclen, pairs)?;
            let offset = HEADER_SIZE as u64 + self.consumed;
            self.map.map(offset + block.len() as u64, true)?;
            self.map.region_mut()[offset as usize..offset as usize + block.len()]
                .copy_from_slice(&block);
            docs.create(doc_id, offset)?;

            let new_token_count = self.token_count().saturating_add(doclen as u64);
            let new_doc_count = self.doc_count().saturating_add(1);
            self.map.store_u64_relaxed(TOKEN_COUNT_OFFSET, new_token_count);
            self.map.store_u32_relaxed(DOC_COUNT_OFFSET, new_doc_count);

            let new_len = self.consumed + block.len() as u64;
            self.map.store_u64_release(DATA_LEN_OFFSET, new_len);
            self.consumed = new_len;
            Ok(())
        })();
        self.map.unlock()?;
        result
    }

    /// Remove `doc_id`: acks the original block, drops it from every
    /// referenced term's posting bitmap, appends a tombstone, and
    /// decrements the header counters exactly once (here, after the
    /// tombstone append succeeds).
    pub fn remove(
        &mut self,
        doc_id: u64,
        terms: &mut TermsFile,
        table: &mut TermTable,
        docs: &mut DocTable,
    ) -> Result<()> {
        self.map.lock_excl()?;
        let result = (|| -> Result<()> {
            terms.sync(table)?;
            self.sync(table, docs, false)?;

            let entry = docs
                .lookup(doc_id)
                .copied()
                .ok_or_else(|| NxsError::Missing(format!("document {doc_id} not found")))?;
            let offset = entry.offset as usize;

            self.map.store_u64_release(offset, 0);

            let doclen = read_u32_be(self.map.region(), offset + 8)?;
            let n = read_u32_be(self.map.region(), offset + 12)? as usize;
            for i in 0..n {
                let pair_off = offset + 16 + i * 8;
                let term_id = read_u32_be(self.map.region(), pair_off)?;
                let count = read_u32_be(self.map.region(), pair_off + 4)?;
                table.del_doc(term_id, doc_id);
                table.decr_total(term_id, count as u64);
            }
            docs.destroy(doc_id);

            let tomb_offset = HEADER_SIZE as u64 + self.consumed;
            self.map.map(tomb_offset + 16, true)?;
            {
                let region = self.map.region_mut();
                let mut cur = Cursor::at(region, tomb_offset as usize);
                cur.store_u64(doc_id)?;
                cur.store_u32(0)?;
                cur.store_u32(0)?;
            }

            let new_token_count = self.token_count().saturating_sub(doclen as u64);
            let new_doc_count = self.doc_count().saturating_sub(1);
            self.map.store_u64_relaxed(TOKEN_COUNT_OFFSET, new_token_count);
            self.map.store_u32_relaxed(DOC_COUNT_OFFSET, new_doc_count);

            let new_len = self.consumed + 16;
            self.map.store_u64_release(DATA_LEN_OFFSET, new_len);
            self.consumed = new_len;
            Ok(())
        })();
        self.map.unlock()?;
        result
    }

    pub fn region(&self) -> &[u8] {
        self.map.region()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fresh_pair(dir: &std::path::Path) -> (TermsFile, TermTable, DtmapFile, DocTable) {
        let mut table = TermTable::new();
        let terms = TermsFile::open(&dir.join("nxsterms.db"), &mut table).unwrap();
        let mut docs = DocTable::new();
        let dtmap = DtmapFile::open(&dir.join("nxsdtmap.db"), &mut table, &mut docs).unwrap();
        (terms, table, dtmap, docs)
    }

    #[test]
    fn add_then_get_termcount_round_trips() {
        let dir = tempdir().unwrap();
        let (mut terms, mut table, mut dtmap, mut docs) = fresh_pair(dir.path());

        terms.add(&[("fox", 2), ("dog", 1)], &mut table).unwrap();
        let fox = table.lookup("fox").unwrap();
        let dog = table.lookup("dog").unwrap();
        dtmap
            .add(1, vec![(fox, 2), (dog, 1)], 3, &mut terms, &mut table, &mut docs)
            .unwrap();

        assert_eq!(dtmap.doc_count(), 1);
        assert_eq!(dtmap.token_count(), 3);
        assert_eq!(docs.get_doclen(1, dtmap.region()).unwrap(), 3);
        assert_eq!(docs.get_termcount(1, fox, dtmap.region()).unwrap(), 2);
        assert_eq!(docs.get_termcount(1, dog, dtmap.region()).unwrap(), 1);
        assert_eq!(table.doc_freq(fox), 1);
    }

    #[test]
    fn add_duplicate_doc_id_fails_with_exists() {
        let dir = tempdir().unwrap();
        let (mut terms, mut table, mut dtmap, mut docs) = fresh_pair(dir.path());
        terms.add(&[("fox", 1)], &mut table).unwrap();
        let fox = table.lookup("fox").unwrap();
        dtmap
            .add(1, vec![(fox, 1)], 1, &mut terms, &mut table, &mut docs)
            .unwrap();
        let err = dtmap
            .add(1, vec![(fox, 1)], 1, &mut terms, &mut table, &mut docs)
            .unwrap_err();
        assert_eq!(err.code(), "EXISTS");
    }

    #[test]
    fn remove_tombstones_and_clears_postings() {
        let dir = tempdir().unwrap();
        let (mut terms, mut table, mut dtmap, mut docs) = fresh_pair(dir.path());
        terms.add(&[("fox", 1)], &mut table).unwrap();
        let fox = table.lookup("fox").unwrap();
        dtmap
            .add(1, vec![(fox, 1)], 1, &mut terms, &mut table, &mut docs)
            .unwrap();

        dtmap.remove(1, &mut terms, &mut table, &mut docs).unwrap();

        assert!(docs.lookup(1).is_none());
        assert_eq!(table.doc_freq(fox), 0);
        assert_eq!(dtmap.doc_count(), 0);
        assert_eq!(dtmap.token_count(), 0);
    }

    #[test]
    fn remove_missing_doc_fails_with_missing() {
        let dir = tempdir().unwrap();
        let (mut terms, mut table, mut dtmap, mut docs) = fresh_pair(dir.path());
        let err = dtmap.remove(404, &mut terms, &mut table, &mut docs).unwrap_err();
        assert_eq!(err.code(), "MISSING");
    }

    #[test]
    fn reopen_replays_records_into_fresh_in_memory_state() {
        let dir = tempdir().unwrap();
        {
            let (mut terms, mut table, mut dtmap, mut docs) = fresh_pair(dir.path());
            terms.add(&[("fox", 1), ("dog", 1)], &mut table).unwrap();
            let fox = table.lookup("fox").unwrap();
            let dog = table.lookup("dog").unwrap();
            dtmap
                .add(1, vec![(fox, 1), (dog, 1)], 2, &mut terms, &mut table, &mut docs)
                .unwrap();
        }

        let mut table2 = TermTable::new();
        let _terms2 = TermsFile::open(&dir.path().join("nxsterms.db"), &mut table2).unwrap();
        let mut docs2 = DocTable::new();
        let dtmap2 = DtmapFile::open(&dir.path().join("nxsdtmap.db"), &mut table2, &mut docs2).unwrap();
        assert_eq!(dtmap2.doc_count(), 1);
        let fox2 = table2.lookup("fox").unwrap();
        assert_eq!(table2.doc_freq(fox2), 1);
        assert!(docs2.lookup(1).is_some());
    }
}
