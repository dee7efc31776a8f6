//! Append-only term dictionary file: a 16-byte header followed by a
//! sequence of term blocks, each holding the term's UTF-8 text and an
//! 8-byte occurrence counter. Term id equals ordinal append position, so
//! every process that replays the file in order assigns the same ids.

use std::path::Path;

use tracing::debug;

use crate::error::{NxsError, Result};
use crate::index::fts::term_table::TermTable;
use crate::storage::binio::Cursor;
use crate::storage::idxmap::IdxMap;

const MAGIC: &[u8; 5] = b"NXSTM";
const ABI_VERSION: u8 = 1;
const HEADER_SIZE: usize = 16;
// Padded to a 4-byte boundary: `AtomicU32::from_ptr` requires its pointer be
// aligned to `align_of::<AtomicU32>()`, and the mmap base is only guaranteed
// page-aligned, not aligned at arbitrary header offsets.
const DATA_LEN_OFFSET: usize = 8;
const MAX_TERM_LEN: usize = 65_535;

fn block_size(text_len: usize) -> usize {
    let unpadded = 2 + text_len + 1;
    let padded = unpadded.div_ceil(8) * 8;
    padded + 8
}

/// Handle to the open terms file plus this process's read cursor into it.
pub struct TermsFile {
    map: IdxMap,
    consumed: u64,
}

impl TermsFile {
    /// Open (creating if necessary) the terms file at `path`, writing the
    /// header on creation, and catch this handle's cursor up to whatever is
    /// already on disk into `table`.
    pub fn open(path: &Path, table: &mut TermTable) -> Result<Self> {
        let (mut map, created) = IdxMap::open(path)?;
        if created {
            map.lock_excl()?;
            let write_result = (|| -> Result<()> {
                map.map(HEADER_SIZE as u64, true)?;
                let mut cur = Cursor::new(&mut map.region_mut()[..HEADER_SIZE]);
                cur.store_bytes(MAGIC)?;
                cur.store_bytes(&[ABI_VERSION])?;
                cur.store_bytes(&[0, 0])?;
                cur.store_u32(0)?;
                cur.store_bytes(&[0, 0, 0, 0])?;
                Ok(())
            })();
            map.unlock()?;
            write_result?;
            debug!(path = %path.display(), "initialized terms file header");
        } else {
            let region = &map.region()[0..5];
            if region != MAGIC {
                return Err(NxsError::Fatal(format!(
                    "{}: bad terms file magic",
                    path.display()
                )));
            }
        }
        let mut file = Self { map, consumed: 0 };
        file.sync(table)?;
        Ok(file)
    }

    fn data_length(&self) -> u64 {
        self.map.load_u32_acquire(DATA_LEN_OFFSET) as u64
    }

    /// Replay term blocks from our consumed offset to the published data
    /// length, interning each into `table` with id `table.next_id()`.
    pub fn sync(&mut self, table: &mut TermTable) -> Result<()> {
        let published = self.data_length();
        if published <= self.consumed {
            return Ok(());
        }
        self.map.map(HEADER_SIZE as u64 + published, false)?;

        let mut offset = HEADER_SIZE + self.consumed as usize;
        let limit = HEADER_SIZE + published as usize;
        while offset < limit {
            let region = self.map.region();
            let len = u16::from_be_bytes([region[offset], region[offset + 1]]) as usize;
            let text_start = offset + 2;
            let text = std::str::from_utf8(&region[text_start..text_start + len])
                .map_err(|e| NxsError::Fatal(format!("terms file: invalid utf8: {e}")))?
                .to_string();
            let counter_off = {
                let unpadded = 2 + len + 1;
                offset + unpadded.div_ceil(8) * 8
            };
            let count = crate::storage::binio::read_u64_be(self.map.region(), counter_off)?;
            table.insert(&text, table.next_id(), counter_off as u64, count);
            offset = counter_off + 8;
        }
        self.consumed = published;
        Ok(())
    }

    /// Append every staged (unresolved) token's text as a new term, retrying
    /// the publish loop once if a peer has advanced the file underneath us.
    pub fn add(&mut self, staged_texts: &[(&str, u32)], table: &mut TermTable) -> Result<()> {
        if staged_texts.is_empty() {
            return Ok(());
        }
        self.map.lock_excl()?;
        let result = self.add_locked(staged_texts, table);
        self.map.unlock()?;
        result
    }

    fn add_locked(&mut self, staged_texts: &[(&str, u32)], table: &mut TermTable) -> Result<()> {
        loop {
            let published = self.data_length();
            if published > self.consumed {
                self.sync(table)?;
                continue;
            }
            break;
        }

        let mut new_len = self.consumed;
        let mut worst_case = 0u64;
        for (text, _) in staged_texts {
            if table.lookup(text).is_none() {
                if text.len() > MAX_TERM_LEN {
                    return Err(NxsError::Limit(format!("term too long ({})", text.len())));
                }
                worst_case += block_size(text.len()) as u64;
            }
        }
        self.map
            .map(HEADER_SIZE as u64 + self.consumed + worst_case, true)?;

        for (text, in_text_count) in staged_texts {
            if table.lookup(text).is_some() {
                continue;
            }
            let offset = HEADER_SIZE as u64 + new_len;
            let size = block_size(text.len());
            let unpadded = 2 + text.len() + 1;
            let pad = size - 8 - unpadded;
            {
                let region = self.map.region_mut();
                let mut cur = Cursor::at(region, offset as usize);
                cur.store_u16(text.len() as u16)?;
                cur.store_bytes(text.as_bytes())?;
                cur.store_bytes(&[0u8])?;
                for _ in 0..pad {
                    cur.store_bytes(&[0u8])?;
                }
                cur.store_u64(*in_text_count as u64)?;
            }
            let counter_offset = offset + (size as u64 - 8);
            let id = table.next_id();
            table.insert(text, id, counter_offset, *in_text_count as u64);
            new_len += size as u64;
        }

        self.map.store_u32_release(DATA_LEN_OFFSET, new_len as u32);
        self.consumed = new_len;
        Ok(())
    }
}
