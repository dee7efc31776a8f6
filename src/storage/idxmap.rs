//! Memory-mapped backing file shared by possibly many processes: open/create
//! with bounded retry on the creation race, grow-and-remap, and advisory
//! file-range locking. The terms file and dtmap file are both built on top
//! of this.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use fs2::FileExt;
use memmap2::MmapMut;
use tracing::{debug, warn};

use crate::error::{NxsError, Result};

pub const GROWTH_STEP: u64 = 32 * 1024;
const OPEN_RETRIES: u32 = 10;

fn round_up_to_growth_step(len: u64) -> u64 {
    if len == 0 {
        return GROWTH_STEP;
    }
    len.div_ceil(GROWTH_STEP) * GROWTH_STEP
}

/// A memory-mapped file plus the file handle backing it. `map` may swap out
/// the mapping in place as the file grows; callers must re-derive any
/// borrowed slices after calling it.
pub struct IdxMap {
    path: PathBuf,
    file: File,
    mmap: MmapMut,
}

impl IdxMap {
    /// Open or create the backing file. Returns whether this call created
    /// it. On creation the caller receives the file already extended to one
    /// growth step and holding no lock; the caller is expected to call
    /// `lock_excl` itself before writing the header, matching the append
    /// protocols in the terms/dtmap files.
    pub fn open(path: &Path) -> Result<(Self, bool)> {
        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => {
                debug!(path = %path.display(), "creating new index file");
                file.set_len(GROWTH_STEP)?;
                let mmap = unsafe { MmapMut::map_mut(&file)? };
                Ok((
                    Self {
                        path: path.to_path_buf(),
                        file,
                        mmap,
                    },
                    true,
                ))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Self::open_existing_with_retry(path)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn open_existing_with_retry(path: &Path) -> Result<(Self, bool)> {
        for attempt in 0..OPEN_RETRIES {
            let file = OpenOptions::new().read(true).write(true).open(path)?;
            FileExt::lock_shared(&file)?;
            let len = file.metadata()?.len();
            if len == 0 {
                FileExt::unlock(&file)?;
                warn!(path = %path.display(), attempt, "zero-length file race on open, retrying");
                continue;
            }
            let mmap = unsafe { MmapMut::map_mut(&file)? };
            FileExt::unlock(&file)?;
            return Ok((
                Self {
                    path: path.to_path_buf(),
                    file,
                    mmap,
                },
                false,
            ));
        }
        Err(NxsError::System(format!(
            "open {}: zero-length file persisted after {OPEN_RETRIES} retries",
            path.display()
        )))
    }

    /// Ensure the active mapping covers at least `target_len` bytes, rounded
    /// up to the growth step. If `may_extend`, grows the backing file first;
    /// the caller must already hold the exclusive lock in that case.
    pub fn map(&mut self, target_len: u64, may_extend: bool) -> Result<()> {
        let rounded = round_up_to_growth_step(target_len);
        let file_len = self.file.metadata()?.len();
        if rounded > file_len {
            if !may_extend {
                return Err(NxsError::Fatal(format!(
                    "{}: mapping requires {rounded} bytes but file is only {file_len} and extension is not permitted",
                    self.path.display()
                )));
            }
            self.file.set_len(rounded)?;
            debug!(path = %self.path.display(), new_len = rounded, "grew index file");
        }
        if (self.mmap.len() as u64) < rounded {
            let new_mmap = unsafe { MmapMut::map_mut(&self.file)? };
            self.mmap = new_mmap;
        }
        Ok(())
    }

    pub fn lock_excl(&self) -> Result<()> {
        FileExt::lock_exclusive(&self.file).map_err(|e| {
            NxsError::System(format!("lock_excl {}: {e}", self.path.display()))
        })
    }

    pub fn lock_shared(&self) -> Result<()> {
        FileExt::lock_shared(&self.file).map_err(|e| {
            NxsError::System(format!("lock_shared {}: {e}", self.path.display()))
        })
    }

    pub fn unlock(&self) -> Result<()> {
        FileExt::unlock(&self.file)
            .map_err(|e| NxsError::System(format!("unlock {}: {e}", self.path.display())))
    }

    pub fn region(&self) -> &[u8] {
        &self.mmap[..]
    }

    pub fn region_mut(&mut self) -> &mut [u8] {
        &mut self.mmap[..]
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn flush_async(&self) -> Result<()> {
        self.mmap.flush_async().map_err(|e| e.into())
    }

    /// View the 4-byte field at `offset` as an atomic for the published
    /// data-length header field. The value stored/loaded is converted
    /// to/from big-endian so the on-disk bytes stay big-endian regardless of
    /// host byte order, while the read-modify/store itself is atomic.
    fn atomic_u32_at(&self, offset: usize) -> &AtomicU32 {
        assert!(offset + 4 <= self.mmap.len());
        unsafe { AtomicU32::from_ptr(self.mmap.as_ptr().add(offset) as *mut u32) }
    }

    fn atomic_u64_at(&self, offset: usize) -> &AtomicU64 {
        assert!(offset + 8 <= self.mmap.len());
        unsafe { AtomicU64::from_ptr(self.mmap.as_ptr().add(offset) as *mut u64) }
    }

    pub fn load_u32_acquire(&self, offset: usize) -> u32 {
        u32::from_be(self.atomic_u32_at(offset).load(Ordering::Acquire))
    }

    pub fn store_u32_release(&self, offset: usize, value: u32) {
        self.atomic_u32_at(offset).store(value.to_be(), Ordering::Release);
    }

    pub fn load_u64_acquire(&self, offset: usize) -> u64 {
        u64::from_be(self.atomic_u64_at(offset).load(Ordering::Acquire))
    }

    pub fn store_u64_release(&self, offset: usize, value: u64) {
        self.atomic_u64_at(offset).store(value.to_be(), Ordering::Release);
    }

    /// Relaxed counterparts for header fields that are not themselves the
    /// synchronization point (document/token counts): still big-endian on
    /// disk, but no ordering is established with surrounding writes.
    pub fn load_u32_relaxed(&self, offset: usize) -> u32 {
        u32::from_be(self.atomic_u32_at(offset).load(Ordering::Relaxed))
    }

    pub fn store_u32_relaxed(&self, offset: usize, value: u32) {
        self.atomic_u32_at(offset).store(value.to_be(), Ordering::Relaxed);
    }

    pub fn load_u64_relaxed(&self, offset: usize) -> u64 {
        u64::from_be(self.atomic_u64_at(offset).load(Ordering::Relaxed))
    }

    pub fn store_u64_relaxed(&self, offset: usize, value: u64) {
        self.atomic_u64_at(offset).store(value.to_be(), Ordering::Relaxed);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_reopen_shares_the_same_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("terms.db");

        let (mut creator, created) = IdxMap::open(&path).unwrap();
        assert!(created);
        creator.region_mut()[0] = 0xAB;

        let (opener, created2) = IdxMap::open(&path).unwrap();
        assert!(!created2);
        assert_eq!(opener.region()[0], 0xAB);
    }

    #[test]
    fn map_grows_past_one_growth_step() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("terms.db");
        let (mut m, _) = IdxMap::open(&path).unwrap();
        assert_eq!(m.len() as u64, GROWTH_STEP);
        m.map(GROWTH_STEP * 3, true).unwrap();
        assert!(m.len() as u64 >= GROWTH_STEP * 3);
    }

    #[test]
    fn atomic_length_round_trips_big_endian_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dtmap.db");
        let (m, _) = IdxMap::open(&path).unwrap();
        m.store_u32_release(0, 0x0102_0304);
        assert_eq!(&m.region()[0..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(m.load_u32_acquire(0), 0x0102_0304);

        m.store_u64_release(8, 0x1122_3344_5566_7788);
        assert_eq!(
            &m.region()[8..16],
            &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]
        );
        assert_eq!(m.load_u64_acquire(8), 0x1122_3344_5566_7788);
    }

    #[test]
    fn exclusive_lock_is_exclusive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("terms.db");
        let (m, _) = IdxMap::open(&path).unwrap();
        m.lock_excl().unwrap();
        m.unlock().unwrap();
    }
}
