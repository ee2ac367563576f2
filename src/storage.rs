//! `ColumnStore`: the explicit storage trait called for in Design Notes §9, replacing a
//! hard-wired `mmap` of a file column with something a test can substitute.
//!
//! `MmapColumnStore` is the production path (`memmap2::MmapMut` over a growable file,
//! grounded in the read-mapping pattern used by the storage layer this pack's LSM-tree
//! example keeps for its on-disk tables). `VecColumnStore` is an in-memory stand-in used
//! by unit tests that would rather not touch a temp directory.

use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{ExecError, ExecResult};

/// Fixed-width column storage: a growable array of `i32`.
///
/// `len()` is the row *capacity* `C` (§3); the table tracks the logical row count `N`
/// separately since `N <= C` and many rows of `C` may be unused tail space.
pub trait ColumnStore: Send + Sync {
    /// Current capacity in elements.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-only view of the backing array.
    fn data(&self) -> &[i32];

    /// Read-write view of the backing array.
    fn data_mut(&mut self) -> &mut [i32];

    /// Grow capacity to `new_len` elements (`new_len >= len()`). Implementations must
    /// invalidate and re-establish any prior mapping; all outstanding `&[i32]`/`&mut [i32]`
    /// borrows are gone by construction (the borrow checker enforces this at the call site).
    fn grow(&mut self, new_len: usize) -> ExecResult<()>;

    /// Flush dirty pages to the backing file. No-op for the in-memory store.
    fn flush(&mut self) -> ExecResult<()>;
}

/// Production `ColumnStore`: a file mapped read-write with `memmap2`.
pub struct MmapColumnStore {
    path: PathBuf,
    file: File,
    map: MmapMut,
    len: usize,
}

impl MmapColumnStore {
    /// Open (creating if absent) the column file at `path`, stretched to at least
    /// `initial_len` elements, and map it.
    pub fn open(path: impl AsRef<Path>, initial_len: usize) -> ExecResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ExecError::Execution(format!("create_dir_all {parent:?}: {e}")))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| ExecError::Execution(format!("open {path:?}: {e}")))?;
        let byte_len = (initial_len * 4) as u64;
        if file.metadata().map(|m| m.len()).unwrap_or(0) < byte_len {
            file.set_len(byte_len)
                .map_err(|e| ExecError::Fatal(format!("set_len {path:?}: {e}")))?;
        }
        let map = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| ExecError::Fatal(format!("mmap {path:?}: {e}")))?;
        Ok(MmapColumnStore {
            path,
            file,
            map,
            len: initial_len,
        })
    }

    fn as_i32_slice(map: &MmapMut) -> &[i32] {
        let bytes = &map[..];
        debug_assert_eq!(bytes.len() % 4, 0);
        // Safety: `MmapMut` is 4-byte aligned memory (page-aligned) and the backing
        // file is owned exclusively by this store, so reinterpreting whole i32 lanes
        // is sound as long as `len` never exceeds the mapped byte length / 4.
        unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const i32, bytes.len() / 4) }
    }

    fn as_i32_slice_mut(map: &mut MmapMut) -> &mut [i32] {
        let bytes = &mut map[..];
        debug_assert_eq!(bytes.len() % 4, 0);
        unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut i32, bytes.len() / 4) }
    }
}

impl ColumnStore for MmapColumnStore {
    fn len(&self) -> usize {
        self.len
    }

    fn data(&self) -> &[i32] {
        &Self::as_i32_slice(&self.map)[..self.len]
    }

    fn data_mut(&mut self) -> &mut [i32] {
        let len = self.len;
        &mut Self::as_i32_slice_mut(&mut self.map)[..len]
    }

    fn grow(&mut self, new_len: usize) -> ExecResult<()> {
        if new_len <= self.len {
            return Ok(());
        }
        // Unmap, extend the file, remap (§4.1 Grow). `self.map` is dropped here.
        let byte_len = (new_len * 4) as u64;
        self.file
            .set_len(byte_len)
            .map_err(|e| ExecError::Fatal(format!("grow {:?} to {byte_len}: {e}", self.path)))?;
        let map = unsafe { MmapMut::map_mut(&self.file) }
            .map_err(|e| ExecError::Fatal(format!("remap {:?}: {e}", self.path)))?;
        self.map = map;
        self.len = new_len;
        Ok(())
    }

    fn flush(&mut self) -> ExecResult<()> {
        self.map
            .flush()
            .map_err(|e| ExecError::Execution(format!("flush {:?}: {e}", self.path)))
    }
}

/// In-memory `ColumnStore` (a plain `Vec<i32>`), for tests that don't want a temp dir.
#[derive(Default)]
pub struct VecColumnStore {
    data: Vec<i32>,
}

impl VecColumnStore {
    pub fn new(initial_len: usize) -> Self {
        VecColumnStore {
            data: vec![0; initial_len],
        }
    }
}

impl ColumnStore for VecColumnStore {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn data(&self) -> &[i32] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [i32] {
        &mut self.data
    }

    fn grow(&mut self, new_len: usize) -> ExecResult<()> {
        if new_len > self.data.len() {
            self.data.resize(new_len, 0);
        }
        Ok(())
    }

    fn flush(&mut self) -> ExecResult<()> {
        Ok(())
    }
}

/// Read an entire small file into memory (used for `.idx`/`.btree`/metadata files,
/// which are loaded once wholesale rather than mapped).
pub fn read_whole(path: &Path) -> io::Result<Vec<u8>> {
    std::fs::read(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmap_store_opens_creates_and_stretches_the_backing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("col.data");
        let store = MmapColumnStore::open(&path, 4).unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 16);
    }

    #[test]
    fn mmap_store_survives_grow_past_initial_capacity() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("col.data");
        let mut store = MmapColumnStore::open(&path, 4).unwrap();
        store.data_mut().copy_from_slice(&[10, 20, 30, 40]);

        store.grow(8).unwrap();
        assert_eq!(store.len(), 8);
        // Data written before the remap must still be there (§4.1 "Grow").
        assert_eq!(&store.data()[..4], &[10, 20, 30, 40]);

        store.data_mut()[4..8].copy_from_slice(&[50, 60, 70, 80]);
        store.flush().unwrap();
        assert_eq!(store.data(), &[10, 20, 30, 40, 50, 60, 70, 80]);
    }

    #[test]
    fn mmap_store_reopen_sees_previously_written_and_flushed_data() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("col.data");
        {
            let mut store = MmapColumnStore::open(&path, 4).unwrap();
            store.data_mut().copy_from_slice(&[1, 2, 3, 4]);
            store.flush().unwrap();
        }
        let store2 = MmapColumnStore::open(&path, 4).unwrap();
        assert_eq!(store2.data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn vec_store_grow_zero_fills_new_elements() {
        let mut store = VecColumnStore::new(2);
        store.data_mut().copy_from_slice(&[7, 8]);
        store.grow(5).unwrap();
        assert_eq!(store.data(), &[7, 8, 0, 0, 0]);
    }
}
