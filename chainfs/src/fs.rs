//! Filesystem manager: the block-allocation engine plus the public
//! create/write/read/delete/list operations.
//!
//! ## Design
//!
//! All state lives behind a single reader/writer lock: the file table,
//! the chain-node table, and the disk handle. Mutating operations take
//! the exclusive lock and rewrite the whole metadata region before
//! releasing it (write-through, no buffering); `read` and `list` take the
//! shared lock, so concurrent readers never observe a half-updated table.
//!
//! ## Overwrite protocol
//!
//! `write` allocates the replacement chain and persists the metadata
//! pointing at it *before* releasing the old chain. The on-disk tables
//! therefore never reference blocks that are being freed. A crash between
//! persist and release leaks the old blocks (they stay marked allocated
//! but unreachable); it cannot corrupt a live chain.

use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info};

use crate::constants::{BLOCK_SIZE, IMAGE_SIZE, MAXBLOCKS, MAXFILES, METADATA_SIZE, NAME_LEN, NIL};
use crate::disk::DiskImage;
use crate::error::{FsError, Result};
use crate::layout::{self, FNode, FileEntry};

/// Byte offset of a data block inside the image.
fn data_offset(block: usize) -> u64 {
    (METADATA_SIZE + block * BLOCK_SIZE) as u64
}

/// Everything the lock protects: both metadata tables and the image handle.
struct FsState {
    files: [FileEntry; MAXFILES],
    nodes: [FNode; MAXBLOCKS],
    disk: DiskImage,
}

impl FsState {
    fn find_entry(&self, name: &str) -> Option<usize> {
        self.files
            .iter()
            .position(|e| !e.is_free() && e.name == name)
    }

    fn free_slot(&self) -> Option<usize> {
        self.files.iter().position(|e| e.is_free())
    }

    /// Claim `count` free chain nodes, lowest index first, and link them
    /// into a chain in scan order. All-or-nothing: if fewer than `count`
    /// nodes are free, nothing is touched.
    fn allocate_chain(&mut self, count: usize) -> Result<Vec<usize>> {
        let free: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_free())
            .map(|(i, _)| i)
            .take(count)
            .collect();
        if free.len() < count {
            return Err(FsError::InsufficientSpace);
        }

        for (pos, &idx) in free.iter().enumerate() {
            self.nodes[idx] = FNode {
                block_index: idx as i16,
                next: free.get(pos + 1).map(|&n| n as i16).unwrap_or(NIL),
            };
        }
        Ok(free)
    }

    /// Release a chain starting at `first`: zero each node's data block,
    /// then mark the node free. An out-of-range or already-free node ends
    /// the walk; it is not an error.
    fn free_chain(&mut self, first: i16) -> Result<()> {
        let mut current = first;
        while current >= 0 && (current as usize) < MAXBLOCKS {
            let idx = current as usize;
            if self.nodes[idx].block_index >= 0 {
                self.disk
                    .zero_range(data_offset(self.nodes[idx].block_index as usize), BLOCK_SIZE)?;
            }
            let next = self.nodes[idx].next;
            self.nodes[idx] = FNode::empty();
            current = next;
        }
        Ok(())
    }

    /// Rewrite the full metadata region and force it to the device.
    fn persist(&self) -> Result<()> {
        let bytes = layout::encode_tables(&self.files, &self.nodes);
        self.disk.write_at(0, &bytes)?;
        self.disk.flush()
    }

    fn load(&mut self) -> Result<()> {
        let mut bytes = vec![0u8; METADATA_SIZE];
        self.disk.read_at(0, &mut bytes)?;
        let (files, nodes) = layout::decode_tables(&bytes);
        self.files = files;
        self.nodes = nodes;
        Ok(())
    }
}

/// Point-in-time usage counters, taken under the shared lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FsStats {
    pub live_files: usize,
    pub used_blocks: usize,
}

/// A name plus its live size, as reported by [`FileSystem::files`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u16,
}

pub struct FileSystem {
    state: RwLock<FsState>,
}

impl FileSystem {
    /// Open (or create) the filesystem backed by the image at `path`.
    ///
    /// `total_size` must equal [`IMAGE_SIZE`]; any other value is a
    /// configuration error. A fresh image (newly created, grown, or with
    /// an all-zero metadata region) gets empty tables installed and
    /// persisted; otherwise the tables are loaded from the metadata
    /// region, so files survive a restart.
    pub fn open<P: AsRef<Path>>(path: P, total_size: u64) -> Result<Self> {
        if total_size != IMAGE_SIZE as u64 {
            return Err(FsError::Configuration {
                expected: IMAGE_SIZE as u64,
                requested: total_size,
            });
        }

        let path = path.as_ref();
        let (disk, mut fresh) = DiskImage::open(path, total_size)?;
        let mut state = FsState {
            files: std::array::from_fn(|_| FileEntry::empty()),
            nodes: [FNode::empty(); MAXBLOCKS],
            disk,
        };

        if !fresh {
            // An image whose metadata region was never written decodes to
            // nonsense (zero bytes read as first_block = 0), so treat it
            // the same as a newly created one.
            let mut bytes = vec![0u8; METADATA_SIZE];
            state.disk.read_at(0, &mut bytes)?;
            if bytes.iter().all(|&b| b == 0) {
                fresh = true;
            }
        }

        if fresh {
            state.persist()?;
            info!(target: "fs", "formatted fresh image {:?}", path);
        } else {
            state.load()?;
            let live = state.files.iter().filter(|e| !e.is_free()).count();
            info!(target: "fs", "loaded image {:?} ({} live files)", path, live);
        }

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    // A poisoned lock only means another client thread panicked mid-command.
    // Every mutation rewrites the full tables before unlocking, so the
    // state is still usable; recover the guard instead of propagating.
    fn read_state(&self) -> RwLockReadGuard<'_, FsState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, FsState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an empty file. Fails if the name is empty, longer than
    /// `NAME_LEN` bytes, already taken, or the file table is full.
    pub fn create(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(FsError::InvalidName);
        }
        if name.len() > NAME_LEN {
            return Err(FsError::NameTooLong);
        }

        let mut st = self.write_state();
        if st.find_entry(name).is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        let slot = st.free_slot().ok_or(FsError::TableFull)?;

        st.files[slot] = FileEntry {
            name: name.to_string(),
            size: 0,
            first_block: NIL,
        };
        st.persist()?;

        info!(target: "fs", "created '{}' in slot {}", name, slot);
        Ok(())
    }

    /// Replace the file's entire content with `contents`.
    ///
    /// The replacement chain is fully allocated and written, and the
    /// metadata persisted, before the previous chain is released (see the
    /// module docs for why). There is no append or partial write.
    pub fn write(&self, name: &str, contents: &[u8]) -> Result<()> {
        let mut st = self.write_state();
        let idx = st
            .find_entry(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;

        let num_blocks = contents.len().div_ceil(BLOCK_SIZE);
        if num_blocks > MAXBLOCKS {
            return Err(FsError::FileTooLarge);
        }

        let chain = st.allocate_chain(num_blocks)?;
        for (pos, &node) in chain.iter().enumerate() {
            let start = pos * BLOCK_SIZE;
            let end = (start + BLOCK_SIZE).min(contents.len());
            st.disk.write_at(data_offset(node), &contents[start..end])?;
        }

        let old_first = st.files[idx].first_block;
        st.files[idx].size = contents.len() as u16;
        st.files[idx].first_block = chain.first().map(|&n| n as i16).unwrap_or(NIL);
        st.persist()?;

        st.free_chain(old_first)?;

        info!(target: "fs", "wrote {} bytes to '{}' ({} blocks)", contents.len(), name, num_blocks);
        Ok(())
    }

    /// Read the file's entire content.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let st = self.read_state();
        let idx = st
            .find_entry(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let entry = &st.files[idx];

        if entry.first_block < 0 {
            return Ok(Vec::new());
        }

        let size = entry.size as usize;
        let mut data = Vec::with_capacity(size);
        let mut current = entry.first_block;

        while current != NIL && data.len() < size {
            // A negative `current` other than NIL wraps to an out-of-range
            // index here and lands in the corrupt arm like any other.
            let node = match st.nodes.get(current as usize) {
                Some(n) if n.block_index >= 0 => *n,
                _ => return Err(FsError::CorruptChain(name.to_string())),
            };

            let want = (size - data.len()).min(BLOCK_SIZE);
            let mut buf = vec![0u8; want];
            st.disk.read_at(data_offset(node.block_index as usize), &mut buf)?;
            data.extend_from_slice(&buf);

            current = node.next;
        }

        if data.len() < size {
            // Chain ended before yielding the recorded size.
            return Err(FsError::CorruptChain(name.to_string()));
        }

        debug!(target: "fs", "read {} bytes from '{}'", data.len(), name);
        Ok(data)
    }

    /// Remove the file and release its chain.
    pub fn delete(&self, name: &str) -> Result<()> {
        let mut st = self.write_state();
        let idx = st
            .find_entry(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;

        let first = st.files[idx].first_block;
        st.free_chain(first)?;
        st.files[idx] = FileEntry::empty();
        st.persist()?;

        info!(target: "fs", "deleted '{}'", name);
        Ok(())
    }

    /// Live filenames in table-index order (not insertion or lexical order).
    pub fn list(&self) -> Vec<String> {
        self.files().into_iter().map(|f| f.name).collect()
    }

    /// Live files with their sizes, in table-index order.
    pub fn files(&self) -> Vec<FileInfo> {
        let st = self.read_state();
        st.files
            .iter()
            .filter(|e| !e.is_free())
            .map(|e| FileInfo {
                name: e.name.clone(),
                size: e.size,
            })
            .collect()
    }

    /// Current table usage.
    pub fn stats(&self) -> FsStats {
        let st = self.read_state();
        FsStats {
            live_files: st.files.iter().filter(|e| !e.is_free()).count(),
            used_blocks: st.nodes.iter().filter(|n| !n.is_free()).count(),
        }
    }
}
