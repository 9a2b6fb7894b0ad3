//! Filesystem geometry.
//!
//! These constants define the on-disk image format and must not change
//! independently of each other: block addresses are FNode table indices,
//! and the data region starts immediately after the serialized tables.

/// Capacity of the file table (one slot per file).
pub const MAXFILES: usize = 5;

/// Capacity of the block-chain table (one slot per physical data block).
pub const MAXBLOCKS: usize = 10;

/// Bytes per data block.
pub const BLOCK_SIZE: usize = 128;

/// Fixed width of the on-disk filename field.
pub const NAME_LEN: usize = 11;

/// Serialized file entry: 11-byte name + 2-byte size + 2-byte first block.
pub const FENTRY_SIZE: usize = NAME_LEN + 2 + 2;

/// Serialized chain node: 2-byte block index + 2-byte next pointer.
pub const FNODE_SIZE: usize = 2 + 2;

/// Size of the metadata region at the head of the image.
pub const METADATA_SIZE: usize = FENTRY_SIZE * MAXFILES + FNODE_SIZE * MAXBLOCKS;

/// Required total image size: metadata region plus the data region.
pub const IMAGE_SIZE: usize = METADATA_SIZE + MAXBLOCKS * BLOCK_SIZE;

/// Sentinel for "no block" / "end of chain" in 16-bit index fields.
pub const NIL: i16 = -1;
