//! On-disk metadata layout.
//!
//! The metadata region is the serialized file table followed by the
//! serialized chain-node table, both in index order at offset 0. All
//! 16-bit fields are big-endian, matching the original image format.
//! There is no version header or magic; the geometry in `constants` is
//! the format.

use crate::constants::{FENTRY_SIZE, FNODE_SIZE, MAXBLOCKS, MAXFILES, METADATA_SIZE, NAME_LEN, NIL};

/// One file-table slot. A free slot has an empty name and no first block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    /// Filename, at most `NAME_LEN` bytes when stored.
    pub name: String,
    /// Live byte count of the file's content.
    pub size: u16,
    /// Head of the file's chain, or `NIL` for a zero-block file.
    pub first_block: i16,
}

impl FileEntry {
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            size: 0,
            first_block: NIL,
        }
    }

    pub fn is_free(&self) -> bool {
        self.name.is_empty()
    }

    pub fn encode(&self, buf: &mut [u8; FENTRY_SIZE]) {
        buf.fill(0);
        let src = self.name.as_bytes();
        let n = src.len().min(NAME_LEN);
        buf[..n].copy_from_slice(&src[..n]);
        buf[NAME_LEN..NAME_LEN + 2].copy_from_slice(&self.size.to_be_bytes());
        buf[NAME_LEN + 2..].copy_from_slice(&self.first_block.to_be_bytes());
    }

    pub fn decode(buf: &[u8; FENTRY_SIZE]) -> Self {
        let name_len = buf[..NAME_LEN].iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        let name = String::from_utf8_lossy(&buf[..name_len]).into_owned();
        let size = u16::from_be_bytes([buf[NAME_LEN], buf[NAME_LEN + 1]]);
        let first_block = i16::from_be_bytes([buf[NAME_LEN + 2], buf[NAME_LEN + 3]]);
        Self { name, size, first_block }
    }
}

/// One chain-node slot. Index in the table doubles as the physical block
/// address when the node is allocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FNode {
    /// `NIL` when free; otherwise the node's own table index.
    pub block_index: i16,
    /// Next node in this file's chain, or `NIL` at end of chain.
    pub next: i16,
}

impl FNode {
    pub fn empty() -> Self {
        Self { block_index: NIL, next: NIL }
    }

    pub fn is_free(&self) -> bool {
        self.block_index < 0
    }

    pub fn encode(&self, buf: &mut [u8; FNODE_SIZE]) {
        buf[..2].copy_from_slice(&self.block_index.to_be_bytes());
        buf[2..].copy_from_slice(&self.next.to_be_bytes());
    }

    pub fn decode(buf: &[u8; FNODE_SIZE]) -> Self {
        Self {
            block_index: i16::from_be_bytes([buf[0], buf[1]]),
            next: i16::from_be_bytes([buf[2], buf[3]]),
        }
    }
}

/// Serialize both tables into one metadata-region image.
pub fn encode_tables(files: &[FileEntry; MAXFILES], nodes: &[FNode; MAXBLOCKS]) -> Vec<u8> {
    let mut out = vec![0u8; METADATA_SIZE];
    for (i, entry) in files.iter().enumerate() {
        let mut buf = [0u8; FENTRY_SIZE];
        entry.encode(&mut buf);
        out[i * FENTRY_SIZE..(i + 1) * FENTRY_SIZE].copy_from_slice(&buf);
    }
    let base = FENTRY_SIZE * MAXFILES;
    for (i, node) in nodes.iter().enumerate() {
        let mut buf = [0u8; FNODE_SIZE];
        node.encode(&mut buf);
        out[base + i * FNODE_SIZE..base + (i + 1) * FNODE_SIZE].copy_from_slice(&buf);
    }
    out
}

/// Deserialize a full metadata region back into the two tables.
/// `bytes` must be exactly `METADATA_SIZE` long.
pub fn decode_tables(bytes: &[u8]) -> ([FileEntry; MAXFILES], [FNode; MAXBLOCKS]) {
    debug_assert_eq!(bytes.len(), METADATA_SIZE);
    let files = std::array::from_fn(|i| {
        let mut buf = [0u8; FENTRY_SIZE];
        buf.copy_from_slice(&bytes[i * FENTRY_SIZE..(i + 1) * FENTRY_SIZE]);
        FileEntry::decode(&buf)
    });
    let base = FENTRY_SIZE * MAXFILES;
    let nodes = std::array::from_fn(|i| {
        let mut buf = [0u8; FNODE_SIZE];
        buf.copy_from_slice(&bytes[base + i * FNODE_SIZE..base + (i + 1) * FNODE_SIZE]);
        FNode::decode(&buf)
    });
    (files, nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fentry_byte_layout() {
        let entry = FileEntry {
            name: "a.txt".into(),
            size: 14,
            first_block: 3,
        };
        let mut buf = [0u8; FENTRY_SIZE];
        entry.encode(&mut buf);

        // 11-byte zero-padded name, then big-endian size and first block.
        assert_eq!(&buf[..5], b"a.txt");
        assert_eq!(&buf[5..NAME_LEN], &[0u8; 6]);
        assert_eq!(&buf[NAME_LEN..NAME_LEN + 2], &[0, 14]);
        assert_eq!(&buf[NAME_LEN + 2..], &[0, 3]);

        assert_eq!(FileEntry::decode(&buf), entry);
    }

    #[test]
    fn test_fentry_free_slot_encodes_negative_first_block() {
        let mut buf = [0u8; FENTRY_SIZE];
        FileEntry::empty().encode(&mut buf);
        assert_eq!(&buf[..NAME_LEN + 2], &[0u8; NAME_LEN + 2]);
        assert_eq!(&buf[NAME_LEN + 2..], &[0xFF, 0xFF]);

        let decoded = FileEntry::decode(&buf);
        assert!(decoded.is_free());
        assert_eq!(decoded.first_block, NIL);
    }

    #[test]
    fn test_fentry_truncates_long_name() {
        let entry = FileEntry {
            name: "averylongfilename.txt".into(),
            size: 0,
            first_block: NIL,
        };
        let mut buf = [0u8; FENTRY_SIZE];
        entry.encode(&mut buf);
        assert_eq!(&buf[..NAME_LEN], b"averylongfi");
        assert_eq!(FileEntry::decode(&buf).name, "averylongfi");
    }

    #[test]
    fn test_fnode_byte_layout() {
        let mut buf = [0u8; FNODE_SIZE];
        FNode::empty().encode(&mut buf);
        assert_eq!(buf, [0xFF, 0xFF, 0xFF, 0xFF]);

        let node = FNode { block_index: 7, next: 2 };
        node.encode(&mut buf);
        assert_eq!(buf, [0, 7, 0, 2]);
        assert_eq!(FNode::decode(&buf), node);
    }

    #[test]
    fn test_tables_round_trip() {
        let mut files: [FileEntry; MAXFILES] = std::array::from_fn(|_| FileEntry::empty());
        let mut nodes: [FNode; MAXBLOCKS] = [FNode::empty(); MAXBLOCKS];
        files[1] = FileEntry {
            name: "b.txt".into(),
            size: 200,
            first_block: 0,
        };
        nodes[0] = FNode { block_index: 0, next: 4 };
        nodes[4] = FNode { block_index: 4, next: NIL };

        let bytes = encode_tables(&files, &nodes);
        assert_eq!(bytes.len(), METADATA_SIZE);

        let (files2, nodes2) = decode_tables(&bytes);
        assert_eq!(files2, files);
        assert_eq!(nodes2, nodes);
    }
}
