//! chainfs - a minimal disk-resident block filesystem served over TCP.
//!
//! A single backing image holds a fixed-size file table, a fixed-size
//! chain-node table, and the data blocks the chains address. Clients
//! manipulate named files through a line-oriented protocol; one worker
//! thread per connection, all mutations serialized through one
//! reader/writer lock.
//!
//! Module map:
//! - [`constants`] - image geometry (`MAXFILES`, `MAXBLOCKS`, `BLOCK_SIZE`)
//! - [`disk`] - offset-addressed access to the backing image
//! - [`layout`] - byte-exact metadata serialization
//! - [`fs`] - allocation engine and the five public operations
//! - [`server`] - the TCP protocol front end
//! - [`klog`] - logging backend for the binaries

pub mod constants;
pub mod disk;
pub mod error;
pub mod fs;
pub mod klog;
pub mod layout;
pub mod server;

pub use error::{FsError, Result};
pub use fs::{FileInfo, FileSystem, FsStats};
pub use server::FileServer;

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A uniquely named image file under the system temp dir, removed on drop.
    pub struct TempImage(PathBuf);

    impl TempImage {
        pub fn new(tag: &str) -> Self {
            static COUNTER: AtomicUsize = AtomicUsize::new(0);
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "chainfs-test-{}-{}-{}.img",
                tag,
                std::process::id(),
                n
            ));
            let _ = std::fs::remove_file(&path);
            Self(path)
        }

        pub fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TempImage {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }
}
