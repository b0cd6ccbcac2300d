// Filesystem interface abstraction
//
// One method per filesystem operation, implemented by the filtering backend.
// The FUSE adapter translates fuser callbacks into these calls, so the
// filtering and read-only logic stays protocol-neutral and testable without
// a kernel mount.

use std::path::PathBuf;
use std::time::SystemTime;

pub use crate::fs::error::{FsError, FsResult};
pub use crate::fs::operations::FileKind;

/// File attributes as returned by a stat on the real entry.
#[derive(Debug, Clone)]
pub struct FileAttr {
    pub inode: u64,
    pub kind: FileKind,
    pub size: u64,
    pub blocks: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    /// Permission bits only (no file-type bits).
    pub perm: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
}

/// Directory entry as produced by directory enumeration.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub inode: u64,
    pub name: String,
    pub kind: FileKind,
}

/// Attribute changes requested by setattr. All rejected, but carried so the
/// backend can hide-check before denying.
#[derive(Debug, Default)]
pub struct SetAttr {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub size: Option<u64>,
    pub atime: Option<SystemTime>,
    pub mtime: Option<SystemTime>,
}

/// Filesystem statistics, passed through from the source filesystem.
#[derive(Debug, Clone)]
pub struct StatFs {
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub bsize: u32,
    pub namelen: u32,
    pub frsize: u32,
}

/// Unified filesystem interface.
///
/// Every operation is stateless: resolve the real path, gather the entry
/// type, consult the visibility policy, then delegate or deny. Hidden
/// entries report `NotFound` from every operation; mutations on visible
/// entries report `ReadOnly`.
pub trait FilesystemInterface: Send + Sync {
    // Read-class operations
    fn get_attr(&self, path: &str) -> FsResult<FileAttr>;
    fn read_link(&self, path: &str) -> FsResult<PathBuf>;
    fn read_dir(&self, path: &str) -> FsResult<Vec<DirEntry>>;
    fn open(&self, path: &str, flags: i32) -> FsResult<()>;
    fn read_file(&self, path: &str, offset: u64, size: u32) -> FsResult<Vec<u8>>;
    fn access(&self, path: &str, mask: i32) -> FsResult<()>;
    fn statfs(&self, path: &str) -> FsResult<StatFs>;
    fn get_xattr(&self, path: &str, name: &str) -> FsResult<Vec<u8>>;
    fn list_xattr(&self, path: &str) -> FsResult<Vec<u8>>;

    // Mutating operations, categorically rejected
    fn write_file(&self, path: &str, offset: u64, data: &[u8]) -> FsResult<u32>;
    fn set_attr(&self, path: &str, attr: SetAttr) -> FsResult<FileAttr>;
    fn make_node(&self, path: &str, mode: u32, rdev: u32) -> FsResult<()>;
    fn make_dir(&self, path: &str, mode: u32) -> FsResult<()>;
    fn remove_file(&self, path: &str) -> FsResult<()>;
    fn remove_dir(&self, path: &str) -> FsResult<()>;
    fn make_symlink(&self, target: &str, link: &str) -> FsResult<()>;
    fn rename(&self, from: &str, to: &str) -> FsResult<()>;
    fn hard_link(&self, from: &str, to: &str) -> FsResult<()>;
    fn set_xattr(&self, path: &str, name: &str, value: &[u8]) -> FsResult<()>;
    fn remove_xattr(&self, path: &str, name: &str) -> FsResult<()>;

    // Handle lifecycle: no handle is held open across calls
    fn release(&self, _path: &str) -> FsResult<()> {
        Ok(())
    }

    fn fsync(&self, _path: &str) -> FsResult<()> {
        Ok(())
    }
}
