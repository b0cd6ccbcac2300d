// SieveBackend - the filtering read-only filesystem
//
// Implements FilesystemInterface over a SourceTree and a FilterPolicy.
// Every operation follows the same two phases: resolve (translate the
// path, stat when the type is not already known) and decide (consult the
// policy, then delegate to the real filesystem or deny). Hidden entries
// report NotFound from every operation so they are indistinguishable from
// nonexistent ones; that takes precedence over the ReadOnly rejection all
// mutations get.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nix::sys::stat::FileStat;

use super::interface::*;
use crate::filter::FilterPolicy;
use crate::fs::operations::{FileKind, SourceTree};
use crate::fs::path::join_virtual;

const WRITE_INTENT: i32 = libc::O_WRONLY | libc::O_RDWR | libc::O_CREAT | libc::O_EXCL | libc::O_TRUNC;

pub struct SieveBackend {
    tree: SourceTree,
    policy: Arc<FilterPolicy>,
    preserve_perms: bool,
}

impl SieveBackend {
    pub fn new(policy: Arc<FilterPolicy>, preserve_perms: bool) -> Self {
        let tree = SourceTree::new(policy.source_root());
        Self { tree, policy, preserve_perms }
    }

    /// lstat the real entry and apply the hide check with the stat'ed type.
    /// A stat failure propagates; a hide decision overrides a successful
    /// stat.
    fn resolve(&self, path: &str) -> FsResult<FileStat> {
        let st = self.tree.lstat(path)?;
        if self.policy.should_hide(path, FileKind::from_mode(st.st_mode as u32)) {
            return Err(FsError::NotFound(path.to_string()));
        }
        Ok(st)
    }

    /// Hide check with an assumed regular-file type, used by mutating
    /// operations that have no reason to stat before denying.
    fn deny_hidden(&self, path: &str) -> FsResult<()> {
        if self.policy.should_hide(path, FileKind::RegularFile) {
            return Err(FsError::NotFound(path.to_string()));
        }
        Ok(())
    }

    fn stat_to_attr(&self, st: &FileStat) -> FileAttr {
        let mode = st.st_mode as u32;
        let mut perm = (mode & 0o7777) as u16;
        // Read-only display: chmod a-w, unless asked to preserve
        if !self.preserve_perms {
            perm &= !0o222;
        }

        FileAttr {
            inode: st.st_ino,
            kind: FileKind::from_mode(mode),
            size: st.st_size as u64,
            blocks: st.st_blocks as u64,
            atime: timespec_to_system_time(st.st_atime, st.st_atime_nsec),
            mtime: timespec_to_system_time(st.st_mtime, st.st_mtime_nsec),
            ctime: timespec_to_system_time(st.st_ctime, st.st_ctime_nsec),
            perm,
            nlink: st.st_nlink as u32,
            uid: st.st_uid,
            gid: st.st_gid,
            rdev: st.st_rdev as u32,
        }
    }
}

fn timespec_to_system_time(secs: i64, nsecs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs as u64, nsecs as u32)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

impl FilesystemInterface for SieveBackend {
    fn get_attr(&self, path: &str) -> FsResult<FileAttr> {
        let st = self.resolve(path)?;
        Ok(self.stat_to_attr(&st))
    }

    fn read_link(&self, path: &str) -> FsResult<std::path::PathBuf> {
        if self.policy.should_hide(path, FileKind::Symlink) {
            return Err(FsError::NotFound(path.to_string()));
        }
        self.tree.read_link(path)
    }

    fn read_dir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        // Historical quirk, preserved: the directory itself is checked as
        // if it were a regular file, so type and extension rules never hide
        // a whole directory while path patterns still can.
        if self.policy.should_hide(path, FileKind::RegularFile) {
            return Err(FsError::NotFound(path.to_string()));
        }

        let mut visible = Vec::new();
        for entry in self.tree.read_dir(path)? {
            let full = join_virtual(path, &entry.name);
            if self.policy.should_hide(&full, entry.kind) {
                continue;
            }
            visible.push(DirEntry { inode: entry.inode, name: entry.name, kind: entry.kind });
        }
        Ok(visible)
    }

    fn open(&self, path: &str, flags: i32) -> FsResult<()> {
        self.resolve(path)?;

        // We allow opens, unless they're trying to write
        if flags & WRITE_INTENT != 0 {
            return Err(FsError::ReadOnly(path.to_string()));
        }

        self.tree.open_probe(path, flags)
    }

    fn read_file(&self, path: &str, offset: u64, size: u32) -> FsResult<Vec<u8>> {
        self.resolve(path)?;
        self.tree.read_at(path, offset, size)
    }

    fn access(&self, path: &str, mask: i32) -> FsResult<()> {
        self.resolve(path)?;

        if mask & libc::W_OK != 0 {
            return Err(FsError::ReadOnly(path.to_string()));
        }

        self.tree.access(path, mask)
    }

    fn statfs(&self, path: &str) -> FsResult<StatFs> {
        self.resolve(path)?;
        let vfs = self.tree.statvfs(path)?;
        Ok(StatFs {
            blocks: vfs.blocks(),
            bfree: vfs.blocks_free(),
            bavail: vfs.blocks_available(),
            files: vfs.files(),
            ffree: vfs.files_free(),
            bsize: vfs.block_size() as u32,
            namelen: vfs.name_max() as u32,
            frsize: vfs.fragment_size() as u32,
        })
    }

    fn get_xattr(&self, path: &str, name: &str) -> FsResult<Vec<u8>> {
        self.resolve(path)?;
        self.tree.get_xattr(path, name)
    }

    fn list_xattr(&self, path: &str) -> FsResult<Vec<u8>> {
        self.resolve(path)?;
        self.tree.list_xattr(path)
    }

    fn write_file(&self, path: &str, _offset: u64, _data: &[u8]) -> FsResult<u32> {
        self.resolve(path)?;
        Err(FsError::ReadOnly(path.to_string()))
    }

    fn set_attr(&self, path: &str, attr: SetAttr) -> FsResult<FileAttr> {
        // chmod/chown/truncate get the hide check so hidden entries answer
        // ENOENT; a pure timestamp update is denied outright, matching the
        // unconditional rejection utime has always had here.
        if attr.mode.is_some() || attr.uid.is_some() || attr.gid.is_some() || attr.size.is_some() {
            self.deny_hidden(path)?;
        }
        Err(FsError::ReadOnly(path.to_string()))
    }

    fn make_node(&self, path: &str, _mode: u32, _rdev: u32) -> FsResult<()> {
        Err(FsError::ReadOnly(path.to_string()))
    }

    fn make_dir(&self, path: &str, _mode: u32) -> FsResult<()> {
        Err(FsError::ReadOnly(path.to_string()))
    }

    fn remove_file(&self, path: &str) -> FsResult<()> {
        Err(FsError::ReadOnly(path.to_string()))
    }

    fn remove_dir(&self, path: &str) -> FsResult<()> {
        Err(FsError::ReadOnly(path.to_string()))
    }

    fn make_symlink(&self, _target: &str, link: &str) -> FsResult<()> {
        Err(FsError::ReadOnly(link.to_string()))
    }

    fn rename(&self, from: &str, _to: &str) -> FsResult<()> {
        self.deny_hidden(from)?;
        Err(FsError::ReadOnly(from.to_string()))
    }

    fn hard_link(&self, from: &str, _to: &str) -> FsResult<()> {
        self.deny_hidden(from)?;
        Err(FsError::ReadOnly(from.to_string()))
    }

    fn set_xattr(&self, path: &str, _name: &str, _value: &[u8]) -> FsResult<()> {
        self.deny_hidden(path)?;
        Err(FsError::ReadOnly(path.to_string()))
    }

    fn remove_xattr(&self, path: &str, _name: &str) -> FsResult<()> {
        self.deny_hidden(path)?;
        Err(FsError::ReadOnly(path.to_string()))
    }
}
