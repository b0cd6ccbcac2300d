// FUSE adapter - bridges fuser callbacks to FilesystemInterface
//
// fuser addresses files by inode while the backend works on virtual paths,
// so the adapter owns the inode <-> path mapping and translates both the
// arguments and the error codes. All filtering and read-only decisions
// happen behind the FilesystemInterface; this layer stays mechanical.

use super::interface::{
    FileAttr, FileKind, FilesystemInterface, FsError, SetAttr,
};
use crate::fs::path::join_virtual;
use fuser::{
    FileType as FuseFileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, ReplyXattr, Request, TimeOrNow,
};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

/// FUSE adapter over a FilesystemInterface implementation.
pub struct FuseAdapter {
    backend: Arc<dyn FilesystemInterface>,

    /// Inode to path mapping
    /// FUSE uses inodes, but the backend uses paths
    inode_map: Arc<RwLock<InodeMap>>,
}

/// Manages inode <-> path bidirectional mapping
struct InodeMap {
    inode_to_path: HashMap<u64, String>,
    path_to_inode: HashMap<String, u64>,

    /// Next inode to allocate
    next_inode: u64,
}

impl InodeMap {
    fn new() -> Self {
        let mut map = Self {
            inode_to_path: HashMap::new(),
            path_to_inode: HashMap::new(),
            next_inode: 2, // 1 is reserved for root
        };

        map.insert(1, "/".to_string());

        map
    }

    fn insert(&mut self, inode: u64, path: String) {
        self.inode_to_path.insert(inode, path.clone());
        self.path_to_inode.insert(path, inode);
    }

    /// Get or create inode for path
    fn get_or_create(&mut self, path: &str) -> u64 {
        if let Some(&inode) = self.path_to_inode.get(path) {
            return inode;
        }

        let inode = self.next_inode;
        self.next_inode += 1;
        self.insert(inode, path.to_string());
        inode
    }

    fn get_path(&self, inode: u64) -> Option<&str> {
        self.inode_to_path.get(&inode).map(|s| s.as_str())
    }
}

impl FuseAdapter {
    pub fn new(backend: Arc<dyn FilesystemInterface>) -> Self {
        Self { backend, inode_map: Arc::new(RwLock::new(InodeMap::new())) }
    }

    fn get_path(&self, inode: u64) -> Result<String, libc::c_int> {
        let map = self.inode_map.read().unwrap();
        map.get_path(inode).map(|s| s.to_string()).ok_or(libc::ENOENT)
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Result<String, libc::c_int> {
        let name = name.to_str().ok_or(libc::EINVAL)?;
        let parent_path = self.get_path(parent)?;
        Ok(join_virtual(&parent_path, name))
    }

    fn error_to_errno(error: FsError) -> libc::c_int {
        error.to_errno()
    }

    fn to_fuse_kind(kind: FileKind) -> FuseFileType {
        match kind {
            FileKind::RegularFile => FuseFileType::RegularFile,
            FileKind::Directory => FuseFileType::Directory,
            FileKind::Symlink => FuseFileType::Symlink,
            FileKind::CharDevice => FuseFileType::CharDevice,
            FileKind::BlockDevice => FuseFileType::BlockDevice,
            FileKind::NamedPipe => FuseFileType::NamedPipe,
            FileKind::Socket => FuseFileType::Socket,
            // An entry we could not type at all; report it as a plain file
            FileKind::Unknown => FuseFileType::RegularFile,
        }
    }

    /// Convert our FileAttr to fuser FileAttr
    fn to_fuse_attr(attr: &FileAttr) -> fuser::FileAttr {
        fuser::FileAttr {
            ino: attr.inode,
            size: attr.size,
            blocks: attr.blocks,
            atime: attr.atime,
            mtime: attr.mtime,
            ctime: attr.ctime,
            crtime: SystemTime::UNIX_EPOCH,
            kind: Self::to_fuse_kind(attr.kind),
            perm: attr.perm,
            nlink: attr.nlink,
            uid: attr.uid,
            gid: attr.gid,
            rdev: attr.rdev,
            blksize: 4096,
            flags: 0,
        }
    }
}

/// Default TTL for file attributes (1 second)
const ATTR_TTL: Duration = Duration::from_secs(1);

/// Default TTL for directory entries (1 second)
const ENTRY_TTL: Duration = Duration::from_secs(1);

impl Filesystem for FuseAdapter {
    fn init(
        &mut self,
        _req: &Request,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), libc::c_int> {
        tracing::info!("FUSE filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        tracing::info!("FUSE filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let path = match self.child_path(parent, name) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.get_attr(&path) {
            Ok(mut attr) => {
                let inode = {
                    let mut map = self.inode_map.write().unwrap();
                    map.get_or_create(&path)
                };
                attr.inode = inode;

                reply.entry(&ENTRY_TTL, &Self::to_fuse_attr(&attr), 0);
            }
            Err(e) => {
                reply.error(Self::error_to_errno(e));
            }
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let path = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.get_attr(&path) {
            Ok(mut attr) => {
                attr.inode = ino; // Use FUSE inode
                reply.attr(&ATTR_TTL, &Self::to_fuse_attr(&attr));
            }
            Err(e) => {
                reply.error(Self::error_to_errno(e));
            }
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let path = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        let resolve_time = |t: TimeOrNow| match t {
            TimeOrNow::SpecificTime(st) => st,
            TimeOrNow::Now => SystemTime::now(),
        };

        let set_attr = SetAttr {
            mode,
            uid,
            gid,
            size,
            atime: atime.map(resolve_time),
            mtime: mtime.map(resolve_time),
        };

        match self.backend.set_attr(&path, set_attr) {
            Ok(mut attr) => {
                attr.inode = ino;
                reply.attr(&ATTR_TTL, &Self::to_fuse_attr(&attr));
            }
            Err(e) => {
                reply.error(Self::error_to_errno(e));
            }
        }
    }

    fn readlink(&mut self, _req: &Request, ino: u64, reply: ReplyData) {
        let path = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.read_link(&path) {
            Ok(target) => {
                reply.data(target.as_os_str().as_bytes());
            }
            Err(e) => {
                reply.error(Self::error_to_errno(e));
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let path = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.read_dir(&path) {
            Ok(entries) => {
                // TODO: track parent inodes so ".." reports the real one
                let mut all_entries = vec![
                    (ino, FuseFileType::Directory, ".".to_string()),
                    (ino, FuseFileType::Directory, "..".to_string()),
                ];

                for entry in entries {
                    let inode = {
                        let entry_path = join_virtual(&path, &entry.name);
                        let mut map = self.inode_map.write().unwrap();
                        map.get_or_create(&entry_path)
                    };

                    all_entries.push((inode, Self::to_fuse_kind(entry.kind), entry.name));
                }

                // Reply with entries starting from offset; stop when the
                // kernel buffer reports full
                for (i, (inode, kind, name)) in
                    all_entries.iter().enumerate().skip(offset as usize)
                {
                    let buffer_full = reply.add(*inode, (i + 1) as i64, *kind, name);
                    if buffer_full {
                        break;
                    }
                }

                reply.ok();
            }
            Err(e) => {
                reply.error(Self::error_to_errno(e));
            }
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        let path = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.open(&path, flags) {
            // No handle is retained; the probe only surfaced open errors
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let path = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.read_file(&path, offset as u64, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let path = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.write_file(&path, offset as u64, data) {
            Ok(written) => reply.written(written),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }

    fn flush(
        &mut self,
        _req: &Request,
        _ino: u64,
        _fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        // Nothing held open across calls
        reply.ok();
    }

    fn fsync(&mut self, _req: &Request, _ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        reply.ok();
    }

    fn mknod(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        let path = match self.child_path(parent, name) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.make_node(&path, mode, rdev) {
            Ok(()) => reply.error(libc::EIO),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let path = match self.child_path(parent, name) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.make_dir(&path, mode) {
            Ok(()) => reply.error(libc::EIO),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = match self.child_path(parent, name) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.remove_file(&path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = match self.child_path(parent, name) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.remove_dir(&path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request,
        parent: u64,
        link_name: &OsStr,
        target: &std::path::Path,
        reply: ReplyEntry,
    ) {
        let link = match self.child_path(parent, link_name) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.make_symlink(&target.to_string_lossy(), &link) {
            Ok(()) => reply.error(libc::EIO),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let from = match self.child_path(parent, name) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };
        let to = match self.child_path(newparent, newname) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.rename(&from, &to) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }

    fn link(
        &mut self,
        _req: &Request,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let from = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };
        let to = match self.child_path(newparent, newname) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.hard_link(&from, &to) {
            Ok(()) => reply.error(libc::EIO),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let path = match self.child_path(parent, name) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.make_node(&path, mode, 0) {
            Ok(()) => reply.error(libc::EIO),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }

    fn statfs(&mut self, _req: &Request, ino: u64, reply: ReplyStatfs) {
        let path = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.statfs(&path) {
            Ok(stats) => {
                reply.statfs(
                    stats.blocks,
                    stats.bfree,
                    stats.bavail,
                    stats.files,
                    stats.ffree,
                    stats.bsize,
                    stats.namelen,
                    stats.frsize,
                );
            }
            Err(e) => {
                reply.error(Self::error_to_errno(e));
            }
        }
    }

    fn access(&mut self, _req: &Request, ino: u64, mask: i32, reply: ReplyEmpty) {
        let path = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.access(&path, mask) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }

    fn getxattr(
        &mut self,
        _req: &Request,
        ino: u64,
        name: &OsStr,
        size: u32,
        reply: ReplyXattr,
    ) {
        let path = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };
        let name = match name.to_str() {
            Some(n) => n,
            None => {
                reply.error(libc::EINVAL);
                return;
            }
        };

        match self.backend.get_xattr(&path, name) {
            Ok(value) => {
                if size == 0 {
                    reply.size(value.len() as u32);
                } else if value.len() <= size as usize {
                    reply.data(&value);
                } else {
                    reply.error(libc::ERANGE);
                }
            }
            Err(e) => {
                reply.error(Self::error_to_errno(e));
            }
        }
    }

    fn listxattr(&mut self, _req: &Request, ino: u64, size: u32, reply: ReplyXattr) {
        let path = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.backend.list_xattr(&path) {
            Ok(list) => {
                if size == 0 {
                    reply.size(list.len() as u32);
                } else if list.len() <= size as usize {
                    reply.data(&list);
                } else {
                    reply.error(libc::ERANGE);
                }
            }
            Err(e) => {
                reply.error(Self::error_to_errno(e));
            }
        }
    }

    fn setxattr(
        &mut self,
        _req: &Request,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        _flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        let path = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };
        let name = match name.to_str() {
            Some(n) => n,
            None => {
                reply.error(libc::EINVAL);
                return;
            }
        };

        match self.backend.set_xattr(&path, name, value) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }

    fn removexattr(&mut self, _req: &Request, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = match self.get_path(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };
        let name = match name.to_str() {
            Some(n) => n,
            None => {
                reply.error(libc::EINVAL);
                return;
            }
        };

        match self.backend.remove_xattr(&path, name) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(Self::error_to_errno(e)),
        }
    }
}
