// Source-tree access layer
//
// Thin passthrough primitives over the real directory tree. Nothing here
// consults the filtering policy; callers resolve and decide, this layer
// only performs the underlying syscalls. No handle survives a call.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use nix::dir::{Dir, Type};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::stat::{FileStat, Mode};
use nix::sys::statvfs::Statvfs;
use nix::unistd::AccessFlags;

use crate::fs::error::{FsError, FsResult};
use crate::fs::path::translate;

/// Coarse file type, mirroring the `S_IFMT` categories.
///
/// `Unknown` covers directory entries whose type could not be determined
/// even by the fallback stat; the policy treats it as neither regular file
/// nor directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    RegularFile,
    Directory,
    Symlink,
    CharDevice,
    BlockDevice,
    NamedPipe,
    Socket,
    Unknown,
}

impl FileKind {
    /// Classify a raw `st_mode` by its `S_IFMT` bits.
    pub fn from_mode(mode: u32) -> Self {
        match mode & libc::S_IFMT {
            libc::S_IFREG => FileKind::RegularFile,
            libc::S_IFDIR => FileKind::Directory,
            libc::S_IFLNK => FileKind::Symlink,
            libc::S_IFCHR => FileKind::CharDevice,
            libc::S_IFBLK => FileKind::BlockDevice,
            libc::S_IFIFO => FileKind::NamedPipe,
            libc::S_IFSOCK => FileKind::Socket,
            _ => FileKind::Unknown,
        }
    }

    fn from_dirent_type(t: Type) -> Self {
        match t {
            Type::File => FileKind::RegularFile,
            Type::Directory => FileKind::Directory,
            Type::Symlink => FileKind::Symlink,
            Type::CharacterDevice => FileKind::CharDevice,
            Type::BlockDevice => FileKind::BlockDevice,
            Type::Fifo => FileKind::NamedPipe,
            Type::Socket => FileKind::Socket,
        }
    }
}

/// A directory entry as enumerated from the source tree, type resolved
/// from `d_type` with a stat fallback.
#[derive(Debug, Clone)]
pub struct RawDirEntry {
    pub name: String,
    pub inode: u64,
    pub kind: FileKind,
}

/// Handle on the source root. Owns no file descriptors; every operation
/// opens and releases what it needs within the call.
#[derive(Debug)]
pub struct SourceTree {
    root: PathBuf,
}

impl SourceTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Real path for a virtual path.
    pub fn real_path(&self, virtual_path: &str) -> PathBuf {
        translate(&self.root, virtual_path)
    }

    /// lstat the real entry behind `virtual_path`.
    pub fn lstat(&self, virtual_path: &str) -> FsResult<FileStat> {
        let real = self.real_path(virtual_path);
        nix::sys::stat::lstat(&real).map_err(|e| FsError::from_errno(e, virtual_path))
    }

    /// Enumerate a directory. Entry types come from the directory entry
    /// metadata when the filesystem reports them; otherwise one extra
    /// lstat resolves the type. A failing fallback stat leaves the entry
    /// in with an unknown type rather than dropping it.
    pub fn read_dir(&self, virtual_path: &str) -> FsResult<Vec<RawDirEntry>> {
        let real = self.real_path(virtual_path);
        let mut dir = Dir::open(&real, OFlag::O_RDONLY | OFlag::O_DIRECTORY, Mode::empty())
            .map_err(|e| FsError::from_errno(e, virtual_path))?;

        let mut entries = Vec::new();
        for entry in dir.iter() {
            let entry = entry.map_err(|e| FsError::from_errno(e, virtual_path))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == "." || name == ".." {
                continue;
            }

            let kind = match entry.file_type() {
                Some(t) => FileKind::from_dirent_type(t),
                None => {
                    let child = real.join(&name);
                    match nix::sys::stat::lstat(&child) {
                        Ok(st) => FileKind::from_mode(st.st_mode as u32),
                        Err(errno) => {
                            tracing::warn!(
                                path = %child.display(),
                                %errno,
                                "fallback lstat failed while resolving entry type"
                            );
                            FileKind::Unknown
                        }
                    }
                }
            };

            entries.push(RawDirEntry { name, inode: entry.ino(), kind });
        }

        Ok(entries)
    }

    /// Read the target of a symbolic link.
    pub fn read_link(&self, virtual_path: &str) -> FsResult<PathBuf> {
        let real = self.real_path(virtual_path);
        std::fs::read_link(&real).map_err(FsError::Io)
    }

    /// Open-and-close probe, surfacing any real open-time error. The
    /// caller has already rejected write-intent flags; FUSE supplies its
    /// own descriptor to the application, so no handle is retained.
    pub fn open_probe(&self, virtual_path: &str, flags: i32) -> FsResult<()> {
        let real = self.real_path(virtual_path);
        let fd = nix::fcntl::open(&real, OFlag::from_bits_truncate(flags), Mode::empty())
            .map_err(|e| FsError::from_errno(e, virtual_path))?;
        drop(fd);
        Ok(())
    }

    /// Positioned read: open read-only, read at `offset`, close.
    pub fn read_at(&self, virtual_path: &str, offset: u64, size: u32) -> FsResult<Vec<u8>> {
        let real = self.real_path(virtual_path);
        let file = std::fs::File::open(&real).map_err(FsError::Io)?;
        let mut buf = vec![0u8; size as usize];
        let n = file.read_at(&mut buf, offset).map_err(FsError::Io)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Check real accessibility for `mask` (the caller rejects W_OK).
    pub fn access(&self, virtual_path: &str, mask: i32) -> FsResult<()> {
        let real = self.real_path(virtual_path);
        nix::unistd::access(&real, AccessFlags::from_bits_truncate(mask))
            .map_err(|e| FsError::from_errno(e, virtual_path))
    }

    /// statvfs on the real path.
    pub fn statvfs(&self, virtual_path: &str) -> FsResult<Statvfs> {
        let real = self.real_path(virtual_path);
        nix::sys::statvfs::statvfs(&real).map_err(|e| FsError::from_errno(e, virtual_path))
    }

    /// Get one extended attribute, without following symlinks.
    pub fn get_xattr(&self, virtual_path: &str, name: &str) -> FsResult<Vec<u8>> {
        let cpath = self.c_path(virtual_path)?;
        let cname = CString::new(name)
            .map_err(|_| FsError::InvalidPath(format!("xattr name: {name}")))?;

        // Size-probe, then fetch; retry if the value grew in between.
        loop {
            let len = unsafe {
                libc::lgetxattr(cpath.as_ptr(), cname.as_ptr(), std::ptr::null_mut(), 0)
            };
            if len < 0 {
                return Err(FsError::from_errno(Errno::last(), virtual_path));
            }

            let mut buf = vec![0u8; len as usize];
            let res = unsafe {
                libc::lgetxattr(
                    cpath.as_ptr(),
                    cname.as_ptr(),
                    buf.as_mut_ptr().cast(),
                    buf.len(),
                )
            };
            if res < 0 {
                let errno = Errno::last();
                if errno == Errno::ERANGE {
                    continue;
                }
                return Err(FsError::from_errno(errno, virtual_path));
            }

            buf.truncate(res as usize);
            return Ok(buf);
        }
    }

    /// List extended attribute names (raw NUL-separated form), without
    /// following symlinks.
    pub fn list_xattr(&self, virtual_path: &str) -> FsResult<Vec<u8>> {
        let cpath = self.c_path(virtual_path)?;

        loop {
            let len =
                unsafe { libc::llistxattr(cpath.as_ptr(), std::ptr::null_mut(), 0) };
            if len < 0 {
                return Err(FsError::from_errno(Errno::last(), virtual_path));
            }

            let mut buf = vec![0u8; len as usize];
            let res = unsafe {
                libc::llistxattr(cpath.as_ptr(), buf.as_mut_ptr().cast(), buf.len())
            };
            if res < 0 {
                let errno = Errno::last();
                if errno == Errno::ERANGE {
                    continue;
                }
                return Err(FsError::from_errno(errno, virtual_path));
            }

            buf.truncate(res as usize);
            return Ok(buf);
        }
    }

    fn c_path(&self, virtual_path: &str) -> FsResult<CString> {
        let real = self.real_path(virtual_path);
        CString::new(real.as_os_str().as_bytes())
            .map_err(|_| FsError::InvalidPath(virtual_path.to_string()))
    }
}
