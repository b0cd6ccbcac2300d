// FUSE interface implementation
//
// The callback dispatcher: a protocol-neutral FilesystemInterface with the
// filtering backend behind it, plus the fuser adapter and mount plumbing.

pub mod adapter;
pub mod backend;
pub mod interface;
pub mod mount;

pub use adapter::FuseAdapter;
pub use backend::SieveBackend;
pub use interface::{
    DirEntry, FileAttr, FileKind, FilesystemInterface, FsError, FsResult, SetAttr, StatFs,
};
pub use mount::{MountOptions, mount, spawn_mount, unmount};
