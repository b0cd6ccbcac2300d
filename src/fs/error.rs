use thiserror::Error;

pub type FsResult<T> = Result<T, FsError>;

/// Errors surfaced by filesystem operations.
///
/// `NotFound` doubles as the result of a hide decision: a hidden entry must
/// be indistinguishable from a nonexistent one, so both map to ENOENT.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Read-only filesystem rejected operation on: {0}")]
    ReadOnly(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// Convert to a POSIX errno for the FUSE reply.
    ///
    /// Real I/O errors keep their original errno so the caller sees the
    /// same code the underlying syscall produced.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::ReadOnly(_) => libc::EPERM,
            FsError::InvalidPath(_) => libc::EINVAL,
            FsError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }

    pub(crate) fn from_errno(errno: nix::errno::Errno, path: &str) -> Self {
        match errno {
            nix::errno::Errno::ENOENT => FsError::NotFound(path.to_string()),
            other => FsError::Io(std::io::Error::from(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_errno() {
        let err = FsError::NotFound("/music/song.flac".to_string());
        assert_eq!(err.to_errno(), libc::ENOENT);
    }

    #[test]
    fn test_read_only_errno() {
        let err = FsError::ReadOnly("/music/song.mp3".to_string());
        assert_eq!(err.to_errno(), libc::EPERM);
    }

    #[test]
    fn test_invalid_path_errno() {
        let err = FsError::InvalidPath("no leading slash".to_string());
        assert_eq!(err.to_errno(), libc::EINVAL);
    }

    #[test]
    fn test_io_error_keeps_errno() {
        let err = FsError::Io(std::io::Error::from_raw_os_error(libc::EACCES));
        assert_eq!(err.to_errno(), libc::EACCES);
    }

    #[test]
    fn test_io_error_without_errno_maps_to_eio() {
        let err = FsError::Io(std::io::Error::other("synthetic"));
        assert_eq!(err.to_errno(), libc::EIO);
    }

    #[test]
    fn test_from_errno_enoent() {
        let err = FsError::from_errno(nix::errno::Errno::ENOENT, "/gone");
        assert_eq!(err.to_errno(), libc::ENOENT);
        assert!(err.to_string().contains("/gone"));
    }

    #[test]
    fn test_from_errno_other() {
        let err = FsError::from_errno(nix::errno::Errno::EACCES, "/locked");
        assert_eq!(err.to_errno(), libc::EACCES);
    }

    #[test]
    fn test_display_messages() {
        let err = FsError::NotFound("/a/b".to_string());
        assert!(err.to_string().contains("/a/b"));

        let err = FsError::ReadOnly("/a/b".to_string());
        assert!(err.to_string().contains("Read-only"));
    }
}
