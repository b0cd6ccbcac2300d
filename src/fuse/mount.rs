// FUSE mount management
//
// Mounts the filtered view of a source directory. The kernel always sees
// the mount as read-only; the backend additionally rejects every mutation
// in case an option slips through.

use super::{FuseAdapter, SieveBackend};
use crate::filter::FilterPolicy;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Mount options for the FUSE session
#[derive(Debug, Clone)]
pub struct MountOptions {
    /// Allow other users to access the filesystem
    pub allow_other: bool,

    /// Allow root to access the filesystem
    pub allow_root: bool,

    /// Filesystem name (for mtab)
    pub fsname: Option<String>,

    /// Auto-unmount on process exit
    pub auto_unmount: bool,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            allow_other: false,
            allow_root: false,
            fsname: Some("sievefs".to_string()),
            auto_unmount: true,
        }
    }
}

impl MountOptions {
    /// Convert to fuser mount options. `RO` is unconditional.
    fn to_fuser_options(&self) -> Vec<fuser::MountOption> {
        let mut options = vec![fuser::MountOption::RO];

        if self.allow_other {
            options.push(fuser::MountOption::AllowOther);
        }

        if self.allow_root {
            options.push(fuser::MountOption::AllowRoot);
        }

        if let Some(ref fsname) = self.fsname {
            options.push(fuser::MountOption::FSName(fsname.clone()));
        }

        if self.auto_unmount {
            options.push(fuser::MountOption::AutoUnmount);
        }

        options
    }
}

fn build_adapter(policy: Arc<FilterPolicy>, preserve_perms: bool) -> FuseAdapter {
    let backend = Arc::new(SieveBackend::new(policy, preserve_perms));
    FuseAdapter::new(backend)
}

fn check_mountpoint(mountpoint: &Path) -> Result<()> {
    if !mountpoint.exists() {
        anyhow::bail!("Mount point does not exist: {}", mountpoint.display());
    }
    if !mountpoint.is_dir() {
        anyhow::bail!("Mount point is not a directory: {}", mountpoint.display());
    }
    Ok(())
}

/// Mount the filtered filesystem and block until it is unmounted.
pub fn mount(
    policy: Arc<FilterPolicy>,
    preserve_perms: bool,
    mountpoint: impl AsRef<Path>,
    options: MountOptions,
) -> Result<()> {
    let mountpoint = mountpoint.as_ref();
    check_mountpoint(mountpoint)?;

    tracing::info!(
        source = %policy.source_root().display(),
        mountpoint = %mountpoint.display(),
        invert = policy.invert(),
        "mounting filtered view"
    );

    let adapter = build_adapter(policy, preserve_perms);
    fuser::mount2(adapter, mountpoint, &options.to_fuser_options())
        .context("Failed to mount filesystem")?;

    Ok(())
}

/// Mount in the background; the returned session keeps the filesystem
/// mounted until dropped.
pub fn spawn_mount(
    policy: Arc<FilterPolicy>,
    preserve_perms: bool,
    mountpoint: impl AsRef<Path>,
    options: MountOptions,
) -> Result<fuser::BackgroundSession> {
    let mountpoint = mountpoint.as_ref();
    check_mountpoint(mountpoint)?;

    let adapter = build_adapter(policy, preserve_perms);
    let session = fuser::spawn_mount2(adapter, mountpoint, &options.to_fuser_options())
        .context("Failed to mount filesystem")?;

    tracing::info!(mountpoint = %mountpoint.display(), "filesystem mounted");

    Ok(session)
}

/// Explicitly unmount a FUSE filesystem.
///
/// Dropping a BackgroundSession already unmounts; this covers mounts owned
/// by another process.
pub fn unmount(mountpoint: impl AsRef<Path>) -> Result<()> {
    let mountpoint = mountpoint.as_ref();

    tracing::info!("Unmounting filesystem at {}", mountpoint.display());

    #[cfg(target_os = "linux")]
    {
        use std::process::Command;

        let output = Command::new("fusermount")
            .arg("-u")
            .arg(mountpoint)
            .output()
            .context("Failed to execute fusermount")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to unmount: {}", stderr);
        }
    }

    #[cfg(target_os = "macos")]
    {
        use std::process::Command;

        let output =
            Command::new("umount").arg(mountpoint).output().context("Failed to execute umount")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to unmount: {}", stderr);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_options_default() {
        let options = MountOptions::default();
        assert!(!options.allow_other);
        assert!(!options.allow_root);
        assert_eq!(options.fsname, Some("sievefs".to_string()));
        assert!(options.auto_unmount);
    }

    #[test]
    fn test_mount_is_always_read_only() {
        let options = MountOptions::default();
        assert!(options.to_fuser_options().contains(&fuser::MountOption::RO));
    }

    #[test]
    fn test_mount_options_to_fuser() {
        let options = MountOptions {
            allow_other: true,
            allow_root: true,
            fsname: Some("test".to_string()),
            auto_unmount: false,
        };

        let fuser_options = options.to_fuser_options();

        assert!(fuser_options.contains(&fuser::MountOption::AllowOther));
        assert!(fuser_options.contains(&fuser::MountOption::AllowRoot));
        assert!(fuser_options.contains(&fuser::MountOption::FSName("test".to_string())));
        assert!(!fuser_options.contains(&fuser::MountOption::AutoUnmount));
    }

    #[test]
    fn test_check_mountpoint_rejects_missing() {
        assert!(check_mountpoint(Path::new("/nonexistent/mountpoint")).is_err());
    }

    #[test]
    fn test_check_mountpoint_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(check_mountpoint(&file).is_err());
        assert!(check_mountpoint(dir.path()).is_ok());
    }
}
