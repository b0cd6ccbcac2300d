use clap::Parser;
use std::path::PathBuf;

use crate::fuse::MountOptions;

pub const DEFAULT_RULE_FILE: &str = "/etc/sievefs.rc";

/// Process-level settings. Everything else the filesystem needs comes from
/// the rule file, loaded once at startup.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sievefs",
    version,
    about = "Mount a directory read-only, hiding entries that match a rule file"
)]
pub struct Settings {
    /// Where to mount the filtered view
    pub mountpoint: PathBuf,

    /// Directory to mount as read-only and filter
    #[arg(short, long, env = "SIEVEFS_SOURCE")]
    pub source: PathBuf,

    /// Rule file path
    #[arg(short, long, env = "SIEVEFS_CONFIG", default_value = DEFAULT_RULE_FILE)]
    pub config: PathBuf,

    /// The rule file specifies files to show rather than hide
    #[arg(long, env = "SIEVEFS_INVERT")]
    pub invert: bool,

    /// Do not clear write permission bits in reported attributes
    #[arg(long = "preserve-perms", env = "SIEVEFS_PRESERVE_PERMS")]
    pub preserve_perms: bool,

    /// Allow other users to access the mount
    #[arg(long)]
    pub allow_other: bool,

    /// Allow root to access the mount
    #[arg(long)]
    pub allow_root: bool,

    /// Enable extra logging
    #[arg(short, long)]
    pub debug: bool,
}

impl Settings {
    pub fn mount_options(&self) -> MountOptions {
        MountOptions {
            allow_other: self.allow_other,
            allow_root: self.allow_root,
            ..MountOptions::default()
        }
    }
}
