// Path translation between the mounted view and the source tree.
//
// Virtual paths are the paths FUSE hands us, always absolute relative to
// the mount root ("/", "/music/song.mp3"). Real paths live under the
// configured source root.

use std::path::{Path, PathBuf};

/// Translate a virtual path into its real path under the source root.
///
/// Exactly one separator ends up between the root and the relative part,
/// regardless of trailing slashes on the root or leading slashes on the
/// virtual path. Pure string construction, no I/O.
pub fn translate(source_root: &Path, virtual_path: &str) -> PathBuf {
    let relative = virtual_path.trim_start_matches('/');
    if relative.is_empty() {
        source_root.to_path_buf()
    } else {
        source_root.join(relative)
    }
}

/// Join a directory's virtual path with an entry name.
pub fn join_virtual(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}
