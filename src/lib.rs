// sievefs - a read-only filtering passthrough filesystem
//
// Projects a source directory through FUSE as a read-only view, hiding
// entries whose name, type, or extension-derived duplicate status matches
// rules from a plain-text rule file.

pub mod config;
pub mod filter;
pub mod fs;
pub mod fuse;
