// Visibility policy
//
// Applies the compiled ruleset to a single entry. Precedence is fixed and
// the first decisive rule wins:
//
//   1. extension priority (normal mode only) - hide when a dominant-format
//      sibling exists next to the entry on the real filesystem
//   2. type exclusion - hide, flipped to show by invert mode
//   3. invert carve-out - non-regular, non-directory entries pass through
//      an allow-list config instead of being swallowed by omission
//   4. pattern match - hide normally, show when inverted
//   5. default - show normally, hide when inverted
//
// Rule 1 is the only rule with an I/O dependency (a sibling existence
// probe); everything else is pure computation over the compiled rules.

use std::path::{Path, PathBuf};

use super::rules::RuleSet;
use crate::fs::operations::FileKind;
use crate::fs::path::translate;

/// The compiled ruleset plus the runtime context it is evaluated in.
/// Immutable after construction; safe to share across FUSE worker threads
/// without synchronization.
#[derive(Debug)]
pub struct FilterPolicy {
    rules: RuleSet,
    invert: bool,
    source_root: PathBuf,
}

impl FilterPolicy {
    pub fn new(rules: RuleSet, invert: bool, source_root: impl Into<PathBuf>) -> Self {
        Self { rules, invert, source_root: source_root.into() }
    }

    pub fn invert(&self) -> bool {
        self.invert
    }

    /// Decide whether the entry at `virtual_path` with raw type `kind`
    /// should behave as nonexistent.
    pub fn should_hide(&self, virtual_path: &str, kind: FileKind) -> bool {
        tracing::debug!(path = virtual_path, ?kind, "visibility check");

        // 1. A dominant-format sibling hides this entry outright. The probe
        // only checks existence; a sibling that is itself hidden by another
        // rule still counts.
        if !self.invert && self.rules.has_ext_priority() {
            let real = translate(&self.source_root, virtual_path);
            if let Some(ext) = real.extension().and_then(|e| e.to_str()) {
                for dominant in self.rules.dominant_extensions(ext) {
                    let sibling = real.with_extension(dominant);
                    if sibling.exists() {
                        tracing::debug!(
                            path = virtual_path,
                            sibling = %sibling.display(),
                            "hidden by extension priority"
                        );
                        return true;
                    }
                }
            }
        }

        // 2. Excluded raw types; invert flips this decision.
        if self.rules.excludes_type(kind) {
            tracing::debug!(path = virtual_path, ?kind, "matched excluded type");
            return !self.invert;
        }

        // 3. In invert mode, entries that are neither regular files nor
        // directories are shown unless a type rule caught them above.
        if self.invert && kind != FileKind::RegularFile && kind != FileKind::Directory {
            return false;
        }

        // 4. Pattern match against the virtual path.
        if let Some(pattern) = self.rules.pattern() {
            if pattern.is_match(virtual_path) {
                tracing::debug!(path = virtual_path, "matched pattern");
                return !self.invert;
            }
        }

        // 5. Nothing matched.
        self.invert
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }
}
