// Visibility policy behavior against real on-disk trees.

use std::path::Path;
use std::sync::Arc;

use sievefs::filter::{FilterPolicy, RuleSet};
use sievefs::fs::operations::FileKind;

fn policy(rules: &str, invert: bool, root: &Path) -> FilterPolicy {
    FilterPolicy::new(RuleSet::parse(rules, "test").unwrap(), invert, root)
}

#[test]
fn test_extension_priority_pair() {
    // flac,mp3: hide song.flac only while song.mp3 exists alongside it
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("song.flac"), b"flac").unwrap();
    std::fs::write(dir.path().join("song.mp3"), b"mp3").unwrap();

    let p = policy("|extensionPriority: flac,mp3\n", false, dir.path());
    assert!(p.should_hide("/song.flac", FileKind::RegularFile));
    assert!(!p.should_hide("/song.mp3", FileKind::RegularFile));

    std::fs::remove_file(dir.path().join("song.mp3")).unwrap();
    assert!(!p.should_hide("/song.flac", FileKind::RegularFile));
}

#[test]
fn test_extension_priority_in_subdirectory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("albums")).unwrap();
    std::fs::write(dir.path().join("albums/track.flac"), b"flac").unwrap();
    std::fs::write(dir.path().join("albums/track.mp3"), b"mp3").unwrap();

    let p = policy("|extensionPriority: flac,mp3\n", false, dir.path());
    assert!(p.should_hide("/albums/track.flac", FileKind::RegularFile));
    assert!(!p.should_hide("/albums/track.mp3", FileKind::RegularFile));
}

#[test]
fn test_dominant_sibling_counts_even_when_itself_hidden() {
    // The probe checks existence only; a pattern hiding the dominant
    // sibling does not resurrect the subordinate
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("song.flac"), b"flac").unwrap();
    std::fs::write(dir.path().join("song.mp3"), b"mp3").unwrap();

    let p = policy("|extensionPriority: flac,mp3\n\\.mp3$\n", false, dir.path());
    assert!(p.should_hide("/song.flac", FileKind::RegularFile));
    assert!(p.should_hide("/song.mp3", FileKind::RegularFile));
}

#[test]
fn test_type_exclusion_normal_and_invert() {
    let p = policy("| type: LNK\n", false, Path::new("/src"));
    assert!(p.should_hide("/link", FileKind::Symlink));

    let p = policy("| type: LNK\n", true, Path::new("/src"));
    assert!(!p.should_hide("/link", FileKind::Symlink));
}

#[test]
fn test_invert_mode_pattern() {
    let p = policy(r"\.mp3$", true, Path::new("/src"));
    assert!(!p.should_hide("/song.mp3", FileKind::RegularFile));
    assert!(p.should_hide("/song.flac", FileKind::RegularFile));
    // Carve-out: special files pass through the allow-list
    assert!(!p.should_hide("/link", FileKind::Symlink));
    assert!(!p.should_hide("/fifo", FileKind::NamedPipe));
    // Directories follow the pattern like regular files
    assert!(p.should_hide("/somedir", FileKind::Directory));
    assert!(!p.should_hide("/dir.mp3", FileKind::Directory));
}

#[test]
fn test_policy_is_safe_to_share_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("song.flac"), b"flac").unwrap();
    std::fs::write(dir.path().join("song.mp3"), b"mp3").unwrap();

    let p = Arc::new(policy("|extensionPriority: flac,mp3\n\\.bak$\n", false, dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let p = Arc::clone(&p);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    assert!(p.should_hide("/song.flac", FileKind::RegularFile));
                    assert!(!p.should_hide("/song.mp3", FileKind::RegularFile));
                    assert!(p.should_hide("/notes.bak", FileKind::RegularFile));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_no_state_carried_between_calls() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("song.flac"), b"flac").unwrap();

    let p = policy("|extensionPriority: flac,mp3\n", false, dir.path());
    assert!(!p.should_hide("/song.flac", FileKind::RegularFile));

    // The decision tracks current on-disk state, not a cached answer
    std::fs::write(dir.path().join("song.mp3"), b"mp3").unwrap();
    assert!(p.should_hide("/song.flac", FileKind::RegularFile));
}
