//! Filesystem naming helpers.

use std::path::{Path, PathBuf};

/// Characters that cannot appear in a file name on at least one supported
/// platform.
const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Make a string safe to use as a single path component.
///
/// Forbidden and control characters become spaces, runs of whitespace
/// collapse, and an empty result falls back to a placeholder so callers
/// always get a usable name.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if FORBIDDEN.contains(&c) || c.is_control() {
                ' '
            } else {
                c
            }
        })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "untitled".to_string()
    } else {
        collapsed
    }
}

/// First path of the form `dir/stem.ext`, `dir/stem (1).ext`, ... for which
/// neither the filesystem nor the caller's reservation predicate objects.
pub fn collision_free_path(
    dir: &Path,
    stem: &str,
    ext: &str,
    is_taken: impl Fn(&Path) -> bool,
) -> PathBuf {
    let stem = sanitize_component(stem);
    let ext = ext.trim_start_matches('.');

    let mut candidate = dir.join(format!("{stem}.{ext}"));
    let mut index = 1u32;
    while candidate.exists() || is_taken(&candidate) {
        candidate = dir.join(format!("{stem} ({index}).{ext}"));
        index += 1;
    }
    candidate
}
