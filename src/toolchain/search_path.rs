//! Search path (`PATH`) manipulation.
//!
//! Every function here is idempotent: applying it to its own output returns
//! the same string. The bootstrap relies on that so a hook that runs on every
//! dyno boot does not keep growing `PATH`.

use std::collections::HashSet;

#[cfg(unix)]
pub const SEPARATOR: char = ':';
#[cfg(windows)]
pub const SEPARATOR: char = ';';

/// Split a search path into its non-empty entries.
pub fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|entry| !entry.is_empty())
}

/// Put `dirs` at the front of `path`.
///
/// Later occurrences of the same entries are dropped, as are duplicates
/// and empty entries anywhere in the result.
pub fn prepend<S: AsRef<str>>(path: &str, dirs: &[S]) -> String {
    let front = dirs.iter().map(AsRef::<str>::as_ref).filter(|d| !d.is_empty());
    join_unique(front.chain(split(path)))
}

/// Add `dirs` at the end of `path`, skipping any that are already present.
pub fn append_missing<S: AsRef<str>>(path: &str, dirs: &[S]) -> String {
    let back = dirs.iter().map(AsRef::<str>::as_ref).filter(|d| !d.is_empty());
    join_unique(split(path).chain(back))
}

fn join_unique<'a>(entries: impl Iterator<Item = &'a str>) -> String {
    let mut seen = HashSet::new();
    let kept: Vec<&str> = entries.filter(|entry| seen.insert(*entry)).collect();
    kept.join(&SEPARATOR.to_string())
}
