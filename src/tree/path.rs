//! Slash-separated path normalization and decomposition

use unicode_normalization::UnicodeNormalization;

/// Join `parent` and `child` with a single separator and normalize the result.
///
/// The result always has one leading slash, no trailing slash (except the root
/// itself) and no repeated separators. `normalize("", "")` is `"/"`.
pub fn normalize(parent: &str, child: &str) -> String {
    let mut result = String::with_capacity(parent.len() + child.len() + 1);
    for segment in parent.split('/').chain(child.split('/')) {
        if segment.is_empty() {
            continue;
        }
        result.push('/');
        result.push_str(segment);
    }
    if result.is_empty() {
        result.push('/');
    }
    result
}

/// Normalize a single path string, including Unicode NFC composition
///
/// Composed and decomposed spellings of a name address the same entry.
pub fn normalize_path(path: &str) -> String {
    let composed: String = path.nfc().collect();
    normalize(&composed, "")
}

/// Index key for child `name` of `parent`.
///
/// Hosts report names in whatever Unicode form they store; keys are always
/// NFC so that lookups through [`normalize_path`] find them.
pub fn join(parent: &str, name: &str) -> String {
    normalize_path(&normalize(parent, name))
}

/// Last non-empty segment of `path`; empty for the root.
pub fn basename(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

/// Parent of a normalized path: `""` for the root, `"/"` for top-level entries.
pub fn parent_path(path: &str) -> String {
    let normalized = normalize(path, "");
    if normalized == "/" {
        return String::new();
    }
    match normalized.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => normalized[..idx].to_string(),
    }
}

/// Substring after the final `.` of the basename.
///
/// Names without a dot, names ending in a dot, and dotfiles such as
/// `.gitignore` have no extension.
pub fn extension(path: &str) -> &str {
    let name = basename(path);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &name[idx + 1..],
    }
}

/// True when `path` lies strictly below `ancestor`.
///
/// Segment-aware: `/src` is not an ancestor of `/src2/a`.
pub fn is_descendant(ancestor: &str, path: &str) -> bool {
    let ancestor = normalize(ancestor, "");
    let path = normalize(path, "");
    if ancestor == path {
        return false;
    }
    if ancestor == "/" {
        return true;
    }
    path.strip_prefix(ancestor.as_str())
        .is_some_and(|rest| rest.starts_with('/'))
}
