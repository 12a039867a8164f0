//! Path helpers shared by the merger, validator, and accessor.

/// Join nested paths for better error messages.
pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Split a dotted path into its segments, ignoring empty segments.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|segment| !segment.is_empty()).collect()
}
