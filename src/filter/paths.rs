//! Private- and noise-path rejection.

/// Prefix marking a vault subtree that must never surface.
const PRIVATE_PREFIX: &str = "_PRIVATE";

/// Returns true when the path lives under the private subtree.
///
/// Both separators are checked case-sensitively at position 0, and the
/// uppercased path is checked once more so `_private/…` and `_Private\…`
/// are caught too.
#[must_use]
pub fn is_private(path: &str) -> bool {
    if path.starts_with("_PRIVATE/") || path.starts_with("_PRIVATE\\") {
        return true;
    }
    let upper = path.to_uppercase();
    upper.starts_with("_PRIVATE/") || upper.starts_with("_PRIVATE\\")
}

/// Returns true when the path has a configured noise prefix.
#[must_use]
pub fn is_noisy(path: &str, noise_prefixes: &[String]) -> bool {
    noise_prefixes
        .iter()
        .any(|prefix| !prefix.is_empty() && path.starts_with(prefix.as_str()))
}

/// Returns true when the candidate path must be dropped from every output.
#[must_use]
pub fn should_skip_path(path: &str, noise_prefixes: &[String]) -> bool {
    is_private(path) || is_noisy(path, noise_prefixes)
}
