//! Open-redirect protection.

/// Return `to` if it is a same-site path, otherwise `default`.
///
/// Rejects anything not starting with a single `/`, protocol-relative
/// `//host` and `/\host` forms, and paths containing `..`.
pub fn safe_redirect(to: Option<&str>, default: &str) -> String {
    let Some(to) = to.map(str::trim) else {
        return default.to_string();
    };
    if !to.starts_with('/') || to.starts_with("//") || to.starts_with("/\\") || to.contains("..") {
        return default.to_string();
    }
    to.to_string()
}
