use std::fmt::Write;

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns a formatted version string including build metadata if available.
#[must_use]
pub fn version_string() -> String {
    format_version(option_env!("PEACOCK_BUILD_GIT_HASH"))
}

fn format_version(hash: Option<&str>) -> String {
    let mut s = format!("peacock {VERSION}");

    if let Some(hash) = hash {
        let _ = write!(s, " ({hash})");
    }

    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_version_string_contains_version() {
        let vs = version_string();
        assert!(vs.contains(VERSION));
        assert!(vs.starts_with("peacock "));
    }

    #[test]
    fn test_build_hash_is_appended() {
        assert_eq!(format_version(None), format!("peacock {VERSION}"));
        assert_eq!(format_version(Some("abc123")), format!("peacock {VERSION} (abc123)"));
    }
}
