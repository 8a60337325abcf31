//! Compile-time build metadata exposed to the CLI.

/// Semver package version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// VCS commit hash captured at build time.
pub const GIT_COMMIT: &str = env!("CONVAI_BUILD_GIT_HASH");

/// Build timestamp captured at compile time.
pub const BUILD_TIMESTAMP: &str = env!("CONVAI_BUILD_TIMESTAMP");

/// Version block printed by `convai --version`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("CONVAI_BUILD_GIT_HASH"),
    "\nbuilt: ",
    env!("CONVAI_BUILD_TIMESTAMP"),
);

/// One-line banner printed when an interactive session starts.
pub fn startup_metadata_line() -> String {
    format!("convai v{VERSION} ({GIT_COMMIT}, built {BUILD_TIMESTAMP})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_version_lists_commit_and_build_time() {
        assert_eq!(
            LONG_VERSION,
            format!("{VERSION}\ncommit: {GIT_COMMIT}\nbuilt: {BUILD_TIMESTAMP}")
        );
    }

    #[test]
    fn startup_metadata_line_contains_all_fields() {
        let text = startup_metadata_line();
        assert!(text.starts_with("convai v"));
        assert!(text.contains(GIT_COMMIT));
        assert!(text.contains(BUILD_TIMESTAMP));
    }
}
