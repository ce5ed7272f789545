//! Request-shape validation for package names, versions and repository
//! paths. These run before any cache work, so malformed or hostile input
//! is rejected with 400 and never reaches the filesystem layer.

use std::sync::OnceLock;

use regex::Regex;

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static validation pattern"))
}

/// Shared guard: traversal sequences, separators smuggled in via
/// backslash, and NUL bytes are never acceptable in any component.
fn has_hostile_sequence(value: &str) -> bool {
    value.contains("..") || value.contains('\\') || value.contains('\0')
}

/// npm package names: optionally scoped (`@scope/name`), lowercase
/// alphanumerics plus `.`, `_`, `-`, at most 214 characters.
pub fn valid_npm_package_name(package: &str) -> bool {
    static SCOPED: OnceLock<Regex> = OnceLock::new();
    static UNSCOPED: OnceLock<Regex> = OnceLock::new();

    if package.is_empty() || package.len() > 214 {
        return false;
    }
    if has_hostile_sequence(package) || package.starts_with('/') {
        return false;
    }
    re(
        &SCOPED,
        r"(?i)^@[a-z0-9][a-z0-9._-]*/[a-z0-9][a-z0-9._-]*$",
    )
    .is_match(package)
        || re(&UNSCOPED, r"(?i)^[a-z0-9][a-z0-9._-]*$").is_match(package)
}

/// PyPI package names per PEP 508: alphanumeric start, then letters,
/// digits, `.`, `_`, `-`.
pub fn valid_pypi_package_name(package: &str) -> bool {
    static NAME: OnceLock<Regex> = OnceLock::new();

    if package.is_empty() || package.len() > 214 {
        return false;
    }
    if has_hostile_sequence(package) || package.starts_with('/') {
        return false;
    }
    re(&NAME, r"^[a-zA-Z0-9][a-zA-Z0-9._-]*$").is_match(package)
}

/// Version strings: semver and common variants, no separators.
pub fn valid_version_string(version: &str) -> bool {
    static VERSION: OnceLock<Regex> = OnceLock::new();

    if version.is_empty() || version.len() > 100 {
        return false;
    }
    if has_hostile_sequence(version) || version.contains('/') {
        return false;
    }
    re(&VERSION, r"^[a-zA-Z0-9._+-]+$").is_match(version)
}

/// Maven repository paths: `group/artifact/version/file` shapes with a
/// conservative charset, no absolute form, no empty segments.
pub fn valid_maven_path(path: &str) -> bool {
    static PATH: OnceLock<Regex> = OnceLock::new();

    if path.is_empty() || path.len() > 1024 {
        return false;
    }
    if has_hostile_sequence(path) || path.starts_with('/') || path.contains("//") {
        return false;
    }
    re(&PATH, r"^[a-zA-Z0-9._/-]+$").is_match(path)
}

/// PyPI package-file paths (the tail after `/packages/`). Slightly wider
/// charset than Maven: wheel names may carry `+` local-version tags.
pub fn valid_pypi_file_path(path: &str) -> bool {
    static PATH: OnceLock<Regex> = OnceLock::new();

    if path.is_empty() || path.len() > 1024 {
        return false;
    }
    if has_hostile_sequence(path) || path.starts_with('/') || path.contains("//") {
        return false;
    }
    re(&PATH, r"^[a-zA-Z0-9._/+-]+$").is_match(path)
}

/// npm tarball filenames: a single path segment with a tar-family suffix.
pub fn valid_tarball_name(filename: &str) -> bool {
    static TARBALL: OnceLock<Regex> = OnceLock::new();

    if filename.is_empty() || filename.len() > 255 {
        return false;
    }
    if has_hostile_sequence(filename) || filename.contains('/') {
        return false;
    }
    re(
        &TARBALL,
        r"^[a-zA-Z0-9._-]+\.(?:tgz|tar\.gz|tar\.bz2|tar\.xz|tar)$",
    )
    .is_match(filename)
}
