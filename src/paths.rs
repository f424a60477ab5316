//! Storage path resolution
//!
//! Three path shapes meet at the boundaries of the file manager:
//!
//! - the navigation path: whatever follows `/browse` in the visible route,
//!   possibly percent-encoded, with no separator guarantees;
//! - the storage path: relative to the configured storage root, always
//!   `/`-rooted, kept in canonical percent-encoded form;
//! - the server path: the absolute path of a resource identifier returned by
//!   the server, which still carries the storage root prefix.
//!
//! Everything here is pure string manipulation.

use std::borrow::Cow;

/// Percent-decode a path, returning the input untouched when the escapes do
/// not decode to valid UTF-8.
pub fn percent_decode(raw: &str) -> Cow<'_, str> {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(raw),
    }
}

/// Decode, drop empty and `.` segments, resolve `..` without climbing above
/// the root, then re-encode each segment.
fn canonical_segments(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    for segment in percent_decode(path).split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(urlencoding::encode(segment).into_owned()),
        }
    }
    segments
}

/// Convert a navigation path into a directory storage path.
///
/// The result starts and ends with exactly one `/`; empty input maps to `/`.
/// Applying it twice gives the same result as applying it once.
pub fn to_storage_path(navigation_path: &str) -> String {
    let segments = canonical_segments(navigation_path);
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    }
}

/// Canonicalize any storage path, keeping whether it names a directory
/// (trailing `/`) or not.
pub fn canonical_path(path: &str) -> String {
    let segments = canonical_segments(path);
    if segments.is_empty() {
        return "/".to_string();
    }
    let joined = format!("/{}", segments.join("/"));
    if path.ends_with('/') {
        joined + "/"
    } else {
        joined
    }
}

/// Split "https://host/dav/" into ("https://host", "/dav/"). Values without a
/// scheme have an empty origin.
fn split_origin(value: &str) -> (&str, &str) {
    match value.find("://") {
        Some(i) => {
            let start = i + 3;
            match value[start..].find('/') {
                Some(j) => value.split_at(start + j),
                None => (value, ""),
            }
        }
        None => ("", value),
    }
}

/// Strip `storage_root` (a full URL or only its path) from the front of
/// `path` and return the raw remainder.
///
/// Segments are compared decoded, so a root spelled `me@example.com` matches
/// a server path carrying `me%40example.com`. Only whole segments are
/// stripped.
fn strip_root<'a>(path: &'a str, storage_root: &str) -> Option<&'a str> {
    let (path_origin, mut rest) = split_origin(path);
    let (root_origin, root_path) = split_origin(storage_root);
    if !path_origin.is_empty() && !path_origin.eq_ignore_ascii_case(root_origin) {
        return None;
    }
    for expected in root_path.split('/').filter(|s| !s.is_empty()) {
        let trimmed = rest.trim_start_matches('/');
        let (segment, remainder) = trimmed.split_at(trimmed.find('/').unwrap_or(trimmed.len()));
        if percent_decode(segment) != percent_decode(expected) {
            return None;
        }
        rest = remainder;
    }
    Some(rest)
}

/// Turn a storage path into the route segment shown after `/browse/`.
pub fn to_navigation_segment(storage_path: &str, storage_root: &str) -> String {
    let relative = strip_root(storage_path, storage_root).unwrap_or(storage_path);
    relative.trim_matches('/').to_string()
}

/// Parent directory of a storage path; the root is its own parent.
pub fn parent_of(storage_path: &str) -> String {
    let trimmed = storage_path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(index) => trimmed[..=index].to_string(),
        None => "/".to_string(),
    }
}

/// Key used for every path comparison: root stripped, decoded, `/`-rooted,
/// no trailing separator.
fn comparison_key(path: &str, storage_root: &str) -> String {
    let relative = strip_root(path, storage_root).unwrap_or(path);
    let decoded = percent_decode(relative);
    let trimmed = decoded.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Semantic path equality.
///
/// Ignores trailing separators, percent-encoding differences and a storage
/// root prefix present on only one side. Malformed escapes compare raw.
pub fn paths_equal(a: &str, b: &str, storage_root: &str) -> bool {
    comparison_key(a, storage_root) == comparison_key(b, storage_root)
}

/// Convert a server path (as carried by [`crate::DavEntry::path`]) back into
/// a canonical storage path.
pub fn storage_path_of(server_path: &str, storage_root: &str) -> String {
    let relative = strip_root(server_path, storage_root).unwrap_or(server_path);
    if relative.is_empty() {
        return "/".to_string();
    }
    canonical_path(relative)
}

/// Append an (unencoded) child name to a directory storage path.
pub fn join_child(dir: &str, name: &str, is_dir: bool) -> String {
    let mut path = with_trailing_slash(dir);
    path.push_str(&urlencoding::encode(name));
    if is_dir {
        path.push('/');
    }
    path
}

pub fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

pub fn without_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Human-readable form of a storage path
pub fn display_path(storage_path: &str) -> String {
    percent_decode(storage_path).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        "/",
        "docs",
        "/docs",
        "docs/",
        "//docs//reports///",
        "a b/c",
        "a%20b/c%2Fd",
        "%E4%B8%AD%E6%96%87/%E6%96%87%E6%A1%A3",
        "中文/文档",
        "100%",
        "%FF%FE/x",
        "%2541",
        "../../",
        "a/./b/..",
        "%2E%2E/x",
    ];

    #[test]
    fn test_to_storage_path_shape() {
        assert_eq!(to_storage_path(""), "/");
        assert_eq!(to_storage_path("/"), "/");
        assert_eq!(to_storage_path("docs"), "/docs/");
        assert_eq!(to_storage_path("//docs//reports///"), "/docs/reports/");
        assert_eq!(to_storage_path("a%20b"), "/a%20b/");
        assert_eq!(to_storage_path("a b"), "/a%20b/");
        assert_eq!(to_storage_path("%E4%B8%AD%E6%96%87"), "/%E4%B8%AD%E6%96%87/");
        assert_eq!(to_storage_path("中文"), "/%E4%B8%AD%E6%96%87/");
    }

    #[test]
    fn test_to_storage_path_idempotent() {
        for sample in SAMPLES {
            let once = to_storage_path(sample);
            assert_eq!(to_storage_path(&once), once, "sample {:?}", sample);
            assert!(once.starts_with('/') && once.ends_with('/'));
            assert!(!once.contains("//"));
        }
    }

    #[test]
    fn test_malformed_escape_survives() {
        // "%FF" is not valid UTF-8 once decoded, so the raw text is kept
        assert_eq!(percent_decode("%FF"), "%FF");
        assert_eq!(to_storage_path("%FF"), "/%25FF/");
    }

    #[test]
    fn test_dot_segments_never_climb_above_root() {
        assert_eq!(to_storage_path("../../"), "/");
        assert_eq!(to_storage_path("./docs/."), "/docs/");
        assert_eq!(to_storage_path("docs/reports/.."), "/docs/");
        assert_eq!(to_storage_path("a/../../b"), "/b/");
        assert_eq!(to_storage_path("%2E%2E/%2e%2e/etc"), "/etc/");
        assert_eq!(canonical_path("/docs/../a.txt"), "/a.txt");
        assert_eq!(canonical_path("/.."), "/");
        // Dots inside a name are ordinary characters
        assert_eq!(to_storage_path("..hidden/a..b"), "/..hidden/a..b/");
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("/a/b/c/"), "/a/b/");
        assert_eq!(parent_of("/a/b/c"), "/a/b/");
        assert_eq!(parent_of("/a/"), "/");
        assert_eq!(parent_of("/"), "/");
        assert_eq!(parent_of(""), "/");
        assert_eq!(parent_of("a/"), "/");
    }

    #[test]
    fn test_parent_of_reaches_root() {
        for sample in SAMPLES {
            let mut current = to_storage_path(sample);
            let mut steps = 0;
            while current != "/" {
                current = parent_of(&current);
                steps += 1;
                assert!(steps < 64, "parent_of never reached root for {:?}", sample);
            }
            assert_eq!(parent_of(&current), "/");
        }
    }

    #[test]
    fn test_paths_equal_reflexive() {
        for sample in SAMPLES {
            assert!(paths_equal(sample, sample, ""));
            assert!(paths_equal(sample, sample, "https://host/dav/"));
        }
    }

    #[test]
    fn test_paths_equal_normalizes() {
        let root = "https://cloud.example.com/remote.php/dav/files/user/";
        assert!(paths_equal("/docs", "/docs/", root));
        assert!(paths_equal("/a%20b/", "/a b", root));
        assert!(paths_equal("/%E4%B8%AD/", "/中/", root));
        assert!(paths_equal("/remote.php/dav/files/user/docs/", "/docs/", root));
        assert!(paths_equal(
            "https://cloud.example.com/remote.php/dav/files/user/docs/",
            "/docs",
            root
        ));
        assert!(paths_equal("/remote.php/dav/files/user/", "/", root));
        assert!(!paths_equal("/docs/", "/doc/", root));
        assert!(!paths_equal("/docs/a/", "/docs/", root));
    }

    #[test]
    fn test_root_prefix_strips_whole_segments_only() {
        assert!(!paths_equal("/davinci/", "/inci/", "/dav/"));
        assert_eq!(to_navigation_segment("/davinci/", "/dav/"), "davinci");
    }

    #[test]
    fn test_to_navigation_segment() {
        let root = "https://host/remote.php/dav/files/user/";
        assert_eq!(to_navigation_segment("/", root), "");
        assert_eq!(to_navigation_segment("/docs/reports/", root), "docs/reports");
        assert_eq!(to_navigation_segment("/remote.php/dav/files/user/docs/", root), "docs");
        assert_eq!(to_navigation_segment(&format!("{}docs/", root), root), "docs");
    }

    #[test]
    fn test_storage_path_of() {
        let root = "https://host/remote.php/dav/files/user/";
        assert_eq!(storage_path_of("/remote.php/dav/files/user/", root), "/");
        assert_eq!(storage_path_of("/remote.php/dav/files/user/a%20b/", root), "/a%20b/");
        assert_eq!(storage_path_of("/remote.php/dav/files/user/x.txt", root), "/x.txt");
        assert_eq!(storage_path_of("/remote.php/dav/files/user/a(1).txt", root), "/a%281%29.txt");
    }

    #[test]
    fn test_root_encoded_differently_from_server_paths() {
        let root = "https://cloud.example.com/remote.php/dav/files/me@example.com/";
        let href = "/remote.php/dav/files/me%40example.com/docs/a.txt";
        assert_eq!(storage_path_of(href, root), "/docs/a.txt");
        assert_eq!(
            to_navigation_segment("/remote.php/dav/files/me%40example.com/docs/", root),
            "docs"
        );
        assert_eq!(storage_path_of("/remote.php/dav/files/me%40example.com/", root), "/");
        assert!(paths_equal(href, "/docs/a.txt", root));

        // And the other way round: encoded root, raw server path
        let encoded_root = "https://cloud.example.com/remote.php/dav/files/me%40example.com/";
        assert_eq!(
            storage_path_of("/remote.php/dav/files/me@example.com/x%20y/", encoded_root),
            "/x%20y/"
        );
        assert_eq!(
            storage_path_of(
                "https://cloud.example.com/remote.php/dav/files/me@example.com/b.txt",
                encoded_root
            ),
            "/b.txt"
        );

        // A different host is never stripped
        assert_eq!(
            to_navigation_segment("https://other.example.com/remote.php/dav/files/me@example.com/x/", root),
            "https://other.example.com/remote.php/dav/files/me@example.com/x"
        );
    }

    #[test]
    fn test_join_child() {
        assert_eq!(join_child("/docs/", "new folder", true), "/docs/new%20folder/");
        assert_eq!(join_child("/docs", "notes.txt", false), "/docs/notes.txt");
        assert_eq!(join_child("/", "中", false), "/%E4%B8%AD");
    }

    #[test]
    fn test_slash_helpers() {
        assert_eq!(with_trailing_slash("/a"), "/a/");
        assert_eq!(with_trailing_slash("/a/"), "/a/");
        assert_eq!(without_trailing_slash("/a/"), "/a");
        assert_eq!(without_trailing_slash("/"), "/");
        assert_eq!(display_path("/a%20b/%E4%B8%AD/"), "/a b/中/");
    }
}
