//! Manifest row-key derivation.
//!
//! Every row in the manifest partition is addressed by `<project>:<token>`.
//! The token `current` is reserved for the active-revision pointer.

/// Number of revision-hash characters kept in a derived key.
pub const REVISION_TOKEN_LEN: usize = 8;

/// Separates the project name from the token.
pub const KEY_SEPARATOR: char = ':';

/// Token reserved for the current-pointer row.
pub const CURRENT_TOKEN: &str = "current";

/// Build the manifest key for a revision.
///
/// A non-empty `explicit_override` is used verbatim as the token; otherwise the
/// first [`REVISION_TOKEN_LEN`] characters of `fallback_hash` are used.
pub fn derive_revision_key(
    project: &str,
    explicit_override: Option<&str>,
    fallback_hash: &str,
) -> String {
    let token: String = match explicit_override {
        Some(rev) if !rev.is_empty() => rev.to_string(),
        _ => fallback_hash.chars().take(REVISION_TOKEN_LEN).collect(),
    };
    format!("{}{}{}", project, KEY_SEPARATOR, token)
}

/// Key of the row holding the project's active revision key.
pub fn derive_current_key(project: &str) -> String {
    format!("{}{}{}", project, KEY_SEPARATOR, CURRENT_TOKEN)
}

/// Whether `key` addresses a current-pointer row (of any project).
pub fn is_current_key(key: &str) -> bool {
    key.rsplit_once(KEY_SEPARATOR)
        .is_some_and(|(_, token)| token == CURRENT_TOKEN)
}

/// Whether `key` is a row belonging to `project`.
///
/// The token must not contain the separator, so `demo:x:ab12cd34` is not a
/// row of `demo`.
pub fn belongs_to(key: &str, project: &str) -> bool {
    key.strip_prefix(project)
        .and_then(|rest| rest.strip_prefix(KEY_SEPARATOR))
        .is_some_and(|token| !token.is_empty() && !token.contains(KEY_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_revision_key_truncates_hash() {
        let key = derive_revision_key("demo", None, "ab12cd34ef56");
        assert_eq!(key, "demo:ab12cd34");
    }

    #[test]
    fn test_derive_revision_key_override_wins() {
        let key = derive_revision_key("demo", Some("release-7"), "ab12cd34ef56");
        assert_eq!(key, "demo:release-7");
    }

    #[test]
    fn test_derive_revision_key_empty_override_falls_back() {
        let key = derive_revision_key("demo", Some(""), "ab12cd34ef56");
        assert_eq!(key, "demo:ab12cd34");
    }

    #[test]
    fn test_derive_revision_key_short_hash_kept_whole() {
        assert_eq!(derive_revision_key("demo", None, "abc"), "demo:abc");
    }

    #[test]
    fn test_derive_revision_key_is_deterministic() {
        let a = derive_revision_key("demo", Some("x"), "ffff0000ffff");
        let b = derive_revision_key("demo", Some("x"), "ffff0000ffff");
        assert_eq!(a, b);
        let c = derive_revision_key("demo", None, "ffff0000ffff");
        let d = derive_revision_key("demo", None, "ffff0000ffff");
        assert_eq!(c, d);
    }

    #[test]
    fn test_current_key() {
        assert_eq!(derive_current_key("demo"), "demo:current");
        assert!(is_current_key("demo:current"));
        assert!(is_current_key("other:current"));
        assert!(!is_current_key("demo:ab12cd34"));
        assert!(!is_current_key("current"));
    }

    #[test]
    fn test_belongs_to() {
        assert!(belongs_to("demo:ab12cd34", "demo"));
        assert!(!belongs_to("demo2:ab12cd34", "demo"));
        assert!(!belongs_to("other:ab12cd34", "demo"));
    }

    #[test]
    fn test_belongs_to_rejects_nested_project_rows() {
        assert!(!belongs_to("demo:x:ab12cd34", "demo"));
        assert!(!belongs_to("demo:", "demo"));
        assert!(!belongs_to("demo", "demo"));
    }
}
