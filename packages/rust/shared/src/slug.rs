//! URL-safe slug derivation.
//!
//! Rule: lowercase, collapse every run of characters other than ASCII
//! letters and digits into a single `-`, trim leading/trailing `-`.
//! An empty result becomes [`FALLBACK_SLUG`].

use std::sync::LazyLock;

use regex::Regex;

/// Slug used when a name contains no ASCII letters or digits.
pub const FALLBACK_SLUG: &str = "tool";

/// Derive a slug from a display name.
pub fn slugify(name: &str) -> String {
    static SEPARATOR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

    let lowered = name.to_lowercase();
    let slug = SEPARATOR_RE.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Append a numeric suffix for the `n`th collision (`n >= 2`).
pub fn with_suffix(slug: &str, n: u32) -> String {
    format!("{slug}-{n}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_becomes_hyphen() {
        assert_eq!(slugify("My Tool"), "my-tool");
        assert_eq!(slugify("  Foo   Bar  "), "foo-bar");
        assert_eq!(slugify("Tab\tSeparated\nName"), "tab-separated-name");
    }

    #[test]
    fn punctuation_is_collapsed_and_trimmed() {
        assert_eq!(slugify("My Tool!"), "my-tool");
        assert_eq!(slugify("C++ / Rust"), "c-rust");
        assert_eq!(slugify("Notion.so"), "notion-so");
        assert_eq!(slugify("--already-slugged--"), "already-slugged");
    }

    #[test]
    fn non_ascii_only_falls_back() {
        assert_eq!(slugify("!!!"), FALLBACK_SLUG);
        assert_eq!(slugify(""), FALLBACK_SLUG);
        assert_eq!(slugify("日本語"), FALLBACK_SLUG);
        assert_eq!(slugify("Café 2"), "caf-2");
    }

    #[test]
    fn suffix_format() {
        assert_eq!(with_suffix("linear", 2), "linear-2");
    }
}
