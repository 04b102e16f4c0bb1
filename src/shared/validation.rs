use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating slug fields
    /// Must be lowercase alphanumeric with single hyphens between segments
    /// - Valid: "mathematics", "linear-algebra", "grade-10"
    /// - Invalid: "-math", "math-", "math--101", "Math", "math_101"
    pub static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

/// Derive a URL-safe slug from a display name.
///
/// Lowercases the input, replaces every run of non-alphanumeric characters
/// with a single `-` and trims separators from both ends. Non-ASCII letters
/// count as separators so the result always matches [`SLUG_REGEX`] (or is
/// empty when the name has no ASCII alphanumerics at all).
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}
