//! Name normalization and slug derivation.

/// Normalize a display name for map and alias lookups: case-fold, trim,
/// and collapse internal whitespace runs.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derive a deterministic slug from a display name.
///
/// Apostrophes are dropped rather than hyphenated, so "O'Leary" becomes
/// `oleary` and lines up with the seeded alias table. Every other
/// non-alphanumeric run collapses to a single hyphen.
pub fn derive_slug(name: &str) -> String {
    let lowered = name.to_lowercase().replace(['\'', '\u{2019}'], "");
    let mut slug = String::with_capacity(lowered.len());
    let mut gap = false;
    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() {
            if gap && !slug.is_empty() {
                slug.push('-');
            }
            gap = false;
            slug.push(c);
        } else {
            gap = true;
        }
    }
    slug
}
