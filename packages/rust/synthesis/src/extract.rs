//! Locates and cleans the JSON payload inside model completion text.
//!
//! Completions rarely arrive as bare JSON: providers wrap them in code
//! fences, prepend prose, and scatter citation artifacts through field
//! values. Each cleanup pass is a function `&str -> String` applied in
//! sequence, followed by a bracket-balance scan that slices out the
//! first complete object or array.

use std::sync::LazyLock;

use regex::Regex;

use dealboard_shared::{DealboardError, Result};

/// Knobs for [`extract_json_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Track string literals and escapes during the boundary scan, so a
    /// brace inside a quoted value cannot misalign nesting. Off by default:
    /// plain counting is enough for well-formed generation output.
    pub strict: bool,
}

/// Extract the first complete JSON object or array from completion text.
pub fn extract_json(text: &str) -> Result<String> {
    extract_json_with(text, ExtractOptions::default())
}

/// Extract with explicit options.
///
/// Returns the payload substring only; parsing and schema checks are the
/// caller's job. Failure means no balanced structure was found, never a
/// best-effort partial string.
pub fn extract_json_with(text: &str, options: ExtractOptions) -> Result<String> {
    let cleaned = strip_citations(text);
    let cleaned = unwrap_code_fence(cleaned.trim());

    let start = match cleaned.as_bytes().first() {
        Some(b'{') | Some(b'[') => 0,
        _ => cleaned
            .find('{')
            .or_else(|| cleaned.find('['))
            .ok_or_else(|| {
                DealboardError::extraction("no JSON object or array in completion text")
            })?,
    };

    let body = scan_balanced(&cleaned[start..], options)?;

    // Field values can carry citations of their own; strip once more now
    // that the payload is isolated.
    Ok(strip_citations(body).trim().to_string())
}

/// Run the full citation-stripping pipeline on completion text.
pub fn strip_citations(text: &str) -> String {
    let mut result = text.to_string();

    result = strip_numbered_refs(&result);
    result = strip_link_groups(&result);
    result = collapse_inline_links(&result);
    result = strip_domain_tags(&result);
    result = strip_footnote_markers(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Numbered bracket references
// ---------------------------------------------------------------------------

/// Remove `[1]` and `[2, 3]` style reference markers.
fn strip_numbered_refs(text: &str) -> String {
    static REF_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[\d+(?:\s*,\s*\d+)*\]").expect("valid regex"));

    REF_RE.replace_all(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Parenthesized link groups
// ---------------------------------------------------------------------------

/// Remove whole `([Source](url))` and `([a](u), [b](v))` groups.
///
/// Must run before inline links are collapsed, otherwise the group
/// degrades to `(Source)` and the parentheses survive.
fn strip_link_groups(text: &str) -> String {
    static GROUP_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\(\s*(?:\[[^\]]*\]\([^()]*\)\s*,?\s*)+\)").expect("valid regex")
    });

    GROUP_RE.replace_all(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Inline markdown links
// ---------------------------------------------------------------------------

/// Collapse `[text](url)` down to its display text.
fn collapse_inline_links(text: &str) -> String {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]*)\)").expect("valid regex"));

    LINK_RE.replace_all(text, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Bracketed domain tags
// ---------------------------------------------------------------------------

/// Remove `[reuters.com]` style source tags. Requires a dot so bracketed
/// prose and quoted JSON arrays pass through untouched.
fn strip_domain_tags(text: &str) -> String {
    static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[[A-Za-z0-9][A-Za-z0-9.-]*\.[A-Za-z]{2,}\]").expect("valid regex")
    });

    DOMAIN_RE.replace_all(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Footnote markers
// ---------------------------------------------------------------------------

/// Remove `【3†source】` style markers some providers emit.
fn strip_footnote_markers(text: &str) -> String {
    static FOOTNOTE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"【[^】]*】").expect("valid regex"));

    FOOTNOTE_RE.replace_all(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Code fence unwrapping
// ---------------------------------------------------------------------------

/// Unwrap a single leading/trailing fenced code block, with or without a
/// language tag. Text that is not one complete fenced block is returned
/// unchanged; the boundary scan handles partial fences fine.
fn unwrap_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(newline) = rest.find('\n') else {
        return text;
    };
    match rest[newline + 1..].trim_end().strip_suffix("```") {
        Some(inner) => inner.trim(),
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Boundary scan
// ---------------------------------------------------------------------------

/// Scan text that starts on `{` or `[`, returning the slice up to where
/// nesting of that bracket type returns to zero.
fn scan_balanced(text: &str, options: ExtractOptions) -> Result<&str> {
    let bytes = text.as_bytes();
    let (open, close) = match bytes.first() {
        Some(b'{') => (b'{', b'}'),
        Some(b'[') => (b'[', b']'),
        _ => {
            return Err(DealboardError::extraction(
                "boundary scan must start on an opening bracket",
            ));
        }
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &byte) in bytes.iter().enumerate() {
        if options.strict {
            if escaped {
                escaped = false;
                continue;
            }
            if in_string {
                match byte {
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            if byte == b'"' {
                in_string = true;
                continue;
            }
        }

        if byte == open {
            depth += 1;
        } else if byte == close {
            depth -= 1;
            if depth == 0 {
                // Closing bracket is ASCII, so i + 1 is a char boundary.
                return Ok(&text[..=i]);
            }
        }
    }

    Err(DealboardError::extraction(format!(
        "unbalanced `{}` in completion text",
        open as char
    )))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
