//! Context-aware escaping for values injected into the bootstrap markup.
//!
//! Two embedding contexts exist:
//!
//! - **inside a `<script>` element**: values are written as JSON, which is a
//!   valid JavaScript expression.  `<`, `>` and `&` are additionally written
//!   as `\u` escapes so no value can close the element (`</script>`) or open
//!   a comment (`<!--`), and U+2028/U+2029 are escaped for older engines.
//!   Backticks and `${` need no treatment because JSON strings are
//!   double-quoted.
//! - **inside a double-quoted HTML attribute or a text node**: `&`, `<`, `>`
//!   and `"` become entities.

use serde::Serialize;

use crate::error::Result;

/// Encode `value` as JSON that is safe to place verbatim inside `<script>`.
pub fn script_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Encode text as a JavaScript string literal safe inside `<script>`.
pub fn script_string(text: &str) -> Result<String> {
    script_json(text)
}

/// Escape text for a double-quoted HTML attribute value or a text node.
pub fn html_attribute(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
