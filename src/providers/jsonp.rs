//! JSONP wrapper stripping.
//!
//! The estimate endpoint answers with `jsonpgz({...});` rather than plain
//! JSON. Extraction searches for the outermost parentheses instead of
//! assuming the exact callback literal, which tolerates minor drift in the
//! wrapper text.

/// Returns the payload between the first `(` and the last `)`, or `None`
/// when no such span exists.
pub fn strip_jsonp(body: &str) -> Option<&str> {
    let start = body.find('(')?;
    let end = body.rfind(')')?;
    if end <= start {
        return None;
    }
    Some(&body[start + 1..end])
}
