//! RFC 6901 JSON Pointer helpers.
//!
//! The document root is written as `/` rather than the empty string so the
//! same form is used by diff output and validation error paths.

/// Escape one reference token (`~` → `~0`, `/` → `~1`).
pub fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Reverse of [`escape`].
pub fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Join unescaped tokens into a pointer; no tokens gives `/`.
pub fn join<S: AsRef<str>>(tokens: &[S]) -> String {
    if tokens.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for token in tokens {
        out.push('/');
        out.push_str(&escape(token.as_ref()));
    }
    out
}

/// Split a pointer into unescaped tokens.
///
/// Both `""` and `"/"` address the root. Returns `None` for a non-empty
/// pointer that does not start with `/`.
pub fn parse(pointer: &str) -> Option<Vec<String>> {
    if pointer.is_empty() || pointer == "/" {
        return Some(Vec::new());
    }
    let rest = pointer.strip_prefix('/')?;
    Some(rest.split('/').map(unescape).collect())
}
