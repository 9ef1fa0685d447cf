//! Cleanup of raw backend output into a single HTML document.

use std::sync::OnceLock;

use regex::Regex;

/// Closing root tag, also used as the generation stop sequence.
pub const ROOT_CLOSE: &str = "</html>";

const FENCE: &str = "```";

fn document_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<!doctype\b|<html\b").expect("document open regex is valid"))
}

fn document_close_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</html\s*>").expect("document close regex is valid"))
}

/// Drop a leading fence line (```` ``` ```` or ```` ```html ````) and a trailing fence.
pub fn strip_fences(text: &str) -> &str {
    let mut text = text.trim();
    if text.starts_with(FENCE) {
        text = match text.find('\n') {
            Some(nl) => &text[nl + 1..],
            None => "",
        };
    }
    if let Some(stripped) = text.trim_end().strip_suffix(FENCE) {
        text = stripped;
    }
    text.trim()
}

/// Append `</html>` unless the text already ends with it, ignoring case.
/// Applying this twice gives the same result as applying it once.
pub fn terminate(text: &str) -> String {
    let text = text.trim_end();
    let bytes = text.as_bytes();
    let closed = bytes.len() >= ROOT_CLOSE.len()
        && bytes[bytes.len() - ROOT_CLOSE.len()..].eq_ignore_ascii_case(ROOT_CLOSE.as_bytes());

    let mut out = text.to_string();
    if !closed {
        out.push_str(ROOT_CLOSE);
    }
    out
}

/// The span from the first `<!doctype`/`<html` to the last `</html>`,
/// inclusive. Text without such a span is returned unchanged.
pub fn extract_document(text: &str) -> &str {
    let Some(open) = document_open_re().find(text) else {
        return text;
    };
    match document_close_re().find_iter(text).last() {
        Some(close) if close.end() > open.start() => &text[open.start()..close.end()],
        _ => text,
    }
}

/// Fence stripping followed by document extraction.
pub fn finalize(text: &str) -> String {
    extract_document(strip_fences(text)).to_string()
}

/// Whether a merge result opens the document root more than once.
pub fn reopens_document(html: &str) -> bool {
    let opens = document_open_re().find_iter(html).count();
    // A doctype and its <html> belong to the same document.
    let doctypes = html.to_ascii_lowercase().matches("<!doctype").count();
    opens > 1 && opens - doctypes.min(1) > 1
}
