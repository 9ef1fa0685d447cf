use crate::text::{escape_html, truncate_chars};

/// Fixed fallback document embedding the start of the raw HTML.
pub fn stub_document(raw_html: &str, snippet_chars: usize) -> String {
    let snippet = escape_html(truncate_chars(raw_html, snippet_chars));
    format!(
        "<!doctype html>
<html>
  <head><title>stub clone</title></head>
  <body style=\"font-family:sans-serif;padding:2rem\">
    <h1>stub clone (generation backend unavailable)</h1>
    <pre>{snippet}</pre>
  </body>
</html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_embeds_escaped_snippet() {
        let html = stub_document("<p>could not fetch page content</p>", 2_000);
        assert!(html.contains("<title>stub clone</title>"));
        assert!(html.contains("&lt;p&gt;could not fetch page content&lt;/p&gt;"));
        assert!(html.ends_with("</html>"));
    }

    #[test]
    fn test_stub_truncates_snippet() {
        let html = stub_document(&"z".repeat(5_000), 2_000);
        assert!(html.contains(&"z".repeat(2_000)));
        assert!(!html.contains(&"z".repeat(2_001)));
    }
}
