//! Prompt construction for the seed and merge calls.

use crate::text::truncate_chars;
use crate::types::{GenerationMessage, GenerationRequest};

use super::extract::ROOT_CLOSE;

pub const SEED_SYSTEM: &str = "You are an HTML cloning assistant. \
Respond with only the raw HTML document: no explanations, no code fences, no headers. \
Begin with `<!DOCTYPE html>` and `<html>` tags. \
Discard any content that comes before the doctype. \
If the input chunk contains CSS rules, place them inside a `<style>` element in `<head>`; do not emit them as plain text. \
Use inline CSS on elements as needed, and placeholders for images. \
The document must be complete and self-contained.";

pub const MERGE_SYSTEM: &str = "You are an HTML merging assistant. \
Respond with only the merged HTML document: no commentary or fences. \
Do not re-emit `<!DOCTYPE html>` or `<html>` tags; just integrate the new fragment. \
If the fragment includes CSS, merge it into the existing `<style>` in `<head>` or convert it to inline styles; do not print standalone CSS.";

/// First call: build a whole document from chunk 0.
///
/// The screenshot hint is only attached when a screenshot was captured.
pub fn seed_request(chunk: &str, screenshot_base64: &str, hint_chars: usize) -> GenerationRequest {
    let mut messages = vec![
        GenerationMessage::system(SEED_SYSTEM),
        GenerationMessage::user(format!("HTML_CHUNK:\n{chunk}")),
    ];
    if !screenshot_base64.is_empty() {
        messages.push(GenerationMessage::user(format!(
            "SCREENSHOT_BASE64 (ignore): {}",
            truncate_chars(screenshot_base64, hint_chars)
        )));
    }
    GenerationRequest {
        messages,
        stop: Some(ROOT_CLOSE.to_string()),
    }
}

/// Later calls: fold one more chunk into the accumulated document.
pub fn merge_request(accumulated: &str, chunk: &str) -> GenerationRequest {
    GenerationRequest {
        messages: vec![
            GenerationMessage::system(MERGE_SYSTEM),
            GenerationMessage::user(format!("EXISTING_HTML:\n{accumulated}\nNEW_CHUNK:\n{chunk}")),
        ],
        stop: Some(ROOT_CLOSE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_seed_with_screenshot_hint() {
        let shot = "A".repeat(5_000);
        let req = seed_request("<p>one</p>", &shot, 2_000);
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[1].content, "HTML_CHUNK:\n<p>one</p>");
        assert_eq!(
            req.messages[2].content.len(),
            "SCREENSHOT_BASE64 (ignore): ".len() + 2_000
        );
        assert_eq!(req.stop.as_deref(), Some("</html>"));
    }

    #[test]
    fn test_seed_without_screenshot_skips_hint() {
        let req = seed_request("<p>one</p>", "", 2_000);
        assert_eq!(req.messages.len(), 2);
    }

    #[test]
    fn test_merge_layout() {
        let req = merge_request("<html>acc</html>", "<p>two</p>");
        assert_eq!(req.messages[0].content, MERGE_SYSTEM);
        assert_eq!(
            req.messages[1].content,
            "EXISTING_HTML:\n<html>acc</html>\nNEW_CHUNK:\n<p>two</p>"
        );
        assert_eq!(req.stop.as_deref(), Some("</html>"));
    }
}
