//! Length-prefixed framing for the capture worker's stdout.
//!
//! ```text
//! REPLICA-CAPTURE/1 dom=<bytes> screenshot=<bytes>\n
//! <dom bytes><screenshot base64 bytes>
//! ```
//!
//! Payloads are sliced by the declared lengths and never scanned, so the
//! DOM may contain any byte sequence, including header-like text.

use crate::types::CaptureError;

/// Header magic and protocol version.
pub const FRAME_MAGIC: &str = "REPLICA-CAPTURE/1";

/// One capture worker result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureFrame {
    pub dom: String,
    pub screenshot_base64: String,
}

impl CaptureFrame {
    /// Serialize into header line plus payloads.
    pub fn encode(&self) -> Vec<u8> {
        let header = format!(
            "{FRAME_MAGIC} dom={} screenshot={}\n",
            self.dom.len(),
            self.screenshot_base64.len()
        );
        let mut out =
            Vec::with_capacity(header.len() + self.dom.len() + self.screenshot_base64.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(self.dom.as_bytes());
        out.extend_from_slice(self.screenshot_base64.as_bytes());
        out
    }

    /// Parse a complete worker output. Anything other than exactly one
    /// well-formed frame is a protocol error.
    pub fn decode(bytes: &[u8]) -> Result<Self, CaptureError> {
        let newline = bytes
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| protocol("missing frame header"))?;

        let header = std::str::from_utf8(&bytes[..newline])
            .map_err(|_| protocol("frame header is not UTF-8"))?;
        let mut fields = header.trim_end_matches('\r').split(' ');

        match fields.next() {
            Some(FRAME_MAGIC) => {}
            other => {
                return Err(protocol(&format!(
                    "unexpected frame magic {:?}",
                    other.unwrap_or_default()
                )))
            }
        }
        let dom_len = length_field(fields.next(), "dom")?;
        let shot_len = length_field(fields.next(), "screenshot")?;
        if let Some(extra) = fields.next() {
            return Err(protocol(&format!("unexpected header field {extra:?}")));
        }

        let body = &bytes[newline + 1..];
        let expected = dom_len
            .checked_add(shot_len)
            .ok_or_else(|| protocol("declared lengths overflow"))?;
        if body.len() != expected {
            return Err(protocol(&format!(
                "payload is {} bytes, header declares {expected}",
                body.len()
            )));
        }

        let (dom, shot) = body.split_at(dom_len);
        Ok(Self {
            dom: String::from_utf8(dom.to_vec()).map_err(|_| protocol("DOM is not UTF-8"))?,
            screenshot_base64: String::from_utf8(shot.to_vec())
                .map_err(|_| protocol("screenshot is not UTF-8"))?,
        })
    }
}

fn length_field(field: Option<&str>, name: &str) -> Result<usize, CaptureError> {
    let field = field.ok_or_else(|| protocol(&format!("missing {name} length")))?;
    field
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('='))
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| protocol(&format!("malformed {name} length {field:?}")))
}

fn protocol(msg: &str) -> CaptureError {
    CaptureError::Protocol(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_encoded_frame() {
        let frame = CaptureFrame {
            dom: "<html><body>hi</body></html>".into(),
            screenshot_base64: "iVBORw0KGgo=".into(),
        };
        assert_eq!(CaptureFrame::decode(&frame.encode()).unwrap(), frame);
    }

    #[test]
    fn test_payload_may_contain_marker_text() {
        let dom = format!("<pre>===DOM_END===\n{FRAME_MAGIC} dom=1 screenshot=1\n</pre>");
        let frame = CaptureFrame {
            dom,
            screenshot_base64: String::new(),
        };
        let decoded = CaptureFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded.dom, frame.dom);
        assert!(decoded.screenshot_base64.is_empty());
    }

    #[test]
    fn test_lengths_are_bytes() {
        let frame = CaptureFrame {
            dom: "é".into(),
            screenshot_base64: "AA==".into(),
        };
        let encoded = frame.encode();
        assert!(encoded.starts_with(b"REPLICA-CAPTURE/1 dom=2 screenshot=4\n"));
        assert_eq!(CaptureFrame::decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let mut encoded = CaptureFrame {
            dom: "<p>x</p>".into(),
            screenshot_base64: "AAAA".into(),
        }
        .encode();
        encoded.truncate(encoded.len() - 2);
        let err = CaptureFrame::decode(&encoded).unwrap_err();
        assert!(err.to_string().contains("header declares 12"));
    }

    #[test]
    fn test_missing_header_rejected() {
        assert!(CaptureFrame::decode(b"").is_err());
        assert!(CaptureFrame::decode(b"<html></html>").is_err());
    }

    #[test]
    fn test_legacy_markers_rejected() {
        let legacy = b"===DOM_START===\n<p>x</p>\n===DOM_END===\n";
        let err = CaptureFrame::decode(legacy).unwrap_err();
        assert!(err.to_string().contains("unexpected frame magic"));
    }

    #[test]
    fn test_malformed_length_rejected() {
        let err = CaptureFrame::decode(b"REPLICA-CAPTURE/1 dom=abc screenshot=0\n").unwrap_err();
        assert!(err.to_string().contains("malformed dom length"));
    }
}
