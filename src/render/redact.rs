//! Inline image redaction
//!
//! Replaces quoted `data:image/<subtype>;base64,<payload>` values with short
//! placeholders such as `[IMAGE_PNG_3B]`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

/// Placeholder used when an inline image cannot be described.
pub const HIDDEN_IMAGE_PLACEHOLDER: &str = "[IMAGE_DATA_HIDDEN]";

const DATA_IMAGE_MARKER: &str = "data:image/";

static INLINE_IMAGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""data:image/([A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/=]*)""#)
        .expect("Failed to compile inline image regex")
});

/// Unquoted data URI: media type, parameters, then the base64 payload.
static BARE_IMAGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:image/[A-Za-z0-9.+-]*(?:;[A-Za-z0-9.+=-]*)*(?:,[A-Za-z0-9+/=]*)?")
        .expect("Failed to compile bare image regex")
});

/// Subtype and estimated decoded size of one inline base64 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionUnit {
    pub subtype: String,
    pub estimated_bytes: usize,
}

impl RedactionUnit {
    pub fn from_payload(subtype: &str, payload: &str) -> Self {
        Self {
            subtype: subtype.to_string(),
            estimated_bytes: payload.len() * 3 / 4,
        }
    }

    /// Placeholder text without surrounding quotes, e.g. `[IMAGE_PNG_3B]`
    pub fn placeholder(&self) -> String {
        format!(
            "[IMAGE_{}_{}]",
            self.subtype.to_ascii_uppercase(),
            format_bytes(self.estimated_bytes)
        )
    }
}

/// Render a byte count as `B`, `KB` or `MB` using 1024 steps and floor division.
pub fn format_bytes(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * 1024;
    if bytes >= MIB {
        format!("{}MB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{}KB", bytes / KIB)
    } else {
        format!("{}B", bytes)
    }
}

/// Whether the text still carries any inline image data.
pub fn contains_inline_image(text: &str) -> bool {
    text.contains(DATA_IMAGE_MARKER)
}

/// Whether the text holds at least one well-formed quoted inline image.
pub fn contains_capturable_image(text: &str) -> bool {
    INLINE_IMAGE_REGEX.is_match(text)
}

/// Replace every well-formed quoted inline image with its descriptive placeholder.
///
/// Text without matches is returned borrowed.
pub fn replace_image_payloads(text: &str) -> Cow<'_, str> {
    INLINE_IMAGE_REGEX.replace_all(text, |caps: &Captures| {
        let unit = RedactionUnit::from_payload(&caps[1], &caps[2]);
        format!("\"{}\"", unit.placeholder())
    })
}

/// Redact inline base64 images from arbitrary text.
///
/// Well-formed values get a placeholder naming the subtype and size. Anything
/// left over that still mentions `data:image/` is hidden wholesale. The output
/// never contains `data:image/`, so applying this twice changes nothing.
pub fn redact_inline_images(text: &str) -> String {
    if !contains_inline_image(text) {
        return text.to_string();
    }
    let redacted = replace_image_payloads(text);
    if contains_inline_image(&redacted) {
        hide_remaining_images(&redacted)
    } else {
        redacted.into_owned()
    }
}

/// Loose fallback for malformed inline images.
///
/// Each occurrence is consumed left to right, so the scan always terminates.
pub fn hide_remaining_images(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(DATA_IMAGE_MARKER) {
        let start = pos + offset;
        let after_marker = start + DATA_IMAGE_MARKER.len();
        let quoted = start > pos && text.as_bytes()[start - 1] == b'"';

        if quoted {
            out.push_str(&text[pos..start - 1]);
            out.push('"');
            out.push_str(HIDDEN_IMAGE_PLACEHOLDER);
            out.push('"');
            pos = match text[after_marker..].find('"') {
                Some(end) => after_marker + end + 1,
                None => text.len(),
            };
        } else {
            out.push_str(&text[pos..start]);
            out.push_str(HIDDEN_IMAGE_PLACEHOLDER);
            pos = match BARE_IMAGE_REGEX.find(&text[start..]) {
                Some(uri) => start + uri.end(),
                None => after_marker,
            };
        }
    }

    out.push_str(&text[pos..]);
    out
}
