//! Response rendering
//!
//! Pure helpers that turn response bodies into display text: inline image
//! redaction, structural pretty-printing and image summaries. Nothing here
//! holds state, so every function is safe to call from any thread.

mod pretty;
mod redact;

pub use pretty::pretty_print_structure;
pub use redact::{
    contains_capturable_image, contains_inline_image, format_bytes, hide_remaining_images,
    redact_inline_images, replace_image_payloads, RedactionUnit, HIDDEN_IMAGE_PLACEHOLDER,
};

use crate::models::ApiResult;
use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Placeholder substituted for the image shown separately by the UI.
pub const DISPLAYED_BELOW_PLACEHOLDER: &str = "[IMAGE_DISPLAYED_BELOW]";

static IMAGE_FIELD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""image"\s*:\s*"data:image/([A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/=]*)""#)
        .expect("Failed to compile image field regex")
});

/// Internal rendering failures. These never leave the public functions.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("formatting failed: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Image decoded from the `"image"` field of a response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub subtype: String,
    pub bytes: Vec<u8>,
}

/// Render a completed API call for display.
///
/// Errors are shown verbatim. Bodies are always redacted, then formatted by
/// content type, falling back to sniffing for an embedded `"image"` field.
pub fn render_api_result(result: &ApiResult) -> String {
    if let Some(error) = &result.error {
        return format!("Error: {}", error);
    }

    let content_type = result
        .content_type
        .as_deref()
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if content_type.contains("application/json") {
        return pretty_print_structure(&result.body);
    }
    if content_type.starts_with("image/") {
        return format!("[Image data: {}]", format_bytes(result.body.len()));
    }
    if contains_inline_image(&result.body) {
        return render_with_embedded_image(&result.body)
            .unwrap_or_else(|| pretty_print_structure(&result.body));
    }

    redact_inline_images(&result.body)
}

/// Pretty-print a body whose `"image"` field is displayed separately, with a
/// trailer describing the image. Returns `None` when there is no such field.
fn render_with_embedded_image(body: &str) -> Option<String> {
    let caps = IMAGE_FIELD_REGEX.captures(body)?;
    let whole = caps.get(0)?;
    let unit = RedactionUnit::from_payload(&caps[1], &caps[2]);

    let mut replaced = String::with_capacity(body.len());
    replaced.push_str(&body[..whole.start()]);
    replaced.push_str(&format!("\"image\": \"{}\"", DISPLAYED_BELOW_PLACEHOLDER));
    replaced.push_str(&body[whole.end()..]);

    Some(format!(
        "{}\n\nImage: {}\nSize: {}",
        pretty_print_structure(&replaced),
        unit.subtype.to_ascii_uppercase(),
        format_bytes(unit.estimated_bytes)
    ))
}

/// Decode the first `"image": "data:image/...;base64,..."` field of a body.
///
/// Returns `None` when there is no such field or the payload is not valid base64.
pub fn extract_embedded_image(body: &str) -> Option<EmbeddedImage> {
    let caps = IMAGE_FIELD_REGEX.captures(body)?;
    let payload = &caps[2];
    let bytes = general_purpose::STANDARD
        .decode(payload)
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(payload.trim_end_matches('=')))
        .map_err(|e| tracing::debug!("Embedded image is not valid base64: {}", e))
        .ok()?;
    Some(EmbeddedImage {
        subtype: caps[1].to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_rendered_verbatim() {
        let result = ApiResult::failed("connection refused: {\"a\":1}");
        assert_eq!(
            render_api_result(&result),
            "Error: connection refused: {\"a\":1}"
        );
    }

    #[test]
    fn json_bodies_are_redacted_and_pretty_printed() {
        let result = ApiResult::ok(
            200,
            Some("application/json; charset=utf-8"),
            r#"{"ok":true,"thumb":"data:image/png;base64,AAAA"}"#,
        );
        assert_eq!(
            render_api_result(&result),
            "{\n  \"ok\": true,\n  \"thumb\": \"[IMAGE_PNG_3B]\"\n}"
        );
    }

    #[test]
    fn image_content_is_summarised() {
        let result = ApiResult::ok(200, Some("image/jpeg"), "x".repeat(2048));
        assert_eq!(render_api_result(&result), "[Image data: 2KB]");
    }

    #[test]
    fn embedded_image_is_moved_below_the_body() {
        let body = r#"{"type":"photo","image":"data:image/jpeg;base64,AAAAAAAA","durationMs":12}"#;
        let result = ApiResult::ok(200, None, body);
        let rendered = render_api_result(&result);
        let expected = "{\n  \"type\": \"photo\",\n  \"image\": \"[IMAGE_DISPLAYED_BELOW]\",\n  \"durationMs\": 12\n}\n\nImage: JPEG\nSize: 6B";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn sniffing_without_image_field_falls_back_to_pretty_print() {
        let body = r#"{"avatar":"data:image/png;base64,AAAA"}"#;
        let result = ApiResult::ok(200, Some("text/plain"), body);
        assert_eq!(
            render_api_result(&result),
            "{\n  \"avatar\": \"[IMAGE_PNG_3B]\"\n}"
        );
    }

    #[test]
    fn plain_text_is_returned_unchanged() {
        let result = ApiResult::ok(200, Some("text/plain"), "hello, {world}");
        assert_eq!(render_api_result(&result), "hello, {world}");
    }

    #[test]
    fn extracts_and_decodes_embedded_image() {
        let body = r#"{"image": "data:image/png;base64,iVBORw0KGgo="}"#;
        let image = extract_embedded_image(body).expect("image present");
        assert_eq!(image.subtype, "png");
        assert_eq!(image.bytes, vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn extraction_is_absent_without_field_or_valid_payload() {
        assert!(extract_embedded_image(r#"{"status":"ok"}"#).is_none());
        assert!(extract_embedded_image(r#"{"image":"data:image/png;base64,A"}"#).is_none());
    }
}
