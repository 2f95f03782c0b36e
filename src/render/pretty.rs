//! Structural reindentation for JSON-like text.
//!
//! This is a syntactic pass, not a parser: it never validates the input and
//! never fails on unbalanced brackets.

use super::redact::redact_inline_images;
use super::RenderError;
use std::fmt::Write;

const INDENT: &str = "  ";

/// Scanner state carried across characters.
#[derive(Debug, Default, Clone, Copy)]
struct ScanState {
    in_string: bool,
    escape_next: bool,
}

/// Redact inline images, then reindent the text with two-space indentation.
///
/// If reindenting fails the redacted text is returned as-is.
pub fn pretty_print_structure(text: &str) -> String {
    let redacted = redact_inline_images(text);
    match reindent(&redacted) {
        Ok(formatted) => formatted,
        Err(err) => {
            tracing::debug!("Falling back to unformatted body: {}", err);
            redacted
        }
    }
}

/// Reindent without redacting first.
pub(crate) fn reindent(text: &str) -> Result<String, RenderError> {
    let mut out = String::with_capacity(text.len() + text.len() / 2);
    let mut state = ScanState::default();
    let mut depth: usize = 0;

    for ch in text.chars() {
        if state.in_string {
            out.push(ch);
            if state.escape_next {
                state.escape_next = false;
            } else if ch == '\\' {
                state.escape_next = true;
            } else if ch == '"' {
                state.in_string = false;
            }
            continue;
        }

        match ch {
            '"' => {
                state.in_string = true;
                out.push(ch);
            }
            '{' | '[' => {
                depth += 1;
                write!(out, "{}\n{}", ch, INDENT.repeat(depth))?;
            }
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                write!(out, "\n{}{}", INDENT.repeat(depth), ch)?;
            }
            ',' => write!(out, ",\n{}", INDENT.repeat(depth))?,
            ':' => out.push_str(": "),
            c if c.is_whitespace() => {}
            c => out.push(c),
        }
    }

    Ok(out)
}
