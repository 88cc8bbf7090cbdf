// src/utils/text.rs

//! Text helpers for announcement bodies.

use std::borrow::Cow;

use scraper::{Html, Node};

/// Longest body a rendered message may carry, in characters.
pub const MAX_BODY_CHARS: usize = 2048;

/// Characters kept from an over-long body before the marker.
pub const TRUNCATED_BODY_CHARS: usize = 2041;

/// Appended to a body that had to be cut.
pub const TRUNCATION_MARKER: &str = "\n\n...";

/// Strip HTML tags from an announcement body.
///
/// Paragraphs start on a new line, `<br>` becomes a line break and
/// non-breaking spaces are dropped. The result is trimmed.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());

    for node in fragment.tree.root().descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "p" || el.name() == "br" => out.push('\n'),
            _ => {}
        }
    }

    out.replace('\u{a0}', "").trim().to_string()
}

/// Cut a body down to [`MAX_BODY_CHARS`], appending [`TRUNCATION_MARKER`]
/// when anything was removed.
pub fn truncate_body(body: &str) -> Cow<'_, str> {
    if body.chars().count() <= MAX_BODY_CHARS {
        return Cow::Borrowed(body);
    }

    let mut cut: String = body.chars().take(TRUNCATED_BODY_CHARS).collect();
    cut.push_str(TRUNCATION_MARKER);
    Cow::Owned(cut)
}
