//! Watermark injection for non-production output.
//!
//! Outside production every rendered document is tagged twice: a `<title>`
//! naming it a test document, and a `<style>` block that lays a fixed
//! background image over the body. Both go in by literal substring search on
//! the markup, not by parsing it. The offsets are part of the observable
//! output, so they are reproduced exactly:
//!
//! * the title goes right after the `>` that closes the first `<head` tag,
//!   or, without one, inside a synthesised `<head>` right after the `>` that
//!   closes the first `<html` tag;
//! * the style goes immediately **before** the first `<body` token.
//!
//! Matching is case-sensitive and `<head` also matches `<header`. When
//! `<html`, `</html>` and `<body` are not all present the text is returned
//! untouched.

use tracing::debug;

/// Title inserted into every watermarked document.
pub const TEST_TITLE: &str = "\n<title>THIS IS A TEST DOCUMENT</title>";

/// Head block used when the document has no `<head` tag.
pub const TEST_HEAD: &str = "\n<head><title>THIS IS A TEST DOCUMENT</title></head>";

/// Background-image style inserted before `<body`.
pub const WATERMARK_STYLE: &str = include_str!("../../assets/watermark.html");

/// Apply the watermark when `enabled`; otherwise return `html` as-is.
pub fn apply(html: String, enabled: bool) -> String {
    if enabled {
        debug!("...setting watermark");
        inject(html)
    } else {
        html
    }
}

/// Insert the test title and background style into `html`.
pub fn inject(mut html: String) -> String {
    let Some(html_start) = html.find("<html") else {
        return html;
    };
    if !html.contains("</html>") || !html.contains("<body") {
        return html;
    }
    debug!("...handling watermark");

    // ── Title ────────────────────────────────────────────────────────────
    match (html.find("<head"), tag_end(&html, html.find("<head"))) {
        (Some(head_start), Some(head_end)) if head_start > 0 && head_end > head_start => {
            html.insert_str(head_end + 1, TEST_TITLE);
        }
        _ => match tag_end(&html, Some(html_start)) {
            Some(html_end) => html.insert_str(html_end + 1, TEST_HEAD),
            None => return html,
        },
    }

    // ── Background style ─────────────────────────────────────────────────
    let body_start = html.find("<body");
    let body_end = tag_end(&html, body_start);
    let body_close = html.find("</body");
    if let (Some(start), Some(end), Some(close)) = (body_start, body_end, body_close) {
        if start > 0 && end > start && close > end {
            html.insert_str(start, WATERMARK_STYLE);
        }
    }

    html
}

/// Index of the first `>` after a five-byte tag opener at `start`.
fn tag_end(html: &str, start: Option<usize>) -> Option<usize> {
    let from = start? + 5;
    html.get(from..)?.find('>').map(|i| from + i)
}
