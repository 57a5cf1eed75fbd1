use docsearch_core::TextExtractor;
use std::io::Cursor;

/// Convert HTML to readable plain text.
///
/// Deterministic and "good enough"; not a readability engine.
pub fn html_to_text(html: &str, width: usize) -> String {
    // html2text expects bytes; Cursor avoids allocating a second large buffer.
    html2text::from_read(Cursor::new(html.as_bytes()), width).unwrap_or_else(|_| html.to_string())
}

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_any_text(s: &str) -> bool {
    s.chars().any(|c| !c.is_whitespace())
}

/// Best-effort guess for whether a body is HTML-ish.
pub fn looks_like_html(body: &str) -> bool {
    let rest = body.trim_start().as_bytes();
    let prefix = &rest[..rest.len().min(16)];
    let lower = prefix.to_ascii_lowercase();
    lower.starts_with(b"<!doctype")
        || lower.starts_with(b"<html")
        || lower.starts_with(b"<head")
        || lower.starts_with(b"<body")
}

fn content_type_lc_prefix(ct: Option<&str>) -> String {
    ct.unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Remove `<tag ...> ... </tag>` blocks (ASCII case-insensitive). Stops at the first
/// unclosed tag.
fn strip_tag_blocks(html: &str, tag: &str) -> String {
    let open_pat = format!("<{}", tag.to_ascii_lowercase());
    let close_pat = format!("</{}>", tag.to_ascii_lowercase());

    let mut out = String::new();
    let mut i = 0usize;
    let lower = html.to_ascii_lowercase();
    while let Some(rel_start) = lower[i..].find(&open_pat) {
        let start = i + rel_start;
        let after_open = start + open_pat.len();
        if let Some(rel_end) = lower[after_open..].find(&close_pat) {
            let end = after_open + rel_end + close_pat.len();
            out.push_str(&html[i..start]);
            i = end;
        } else {
            break;
        }
    }
    out.push_str(&html[i..]);
    out
}

/// Plain concatenation of `<body>` text nodes; used when rendering produced nothing.
fn body_text(html: &str) -> String {
    let doc = html_scraper::Html::parse_document(html);
    let Ok(sel) = html_scraper::Selector::parse("body") else {
        return String::new();
    };
    doc.select(&sel)
        .next()
        .map(|b| norm_ws(&b.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct HtmlTextExtractor {
    width: usize,
}

impl HtmlTextExtractor {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.clamp(20, 240),
        }
    }
}

impl Default for HtmlTextExtractor {
    fn default() -> Self {
        Self::new(docsearch_core::config::DEFAULT_TEXT_WIDTH)
    }
}

impl TextExtractor for HtmlTextExtractor {
    fn extract_text(&self, body: &str, content_type: Option<&str>) -> String {
        let ct = content_type_lc_prefix(content_type);
        let is_html = ct.contains("html") || (ct.is_empty() && looks_like_html(body));
        if !is_html {
            return body.to_string();
        }
        let mut cleaned = body.to_string();
        for tag in ["script", "style", "noscript", "template"] {
            cleaned = strip_tag_blocks(&cleaned, tag);
        }
        let text = html_to_text(&cleaned, self.width);
        if has_any_text(&text) {
            text
        } else {
            body_text(&cleaned)
        }
    }
}
