//! Builds the single HTML document handed to the renderer.

use std::borrow::Cow;

use scraper::{ElementRef, Html, Node, Selector};

use crate::metadata::EmailMetadata;

const HEAD: &str = r#"<html>
<head>
<meta charset="utf-8">
<title>Email Details</title>
<style>
.header {
    text-align: center;
    line-height: 2;
}
.header p {
    margin: 0;
}
</style>
</head>
<body>
"#;

const TAIL: &str = "\n</body>\n</html>\n";

/// Document-structure tags whose presence means the fragment must be parsed.
const WRAPPER_TAGS: [&str; 6] = ["<html", "<head", "<body", "</html", "</head", "</body"];

/// Elements that belong in `<head>`. html5ever moves them into `<body>` when
/// the fragment's own `<head>` arrives after body content has started.
const HEAD_ONLY: [&str; 5] = ["title", "style", "meta", "link", "base"];

fn has_tag(lower: &str, tag: &str) -> bool {
    lower.match_indices(tag).any(|(at, _)| {
        lower[at + tag.len()..]
            .chars()
            .next()
            .is_some_and(|c| c == '>' || c == '/' || c.is_ascii_whitespace())
    })
}

fn has_wrapper(fragment: &str) -> bool {
    let lower = fragment.to_ascii_lowercase();
    WRAPPER_TAGS.iter().any(|tag| has_tag(&lower, tag))
}

fn serialize_body(body: ElementRef<'_>) -> String {
    let mut out = String::new();
    for child in body.children() {
        if let Some(element) = ElementRef::wrap(child) {
            if !HEAD_ONLY.contains(&element.value().name()) {
                out.push_str(&element.html());
            }
            continue;
        }
        match child.value() {
            Node::Text(text) => out.push_str(&html_escape::encode_text(&**text)),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            _ => {}
        }
    }
    out
}

/// Inner markup of the fragment's `<body>`, dropping any `<html>`/`<head>`
/// wrapper the message carried along with head-only elements. Fragments
/// without wrapper tags are used as-is.
pub fn body_content(fragment: &str) -> Cow<'_, str> {
    if !has_wrapper(fragment) {
        return Cow::Borrowed(fragment);
    }
    let document = Html::parse_document(fragment);
    let Ok(selector) = Selector::parse("body") else {
        return Cow::Borrowed(fragment);
    };
    match document.select(&selector).next() {
        Some(body) => Cow::Owned(serialize_body(body)),
        None => Cow::Borrowed(fragment),
    }
}

fn header_block(metadata: &EmailMetadata) -> String {
    let mut block = String::from("<div class=\"header\">\n");
    for (label, value) in [
        ("From", metadata.from.as_str()),
        ("To", metadata.to.as_str()),
        ("Subject", metadata.subject.as_str()),
    ] {
        block.push_str(&format!("<p>{label}: {}</p>\n", html_escape::encode_text(value)));
    }
    block.push_str(&format!("<p>Date and Time: {}</p>\n", metadata.formatted_date()));
    block.push_str("</div>\n");
    block
}

/// Joins the header block and the message body into one complete document.
/// Pure and deterministic.
pub fn assemble(metadata: &EmailMetadata, fragment: &str) -> String {
    let body = body_content(fragment);
    let header = header_block(metadata);
    let mut out = String::with_capacity(HEAD.len() + header.len() + body.len() + TAIL.len());
    out.push_str(HEAD);
    out.push_str(&header);
    out.push_str(&body);
    out.push_str(TAIL);
    out
}
