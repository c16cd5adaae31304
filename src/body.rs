//! Picks the renderable parts of a message and joins them into one fragment.

use mailparse::ParsedMail;
use tracing::debug;

use crate::decode::decode_part;
use crate::document::body_content;
use crate::error::Result;

fn is_multipart(mail: &ParsedMail) -> bool {
    mail.ctype.mimetype.starts_with("multipart/")
}

fn push_paragraph(out: &mut String, text: &str) {
    out.push_str("<p>");
    out.push_str(text);
    out.push_str("</p>");
}

/// Depth-first walk over a multipart tree. Only `text/html` and `text/plain`
/// leaves contribute; everything else (images, attachments) is skipped.
/// Each HTML part loses its own document wrapper before it is appended.
fn collect(mail: &ParsedMail, out: &mut String) -> Result<()> {
    for part in &mail.subparts {
        if is_multipart(part) {
            collect(part, out)?;
            continue;
        }
        match part.ctype.mimetype.as_str() {
            "text/html" => out.push_str(&body_content(&decode_part(part)?)),
            "text/plain" => push_paragraph(out, &decode_part(part)?),
            other => debug!(content_type = other, "skipping non-text part"),
        }
    }
    Ok(())
}

/// Builds the markup fragment for `mail`.
///
/// A single-part `text/plain` body is wrapped in a paragraph like its
/// multipart counterpart. Any other single-part body is decoded and passed
/// through as-is. Returns an empty string when a multipart message has no
/// text parts at all.
pub fn select_body(mail: &ParsedMail) -> Result<String> {
    let mut out = String::new();
    if is_multipart(mail) {
        collect(mail, &mut out)?;
    } else if mail.ctype.mimetype == "text/plain" {
        push_paragraph(&mut out, &decode_part(mail)?);
    } else {
        out.push_str(&decode_part(mail)?);
    }
    Ok(out)
}
