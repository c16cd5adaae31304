//! One file in, one PDF (or one failure) out.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::body::select_body;
use crate::document::assemble;
use crate::error::{ConvertError, ErrorKind, Result};
use crate::metadata::extract;
use crate::render::{PageOptions, Renderer};

/// Outcome for a single input file. The input path is kept on both arms so a
/// position-named output can always be traced back to its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionResult {
    Success {
        input: PathBuf,
        output: PathBuf,
    },
    Failure {
        input: PathBuf,
        kind: ErrorKind,
        message: String,
    },
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn input(&self) -> &Path {
        match self {
            Self::Success { input, .. } | Self::Failure { input, .. } => input,
        }
    }
}

/// Parses raw message bytes and produces the complete HTML document.
pub fn message_to_html(raw: &[u8]) -> Result<String> {
    let mail = mailparse::parse_mail(raw)?;
    let metadata = extract(&mail)?;
    debug!(from = %metadata.from, subject = %metadata.subject, "extracted headers");
    let body = select_body(&mail)?;
    debug!(bytes = body.len(), "selected body");
    Ok(assemble(&metadata, &body))
}

/// Pairs a renderer with the page setup it is driven with.
pub struct Converter<R> {
    renderer: R,
    options: PageOptions,
}

impl<R: Renderer> Converter<R> {
    pub fn new(renderer: R) -> Self {
        Self::with_options(renderer, PageOptions::default())
    }

    pub fn with_options(renderer: R, options: PageOptions) -> Self {
        Self { renderer, options }
    }

    fn try_convert(&self, input: &Path, output: &Path) -> Result<()> {
        let text = fs::read_to_string(input)
            .map_err(|e| ConvertError::io(format!("read {}", input.display()), e))?;
        let document = message_to_html(text.as_bytes())?;

        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.is_dir() {
                return Err(ConvertError::io(
                    format!("output directory {}", dir.display()),
                    io::Error::new(io::ErrorKind::NotFound, "not a directory"),
                ));
            }
        }

        self.renderer.render(&document, output, &self.options)
    }

    /// Converts `input` into a PDF at `output`. Every error is absorbed into
    /// a [`ConversionResult::Failure`]; nothing escapes to the caller.
    pub fn convert_one(&self, input: &Path, output: &Path) -> ConversionResult {
        match self.try_convert(input, output) {
            Ok(()) => {
                info!(input = %input.display(), output = %output.display(), "converted");
                ConversionResult::Success {
                    input: input.to_path_buf(),
                    output: output.to_path_buf(),
                }
            }
            Err(err) => {
                warn!(input = %input.display(), error = %err, "conversion failed");
                ConversionResult::Failure {
                    input: input.to_path_buf(),
                    kind: err.kind(),
                    message: format!("Error converting {}: {err}", input.display()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_for_plain_message() {
        let raw = "From: a@x.com\r\nTo: b@x.com\r\nSubject: Hi\r\nDate: Mon, 02 Jan 2006 15:04:05 -0700\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nHello";
        let html = message_to_html(raw.as_bytes()).unwrap();
        assert!(html.contains("<p>Subject: Hi</p>"));
        assert!(html.contains("<p>Hello</p>"));
    }

    #[test]
    fn us_ascii_body_with_eight_bit_bytes_is_rejected() {
        let raw = "From: a@x.com\r\nTo: b@x.com\r\nSubject: Hi\r\nDate: Mon, 02 Jan 2006 15:04:05 -0700\r\nContent-Type: text/plain; charset=us-ascii\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\ncaf=E9 =80";
        let err = message_to_html(raw.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);
    }

    #[test]
    fn header_errors_win_over_body_errors() {
        // no charset on the body, but the missing Date is found first
        let raw = "From: a@x.com\r\nTo: b@x.com\r\nSubject: Hi\r\nContent-Type: text/plain\r\n\r\nHello";
        let err = message_to_html(raw.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingHeader);
    }
}
