//! Transfer-encoding and charset decoding of a single body part.

use std::borrow::Cow;

use encoding_rs::Encoding;
use mailparse::body::Body;
use mailparse::ParsedMail;
use quoted_printable::ParseMode;

use crate::error::{ConvertError, Result};
use crate::metadata::header_last;

const QUOTED_PRINTABLE: &str = "quoted-printable";

/// Applies the quoted-printable inverse transform to the undecoded payload
/// bytes exactly as they sit in the container.
fn decode_quoted_printable(part: &ParsedMail) -> Result<Vec<u8>> {
    let body = part.get_body_encoded();
    let raw = match &body {
        Body::Base64(b) | Body::QuotedPrintable(b) => b.get_raw(),
        Body::SevenBit(b) | Body::EightBit(b) => b.get_raw(),
        Body::Binary(b) => b.get_raw(),
    };
    quoted_printable::decode(raw, ParseMode::Robust)
        .map_err(|e| ConvertError::Decoding(format!("quoted-printable: {e}")))
}

/// Character set a part declares.
///
/// ASCII and Latin-1 are handled here rather than through the WHATWG table,
/// which maps both labels to windows-1252 and accepts every byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Ascii,
    Latin1,
    Other(&'static Encoding),
}

impl Charset {
    pub fn for_label(label: &str) -> Option<Self> {
        let label = label.trim();
        match label.to_ascii_lowercase().as_str() {
            "us-ascii" | "ascii" | "ansi_x3.4-1968" => Some(Self::Ascii),
            "iso-8859-1" | "iso_8859-1" | "latin1" | "l1" => Some(Self::Latin1),
            _ => Encoding::for_label(label.as_bytes()).map(Self::Other),
        }
    }

    /// Decodes `bytes` strictly; malformed sequences are an error, never replaced.
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(at) => Err(ConvertError::Decoding(format!(
                    "byte 0x{:02X} at offset {at} is not US-ASCII",
                    bytes[at]
                ))),
                None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            },
            Self::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Self::Other(encoding) => encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(Cow::into_owned)
                .ok_or_else(|| {
                    ConvertError::Decoding(format!("payload is not valid {}", encoding.name()))
                }),
        }
    }
}

/// Resolves the part's explicit charset parameter. The parser's implicit
/// `us-ascii` default does not count.
fn charset(part: &ParsedMail) -> Result<Charset> {
    let label = part.ctype.params.get("charset").ok_or_else(|| {
        ConvertError::Decoding(format!("{} part declares no charset", part.ctype.mimetype))
    })?;
    Charset::for_label(label)
        .ok_or_else(|| ConvertError::Decoding(format!("unsupported charset {label:?}")))
}

pub fn decode_part(part: &ParsedMail) -> Result<String> {
    let charset = charset(part)?;
    let bytes = match header_last(part, "Content-Transfer-Encoding") {
        Some(cte) if cte == QUOTED_PRINTABLE => decode_quoted_printable(part)?,
        _ => part
            .get_body_raw()
            .map_err(|e| ConvertError::Decoding(e.to_string()))?,
    };
    charset.decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> Result<String> {
        let mail = mailparse::parse_mail(raw.as_bytes()).unwrap();
        decode_part(&mail)
    }

    #[test]
    fn quoted_printable_utf8() {
        let text = decode(
            "Content-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\nCaf=C3=A9 soft=\r\nbreak",
        )
        .unwrap();
        assert_eq!(text, "Café softbreak");
    }

    #[test]
    fn base64_body() {
        // "Hello, world"
        let text = decode(
            "Content-Type: text/plain; charset=\"UTF-8\"\r\nContent-Transfer-Encoding: base64\r\n\r\nSGVsbG8sIHdvcmxk",
        )
        .unwrap();
        assert_eq!(text, "Hello, world");
    }

    #[test]
    fn latin1_charset() {
        let text = decode(
            "Content-Type: text/plain; charset=iso-8859-1\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\nna=EFve",
        )
        .unwrap();
        assert_eq!(text, "naïve");
    }

    #[test]
    fn latin1_maps_c1_bytes_to_matching_code_points() {
        let text = decode(
            "Content-Type: text/plain; charset=ISO-8859-1\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\ncaf=E9 =80",
        )
        .unwrap();
        assert_eq!(text, "caf\u{e9} \u{80}");
    }

    #[test]
    fn eight_bit_byte_under_us_ascii_fails() {
        let err = decode(
            "Content-Type: text/plain; charset=us-ascii\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\ncaf=E9 =80",
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::Decoding(_)));
        assert!(err.to_string().contains("0xE9"));
    }

    #[test]
    fn plain_us_ascii_decodes() {
        let text = decode("Content-Type: text/plain; charset=\"US-ASCII\"\r\n\r\nhello").unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn whatwg_labels_still_resolve() {
        assert_eq!(
            Charset::for_label("windows-1252"),
            Some(Charset::Other(encoding_rs::WINDOWS_1252))
        );
        assert_eq!(Charset::for_label(" Latin1 "), Some(Charset::Latin1));
    }

    #[test]
    fn missing_charset_fails() {
        let err = decode("Content-Type: text/plain\r\n\r\nhello").unwrap_err();
        assert!(matches!(err, ConvertError::Decoding(_)));
        assert!(err.to_string().contains("no charset"));
    }

    #[test]
    fn unknown_charset_fails() {
        let err = decode("Content-Type: text/plain; charset=x-klingon\r\n\r\nhello").unwrap_err();
        assert!(err.to_string().contains("x-klingon"));
    }

    #[test]
    fn invalid_utf8_is_not_replaced() {
        let err = decode(
            "Content-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\nbad =FF byte",
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::Decoding(_)));
    }

    #[test]
    fn transfer_encoding_match_is_case_sensitive() {
        // Upper-case value takes the parser's generic path, which still
        // understands quoted-printable.
        let text = decode(
            "Content-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: Quoted-Printable\r\n\r\na=3Db",
        )
        .unwrap();
        assert_eq!(text, "a=b");
    }
}
