//! Sender, recipient, subject and timestamp extraction.

use chrono::{DateTime, FixedOffset};
use mailparse::{MailHeaderMap, ParsedMail};

use crate::error::{ConvertError, Result};

/// Layout the Date header must follow, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Layout used when printing the timestamp in the document header.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMetadata {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: DateTime<FixedOffset>,
}

impl EmailMetadata {
    /// Timestamp as shown in the header block; keeps the parsed offset.
    pub fn formatted_date(&self) -> String {
        self.date.format(DISPLAY_FORMAT).to_string()
    }
}

/// Last occurrence of `name`, trimmed. Duplicate headers resolve to the last one.
pub(crate) fn header_last(mail: &ParsedMail, name: &str) -> Option<String> {
    mail.headers
        .get_all_values(name)
        .pop()
        .map(|v| v.trim().to_string())
}

fn required(mail: &ParsedMail, name: &'static str) -> Result<String> {
    header_last(mail, name).ok_or(ConvertError::MissingHeader(name))
}

/// Parses a Date header value. No default is substituted on failure.
pub fn parse_date(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value, DATE_FORMAT).map_err(|source| ConvertError::TimestampFormat {
        value: value.to_string(),
        source,
    })
}

pub fn extract(mail: &ParsedMail) -> Result<EmailMetadata> {
    let from = required(mail, "From")?;
    let to = required(mail, "To")?;
    let subject = required(mail, "Subject")?;
    let date = parse_date(&required(mail, "Date")?)?;
    Ok(EmailMetadata {
        from,
        to,
        subject,
        date,
    })
}
