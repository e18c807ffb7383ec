// Raw RFC 822 messages to API messages
use chrono::{DateTime, Utc};
use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};

use shared::models::{AttachmentInfo, EmailMessage};

use super::mime::MimePart;
use super::MailError;

const NO_SUBJECT: &str = "(No Subject)";

pub fn parse_message(uid: u32, raw: &[u8], flags: Vec<String>) -> Result<EmailMessage, MailError> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| MailError::Parse(e.to_string()))?;

    let subject = parsed
        .headers
        .get_first_value("Subject")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NO_SUBJECT.to_string());

    let attachments = MimePart::from_parsed(&parsed)
        .attachments()
        .into_iter()
        .map(|part| AttachmentInfo {
            filename: part.filename.clone().unwrap_or_else(|| "unknown".to_string()),
            content_type: if part.content_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                part.content_type.clone()
            },
            size: part.size,
            part_id: part.part_id.clone(),
            content_id: part.content_id.clone(),
        })
        .collect();

    Ok(EmailMessage {
        id: uid.to_string(),
        uid,
        subject,
        from: first_address(&parsed, "From"),
        to: first_address(&parsed, "To"),
        date: message_date(&parsed).unwrap_or_else(Utc::now),
        text: first_body(&parsed, "text/plain").unwrap_or_default(),
        html: first_body(&parsed, "text/html"),
        attachments,
        flags,
    })
}

/// Display text of the first address in a header, e.g. `Alice <alice@example.com>`
fn first_address(parsed: &ParsedMail<'_>, name: &str) -> String {
    let Some(header) = parsed.headers.get_first_header(name) else {
        return String::new();
    };

    let first = mailparse::addrparse_header(header)
        .ok()
        .and_then(|list| list.iter().next().cloned());

    match first {
        Some(MailAddr::Single(info)) => match info.display_name {
            Some(display) if !display.is_empty() => format!("{} <{}>", display, info.addr),
            _ => info.addr,
        },
        Some(MailAddr::Group(group)) => group
            .addrs
            .first()
            .map(|info| info.addr.clone())
            .unwrap_or(group.group_name),
        None => header.get_value().trim().to_string(),
    }
}

fn message_date(parsed: &ParsedMail<'_>) -> Option<DateTime<Utc>> {
    let value = parsed.headers.get_first_value("Date")?;

    DateTime::parse_from_rfc2822(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            mailparse::dateparse(&value)
                .ok()
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
        })
}

fn is_attachment(part: &ParsedMail<'_>) -> bool {
    part.headers.get_first_value("Content-Disposition").is_some()
        && part.get_content_disposition().disposition == DispositionType::Attachment
}

/// Decoded body of the first non-attachment part with the given mime type
fn first_body(part: &ParsedMail<'_>, mimetype: &str) -> Option<String> {
    if part.subparts.is_empty() {
        if part.ctype.mimetype.eq_ignore_ascii_case(mimetype) && !is_attachment(part) {
            return part.get_body().ok();
        }
        return None;
    }

    part.subparts
        .iter()
        .find_map(|sub| first_body(sub, mimetype))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::mime::tests::SAMPLE_MESSAGE;

    #[test]
    fn test_parse_sample_message() {
        let message =
            parse_message(42, SAMPLE_MESSAGE.as_bytes(), vec!["\\Seen".to_string()]).unwrap();

        assert_eq!(message.id, "42");
        assert_eq!(message.subject, "Quarterly report");
        assert_eq!(message.from, "Alice <alice@example.com>");
        assert_eq!(message.to, "Bob <bob@example.com>");
        assert_eq!(message.date.to_rfc3339(), "2025-06-03T09:30:00+00:00");
        assert!(message.text.contains("Please review the report"));
        assert!(message.html.as_deref().unwrap().contains("<p>"));
        assert_eq!(message.flags, vec!["\\Seen"]);

        assert_eq!(message.attachments.len(), 2);
        let pdf = &message.attachments[0];
        assert_eq!(pdf.filename, "report.pdf");
        assert_eq!(pdf.content_type, "application/pdf");
        assert_eq!(pdf.part_id.as_deref(), Some("2"));
        assert_eq!(pdf.size, 15);
        assert_eq!(message.attachments[1].part_id.as_deref(), Some("3"));
    }

    #[test]
    fn test_defaults_for_sparse_message() {
        let raw = b"From: bare@example.com\r\n\r\nhello\r\n";
        let before = Utc::now();
        let message = parse_message(7, raw, Vec::new()).unwrap();

        assert_eq!(message.subject, "(No Subject)");
        assert_eq!(message.from, "bare@example.com");
        assert_eq!(message.to, "");
        assert!(message.date >= before);
        assert_eq!(message.text.trim(), "hello");
        assert!(message.html.is_none());
        assert!(message.attachments.is_empty());
    }
}
