//! Owned MIME part trees with IMAP part numbering.
//!
//! Both server-side `BODYSTRUCTURE` responses and locally parsed messages are
//! turned into the same [`MimePart`] tree so that a part id seen in a message
//! listing addresses the same part when the attachment is downloaded.

use std::borrow::Cow;

use async_imap::imap_proto::types::{
    BodyContentCommon, BodyContentSinglePart, BodyStructure, ContentEncoding,
};
use base64::Engine;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TransferEncoding {
    #[default]
    Identity,
    Base64,
    QuotedPrintable,
}

impl TransferEncoding {
    fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "base64" => TransferEncoding::Base64,
            "quoted-printable" => TransferEncoding::QuotedPrintable,
            _ => TransferEncoding::Identity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MimePart {
    /// IMAP section number (`1`, `2.1`, ...). `None` for the top-level
    /// multipart container, which has no addressable body of its own.
    pub part_id: Option<String>,
    /// Lowercased `type/subtype`
    pub content_type: String,
    /// Lowercased disposition type, e.g. `attachment` or `inline`
    pub disposition: Option<String>,
    pub filename: Option<String>,
    pub content_id: Option<String>,
    pub encoding: TransferEncoding,
    /// Octets as reported by the server, or decoded length for parsed messages
    pub size: usize,
    pub children: Vec<MimePart>,
}

impl MimePart {
    pub fn is_multipart(&self) -> bool {
        self.content_type.starts_with("multipart/")
    }

    /// A part is listed among a message's attachments when it is marked
    /// `attachment`, or when it carries a filename and is a leaf. Named
    /// inline parts such as embedded images are listed too.
    pub fn is_attachment(&self) -> bool {
        if self.is_downloadable() {
            return true;
        }
        self.filename.is_some() && !self.is_multipart()
    }

    /// Only parts whose disposition is `attachment` can be downloaded by id.
    pub fn is_downloadable(&self) -> bool {
        self.disposition.as_deref() == Some("attachment")
    }

    /// Depth-first, pre-order search for the downloadable part with the given id
    pub fn find_attachment(&self, part_id: &str) -> Option<&MimePart> {
        if self.part_id.as_deref() == Some(part_id) && self.is_downloadable() {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_attachment(part_id))
    }

    /// Every attachment in document order
    pub fn attachments(&self) -> Vec<&MimePart> {
        let mut found = Vec::new();
        self.collect_attachments(&mut found);
        found
    }

    fn collect_attachments<'a>(&'a self, found: &mut Vec<&'a MimePart>) {
        if self.part_id.is_some() && self.is_attachment() {
            found.push(self);
        }
        for child in &self.children {
            child.collect_attachments(found);
        }
    }

    /// Build a tree from a server `BODYSTRUCTURE` response
    pub fn from_body_structure(structure: &BodyStructure<'_>) -> Self {
        convert_structure(structure, None)
    }

    /// Build a tree from a locally parsed message
    pub fn from_parsed(mail: &ParsedMail<'_>) -> Self {
        convert_parsed(mail, None)
    }
}

fn child_id(parent: Option<&str>, index: usize) -> String {
    match parent {
        Some(prefix) => format!("{}.{}", prefix, index + 1),
        None => (index + 1).to_string(),
    }
}

fn param<'a>(params: &'a Option<Vec<(Cow<'_, str>, Cow<'_, str>)>>, key: &str) -> Option<&'a str> {
    params
        .as_ref()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_ref())
}

fn leaf_from_structure(
    common: &BodyContentCommon<'_>,
    other: &BodyContentSinglePart<'_>,
    part_id: String,
) -> MimePart {
    let disposition = common.disposition.as_ref();
    let filename = disposition
        .and_then(|d| param(&d.params, "filename"))
        .or_else(|| param(&common.ty.params, "name"))
        .map(str::to_string);

    let encoding = match &other.transfer_encoding {
        ContentEncoding::Base64 => TransferEncoding::Base64,
        ContentEncoding::QuotedPrintable => TransferEncoding::QuotedPrintable,
        ContentEncoding::Other(name) => TransferEncoding::from_name(name),
        _ => TransferEncoding::Identity,
    };

    MimePart {
        part_id: Some(part_id),
        content_type: format!("{}/{}", common.ty.ty, common.ty.subtype).to_ascii_lowercase(),
        disposition: disposition.map(|d| d.ty.to_ascii_lowercase()),
        filename,
        content_id: other
            .id
            .as_ref()
            .map(|id| id.trim_matches(|c| c == '<' || c == '>').to_string()),
        encoding,
        size: other.octets as usize,
        children: Vec::new(),
    }
}

fn convert_structure(structure: &BodyStructure<'_>, part_id: Option<String>) -> MimePart {
    match structure {
        BodyStructure::Basic { common, other, .. } | BodyStructure::Text { common, other, .. } => {
            leaf_from_structure(common, other, part_id.unwrap_or_else(|| "1".to_string()))
        }
        BodyStructure::Message {
            common,
            other,
            body,
            ..
        } => {
            let id = part_id.unwrap_or_else(|| "1".to_string());
            let mut part = leaf_from_structure(common, other, id.clone());
            let inner = match body.as_ref() {
                BodyStructure::Multipart { .. } => convert_structure(body, Some(id)),
                _ => convert_structure(body, Some(format!("{}.1", id))),
            };
            part.children.push(inner);
            part
        }
        BodyStructure::Multipart { common, bodies, .. } => {
            let children = bodies
                .iter()
                .enumerate()
                .map(|(i, b)| convert_structure(b, Some(child_id(part_id.as_deref(), i))))
                .collect();

            MimePart {
                content_type: format!("{}/{}", common.ty.ty, common.ty.subtype)
                    .to_ascii_lowercase(),
                disposition: common
                    .disposition
                    .as_ref()
                    .map(|d| d.ty.to_ascii_lowercase()),
                part_id,
                children,
                ..Default::default()
            }
        }
    }
}

fn disposition_name(disposition: &DispositionType) -> Option<String> {
    match disposition {
        DispositionType::Inline => Some("inline".to_string()),
        DispositionType::Attachment => Some("attachment".to_string()),
        DispositionType::FormData => Some("form-data".to_string()),
        DispositionType::Extension(other) => Some(other.to_ascii_lowercase()),
    }
}

fn convert_parsed(mail: &ParsedMail<'_>, part_id: Option<String>) -> MimePart {
    let content_type = mail.ctype.mimetype.to_ascii_lowercase();
    let has_disposition_header = mail.headers.get_first_value("Content-Disposition").is_some();
    let disposition = mail.get_content_disposition();

    let filename = disposition
        .params
        .get("filename")
        .or_else(|| mail.ctype.params.get("name"))
        .cloned();

    let mut part = MimePart {
        content_type: content_type.clone(),
        disposition: if has_disposition_header {
            disposition_name(&disposition.disposition)
        } else {
            None
        },
        filename,
        content_id: mail
            .headers
            .get_first_value("Content-ID")
            .map(|id| id.trim().trim_matches(|c| c == '<' || c == '>').to_string()),
        encoding: mail
            .headers
            .get_first_value("Content-Transfer-Encoding")
            .map(|e| TransferEncoding::from_name(&e))
            .unwrap_or_default(),
        size: mail.get_body_raw().map(|b| b.len()).unwrap_or(0),
        ..Default::default()
    };

    if content_type.starts_with("multipart/") {
        part.size = 0;
        part.children = mail
            .subparts
            .iter()
            .enumerate()
            .map(|(i, sub)| convert_parsed(sub, Some(child_id(part_id.as_deref(), i))))
            .collect();
        part.part_id = part_id;
        return part;
    }

    let id = part_id.unwrap_or_else(|| "1".to_string());
    if content_type == "message/rfc822" {
        if let Ok(raw) = mail.get_body_raw() {
            if let Ok(inner) = mailparse::parse_mail(&raw) {
                let inner_id = if inner.ctype.mimetype.to_ascii_lowercase().starts_with("multipart/")
                {
                    id.clone()
                } else {
                    format!("{}.1", id)
                };
                part.children.push(convert_parsed(&inner, Some(inner_id)));
            }
        }
    }
    part.part_id = Some(id);
    part
}

/// Undo a part's `Content-Transfer-Encoding`.
///
/// Base64 payloads commonly arrive with line breaks, which are stripped before
/// decoding. Unknown encodings are returned unchanged.
pub fn decode_transfer(raw: &[u8], encoding: &TransferEncoding) -> anyhow::Result<Vec<u8>> {
    match encoding {
        TransferEncoding::Identity => Ok(raw.to_vec()),
        TransferEncoding::Base64 => {
            let compact: Vec<u8> = raw
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
        }
        TransferEncoding::QuotedPrintable => {
            let mut wrapped = b"Content-Transfer-Encoding: quoted-printable\r\n\r\n".to_vec();
            wrapped.extend_from_slice(raw);
            let mail = mailparse::parse_mail(&wrapped)?;
            Ok(mail.get_body_raw()?)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE_MESSAGE: &str = concat!(
        "From: Alice <alice@example.com>\r\n",
        "To: Bob <bob@example.com>\r\n",
        "Subject: Quarterly report\r\n",
        "Date: Tue, 3 Jun 2025 09:30:00 +0000\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
        "\r\n",
        "--outer\r\n",
        "Content-Type: multipart/alternative; boundary=\"inner\"\r\n",
        "\r\n",
        "--inner\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "Please review the report before Friday.\r\n",
        "--inner\r\n",
        "Content-Type: text/html; charset=utf-8\r\n",
        "\r\n",
        "<p>Please review the report before Friday.</p>\r\n",
        "--inner--\r\n",
        "--outer\r\n",
        "Content-Type: application/pdf; name=\"report.pdf\"\r\n",
        "Content-Disposition: attachment; filename=\"report.pdf\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "JVBERi0xLjQK\r\n",
        "JSVFT0YK\r\n",
        "--outer\r\n",
        "Content-Type: text/csv\r\n",
        "Content-Disposition: attachment; filename=\"numbers.csv\"\r\n",
        "Content-Transfer-Encoding: quoted-printable\r\n",
        "\r\n",
        "a,b=\r\n",
        ",c\r\n",
        "--outer--\r\n",
    );

    /// The structure a server would report for [`SAMPLE_MESSAGE`]
    pub(crate) fn sample_tree() -> MimePart {
        let parsed = mailparse::parse_mail(SAMPLE_MESSAGE.as_bytes()).unwrap();
        MimePart::from_parsed(&parsed)
    }

    #[test]
    fn test_part_numbering() {
        let tree = sample_tree();

        assert_eq!(tree.part_id, None);
        assert_eq!(tree.children.len(), 3);
        assert_eq!(tree.children[0].part_id.as_deref(), Some("1"));
        assert_eq!(tree.children[0].children[0].part_id.as_deref(), Some("1.1"));
        assert_eq!(tree.children[0].children[1].part_id.as_deref(), Some("1.2"));
        assert_eq!(tree.children[1].part_id.as_deref(), Some("2"));
        assert_eq!(tree.children[2].part_id.as_deref(), Some("3"));
    }

    #[test]
    fn test_single_part_message_is_part_one() {
        let raw = b"Subject: hi\r\nContent-Type: text/plain\r\n\r\nhello\r\n";
        let tree = MimePart::from_parsed(&mailparse::parse_mail(raw).unwrap());
        assert_eq!(tree.part_id.as_deref(), Some("1"));
        assert!(tree.children.is_empty());
    }

    #[test]
    fn test_find_attachment() {
        let tree = sample_tree();

        let pdf = tree.find_attachment("2").unwrap();
        assert_eq!(pdf.filename.as_deref(), Some("report.pdf"));
        assert_eq!(pdf.content_type, "application/pdf");
        assert_eq!(pdf.encoding, TransferEncoding::Base64);

        // Body parts are not attachments even though they exist
        assert!(tree.find_attachment("1.1").is_none());
        assert!(tree.find_attachment("9").is_none());
    }

    #[test]
    fn test_attachments_in_document_order() {
        let tree = sample_tree();
        let names: Vec<_> = tree
            .attachments()
            .iter()
            .filter_map(|p| p.filename.clone())
            .collect();
        assert_eq!(names, vec!["report.pdf", "numbers.csv"]);
    }

    const RELATED_MESSAGE: &str = concat!(
        "Subject: Newsletter\r\n",
        "Content-Type: multipart/related; boundary=\"rel\"\r\n",
        "\r\n",
        "--rel\r\n",
        "Content-Type: text/html\r\n",
        "\r\n",
        "<img src=\"cid:logo\">\r\n",
        "--rel\r\n",
        "Content-Type: image/png\r\n",
        "Content-Disposition: inline; filename=\"logo.png\"\r\n",
        "Content-ID: <logo>\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "iVBORw0KGgo=\r\n",
        "--rel--\r\n",
    );

    #[test]
    fn test_inline_part_is_listed_but_not_downloadable() {
        let tree = MimePart::from_parsed(&mailparse::parse_mail(RELATED_MESSAGE.as_bytes()).unwrap());

        let listed = tree.attachments();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].disposition.as_deref(), Some("inline"));
        assert_eq!(listed[0].content_id.as_deref(), Some("logo"));

        assert!(tree.find_attachment("2").is_none());
    }

    #[test]
    fn test_forwarded_message_numbering_from_parsed() {
        let raw = concat!(
            "Subject: Fwd\r\n",
            "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "see below\r\n",
            "--outer\r\n",
            "Content-Type: message/rfc822\r\n",
            "Content-Disposition: attachment; filename=\"original.eml\"\r\n",
            "\r\n",
            "Subject: Original\r\n",
            "Content-Type: multipart/mixed; boundary=\"inner\"\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "hello\r\n",
            "--inner\r\n",
            "Content-Type: text/csv\r\n",
            "Content-Disposition: attachment; filename=\"data.csv\"\r\n",
            "\r\n",
            "a,b\r\n",
            "--inner--\r\n",
            "--outer--\r\n",
        );
        let tree = MimePart::from_parsed(&mailparse::parse_mail(raw.as_bytes()).unwrap());

        let forwarded = &tree.children[1];
        assert_eq!(forwarded.part_id.as_deref(), Some("2"));
        let inner = &forwarded.children[0];
        assert_eq!(inner.children[0].part_id.as_deref(), Some("2.1"));
        assert_eq!(inner.children[1].part_id.as_deref(), Some("2.2"));

        assert_eq!(
            tree.find_attachment("2.2").and_then(|p| p.filename.as_deref()),
            Some("data.csv")
        );
    }

    /// Parse a `* n FETCH (BODYSTRUCTURE ...)` line and convert its body
    fn tree_from_response(response: &str) -> MimePart {
        use async_imap::imap_proto::{parser::parse_response, AttributeValue, Response};

        match parse_response(response.as_bytes()) {
            Ok((_, Response::Fetch(_, attrs))) => attrs
                .iter()
                .find_map(|attr| match attr {
                    AttributeValue::BodyStructure(body) => Some(MimePart::from_body_structure(body)),
                    _ => None,
                })
                .expect("no BODYSTRUCTURE in response"),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_body_structure_nested_multipart() {
        let tree = tree_from_response(concat!(
            "* 1 FETCH (UID 42 BODYSTRUCTURE (",
            "((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"utf-8\") NIL NIL \"7BIT\" 40 1 NIL NIL NIL NIL)",
            "(\"TEXT\" \"HTML\" (\"CHARSET\" \"utf-8\") NIL NIL \"QUOTED-PRINTABLE\" 48 1 NIL NIL NIL NIL)",
            " \"ALTERNATIVE\" (\"BOUNDARY\" \"inner\") NIL NIL NIL)",
            "(\"APPLICATION\" \"PDF\" (\"NAME\" \"report.pdf\") NIL NIL \"BASE64\" 22 NIL",
            " (\"ATTACHMENT\" NIL) NIL NIL)",
            "(\"TEXT\" \"CSV\" NIL \"<csv@example>\" NIL \"QUOTED-PRINTABLE\" 9 1 NIL",
            " (\"ATTACHMENT\" (\"FILENAME\" \"numbers.csv\")) NIL NIL)",
            " \"MIXED\" (\"BOUNDARY\" \"outer\") NIL NIL NIL))\r\n",
        ));

        assert_eq!(tree.part_id, None);
        assert_eq!(tree.content_type, "multipart/mixed");
        assert_eq!(tree.children.len(), 3);

        let alternative = &tree.children[0];
        assert_eq!(alternative.part_id.as_deref(), Some("1"));
        assert_eq!(alternative.children[0].part_id.as_deref(), Some("1.1"));
        assert_eq!(alternative.children[1].part_id.as_deref(), Some("1.2"));
        assert_eq!(alternative.children[1].encoding, TransferEncoding::QuotedPrintable);

        // No FILENAME disposition param, so the Content-Type name is used
        let pdf = tree.find_attachment("2").unwrap();
        assert_eq!(pdf.filename.as_deref(), Some("report.pdf"));
        assert_eq!(pdf.content_type, "application/pdf");
        assert_eq!(pdf.encoding, TransferEncoding::Base64);
        assert_eq!(pdf.size, 22);

        let csv = tree.find_attachment("3").unwrap();
        assert_eq!(csv.filename.as_deref(), Some("numbers.csv"));
        assert_eq!(csv.content_id.as_deref(), Some("csv@example"));

        assert!(tree.find_attachment("1.1").is_none());
        assert!(tree.find_attachment("4").is_none());
    }

    #[test]
    fn test_body_structure_single_part_is_part_one() {
        let tree = tree_from_response(
            "* 3 FETCH (BODYSTRUCTURE (\"TEXT\" \"PLAIN\" (\"CHARSET\" \"iso-8859-1\") NIL NIL \"QUOTED-PRINTABLE\" 1315 42 NIL NIL NIL NIL))\r\n",
        );

        assert_eq!(tree.part_id.as_deref(), Some("1"));
        assert_eq!(tree.content_type, "text/plain");
        assert_eq!(tree.encoding, TransferEncoding::QuotedPrintable);
        assert!(tree.children.is_empty());
        assert!(tree.attachments().is_empty());
    }

    const ENVELOPE: &str = "(NIL \"Original\" NIL NIL NIL NIL NIL NIL NIL NIL)";

    #[test]
    fn test_body_structure_forwarded_multipart_reuses_message_id() {
        let response = format!(
            concat!(
                "* 5 FETCH (BODYSTRUCTURE (",
                "(\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 10 1 NIL NIL NIL NIL)",
                "(\"MESSAGE\" \"RFC822\" NIL NIL NIL \"7BIT\" 300 {} (",
                "(\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 5 1 NIL NIL NIL NIL)",
                "(\"TEXT\" \"CSV\" (\"NAME\" \"data.csv\") NIL NIL \"BASE64\" 8 1 NIL (\"ATTACHMENT\" NIL) NIL NIL)",
                " \"MIXED\" (\"BOUNDARY\" \"inner\") NIL NIL NIL)",
                " 12 NIL (\"ATTACHMENT\" (\"FILENAME\" \"original.eml\")) NIL NIL)",
                " \"MIXED\" (\"BOUNDARY\" \"outer\") NIL NIL NIL))\r\n",
            ),
            ENVELOPE
        );
        let tree = tree_from_response(&response);

        let forwarded = &tree.children[1];
        assert_eq!(forwarded.part_id.as_deref(), Some("2"));
        assert_eq!(forwarded.content_type, "message/rfc822");
        assert_eq!(forwarded.filename.as_deref(), Some("original.eml"));

        let inner = &forwarded.children[0];
        assert_eq!(inner.children[0].part_id.as_deref(), Some("2.1"));
        assert_eq!(inner.children[1].part_id.as_deref(), Some("2.2"));

        let csv = tree.find_attachment("2.2").unwrap();
        assert_eq!(csv.filename.as_deref(), Some("data.csv"));
        assert_eq!(csv.encoding, TransferEncoding::Base64);
        assert_eq!(
            tree.find_attachment("2").map(|p| p.content_type.as_str()),
            Some("message/rfc822")
        );
    }

    #[test]
    fn test_body_structure_forwarded_single_part_is_nested() {
        let response = format!(
            concat!(
                "* 6 FETCH (BODYSTRUCTURE (",
                "(\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 10 1 NIL NIL NIL NIL)",
                "(\"MESSAGE\" \"RFC822\" NIL NIL NIL \"7BIT\" 120 {} ",
                "(\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 5 1 NIL NIL NIL NIL)",
                " 6 NIL (\"ATTACHMENT\" NIL) NIL NIL)",
                " \"MIXED\" (\"BOUNDARY\" \"outer\") NIL NIL NIL))\r\n",
            ),
            ENVELOPE
        );
        let tree = tree_from_response(&response);

        let forwarded = &tree.children[1];
        assert_eq!(forwarded.part_id.as_deref(), Some("2"));
        assert_eq!(forwarded.children.len(), 1);
        assert_eq!(forwarded.children[0].part_id.as_deref(), Some("2.1"));
        assert_eq!(forwarded.children[0].content_type, "text/plain");
    }

    #[test]
    fn test_decode_base64_with_line_breaks() {
        let decoded = decode_transfer(b"JVBERi0xLjQK\r\nJSVFT0YK\r\n", &TransferEncoding::Base64).unwrap();
        assert_eq!(decoded, b"%PDF-1.4\n%%EOF\n");
    }

    #[test]
    fn test_decode_quoted_printable() {
        let decoded =
            decode_transfer(b"caf=C3=A9 =\r\nau lait", &TransferEncoding::QuotedPrintable).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "café au lait");
    }

    #[test]
    fn test_decode_identity_passes_through() {
        let decoded = decode_transfer(b"plain bytes", &TransferEncoding::Identity).unwrap();
        assert_eq!(decoded, b"plain bytes");
    }
}
