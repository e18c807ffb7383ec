//! Mailbox access over IMAP.
//!
//! Each request opens its own session, runs a short select/search/fetch
//! sequence against `INBOX` and logs out. Handlers talk to a [`MailFetcher`]
//! so the HTTP layer can be exercised without a live server.

use async_trait::async_trait;
use axum::http::StatusCode;
use thiserror::Error;

use shared::models::{EmailMessage, IMAP_ENCRYPTION_TLS};

use crate::models::AccountRow;

mod imap;
pub mod mime;
pub mod parse;

pub use imap::ImapFetcher;

/// Outcome of an IMAP operation that did not produce a result.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("IMAP connection failed: {0}")]
    Connect(String),

    #[error("Failed to open inbox: {0}")]
    MailboxUnavailable(String),

    #[error("Email not found")]
    MessageNotFound,

    #[error("Attachment not found by partID")]
    PartNotFound,

    #[error("Failed to search emails: {0}")]
    Search(String),

    #[error("Failed to fetch email: {0}")]
    Fetch(String),

    #[error("Failed to parse email: {0}")]
    Parse(String),

    #[error("Attachment fetch failed")]
    EmptyPart,
}

impl MailError {
    pub fn status(&self) -> StatusCode {
        match self {
            MailError::Connect(_) => StatusCode::SERVICE_UNAVAILABLE,
            MailError::MessageNotFound | MailError::PartNotFound => StatusCode::NOT_FOUND,
            MailError::MailboxUnavailable(_)
            | MailError::Search(_)
            | MailError::Fetch(_)
            | MailError::Parse(_)
            | MailError::EmptyPart => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to API clients
    pub fn public_message(&self) -> &'static str {
        match self {
            MailError::Connect(_) => "IMAP connection failed",
            MailError::MailboxUnavailable(_) => "Failed to open inbox",
            MailError::MessageNotFound => "Email not found",
            MailError::PartNotFound => "Attachment not found by partID",
            MailError::Search(_) => "Failed to search emails",
            MailError::Fetch(_) => "Failed to fetch email",
            MailError::Parse(_) => "Failed to parse email",
            MailError::EmptyPart => "Attachment fetch failed",
        }
    }

    pub fn details(&self) -> Option<String> {
        match self {
            MailError::Connect(d)
            | MailError::MailboxUnavailable(d)
            | MailError::Search(d)
            | MailError::Fetch(d)
            | MailError::Parse(d) => Some(d.clone()),
            MailError::MessageNotFound | MailError::PartNotFound | MailError::EmptyPart => None,
        }
    }
}

/// Connection parameters for one mailbox
#[derive(Debug, Clone, PartialEq)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub username: String,
    pub password: String,
}

impl ImapSettings {
    /// Build settings from a stored profile and its decrypted password.
    ///
    /// Fails when the profile lacks a server, port or address, since no
    /// connection could be attempted.
    pub fn from_account(account: &AccountRow, password: String) -> Result<Self, MailError> {
        let host = account
            .imap_server_address
            .clone()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| MailError::Connect("account has no IMAP server".to_string()))?;

        let port = account
            .imap_server_port
            .and_then(|p| u16::try_from(p).ok())
            .filter(|p| *p != 0)
            .ok_or_else(|| MailError::Connect("account has no valid IMAP port".to_string()))?;

        let username = account
            .email_address
            .clone()
            .ok_or_else(|| MailError::Connect("account has no email address".to_string()))?;

        Ok(Self {
            host,
            port,
            tls: account.imap_encryption.as_deref() == Some(IMAP_ENCRYPTION_TLS),
            username,
            password,
        })
    }
}

/// A decoded attachment ready to be sent to the client
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub filename: String,
}

impl Attachment {
    /// `Content-Disposition` value with an RFC 5987 encoded filename
    pub fn content_disposition(&self) -> String {
        content_disposition(&self.filename)
    }
}

pub fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

#[async_trait]
pub trait MailFetcher: Send + Sync {
    /// Newest messages first, `offset..offset + limit` of the inbox.
    async fn list_recent(
        &self,
        settings: &ImapSettings,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EmailMessage>, MailError>;

    async fn fetch_detail(&self, settings: &ImapSettings, uid: u32)
        -> Result<EmailMessage, MailError>;

    async fn fetch_attachment(
        &self,
        settings: &ImapSettings,
        uid: u32,
        part_id: &str,
    ) -> Result<Attachment, MailError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn account(encryption: Option<&str>, port: Option<i32>) -> AccountRow {
        AccountRow {
            id: 1,
            user_id: Uuid::new_v4(),
            email_address: Some("me@example.com".to_string()),
            encrypted_password: Some(Uuid::new_v4().to_string()),
            imap_server_address: Some("imap.example.com".to_string()),
            imap_server_port: port,
            imap_encryption: encryption.map(str::to_string),
            smtp_server_address: None,
            smtp_server_port: None,
            smtp_encryption: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_settings_from_account() {
        let settings =
            ImapSettings::from_account(&account(Some("SSL/TLS"), Some(993)), "pw".into()).unwrap();
        assert!(settings.tls);
        assert_eq!(settings.port, 993);
        assert_eq!(settings.username, "me@example.com");

        let plain =
            ImapSettings::from_account(&account(Some("STARTTLS"), Some(143)), "pw".into()).unwrap();
        assert!(!plain.tls);
    }

    #[test]
    fn test_settings_reject_missing_port() {
        let err = ImapSettings::from_account(&account(None, None), "pw".into()).unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        assert!(ImapSettings::from_account(&account(None, Some(70000)), "pw".into()).is_err());
    }

    #[test]
    fn test_content_disposition_encodes_filename() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename*=UTF-8''report.pdf"
        );
        assert_eq!(
            content_disposition("季度 报告.pdf"),
            "attachment; filename*=UTF-8''%E5%AD%A3%E5%BA%A6%20%E6%8A%A5%E5%91%8A.pdf"
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(MailError::PartNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            MailError::PartNotFound.public_message(),
            "Attachment not found by partID"
        );
        assert_eq!(
            MailError::MailboxUnavailable("NO".into()).public_message(),
            "Failed to open inbox"
        );
        assert!(MailError::MessageNotFound.details().is_none());
    }
}
