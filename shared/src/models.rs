use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Status of a todo item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    #[default]
    Pending,
    Completed,
    Overdue,
}

impl TodoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "pending",
            TodoStatus::Completed => "completed",
            TodoStatus::Overdue => "overdue",
        }
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TodoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TodoStatus::Pending),
            "completed" => Ok(TodoStatus::Completed),
            "overdue" => Ok(TodoStatus::Overdue),
            other => Err(format!("unknown todo status: {}", other)),
        }
    }
}

/// Todo item as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i32,
    pub user_id: Uuid,
    pub content: String,
    pub status: TodoStatus,
    pub due_at: Option<DateTime<Utc>>,
    pub email_address: Option<String>,
    pub email_uid: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// IMAP/SMTP connection profile owned by a user.
///
/// The password never leaves the server; only the vault reference is stored
/// and it is not part of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAccount {
    pub id: i32,
    pub user_id: Uuid,
    pub email_address: Option<String>,
    pub imap_server_address: Option<String>,
    pub imap_server_port: Option<i32>,
    pub imap_encryption: Option<String>,
    pub smtp_server_address: Option<String>,
    pub smtp_server_port: Option<i32>,
    pub smtp_encryption: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Encryption label that selects implicit TLS for the IMAP connection.
pub const IMAP_ENCRYPTION_TLS: &str = "SSL/TLS";

/// Metadata for one attachment of a fetched message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
    #[serde(rename = "partID", skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

/// A parsed message fetched from the mail server. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub id: String,
    pub uid: u32,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub date: DateTime<Utc>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    pub attachments: Vec<AttachmentInfo>,
    pub flags: Vec<String>,
}
