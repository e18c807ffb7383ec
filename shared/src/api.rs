use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::models::{EmailAccount, EmailMessage, Todo, TodoStatus};

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Accepts RFC 3339, a bare date (midnight UTC) or a naive date-time (UTC).
pub fn parse_due_at(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Due dates as date pickers send them; an empty string means no date.
fn due_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Deserialize::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_due_at(text)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid due date: {}", text))),
    }
}

/// [`due_date`] for partial updates, where `null` or `""` clears the date.
fn due_date_change<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    due_date(deserializer).map(Some)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

/// Ports arrive as numbers or as the text of a form field; `""` is no port.
fn optional_port<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => i32::try_from(n)
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid port: {}", n))),
        Some(NumberOrText::Text(text)) => match text.trim() {
            "" => Ok(None),
            digits => digits
                .parse::<i32>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid port: {}", digits))),
        },
    }
}

fn port<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    optional_port(deserializer)?.ok_or_else(|| de::Error::custom("port is required"))
}

// ============================================================================
// Common envelopes
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details,
        }
    }
}

/// Bare acknowledgement, `{"success": true}`
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

// ============================================================================
// Email account API types
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddAccountRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,

    #[validate(length(min = 1, max = 255))]
    pub imap_server_address: String,

    #[serde(deserialize_with = "port")]
    #[validate(range(min = 1, max = 65535))]
    pub imap_server_port: i32,

    #[validate(length(max = 255))]
    pub imap_encryption: Option<String>,

    #[validate(length(max = 255))]
    pub smtp_server_address: Option<String>,

    #[serde(default, deserialize_with = "optional_port")]
    #[validate(range(min = 1, max = 65535))]
    pub smtp_server_port: Option<i32>,

    #[validate(length(max = 255))]
    pub smtp_encryption: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdates {
    #[validate(email)]
    pub email_address: Option<String>,

    #[validate(length(min = 1))]
    pub password: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub imap_server_address: Option<String>,

    #[serde(default, deserialize_with = "optional_port")]
    #[validate(range(min = 1, max = 65535))]
    pub imap_server_port: Option<i32>,

    #[validate(length(max = 255))]
    pub imap_encryption: Option<String>,

    #[validate(length(max = 255))]
    pub smtp_server_address: Option<String>,

    #[serde(default, deserialize_with = "optional_port")]
    #[validate(range(min = 1, max = 65535))]
    pub smtp_server_port: Option<i32>,

    #[validate(length(max = 255))]
    pub smtp_encryption: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    pub id: Option<i32>,

    #[serde(default)]
    #[validate]
    pub updates: AccountUpdates,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountQuery {
    pub id: Option<i32>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub success: bool,
    pub account: EmailAccount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListAccountsResponse {
    pub success: bool,
    pub accounts: Vec<EmailAccount>,
}

// ============================================================================
// Mail API types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEmailsQuery {
    pub account_id: Option<i32>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDetailQuery {
    pub account_id: Option<i32>,
    pub uid: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentQuery {
    pub account_id: Option<i32>,
    pub uid: Option<u32>,
    #[serde(rename = "partID")]
    pub part_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBrief {
    pub id: i32,
    pub email_address: Option<String>,
    pub imap_server: Option<String>,
}

impl From<&EmailAccount> for AccountBrief {
    fn from(account: &EmailAccount) -> Self {
        Self {
            id: account.id,
            email_address: account.email_address.clone(),
            imap_server: account.imap_server_address.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListEmailsResponse {
    pub success: bool,
    pub emails: Vec<EmailMessage>,
    pub total: usize,
    pub account: AccountBrief,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailDetailResponse {
    pub success: bool,
    pub email: EmailMessage,
}

// ============================================================================
// Todo API types
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateTodoRequest {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,

    pub status: Option<TodoStatus>,

    #[serde(default, deserialize_with = "due_date")]
    pub due_at: Option<DateTime<Utc>>,

    #[validate(length(max = 255))]
    pub email_address: Option<String>,

    pub email_uid: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListTodosRequest {
    pub page: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTodoRequest {
    pub id: Option<i32>,

    #[validate(length(min = 1, max = 5000))]
    pub content: Option<String>,

    pub status: Option<TodoStatus>,

    #[serde(default, deserialize_with = "due_date_change")]
    pub due_at: Option<Option<DateTime<Utc>>>,

    #[serde(default, deserialize_with = "double_option")]
    pub email_address: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub email_uid: Option<Option<i64>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DeleteTodoRequest {
    pub id: Option<i32>,
}

// ============================================================================
// AI API types
// ============================================================================

/// The email handed to the task recognizer, as the inbox view holds it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizeEmail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub email: Option<SummarizeEmail>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SummarizeOutcome {
    Task { task: Todo, message: String },
    NotTask { is_task: bool, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}
