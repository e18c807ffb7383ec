// Database models for Diesel
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use shared::models::{EmailAccount, Todo, TodoStatus};

/// Database representation of an email account profile.
///
/// `encrypted_password` is the vault secret id, never the password itself.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = crate::schema::email_accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AccountRow {
    pub id: i32,
    pub user_id: Uuid,
    pub email_address: Option<String>,
    pub encrypted_password: Option<String>,
    pub imap_server_address: Option<String>,
    pub imap_server_port: Option<i32>,
    pub imap_encryption: Option<String>,
    pub smtp_server_address: Option<String>,
    pub smtp_server_port: Option<i32>,
    pub smtp_encryption: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AccountRow> for EmailAccount {
    fn from(row: AccountRow) -> Self {
        EmailAccount {
            id: row.id,
            user_id: row.user_id,
            email_address: row.email_address,
            imap_server_address: row.imap_server_address,
            imap_server_port: row.imap_server_port,
            imap_encryption: row.imap_encryption,
            smtp_server_address: row.smtp_server_address,
            smtp_server_port: row.smtp_server_port,
            smtp_encryption: row.smtp_encryption,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::email_accounts)]
pub struct NewAccountRow<'a> {
    pub user_id: Uuid,
    pub email_address: &'a str,
    pub encrypted_password: &'a str,
    pub imap_server_address: &'a str,
    pub imap_server_port: i32,
    pub imap_encryption: Option<&'a str>,
    pub smtp_server_address: Option<&'a str>,
    pub smtp_server_port: Option<i32>,
    pub smtp_encryption: Option<&'a str>,
}

/// Column changes for an account; `None` fields are left untouched.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = crate::schema::email_accounts)]
pub struct AccountChangeset {
    pub email_address: Option<String>,
    pub imap_server_address: Option<String>,
    pub imap_server_port: Option<i32>,
    pub imap_encryption: Option<String>,
    pub smtp_server_address: Option<String>,
    pub smtp_server_port: Option<i32>,
    pub smtp_encryption: Option<String>,
}

impl AccountChangeset {
    pub fn is_empty(&self) -> bool {
        self.email_address.is_none()
            && self.imap_server_address.is_none()
            && self.imap_server_port.is_none()
            && self.imap_encryption.is_none()
            && self.smtp_server_address.is_none()
            && self.smtp_server_port.is_none()
            && self.smtp_encryption.is_none()
    }

    /// Apply these changes to an in-memory row
    pub fn apply(&self, row: &mut AccountRow) {
        if let Some(v) = &self.email_address {
            row.email_address = Some(v.clone());
        }
        if let Some(v) = &self.imap_server_address {
            row.imap_server_address = Some(v.clone());
        }
        if let Some(v) = self.imap_server_port {
            row.imap_server_port = Some(v);
        }
        if let Some(v) = &self.imap_encryption {
            row.imap_encryption = Some(v.clone());
        }
        if let Some(v) = &self.smtp_server_address {
            row.smtp_server_address = Some(v.clone());
        }
        if let Some(v) = self.smtp_server_port {
            row.smtp_server_port = Some(v);
        }
        if let Some(v) = &self.smtp_encryption {
            row.smtp_encryption = Some(v.clone());
        }
    }
}

/// Database representation of a todo; status is stored as VARCHAR
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = crate::schema::todos)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TodoRow {
    pub id: i32,
    pub user_id: Uuid,
    pub content: String,
    pub status: String,
    pub due_at: Option<DateTime<Utc>>,
    pub email_address: Option<String>,
    pub email_uid: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TodoRow> for Todo {
    type Error = anyhow::Error;

    fn try_from(row: TodoRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TodoStatus>()
            .map_err(|e| anyhow::anyhow!("todo {}: {}", row.id, e))?;

        Ok(Todo {
            id: row.id,
            user_id: row.user_id,
            content: row.content,
            status,
            due_at: row.due_at,
            email_address: row.email_address,
            email_uid: row.email_uid,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::todos)]
pub struct NewTodoRow<'a> {
    pub user_id: Uuid,
    pub content: &'a str,
    pub status: &'a str,
    pub due_at: Option<DateTime<Utc>>,
    pub email_address: Option<&'a str>,
    pub email_uid: Option<i64>,
}

/// Column changes for a todo. Nested options distinguish "leave alone"
/// (`None`) from "set NULL" (`Some(None)`); `updated_at` is always written.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::todos)]
pub struct TodoChangeset {
    pub content: Option<String>,
    pub status: Option<String>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub email_address: Option<Option<String>>,
    pub email_uid: Option<Option<i64>>,
    pub updated_at: DateTime<Utc>,
}

impl TodoChangeset {
    /// Apply these changes to an in-memory row
    pub fn apply(&self, row: &mut TodoRow) {
        if let Some(v) = &self.content {
            row.content = v.clone();
        }
        if let Some(v) = &self.status {
            row.status = v.clone();
        }
        if let Some(v) = self.due_at {
            row.due_at = v;
        }
        if let Some(v) = &self.email_address {
            row.email_address = v.clone();
        }
        if let Some(v) = self.email_uid {
            row.email_uid = v;
        }
        row.updated_at = self.updated_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo_row(status: &str) -> TodoRow {
        let now = Utc::now();
        TodoRow {
            id: 7,
            user_id: Uuid::new_v4(),
            content: "Reply to Alice".to_string(),
            status: status.to_string(),
            due_at: Some(now),
            email_address: Some("me@example.com".to_string()),
            email_uid: Some(42),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_todo_row_with_unknown_status_is_rejected() {
        assert!(Todo::try_from(todo_row("archived")).is_err());
        assert_eq!(
            Todo::try_from(todo_row("overdue")).unwrap().status,
            TodoStatus::Overdue
        );
    }

    #[test]
    fn test_todo_changeset_apply_clears_and_keeps() {
        let mut row = todo_row("pending");
        let later = row.updated_at + chrono::Duration::seconds(5);
        let changes = TodoChangeset {
            content: None,
            status: Some("completed".to_string()),
            due_at: Some(None),
            email_address: None,
            email_uid: None,
            updated_at: later,
        };

        changes.apply(&mut row);

        assert_eq!(row.status, "completed");
        assert_eq!(row.due_at, None);
        assert_eq!(row.content, "Reply to Alice");
        assert_eq!(row.email_uid, Some(42));
        assert_eq!(row.updated_at, later);
    }

    #[test]
    fn test_empty_account_changeset() {
        assert!(AccountChangeset::default().is_empty());
        let changes = AccountChangeset {
            imap_server_port: Some(143),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
