//! Owner-scoped persistence for account profiles and todos.
//!
//! Every operation takes the caller's user id and only ever sees rows owned
//! by that user. [`PgStore`] is the production implementation;
//! [`MemoryStore`] has the same semantics without a database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared::api::{AccountUpdates, AddAccountRequest, CreateTodoRequest, UpdateTodoRequest};
use shared::models::{Todo, TodoStatus};

use crate::models::{AccountChangeset, AccountRow, TodoChangeset};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Todos are listed ten at a time
pub const TODO_PAGE_SIZE: i64 = 10;

/// Row offset for a 1-based page number; pages below 1 read as the first page.
pub fn page_offset(page: Option<i64>) -> i64 {
    (page.unwrap_or(1).max(1) - 1) * TODO_PAGE_SIZE
}

/// Input for creating a new account; the password goes to the vault
pub struct NewAccount {
    pub email_address: String,
    pub password: String,
    pub imap_server_address: String,
    pub imap_server_port: i32,
    pub imap_encryption: Option<String>,
    pub smtp_server_address: Option<String>,
    pub smtp_server_port: Option<i32>,
    pub smtp_encryption: Option<String>,
}

impl From<AddAccountRequest> for NewAccount {
    fn from(req: AddAccountRequest) -> Self {
        Self {
            email_address: req.email,
            password: req.password,
            imap_server_address: req.imap_server_address,
            imap_server_port: req.imap_server_port,
            imap_encryption: req.imap_encryption,
            smtp_server_address: req.smtp_server_address,
            smtp_server_port: req.smtp_server_port,
            smtp_encryption: req.smtp_encryption,
        }
    }
}

/// Input for updating an account
#[derive(Default)]
pub struct AccountChanges {
    pub password: Option<String>,
    pub columns: AccountChangeset,
}

impl From<AccountUpdates> for AccountChanges {
    fn from(updates: AccountUpdates) -> Self {
        Self {
            password: updates.password,
            columns: AccountChangeset {
                email_address: updates.email_address,
                imap_server_address: updates.imap_server_address,
                imap_server_port: updates.imap_server_port,
                imap_encryption: updates.imap_encryption,
                smtp_server_address: updates.smtp_server_address,
                smtp_server_port: updates.smtp_server_port,
                smtp_encryption: updates.smtp_encryption,
            },
        }
    }
}

/// Input for creating a new todo
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub content: String,
    pub status: TodoStatus,
    pub due_at: Option<DateTime<Utc>>,
    pub email_address: Option<String>,
    pub email_uid: Option<i64>,
}

impl From<CreateTodoRequest> for NewTodo {
    fn from(req: CreateTodoRequest) -> Self {
        Self {
            content: req.content,
            status: req.status.unwrap_or_default(),
            due_at: req.due_at,
            email_address: req.email_address,
            email_uid: req.email_uid,
        }
    }
}

/// Input for updating a todo; see [`TodoChangeset`] for the nested options
#[derive(Debug, Clone, Default)]
pub struct TodoChanges {
    pub content: Option<String>,
    pub status: Option<TodoStatus>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub email_address: Option<Option<String>>,
    pub email_uid: Option<Option<i64>>,
}

impl TodoChanges {
    pub fn into_changeset(self, now: DateTime<Utc>) -> TodoChangeset {
        TodoChangeset {
            content: self.content,
            status: self.status.map(|s| s.as_str().to_string()),
            due_at: self.due_at,
            email_address: self.email_address,
            email_uid: self.email_uid,
            updated_at: now,
        }
    }
}

impl From<UpdateTodoRequest> for TodoChanges {
    fn from(req: UpdateTodoRequest) -> Self {
        Self {
            content: req.content,
            status: req.status,
            due_at: req.due_at,
            email_address: req.email_address,
            email_uid: req.email_uid,
        }
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Store the password in the vault and insert the profile, atomically.
    async fn create(&self, owner: Uuid, account: NewAccount) -> Result<AccountRow>;

    async fn list(&self, owner: Uuid) -> Result<Vec<AccountRow>>;

    async fn get(&self, owner: Uuid, id: i32) -> Result<Option<AccountRow>>;

    /// Decrypt the mailbox password referenced by the account.
    async fn password(&self, account: &AccountRow) -> Result<Option<String>>;

    /// Returns `None` when the account does not exist or is not owned by `owner`.
    async fn update(&self, owner: Uuid, id: i32, changes: AccountChanges)
        -> Result<Option<AccountRow>>;

    /// Remove the profile and the vaulted secret the row points at. Returns
    /// `false` when nothing owned by `owner` matched.
    async fn delete(&self, owner: Uuid, id: i32) -> Result<bool>;
}

#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn create(&self, owner: Uuid, todo: NewTodo) -> Result<Todo>;

    /// Newest first, [`TODO_PAGE_SIZE`] per page.
    async fn list(&self, owner: Uuid, page: Option<i64>) -> Result<Vec<Todo>>;

    async fn get(&self, owner: Uuid, id: i32) -> Result<Option<Todo>>;

    /// Always bumps `updated_at`. Returns `None` when not found or not owned.
    async fn update(&self, owner: Uuid, id: i32, changes: TodoChanges) -> Result<Option<Todo>>;

    async fn delete(&self, owner: Uuid, id: i32) -> Result<bool>;
}
