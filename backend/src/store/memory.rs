use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::models::Todo;

use super::{AccountChanges, AccountStore, NewAccount, NewTodo, TodoChanges, TodoStore};
use crate::models::{AccountRow, TodoRow};

struct StoredSecret {
    id: String,
    name: String,
    description: String,
    secret: String,
}

#[derive(Default)]
struct Inner {
    accounts: Vec<AccountRow>,
    secrets: Vec<StoredSecret>,
    todos: Vec<TodoRow>,
    next_account_id: i32,
    next_todo_id: i32,
}

/// In-process store with the same ownership rules as [`super::PgStore`].
///
/// Nothing survives a restart. Used by the test suite and for running the
/// API without a database.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create(&self, owner: Uuid, account: NewAccount) -> Result<AccountRow> {
        let mut inner = self.inner.write().await;

        let secret_id = Uuid::new_v4().to_string();
        inner.secrets.push(StoredSecret {
            id: secret_id.clone(),
            name: account.email_address.clone(),
            description: owner.to_string(),
            secret: account.password,
        });

        inner.next_account_id += 1;
        let row = AccountRow {
            id: inner.next_account_id,
            user_id: owner,
            email_address: Some(account.email_address),
            encrypted_password: Some(secret_id),
            imap_server_address: Some(account.imap_server_address),
            imap_server_port: Some(account.imap_server_port),
            imap_encryption: account.imap_encryption,
            smtp_server_address: account.smtp_server_address,
            smtp_server_port: account.smtp_server_port,
            smtp_encryption: account.smtp_encryption,
            created_at: Utc::now(),
        };
        inner.accounts.push(row.clone());

        Ok(row)
    }

    async fn list(&self, owner: Uuid) -> Result<Vec<AccountRow>> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .iter()
            .filter(|a| a.user_id == owner)
            .cloned()
            .collect())
    }

    async fn get(&self, owner: Uuid, id: i32) -> Result<Option<AccountRow>> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .iter()
            .find(|a| a.id == id && a.user_id == owner)
            .cloned())
    }

    async fn password(&self, account: &AccountRow) -> Result<Option<String>> {
        let Some(secret_id) = account.encrypted_password.as_deref() else {
            return Ok(None);
        };

        let inner = self.inner.read().await;
        Ok(inner
            .secrets
            .iter()
            .find(|s| s.id == secret_id)
            .map(|s| s.secret.clone()))
    }

    async fn update(
        &self,
        owner: Uuid,
        id: i32,
        changes: AccountChanges,
    ) -> Result<Option<AccountRow>> {
        let mut inner = self.inner.write().await;
        let Inner {
            accounts, secrets, ..
        } = &mut *inner;

        let Some(row) = accounts
            .iter_mut()
            .find(|a| a.id == id && a.user_id == owner)
        else {
            return Ok(None);
        };

        if let Some(secret_id) = row.encrypted_password.as_deref() {
            if let Some(stored) = secrets.iter_mut().find(|s| s.id == secret_id) {
                if let Some(password) = &changes.password {
                    stored.secret = password.clone();
                }
                if let Some(name) = &changes.columns.email_address {
                    stored.name = name.clone();
                }
            }
        }

        changes.columns.apply(row);
        Ok(Some(row.clone()))
    }

    async fn delete(&self, owner: Uuid, id: i32) -> Result<bool> {
        let mut inner = self.inner.write().await;

        let Some(pos) = inner
            .accounts
            .iter()
            .position(|a| a.id == id && a.user_id == owner)
        else {
            return Ok(false);
        };

        let row = inner.accounts.remove(pos);
        if let Some(secret_id) = row.encrypted_password {
            inner.secrets.retain(|s| s.id != secret_id);
        }
        Ok(true)
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn create(&self, owner: Uuid, todo: NewTodo) -> Result<Todo> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        inner.next_todo_id += 1;
        let row = TodoRow {
            id: inner.next_todo_id,
            user_id: owner,
            content: todo.content,
            status: todo.status.as_str().to_string(),
            due_at: todo.due_at,
            email_address: todo.email_address,
            email_uid: todo.email_uid,
            created_at: now,
            updated_at: now,
        };
        inner.todos.push(row.clone());

        row.try_into()
    }

    async fn list(&self, owner: Uuid, page: Option<i64>) -> Result<Vec<Todo>> {
        let inner = self.inner.read().await;

        let mut rows: Vec<&TodoRow> = inner.todos.iter().filter(|t| t.user_id == owner).collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        rows.into_iter()
            .skip(super::page_offset(page) as usize)
            .take(super::TODO_PAGE_SIZE as usize)
            .cloned()
            .map(Todo::try_from)
            .collect()
    }

    async fn get(&self, owner: Uuid, id: i32) -> Result<Option<Todo>> {
        let inner = self.inner.read().await;
        inner
            .todos
            .iter()
            .find(|t| t.id == id && t.user_id == owner)
            .cloned()
            .map(Todo::try_from)
            .transpose()
    }

    async fn update(&self, owner: Uuid, id: i32, changes: TodoChanges) -> Result<Option<Todo>> {
        let mut inner = self.inner.write().await;

        let Some(row) = inner
            .todos
            .iter_mut()
            .find(|t| t.id == id && t.user_id == owner)
        else {
            return Ok(None);
        };

        changes.into_changeset(Utc::now()).apply(row);
        row.clone().try_into().map(Some)
    }

    async fn delete(&self, owner: Uuid, id: i32) -> Result<bool> {
        let mut inner = self.inner.write().await;

        let before = inner.todos.len();
        inner.todos.retain(|t| !(t.id == id && t.user_id == owner));
        Ok(inner.todos.len() != before)
    }
}
