use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use shared::models::Todo;

use super::{AccountChanges, AccountStore, NewAccount, NewTodo, TodoChanges, TodoStore};
use crate::db::{DbConnection, DbPool};
use crate::models::{AccountRow, NewAccountRow, NewTodoRow, TodoRow};
use crate::vault;

/// Stores backed by the Postgres pool
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<DbConnection> {
        self.pool
            .get()
            .await
            .context("Failed to get database connection")
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create(&self, owner: Uuid, account: NewAccount) -> Result<AccountRow> {
        let mut conn = self.conn().await?;
        let owner_id = owner.to_string();

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            async move {
                let secret_id = vault::create_secret(
                    conn,
                    &account.password,
                    &account.email_address,
                    &owner_id,
                )
                .await?;

                let row = diesel::insert_into(crate::schema::email_accounts::table)
                    .values(NewAccountRow {
                        user_id: owner,
                        email_address: &account.email_address,
                        encrypted_password: &secret_id,
                        imap_server_address: &account.imap_server_address,
                        imap_server_port: account.imap_server_port,
                        imap_encryption: account.imap_encryption.as_deref(),
                        smtp_server_address: account.smtp_server_address.as_deref(),
                        smtp_server_port: account.smtp_server_port,
                        smtp_encryption: account.smtp_encryption.as_deref(),
                    })
                    .returning(AccountRow::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to insert email account")?;

                Ok(row)
            }
            .scope_boxed()
        })
        .await
    }

    async fn list(&self, owner: Uuid) -> Result<Vec<AccountRow>> {
        use crate::schema::email_accounts::dsl::*;

        let mut conn = self.conn().await?;
        let rows = email_accounts
            .filter(user_id.eq(owner))
            .order_by(id.asc())
            .select(AccountRow::as_select())
            .load(&mut conn)
            .await?;

        Ok(rows)
    }

    async fn get(&self, owner: Uuid, account_id: i32) -> Result<Option<AccountRow>> {
        use crate::schema::email_accounts::dsl::*;

        let mut conn = self.conn().await?;
        let row = email_accounts
            .filter(id.eq(account_id))
            .filter(user_id.eq(owner))
            .select(AccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(row)
    }

    async fn password(&self, account: &AccountRow) -> Result<Option<String>> {
        let Some(secret_id) = account.encrypted_password.as_deref() else {
            return Ok(None);
        };

        let mut conn = self.conn().await?;
        vault::read_secret(&mut conn, secret_id).await
    }

    async fn update(
        &self,
        owner: Uuid,
        account_id: i32,
        changes: AccountChanges,
    ) -> Result<Option<AccountRow>> {
        let mut conn = self.conn().await?;

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            async move {
                use crate::schema::email_accounts::dsl::*;

                let existing = email_accounts
                    .filter(id.eq(account_id))
                    .filter(user_id.eq(owner))
                    .select(AccountRow::as_select())
                    .first(conn)
                    .await
                    .optional()?;

                let Some(existing) = existing else {
                    return Ok(None);
                };

                let renamed = changes.columns.email_address.as_deref();
                if changes.password.is_some() || renamed.is_some() {
                    if let Some(secret_id) = existing.encrypted_password.as_deref() {
                        vault::update_secret(conn, secret_id, changes.password.as_deref(), renamed)
                            .await?;
                    }
                }

                if changes.columns.is_empty() {
                    return Ok(Some(existing));
                }

                let row = diesel::update(
                    email_accounts
                        .filter(id.eq(account_id))
                        .filter(user_id.eq(owner)),
                )
                .set(&changes.columns)
                .returning(AccountRow::as_returning())
                .get_result(conn)
                .await?;

                Ok(Some(row))
            }
            .scope_boxed()
        })
        .await
    }

    async fn delete(&self, owner: Uuid, account_id: i32) -> Result<bool> {
        let mut conn = self.conn().await?;

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            async move {
                use crate::schema::email_accounts::dsl::*;

                let deleted: Vec<Option<String>> = diesel::delete(
                    email_accounts
                        .filter(id.eq(account_id))
                        .filter(user_id.eq(owner)),
                )
                .returning(encrypted_password)
                .get_results(conn)
                .await?;

                let Some(secret_ref) = deleted.into_iter().next() else {
                    return Ok(false);
                };

                if let Some(secret_id) = secret_ref {
                    vault::delete_secret(conn, &secret_id).await?;
                }
                Ok(true)
            }
            .scope_boxed()
        })
        .await
    }
}

#[async_trait]
impl TodoStore for PgStore {
    async fn create(&self, owner: Uuid, todo: NewTodo) -> Result<Todo> {
        let mut conn = self.conn().await?;

        let row = diesel::insert_into(crate::schema::todos::table)
            .values(NewTodoRow {
                user_id: owner,
                content: &todo.content,
                status: todo.status.as_str(),
                due_at: todo.due_at,
                email_address: todo.email_address.as_deref(),
                email_uid: todo.email_uid,
            })
            .returning(TodoRow::as_returning())
            .get_result(&mut conn)
            .await
            .context("Failed to insert todo")?;

        row.try_into()
    }

    async fn list(&self, owner: Uuid, page: Option<i64>) -> Result<Vec<Todo>> {
        use crate::schema::todos::dsl::*;

        let mut conn = self.conn().await?;
        let rows = todos
            .filter(user_id.eq(owner))
            .order_by((created_at.desc(), id.desc()))
            .limit(super::TODO_PAGE_SIZE)
            .offset(super::page_offset(page))
            .select(TodoRow::as_select())
            .load(&mut conn)
            .await?;

        rows.into_iter().map(Todo::try_from).collect()
    }

    async fn get(&self, owner: Uuid, todo_id: i32) -> Result<Option<Todo>> {
        use crate::schema::todos::dsl::*;

        let mut conn = self.conn().await?;
        let row = todos
            .filter(id.eq(todo_id))
            .filter(user_id.eq(owner))
            .select(TodoRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        row.map(Todo::try_from).transpose()
    }

    async fn update(&self, owner: Uuid, todo_id: i32, changes: TodoChanges) -> Result<Option<Todo>> {
        use crate::schema::todos::dsl::*;

        let mut conn = self.conn().await?;
        let changeset = changes.into_changeset(Utc::now());

        let row = diesel::update(todos.filter(id.eq(todo_id)).filter(user_id.eq(owner)))
            .set(&changeset)
            .returning(TodoRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;

        row.map(Todo::try_from).transpose()
    }

    async fn delete(&self, owner: Uuid, todo_id: i32) -> Result<bool> {
        use crate::schema::todos::dsl::*;

        let mut conn = self.conn().await?;
        let deleted = diesel::delete(todos.filter(id.eq(todo_id)).filter(user_id.eq(owner)))
            .execute(&mut conn)
            .await?;

        Ok(deleted > 0)
    }
}
