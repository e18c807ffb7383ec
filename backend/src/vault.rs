//! Access to the database's secret-management extension.
//!
//! Mailbox passwords are stored encrypted at rest by the `vault` schema and
//! referenced from account rows by an opaque secret id. Secrets are named
//! after the account's email address and described by the owner's user id.

use anyhow::Context;
use diesel::prelude::*;
use diesel::sql_types::{Nullable, Text};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

#[derive(QueryableByName)]
struct SecretId {
    #[diesel(sql_type = Text)]
    id: String,
}

#[derive(QueryableByName)]
struct DecryptedSecret {
    #[diesel(sql_type = Nullable<Text>)]
    decrypted_secret: Option<String>,
}

/// Store a new secret and return its id.
pub async fn create_secret(
    conn: &mut AsyncPgConnection,
    secret: &str,
    name: &str,
    description: &str,
) -> anyhow::Result<String> {
    let row = diesel::sql_query("SELECT vault.create_secret($1, $2, $3)::text AS id")
        .bind::<Text, _>(secret)
        .bind::<Text, _>(name)
        .bind::<Text, _>(description)
        .get_result::<SecretId>(conn)
        .await
        .context("Failed to store secret in vault")?;

    Ok(row.id)
}

pub async fn read_secret(
    conn: &mut AsyncPgConnection,
    secret_id: &str,
) -> anyhow::Result<Option<String>> {
    let row = diesel::sql_query(
        "SELECT decrypted_secret FROM vault.decrypted_secrets WHERE id = $1::uuid",
    )
    .bind::<Text, _>(secret_id)
    .get_result::<DecryptedSecret>(conn)
    .await
    .optional()
    .context("Failed to read secret from vault")?;

    Ok(row.and_then(|r| r.decrypted_secret))
}

/// Replace the secret value and/or rename it. `None` keeps the current value.
pub async fn update_secret(
    conn: &mut AsyncPgConnection,
    secret_id: &str,
    secret: Option<&str>,
    name: Option<&str>,
) -> anyhow::Result<()> {
    diesel::sql_query("SELECT vault.update_secret($1::uuid, $2, $3)")
        .bind::<Text, _>(secret_id)
        .bind::<Nullable<Text>, _>(secret)
        .bind::<Nullable<Text>, _>(name)
        .execute(conn)
        .await
        .context("Failed to update secret in vault")?;

    Ok(())
}

pub async fn delete_secret(conn: &mut AsyncPgConnection, secret_id: &str) -> anyhow::Result<()> {
    diesel::sql_query("DELETE FROM vault.secrets WHERE id = $1::uuid")
        .bind::<Text, _>(secret_id)
        .execute(conn)
        .await
        .context("Failed to delete secret from vault")?;

    Ok(())
}
