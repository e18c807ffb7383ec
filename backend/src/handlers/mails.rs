use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};

use shared::api::{
    AccountBrief, AttachmentQuery, EmailDetailQuery, EmailDetailResponse, ListEmailsQuery,
    ListEmailsResponse,
};
use shared::models::EmailAccount;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::mail::ImapSettings;
use crate::models::AccountRow;
use crate::AppState;

pub const DEFAULT_LIST_LIMIT: usize = 10;
pub const MAX_LIST_LIMIT: usize = 50;

/// Load the caller's account and build IMAP settings with its vaulted password
async fn open_account(
    state: &AppState,
    user: &AuthUser,
    account_id: i32,
) -> ApiResult<(AccountRow, ImapSettings)> {
    let account = state
        .accounts
        .get(user.id, account_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email account not found or access denied"))?;

    let password = state
        .accounts
        .password(&account)
        .await?
        .ok_or_else(|| ApiError::internal("Failed to retrieve email password"))?;

    let settings = ImapSettings::from_account(&account, password)?;
    Ok((account, settings))
}

pub async fn list_emails(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<ListEmailsQuery>, QueryRejection>,
) -> ApiResult<Json<ListEmailsResponse>> {
    let Query(query) = query?;
    let account_id = query
        .account_id
        .ok_or_else(|| ApiError::bad_request("Account ID is required"))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let (account, settings) = open_account(&state, &user, account_id).await?;
    tracing::debug!(account_id, limit, offset, "Listing recent emails");

    let emails = state.mail.list_recent(&settings, limit, offset).await?;
    let account = EmailAccount::from(account);

    Ok(Json(ListEmailsResponse {
        success: true,
        total: emails.len(),
        emails,
        account: AccountBrief::from(&account),
    }))
}

pub async fn email_detail(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<EmailDetailQuery>, QueryRejection>,
) -> ApiResult<Json<EmailDetailResponse>> {
    let Query(query) = query?;
    let (Some(account_id), Some(uid)) = (query.account_id, query.uid) else {
        return Err(ApiError::bad_request("Account ID and UID are required"));
    };

    let (_, settings) = open_account(&state, &user, account_id).await?;
    tracing::debug!(account_id, uid, "Fetching email detail");

    let email = state.mail.fetch_detail(&settings, uid).await?;
    Ok(Json(EmailDetailResponse {
        success: true,
        email,
    }))
}

pub async fn download_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<AttachmentQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let (Some(account_id), Some(uid), Some(part_id)) =
        (query.account_id, query.uid, query.part_id.filter(|p| !p.is_empty()))
    else {
        return Err(ApiError::bad_request("accountId, uid, partID are required"));
    };

    let (_, settings) = open_account(&state, &user, account_id).await?;
    tracing::debug!(account_id, uid, part_id = %part_id, "Downloading attachment");

    let attachment = state.mail.fetch_attachment(&settings, uid, &part_id).await?;
    let disposition = attachment.content_disposition();
    let length = attachment.bytes.len().to_string();

    Ok((
        [
            (header::CONTENT_TYPE, attachment.content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, length),
        ],
        attachment.bytes,
    )
        .into_response())
}
