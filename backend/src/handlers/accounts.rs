use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Extension, Json,
};
use validator::Validate;

use shared::api::{
    AccountResponse, AddAccountRequest, DeleteAccountQuery, ListAccountsResponse,
    MessageResponse, UpdateAccountRequest,
};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const NOT_OWNED: &str = "Account not found or access denied";

pub async fn add_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<AddAccountRequest>, JsonRejection>,
) -> ApiResult<Json<AccountResponse>> {
    let Json(request) = payload?;
    request.validate()?;

    let row = state.accounts.create(user.id, request.into()).await?;
    tracing::info!(user_id = %user.id, account_id = row.id, "Added email account");

    Ok(Json(AccountResponse {
        success: true,
        account: row.into(),
        message: None,
    }))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<ListAccountsResponse>> {
    let rows = state.accounts.list(user.id).await?;

    Ok(Json(ListAccountsResponse {
        success: true,
        accounts: rows.into_iter().map(Into::into).collect(),
    }))
}

pub async fn update_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> ApiResult<Json<AccountResponse>> {
    let Json(request) = payload?;
    let id = request
        .id
        .ok_or_else(|| ApiError::bad_request("Account ID is required"))?;
    request.validate()?;

    let row = state
        .accounts
        .update(user.id, id, request.updates.into())
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_OWNED))?;
    tracing::info!(user_id = %user.id, account_id = id, "Updated email account");

    Ok(Json(AccountResponse {
        success: true,
        account: row.into(),
        message: Some("Email account updated successfully".to_string()),
    }))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<DeleteAccountQuery>, QueryRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Query(query) = query?;
    let id = query
        .id
        .ok_or_else(|| ApiError::bad_request("Account ID is required"))?;
    query
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::bad_request("Email address is required"))?;

    if !state.accounts.delete(user.id, id).await? {
        return Err(ApiError::not_found(NOT_OWNED));
    }
    tracing::info!(user_id = %user.id, account_id = id, "Deleted email account");

    Ok(Json(MessageResponse::new("Email account deleted successfully")))
}
