use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use validator::Validate;

use shared::api::{
    CreateTodoRequest, DataResponse, DeleteTodoRequest, ListTodosRequest, SuccessResponse,
    UpdateTodoRequest,
};
use shared::models::Todo;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub async fn create_todo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> ApiResult<Json<DataResponse<Todo>>> {
    let Json(request) = payload?;
    request.validate()?;

    let todo = state.todos.create(user.id, request.into()).await?;
    Ok(Json(DataResponse::new(todo)))
}

pub async fn list_todos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ListTodosRequest>, JsonRejection>,
) -> ApiResult<Json<DataResponse<Vec<Todo>>>> {
    let Json(request) = payload?;

    let todos = state.todos.list(user.id, request.page).await?;
    Ok(Json(DataResponse::new(todos)))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> ApiResult<Json<DataResponse<Todo>>> {
    let Json(request) = payload?;
    let id = request
        .id
        .ok_or_else(|| ApiError::bad_request("Missing todo id"))?;
    request.validate()?;

    let todo = state
        .todos
        .update(user.id, id, request.into())
        .await?
        .ok_or_else(|| ApiError::not_found("ToDo not found or not authorized"))?;

    Ok(Json(DataResponse::new(todo)))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<DeleteTodoRequest>, JsonRejection>,
) -> ApiResult<Json<SuccessResponse>> {
    let Json(request) = payload?;
    let id = request.id.ok_or_else(|| ApiError::bad_request("Missing id"))?;

    if !state.todos.delete(user.id, id).await? {
        return Err(ApiError::not_found("ToDo not found or unauthorized"));
    }

    Ok(Json(SuccessResponse { success: true }))
}
