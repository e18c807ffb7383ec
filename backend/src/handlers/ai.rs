use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use shared::api::{DataResponse, SummarizeOutcome, SummarizeRequest};
use shared::models::TodoStatus;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::store::NewTodo;
use crate::AppState;

/// Ask the task recognizer about an email and save a todo if it is one.
pub async fn summarize_email(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult<Json<DataResponse<SummarizeOutcome>>> {
    let Json(request) = payload?;
    let email = request
        .email
        .ok_or_else(|| ApiError::bad_request("Missing email"))?;

    let extraction = state.tasks.extract(&email).await?;

    let Some(content) = extraction.task_content() else {
        tracing::debug!(user_id = %user.id, uid = ?email.uid, "Email is not a task");
        return Ok(Json(DataResponse::new(SummarizeOutcome::NotTask {
            is_task: false,
            message: "This email is not a task".to_string(),
        })));
    };

    let todo = state
        .todos
        .create(
            user.id,
            NewTodo {
                content: content.to_string(),
                status: TodoStatus::Pending,
                due_at: extraction.due_at(),
                email_address: email.to.clone(),
                email_uid: email.uid,
            },
        )
        .await?;
    tracing::info!(user_id = %user.id, todo_id = todo.id, "Saved task recognized from email");

    Ok(Json(DataResponse::new(SummarizeOutcome::Task {
        task: todo,
        message: "Task has been successfully recognized and saved".to_string(),
    })))
}
