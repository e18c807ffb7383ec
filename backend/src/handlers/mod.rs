pub mod accounts;
pub mod ai;
pub mod chat;
pub mod mails;
pub mod todos;

use axum::http::StatusCode;

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
