use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::auth::require_auth;
use crate::handlers::{accounts, ai, chat, health_check, mails, todos};
use crate::AppState;

pub fn api_routes(state: AppState) -> Router {
    let protected = Router::new()
        // Email account routes
        .route("/mail/accounts/add", post(accounts::add_account))
        .route("/mail/accounts/get", get(accounts::list_accounts))
        .route("/mail/accounts/update", put(accounts::update_account))
        .route("/mail/accounts/delete", delete(accounts::delete_account))
        // Mailbox routes
        .route("/mails/get", get(mails::list_emails))
        .route("/mails/detail", get(mails::email_detail))
        .route("/mails/attachment", get(mails::download_attachment))
        // Todo routes
        .route("/todos/add", post(todos::create_todo))
        .route("/todos/get", post(todos::list_todos))
        .route("/todos/update", put(todos::update_todo))
        .route("/todos/delete", post(todos::delete_todo))
        .route("/todos/ai/summarize", post(ai::summarize_email))
        // Assistant chat
        .route("/chat", post(chat::chat))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", protected)
        .with_state(state)
}
