use axum::{
    body::{Body, Bytes},
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use futures::StreamExt;

use shared::api::ChatRequest;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// One line of the data-stream wire format: `<code>:<json>\n`.
/// Code `0` carries a text delta, `3` an error.
fn stream_part(code: u8, text: String) -> Bytes {
    Bytes::from(format!("{}:{}\n", code, serde_json::Value::String(text)))
}

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<axum::Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let axum::Json(request) = payload?;
    if request.messages.is_empty() {
        return Err(ApiError::bad_request("Messages are required"));
    }

    let deltas = state.chat.stream(request.messages).await?;
    let body = deltas.map(|delta| {
        Ok::<_, std::convert::Infallible>(match delta {
            Ok(text) => stream_part(0, text),
            Err(e) => {
                tracing::error!("Chat stream failed: {:#}", e);
                stream_part(3, "An error occurred.".to_string())
            }
        })
    });

    let mut response = Body::from_stream(body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert("x-vercel-ai-data-stream", HeaderValue::from_static("v1"));
    Ok(response)
}
