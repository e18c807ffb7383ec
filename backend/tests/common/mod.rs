//! Shared harness: the real router over an in-memory store, a canned
//! mailbox and a scripted LLM.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use futures::stream;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use mailai_backend::auth::{create_token, JwtVerifier};
use mailai_backend::llm::{ChatStreamer, LlmError, TaskExtraction, TaskExtractor, TextStream};
use mailai_backend::mail::mime::MimePart;
use mailai_backend::mail::{parse, Attachment, ImapSettings, MailError, MailFetcher};
use mailai_backend::models::AccountRow;
use mailai_backend::store::{AccountStore, MemoryStore};
use mailai_backend::{build_router, AppState};
use shared::api::{AddAccountRequest, ChatMessage, SummarizeEmail};
use shared::models::EmailMessage;

pub const JWT_SECRET: &str = "test-secret";

pub const MESSAGE_UID: u32 = 42;

pub const SAMPLE_MESSAGE: &str = concat!(
    "From: Alice <alice@example.com>\r\n",
    "To: Bob <bob@example.com>\r\n",
    "Subject: Quarterly report\r\n",
    "Date: Tue, 3 Jun 2025 09:30:00 +0000\r\n",
    "MIME-Version: 1.0\r\n",
    "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
    "\r\n",
    "--outer\r\n",
    "Content-Type: text/plain; charset=utf-8\r\n",
    "\r\n",
    "Please review the report before Friday.\r\n",
    "--outer\r\n",
    "Content-Type: application/pdf; name=\"report.pdf\"\r\n",
    "Content-Disposition: attachment; filename=\"report.pdf\"\r\n",
    "Content-Transfer-Encoding: base64\r\n",
    "\r\n",
    "JVBERi0xLjQK\r\n",
    "--outer--\r\n",
);

/// Serves [`SAMPLE_MESSAGE`] as the only message in every inbox.
pub struct CannedMailbox;

#[async_trait]
impl MailFetcher for CannedMailbox {
    async fn list_recent(
        &self,
        _settings: &ImapSettings,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EmailMessage>, MailError> {
        let message = parse::parse_message(MESSAGE_UID, SAMPLE_MESSAGE.as_bytes(), Vec::new())?;
        Ok(std::iter::once(message).skip(offset).take(limit).collect())
    }

    async fn fetch_detail(
        &self,
        _settings: &ImapSettings,
        uid: u32,
    ) -> Result<EmailMessage, MailError> {
        if uid != MESSAGE_UID {
            return Err(MailError::MessageNotFound);
        }
        parse::parse_message(uid, SAMPLE_MESSAGE.as_bytes(), Vec::new())
    }

    async fn fetch_attachment(
        &self,
        _settings: &ImapSettings,
        uid: u32,
        part_id: &str,
    ) -> Result<Attachment, MailError> {
        if uid != MESSAGE_UID {
            return Err(MailError::MessageNotFound);
        }
        let parsed = mailparse::parse_mail(SAMPLE_MESSAGE.as_bytes())
            .map_err(|e| MailError::Parse(e.to_string()))?;
        let tree = MimePart::from_parsed(&parsed);
        let part = tree.find_attachment(part_id).ok_or(MailError::PartNotFound)?;

        Ok(Attachment {
            bytes: b"%PDF-1.4\n".to_vec(),
            content_type: part.content_type.clone(),
            filename: part.filename.clone().unwrap_or_default(),
        })
    }
}

/// Returns a fixed extraction and a fixed chat reply, recording what it saw.
#[derive(Default)]
pub struct ScriptedLlm {
    pub extraction: Mutex<TaskExtraction>,
    pub chat_deltas: Vec<String>,
    pub seen_emails: Mutex<Vec<SummarizeEmail>>,
}

#[async_trait]
impl TaskExtractor for ScriptedLlm {
    async fn extract(&self, email: &SummarizeEmail) -> Result<TaskExtraction, LlmError> {
        self.seen_emails.lock().unwrap().push(email.clone());
        Ok(self.extraction.lock().unwrap().clone())
    }
}

#[async_trait]
impl ChatStreamer for ScriptedLlm {
    async fn stream(&self, _messages: Vec<ChatMessage>) -> Result<TextStream, LlmError> {
        let deltas: Vec<anyhow::Result<String>> =
            self.chat_deltas.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(deltas)))
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub llm: Arc<ScriptedLlm>,
}

pub fn test_app() -> TestApp {
    test_app_with_llm(ScriptedLlm {
        chat_deltas: vec!["Hel".to_string(), "lo \"there\"".to_string()],
        ..Default::default()
    })
}

pub fn test_app_with_llm(llm: ScriptedLlm) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let llm = Arc::new(llm);

    let state = AppState {
        accounts: store.clone(),
        todos: store.clone(),
        verifier: Arc::new(JwtVerifier::new(JWT_SECRET)),
        mail: Arc::new(CannedMailbox),
        tasks: llm.clone(),
        chat: llm.clone(),
    };

    TestApp {
        router: build_router(state, CorsLayer::permissive()),
        store,
        llm,
    }
}

pub fn token_for(user: Uuid) -> String {
    create_token(
        JWT_SECRET,
        user,
        Some("user@example.com"),
        chrono::Duration::hours(1),
    )
    .unwrap()
}

pub fn json_request(method: &str, uri: &str, user: Uuid, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str, user: Uuid) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_to_json(body: Body) -> serde_json::Value {
    serde_json::from_str(&body_to_string(body).await).unwrap()
}

pub fn account_payload(email: &str) -> serde_json::Value {
    serde_json::json!({
        "email": email,
        "password": "app-password",
        "imapServerAddress": "imap.example.com",
        "imapServerPort": 993,
        "imapEncryption": "SSL/TLS"
    })
}

/// Insert an account directly, bypassing HTTP
pub async fn seed_account(store: &MemoryStore, owner: Uuid, email: &str) -> AccountRow {
    let request: AddAccountRequest = serde_json::from_value(account_payload(email)).unwrap();
    AccountStore::create(store, owner, request.into()).await.unwrap()
}
