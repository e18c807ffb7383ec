use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::types::AuthUser;
use super::{AuthError, TokenVerifier};

/// Asks the identity provider who a token belongs to
pub struct RemoteVerifier {
    client: reqwest::Client,
    user_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ProviderUser {
    id: Uuid,
    email: Option<String>,
}

impl RemoteVerifier {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_url: format!("{}/auth/v1/user", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
        }
    }
}

/// The provider reports failures as `msg`, `message` or `error_description`
fn provider_message(body: &serde_json::Value) -> Option<String> {
    ["msg", "message", "error_description"]
        .iter()
        .find_map(|key| body.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[async_trait]
impl TokenVerifier for RemoteVerifier {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .client
            .get(&self.user_url)
            .bearer_auth(token)
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Identity provider request failed: {}", e);
                AuthError::Unavailable(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Option<serde_json::Value> = response.json().await.ok();
            tracing::debug!(%status, "Identity provider rejected token");
            return Err(body
                .as_ref()
                .and_then(provider_message)
                .map(AuthError::Rejected)
                .unwrap_or(AuthError::InvalidToken));
        }

        let user: ProviderUser = response
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        Ok(AuthUser {
            id: user.id,
            email: user.email,
        })
    }
}
