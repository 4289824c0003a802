//! Bot API client over HTTPS.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use gatekeeper_types::{ChatId, UserId};

use crate::api::{ChatMetadata, Gateway};
use crate::error::GatewayError;
use crate::updates::Update;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra time granted to a long-poll request beyond its server-side timeout.
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub api_base_url: String,
    pub bot_token: String,
    pub request_timeout: Duration,
}

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatInfo {
    title: Option<String>,
    username: Option<String>,
    first_name: Option<String>,
}

pub struct TelegramClient {
    http_client: reqwest::Client,
    /// `{base}/bot{token}`; never logged.
    endpoint: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            endpoint: format!(
                "{}/bot{}",
                config.api_base_url.trim_end_matches('/'),
                config.bot_token
            ),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<T, GatewayError> {
        let url = format!("{}/{method}", self.endpoint);
        let mut request = self.http_client.post(&url).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // Strip the URL from transport errors: it embeds the bot token.
        let response = request.send().await.map_err(|e| {
            let e = e.without_url();
            if e.is_timeout() {
                GatewayError::Unreachable(format!("{method} timed out: {e}"))
            } else if e.is_connect() {
                GatewayError::Unreachable(format!("{method} connection failed: {e}"))
            } else {
                GatewayError::Unreachable(format!("{method}: {e}"))
            }
        })?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| {
            GatewayError::Unreachable(format!("{method} body read failed: {}", e.without_url()))
        })?;

        let result = decode_response(status, &bytes);
        if let Err(e) = &result {
            tracing::debug!(method, status, error = %e, "bot api call failed");
        }
        result
    }

    /// Fetch the next batch of updates after `offset`, waiting up to `timeout_secs`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
        allowed_updates: &[&str],
    ) -> Result<Vec<Update>, GatewayError> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": allowed_updates,
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        let deadline = Duration::from_secs(timeout_secs) + LONG_POLL_GRACE;
        self.call("getUpdates", &body, Some(deadline)).await
    }

    /// Bot identity; used at startup to check the token.
    pub async fn get_me(&self) -> Result<crate::updates::User, GatewayError> {
        self.call("getMe", &json!({}), None).await
    }
}

/// Map a Bot API HTTP response to a typed result.
pub(crate) fn decode_response<T: DeserializeOwned>(
    status: u16,
    body: &[u8],
) -> Result<T, GatewayError> {
    let envelope: ApiResponse<T> = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) if status >= 500 => {
            return Err(GatewayError::Unavailable(format!("HTTP {status}: {e}")))
        }
        Err(e) => return Err(GatewayError::InvalidResponse(e.to_string())),
    };

    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| GatewayError::InvalidResponse("ok response without result".into()));
    }

    let code = envelope.error_code.unwrap_or(status);
    let description = envelope
        .description
        .unwrap_or_else(|| format!("HTTP {code}"));
    let retry_after = envelope.parameters.and_then(|p| p.retry_after);
    Err(classify_error(code, description, retry_after))
}

fn classify_error(code: u16, description: String, retry_after: Option<u64>) -> GatewayError {
    match code {
        401 | 403 => GatewayError::Forbidden(description),
        404 => GatewayError::NotFound(description),
        429 => GatewayError::RateLimited {
            retry_after: retry_after.unwrap_or(1),
        },
        400 if description.to_ascii_lowercase().contains("not found") => {
            GatewayError::NotFound(description)
        }
        400..=499 => GatewayError::BadRequest(description),
        _ => GatewayError::Unavailable(description),
    }
}

#[async_trait]
impl Gateway for TelegramClient {
    async fn approve_join_request(&self, chat: ChatId, user: UserId) -> Result<(), GatewayError> {
        let body = json!({ "chat_id": chat.get(), "user_id": user.get() });
        self.call::<bool>("approveChatJoinRequest", &body, None)
            .await
            .map(drop)
    }

    async fn decline_join_request(&self, chat: ChatId, user: UserId) -> Result<(), GatewayError> {
        let body = json!({ "chat_id": chat.get(), "user_id": user.get() });
        self.call::<bool>("declineChatJoinRequest", &body, None)
            .await
            .map(drop)
    }

    async fn send_direct_message(&self, user: UserId, text: &str) -> Result<(), GatewayError> {
        let body = json!({
            "chat_id": user.get(),
            "text": text,
            "disable_web_page_preview": true,
        });
        self.call::<Value>("sendMessage", &body, None).await.map(drop)
    }

    async fn prompt_contact(&self, user: UserId, text: &str) -> Result<(), GatewayError> {
        let body = json!({
            "chat_id": user.get(),
            "text": text,
            "reply_markup": {
                "keyboard": [[{ "text": "Share my phone number", "request_contact": true }]],
                "one_time_keyboard": true,
                "resize_keyboard": true,
            },
        });
        self.call::<Value>("sendMessage", &body, None).await.map(drop)
    }

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<(), GatewayError> {
        let body = json!({ "chat_id": chat.get(), "user_id": user.get() });
        self.call::<bool>("banChatMember", &body, None)
            .await
            .map(drop)
    }

    async fn export_invite_link(&self, chat: ChatId) -> Result<String, GatewayError> {
        let body = json!({ "chat_id": chat.get() });
        self.call("exportChatInviteLink", &body, None).await
    }

    async fn get_chat_metadata(&self, chat: ChatId) -> Result<ChatMetadata, GatewayError> {
        let body = json!({ "chat_id": chat.get() });
        let info: ChatInfo = self.call("getChat", &body, None).await?;
        Ok(ChatMetadata {
            title: info
                .title
                .or(info.first_name)
                .unwrap_or_else(|| chat.to_string()),
            public_handle: info.username,
        })
    }
}
