//! Telegram directory adapter — JSON calls to an MTProto gateway.
//!
//! Speaks to a locally running bot-api-style gateway: POST
//! `{base}/{method}` with a JSON body, `{ok: true, result}` on success and
//! `{ok: false, error_code, description, parameters}` on failure. Session
//! login itself happens out of band; `authorize` only verifies it.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::directory::{Directory, RemoteAccount};
use crate::error::DirectoryError;

/// Page size for member listings; paging stays inside this adapter.
const PARTICIPANT_PAGE_SIZE: usize = 200;

/// Fallback wait when the gateway flags flood control without a duration.
const DEFAULT_FLOOD_WAIT_SECS: u64 = 30;

/// Directory implementation backed by the HTTP gateway.
pub struct TelegramDirectory {
    base_url: String,
    api_id: i64,
    api_hash: SecretString,
    phone: String,
    client: reqwest::Client,
}

impl TelegramDirectory {
    pub fn new(base_url: String, api_id: i64, api_hash: SecretString, phone: String) -> Self {
        Self {
            base_url,
            api_id,
            api_hash,
            phone,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url.trim_end_matches('/'))
    }

    /// Issue one gateway call and unwrap the response envelope.
    async fn call(&self, method: &str, params: Value) -> Result<Value, DirectoryError> {
        let body = json!({
            "api_id": self.api_id,
            "api_hash": self.api_hash.expose_secret(),
            "phone": self.phone,
            "params": params,
        });

        let resp = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| DirectoryError::Http(e.to_string()))?;

        let status = resp.status();
        let data: Value = resp.json().await.map_err(|e| {
            DirectoryError::Http(format!("{method} returned non-JSON ({status}): {e}"))
        })?;

        if data.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(data.get("result").cloned().unwrap_or(Value::Null));
        }

        Err(classify_api_error(&data, status.as_u16()))
    }
}

/// Map a gateway error envelope onto `DirectoryError`.
fn classify_api_error(data: &Value, http_status: u16) -> DirectoryError {
    let code = data
        .get("error_code")
        .and_then(Value::as_i64)
        .unwrap_or(i64::from(http_status));
    let description = data
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if let Some(secs) = flood_wait_secs(code, &description, data.get("parameters")) {
        return DirectoryError::FloodWait {
            retry_after: Duration::from_secs(secs),
        };
    }
    if description.contains("PRIVACY") {
        return DirectoryError::PrivacyRestricted;
    }
    if code == 401 || description.contains("AUTH_KEY") || description.contains("SESSION") {
        return DirectoryError::AuthFailed {
            reason: description,
        };
    }
    DirectoryError::Api { code, description }
}

/// Flood control arrives as code 420 with a `FLOOD_WAIT_<secs>` description,
/// or as HTTP 429 with `parameters.retry_after`.
fn flood_wait_secs(code: i64, description: &str, parameters: Option<&Value>) -> Option<u64> {
    if let Some(secs) = parameters
        .and_then(|p| p.get("retry_after"))
        .and_then(Value::as_u64)
    {
        return Some(secs);
    }
    if code == 420 || code == 429 || description.starts_with("FLOOD_WAIT") {
        let parsed = description.rsplit('_').next().and_then(|s| s.parse().ok());
        return Some(parsed.unwrap_or(DEFAULT_FLOOD_WAIT_SECS));
    }
    None
}

#[async_trait]
impl Directory for TelegramDirectory {
    async fn authorize(&self) -> Result<(), DirectoryError> {
        let result = self.call("auth.status", json!({})).await?;
        let authorized = result
            .get("authorized")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if authorized {
            tracing::info!(phone = %self.phone, "Session authorized");
            Ok(())
        } else {
            Err(DirectoryError::AuthFailed {
                reason: "session is not authorized; log in on the gateway first".into(),
            })
        }
    }

    async fn import_contact(
        &self,
        identity: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<RemoteAccount>, DirectoryError> {
        let result = self
            .call(
                "contacts.importContacts",
                json!({
                    "contacts": [{
                        "client_id": 0,
                        "phone": identity,
                        "first_name": first_name,
                        "last_name": last_name,
                    }],
                }),
            )
            .await?;

        // An empty users list means the number is not registered.
        let users = result
            .get("users")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        match users.into_iter().next() {
            Some(user) => {
                let account: RemoteAccount =
                    serde_json::from_value(user).map_err(|e| DirectoryError::Api {
                        code: 0,
                        description: format!("malformed user object: {e}"),
                    })?;
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    async fn invite_to_group(
        &self,
        account: &RemoteAccount,
        group: &str,
    ) -> Result<(), DirectoryError> {
        self.call(
            "channels.inviteToChannel",
            json!({
                "channel": group,
                "users": [{
                    "user_id": account.user_id,
                    "access_hash": account.access_hash,
                }],
            }),
        )
        .await?;
        Ok(())
    }

    async fn is_group_member(&self, group: &str, user_id: i64) -> Result<bool, DirectoryError> {
        let mut offset = 0usize;
        loop {
            let result = self
                .call(
                    "channels.getParticipants",
                    json!({
                        "channel": group,
                        "filter": "search",
                        "query": "",
                        "offset": offset,
                        "limit": PARTICIPANT_PAGE_SIZE,
                    }),
                )
                .await?;

            let users = result
                .get("users")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if users
                .iter()
                .any(|u| u.get("id").and_then(Value::as_i64) == Some(user_id))
            {
                return Ok(true);
            }
            // Short page: we've seen the whole member list.
            if users.len() < PARTICIPANT_PAGE_SIZE {
                return Ok(false);
            }
            offset += users.len();
        }
    }

    async fn send_direct_message(
        &self,
        account: &RemoteAccount,
        text: &str,
    ) -> Result<(), DirectoryError> {
        self.call(
            "messages.sendMessage",
            json!({
                "user_id": account.user_id,
                "access_hash": account.access_hash,
                "message": text,
            }),
        )
        .await?;
        Ok(())
    }

    async fn delete_contact(&self, account: &RemoteAccount) -> Result<(), DirectoryError> {
        self.call(
            "contacts.deleteContacts",
            json!({
                "ids": [{
                    "user_id": account.user_id,
                    "access_hash": account.access_hash,
                }],
            }),
        )
        .await?;
        Ok(())
    }

    async fn list_contacts(&self) -> Result<Vec<RemoteAccount>, DirectoryError> {
        let result = self.call("contacts.getContacts", json!({"hash": 0})).await?;
        let users = result
            .get("users")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        users
            .into_iter()
            .map(|u| {
                serde_json::from_value(u).map_err(|e| DirectoryError::Api {
                    code: 0,
                    description: format!("malformed contact object: {e}"),
                })
            })
            .collect()
    }
}
