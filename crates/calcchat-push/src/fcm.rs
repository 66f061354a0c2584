//! Firebase Cloud Messaging (HTTP v1) sender.
//!
//! Auth follows the service-account flow: sign an RS256 JWT assertion with the
//! account's private key, trade it for an OAuth2 access token, cache the token
//! until shortly before it expires.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use futures_util::future::BoxFuture;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::sender::{PushError, PushPayload, PushSender};

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh the access token this long before Google says it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const NOTIFICATION_ICON: &str = "/logo192.png";

/// The subset of a Firebase service-account JSON file we need.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccount {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading service account {}", path.display()))?;
        let account = serde_json::from_str(&raw)
            .with_context(|| format!("parsing service account {}", path.display()))?;
        Ok(account)
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

pub struct FcmSender {
    client: reqwest::Client,
    account: ServiceAccount,
    key: EncodingKey,
    send_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl FcmSender {
    pub fn new(account: ServiceAccount) -> anyhow::Result<Self> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .context("service account private_key is not a valid RSA PEM")?;
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let send_url = format!(
            "https://fcm.googleapis.com/v1/projects/{}/messages:send",
            account.project_id
        );

        info!("FCM push enabled for project {}", account.project_id);
        Ok(Self {
            client,
            account,
            key,
            send_url,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, PushError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: FCM_SCOPE,
            aud: &self.account.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| PushError::Auth(e.to_string()))?;

        let resp = self
            .client
            .post(&self.account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PushError::Auth(format!("token exchange {}: {}", status, body)));
        }

        let token: TokenResponse = resp.json().await?;
        debug!("Fetched FCM access token, valid for {}s", token.expires_in);

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        let value = token.access_token;
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    async fn deliver(&self, device_token: &str, payload: &PushPayload) -> Result<(), PushError> {
        let access_token = self.access_token().await?;

        let body = json!({
            "message": {
                "token": device_token,
                "notification": {
                    "title": payload.title,
                    "body": payload.body,
                },
                "webpush": {
                    "notification": { "icon": NOTIFICATION_ICON }
                }
            }
        });

        let resp = self
            .client
            .post(&self.send_url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(classify_failure(status, body))
    }
}

impl PushSender for FcmSender {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        payload: &'a PushPayload,
    ) -> BoxFuture<'a, Result<(), PushError>> {
        Box::pin(self.deliver(endpoint, payload))
    }
}

/// FCM answers 404 `UNREGISTERED` for tokens that will never work again,
/// and 400 with this message for strings that were never tokens at all.
const INVALID_TOKEN_MESSAGE: &str = "not a valid FCM registration token";

fn classify_failure(status: StatusCode, body: String) -> PushError {
    let invalid_token = status == StatusCode::BAD_REQUEST && body.contains(INVALID_TOKEN_MESSAGE);
    if status == StatusCode::NOT_FOUND || body.contains("UNREGISTERED") || invalid_token {
        PushError::Gone
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        PushError::Auth(body)
    } else {
        PushError::Rejected {
            status: status.as_u16(),
            body,
        }
    }
}
