use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

// -- Messages --

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<u32>,
}

// -- Seen --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenRequest {
    pub user_id: String,
}

// -- Push registration --

/// Delivery goes through FCM only, so the endpoint must be an FCM device token.
/// `keys` is captured just to recognise a browser `PushSubscription`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub user_id: String,
    #[serde(alias = "token")]
    pub endpoint: String,
    #[serde(default)]
    pub keys: Option<IgnoredAny>,
}

impl SubscribeRequest {
    /// A web-push subscription: a push-service URL with encryption keys.
    pub fn is_web_push(&self) -> bool {
        self.keys.is_some() || looks_like_url(&self.endpoint)
    }
}

/// FCM tokens never contain a scheme separator; push-service endpoints always do.
pub fn looks_like_url(endpoint: &str) -> bool {
    endpoint.contains("://")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SaveTokenRequest {
    pub user_id: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_browser_push_subscriptions() {
        let web: SubscribeRequest = serde_json::from_str(
            r#"{"userId":"9746","endpoint":"https://push.example/abc","keys":{"p256dh":"x","auth":"y"}}"#,
        )
        .unwrap();
        assert!(web.is_web_push());

        let keyless: SubscribeRequest =
            serde_json::from_str(r#"{"userId":"9746","endpoint":"https://push.example/abc"}"#).unwrap();
        assert!(keyless.is_web_push());

        let fcm: SubscribeRequest =
            serde_json::from_str(r#"{"userId":"9746","token":"dGVzdA:APA91b-token"}"#).unwrap();
        assert!(!fcm.is_web_push());
        assert_eq!(fcm.endpoint, "dGVzdA:APA91b-token");
    }

    #[test]
    fn seen_tolerates_extra_fields() {
        let req: SeenRequest =
            serde_json::from_str(r#"{"userId":"9492","at":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(req.user_id, "9492");
    }
}
