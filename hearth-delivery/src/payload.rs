use serde::Serialize;
use std::collections::BTreeMap;

/// Provider-agnostic notification. `data` values are strings because the v1
/// API rejects any other JSON type inside `message.data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct V1Request<'a> {
    pub message: V1Message<'a>,
}

#[derive(Debug, Serialize)]
pub struct V1Message<'a> {
    pub token: &'a str,
    pub notification: V1Notification<'a>,
    pub data: &'a BTreeMap<String, String>,
    pub android: V1Android,
    pub apns: V1Apns,
}

#[derive(Debug, Serialize)]
pub struct V1Notification<'a> {
    pub title: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub struct V1Android {
    pub priority: &'static str,
}

#[derive(Debug, Serialize)]
pub struct V1Apns {
    pub payload: V1ApnsPayload,
}

#[derive(Debug, Serialize)]
pub struct V1ApnsPayload {
    pub aps: V1Aps,
}

#[derive(Debug, Serialize)]
pub struct V1Aps {
    pub sound: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LegacyRequest<'a> {
    pub registration_ids: &'a [String],
    pub notification: LegacyNotification<'a>,
    pub data: &'a BTreeMap<String, String>,
    pub priority: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LegacyNotification<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub sound: &'static str,
    pub badge: &'static str,
    pub android_channel_id: &'a str,
}

impl PushPayload {
    pub fn v1_request<'a>(&'a self, token: &'a str) -> V1Request<'a> {
        V1Request {
            message: V1Message {
                token,
                notification: V1Notification {
                    title: &self.title,
                    body: &self.body,
                },
                data: &self.data,
                android: V1Android { priority: "HIGH" },
                apns: V1Apns {
                    payload: V1ApnsPayload {
                        aps: V1Aps { sound: "default" },
                    },
                },
            },
        }
    }

    pub fn legacy_request<'a>(
        &'a self,
        registration_ids: &'a [String],
        android_channel_id: &'a str,
    ) -> LegacyRequest<'a> {
        LegacyRequest {
            registration_ids,
            notification: LegacyNotification {
                title: &self.title,
                body: &self.body,
                sound: "default",
                badge: "1",
                android_channel_id,
            },
            data: &self.data,
            priority: "high",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> PushPayload {
        PushPayload {
            title: "New photo".to_string(),
            body: "Sam shared beach.jpg".to_string(),
            data: BTreeMap::from([
                ("type".to_string(), "image".to_string()),
                ("image_id".to_string(), "img_1".to_string()),
            ]),
        }
    }

    #[test]
    fn v1_body_shape() {
        let body = serde_json::to_value(payload().v1_request("tok_a")).unwrap();
        assert_eq!(
            body,
            json!({
                "message": {
                    "token": "tok_a",
                    "notification": {"title": "New photo", "body": "Sam shared beach.jpg"},
                    "data": {"type": "image", "image_id": "img_1"},
                    "android": {"priority": "HIGH"},
                    "apns": {"payload": {"aps": {"sound": "default"}}}
                }
            })
        );
    }

    #[test]
    fn legacy_body_shape() {
        let tokens = vec!["tok_a".to_string(), "tok_b".to_string()];
        let p = payload();
        let body = serde_json::to_value(p.legacy_request(&tokens, "photos")).unwrap();
        assert_eq!(body["registration_ids"], json!(["tok_a", "tok_b"]));
        assert_eq!(body["priority"], "high");
        assert_eq!(body["notification"]["android_channel_id"], "photos");
        assert_eq!(body["notification"]["sound"], "default");
        assert_eq!(body["data"]["image_id"], "img_1");
    }
}
