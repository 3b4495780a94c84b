use chrono::{DateTime, SecondsFormat, Utc};
use hearth_core::{ContentKind, ContentRef};
use hearth_delivery::PushPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::resolver::RecipientSet;

/// Message text longer than this is cut before it becomes a notification body.
const MAX_BODY_CHARS: usize = 180;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationOverride {
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Inbound trigger for one dispatch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub content_id: String,
    #[serde(default, alias = "type")]
    pub content_type: ContentKind,
    #[serde(default)]
    pub notification: Option<NotificationOverride>,
    #[serde(default)]
    pub data: Option<serde_json::Map<String, Value>>,
}

impl DispatchRequest {
    pub fn for_content(content: &ContentRef) -> Self {
        Self {
            content_id: content.id.clone(),
            content_type: content.kind,
            notification: None,
            data: None,
        }
    }

    pub fn content_ref(&self) -> ContentRef {
        ContentRef {
            kind: self.content_type,
            id: self.content_id.trim().to_string(),
        }
    }

    fn data_str(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key)?.as_str()
    }
}

/// Builds the notification for a resolved run.
///
/// Title and body each fall back through: the explicit `notification` object,
/// then `title`/`body` entries in the request data, then text derived from the
/// content and its sender, then a generic default.
pub fn build_payload(request: &DispatchRequest, set: &RecipientSet, sent_at: DateTime<Utc>) -> PushPayload {
    let explicit = request.notification.as_ref();

    let title = first_non_empty([
        explicit.and_then(|n| n.title.as_deref()),
        request.data_str("title"),
    ])
    .or_else(|| derived_title(set))
    .unwrap_or_else(|| default_title(set.content.kind).to_string());

    let body = first_non_empty([
        explicit.and_then(|n| n.body.as_deref()),
        request.data_str("body"),
    ])
    .or_else(|| derived_body(set))
    .unwrap_or_else(|| default_body(set.content.kind).to_string());

    PushPayload {
        title,
        body,
        data: build_data(request, set, sent_at),
    }
}

fn first_non_empty<const N: usize>(candidates: [Option<&str>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn derived_title(set: &RecipientSet) -> Option<String> {
    let name = set.sender_name.as_deref()?;
    Some(match set.content.kind {
        ContentKind::Image => format!("New photo from {}", name),
        ContentKind::Message => format!("New message from {}", name),
    })
}

fn derived_body(set: &RecipientSet) -> Option<String> {
    let display = set.content.display.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    Some(match set.content.kind {
        ContentKind::Image => format!("Added {} to your gallery", display),
        ContentKind::Message => truncate(display, MAX_BODY_CHARS),
    })
}

fn default_title(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Image => "New photo",
        ContentKind::Message => "New message",
    }
}

fn default_body(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Image => "A new photo was added to your gallery",
        ContentKind::Message => "You have a new message",
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// Routing data for the client. Caller-supplied entries are kept, but the
/// routing keys below always reflect the resolved content.
fn build_data(request: &DispatchRequest, set: &RecipientSet, sent_at: DateTime<Utc>) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();

    if let Some(extra) = &request.data {
        for (key, value) in extra {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            data.insert(key.clone(), value);
        }
    }

    let content = &set.content;
    data.insert("type".to_string(), content.kind.as_str().to_string());
    data.insert("content_id".to_string(), content.id.clone());
    data.insert(content.kind.id_key().to_string(), content.id.clone());
    data.insert("household_id".to_string(), content.household_id.clone());
    data.insert("sender_id".to_string(), content.owner_id.clone());
    if let Some(created_at) = content.created_at {
        data.insert(
            "created_at".to_string(),
            created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
    }
    data.insert("sent_at".to_string(), sent_at.to_rfc3339_opts(SecondsFormat::Secs, true));

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hearth_core::Content;
    use serde_json::json;

    fn set(kind: ContentKind, display: Option<&str>, sender_name: Option<&str>) -> RecipientSet {
        RecipientSet {
            content: Content {
                kind,
                id: "c1".to_string(),
                owner_id: "u1".to_string(),
                household_id: "h1".to_string(),
                display: display.map(str::to_string),
                created_at: Some(Utc.with_ymd_and_hms(2024, 2, 14, 9, 30, 0).unwrap()),
            },
            recipients: vec!["u2".to_string()],
            tokens: vec!["tok".to_string()],
            sender_name: sender_name.map(str::to_string),
        }
    }

    fn request(value: Value) -> DispatchRequest {
        serde_json::from_value(value).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 14, 9, 31, 0).unwrap()
    }

    #[test]
    fn explicit_notification_wins() {
        let req = request(json!({
            "content_id": "c1",
            "notification": {"title": "Hi", "body": "Look"},
            "data": {"title": "ignored", "body": "ignored"}
        }));
        let p = build_payload(&req, &set(ContentKind::Image, Some("a.jpg"), Some("Sam")), now());
        assert_eq!(p.title, "Hi");
        assert_eq!(p.body, "Look");
    }

    #[test]
    fn data_fields_are_second() {
        let req = request(json!({
            "content_id": "c1",
            "notification": {"title": "  "},
            "data": {"title": "From data", "body": "Body from data"}
        }));
        let p = build_payload(&req, &set(ContentKind::Image, Some("a.jpg"), Some("Sam")), now());
        assert_eq!(p.title, "From data");
        assert_eq!(p.body, "Body from data");
    }

    #[test]
    fn content_then_default() {
        let req = request(json!({"content_id": "c1", "content_type": "message"}));

        let p = build_payload(&req, &set(ContentKind::Message, Some("dinner at 7?"), Some("Sam")), now());
        assert_eq!(p.title, "New message from Sam");
        assert_eq!(p.body, "dinner at 7?");

        let p = build_payload(&req, &set(ContentKind::Message, None, None), now());
        assert_eq!(p.title, "New message");
        assert_eq!(p.body, "You have a new message");
    }

    #[test]
    fn long_messages_are_truncated() {
        let long = "x".repeat(500);
        let req = request(json!({"content_id": "c1", "type": "message"}));
        let p = build_payload(&req, &set(ContentKind::Message, Some(&long), None), now());
        assert_eq!(p.body.chars().count(), MAX_BODY_CHARS);
        assert!(p.body.ends_with('…'));
    }

    #[test]
    fn data_bag_carries_routing_keys() {
        let req = request(json!({
            "content_id": "c1",
            "data": {"image_id": "spoofed", "album": "trip", "count": 3, "skip": null}
        }));
        let p = build_payload(&req, &set(ContentKind::Image, None, None), now());

        assert_eq!(p.data["type"], "image");
        assert_eq!(p.data["image_id"], "c1");
        assert_eq!(p.data["content_id"], "c1");
        assert_eq!(p.data["household_id"], "h1");
        assert_eq!(p.data["sender_id"], "u1");
        assert_eq!(p.data["created_at"], "2024-02-14T09:30:00Z");
        assert_eq!(p.data["sent_at"], "2024-02-14T09:31:00Z");
        assert_eq!(p.data["album"], "trip");
        assert_eq!(p.data["count"], "3");
        assert!(!p.data.contains_key("skip"));
    }

    #[test]
    fn request_defaults_to_image() {
        let req = request(json!({"content_id": " img_1 "}));
        assert_eq!(req.content_ref(), ContentRef::image("img_1"));
    }
}
