use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::{devices, images, messages};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Image,
    Message,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Image => "image",
            ContentKind::Message => "message",
        }
    }

    /// Key under which the content id is exposed to clients, e.g. `image_id`.
    pub fn id_key(&self) -> &'static str {
        match self {
            ContentKind::Image => "image_id",
            ContentKind::Message => "message_id",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the row that triggered a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub id: String,
}

impl ContentRef {
    pub fn image(id: impl Into<String>) -> Self {
        Self { kind: ContentKind::Image, id: id.into() }
    }

    pub fn message(id: impl Into<String>) -> Self {
        Self { kind: ContentKind::Message, id: id.into() }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// An image or message as read by the pipeline. Never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub kind: ContentKind,
    pub id: String,
    pub owner_id: String,
    pub household_id: String,
    /// File name for images, message text for messages.
    pub display: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = images)]
pub struct ImageRow {
    pub id: String,
    pub user_id: String,
    pub household_id: String,
    pub file_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<ImageRow> for Content {
    fn from(row: ImageRow) -> Self {
        Content {
            kind: ContentKind::Image,
            id: row.id,
            owner_id: row.user_id,
            household_id: row.household_id,
            display: row.file_name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = messages)]
pub struct MessageRow {
    pub id: String,
    pub user_id: String,
    pub household_id: String,
    pub text: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<MessageRow> for Content {
    fn from(row: MessageRow) -> Self {
        Content {
            kind: ContentKind::Message,
            id: row.id,
            owner_id: row.user_id,
            household_id: row.household_id,
            display: row.text,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdMembership {
    pub household_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRegistration {
    pub user_id: String,
    pub token: String,
    pub platform: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = devices)]
pub struct NewDeviceRegistration<'a> {
    pub user_id: &'a str,
    pub token: &'a str,
    pub platform: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

/// Shortens a device token for log output.
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(8).collect();
    if visible.len() < token.len() {
        format!("{}…", visible)
    } else {
        visible
    }
}
