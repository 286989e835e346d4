use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::user::UserPublic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Diaper,
    Sleep,
    Feed,
    Other,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionType::Diaper => "diaper",
            ActionType::Sleep => "sleep",
            ActionType::Feed => "feed",
            ActionType::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ActionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diaper" => Ok(ActionType::Diaper),
            "sleep" => Ok(ActionType::Sleep),
            "feed" => Ok(ActionType::Feed),
            "other" => Ok(ActionType::Other),
            _ => Err(anyhow::anyhow!("Unknown action type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiaperKind {
    Pee,
    Poo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaperDetails {
    #[serde(rename = "type")]
    pub kind: DiaperKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Shared shape for sleep and feed sessions. `end_time: None` marks an
/// in-progress session; a later update against the same action supplies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedDetails {
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherDetails {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

/// The `details` payload, whose shape is keyed by the action type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionDetails {
    Diaper(DiaperDetails),
    Timed(TimedDetails),
    Other(OtherDetails),
}

impl ActionDetails {
    /// Validates a raw details payload against the action type. Absent
    /// details are treated as `{}` upstream, so required fields surface as
    /// 400s here rather than as opaque persistence failures.
    pub fn validate(action_type: ActionType, raw: Value) -> Result<ActionDetails, ApiError> {
        let invalid =
            |e: serde_json::Error| ApiError::Validation(format!("Invalid details for '{action_type}' action: {e}"));
        match action_type {
            ActionType::Diaper => serde_json::from_value::<DiaperDetails>(raw)
                .map(ActionDetails::Diaper)
                .map_err(invalid),
            ActionType::Sleep | ActionType::Feed => serde_json::from_value::<TimedDetails>(raw)
                .map(ActionDetails::Timed)
                .map_err(invalid),
            ActionType::Other => serde_json::from_value::<OtherDetails>(raw)
                .map(ActionDetails::Other)
                .map_err(invalid),
        }
    }

    pub fn to_value(&self) -> Value {
        // Serializing plain structs cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: Uuid,
    pub baby_profile_id: Uuid,
    pub user_id: Uuid,
    /// Stored as TEXT; one of diaper | sleep | feed | other.
    pub action_type: String,
    pub details: Value,
    /// Snapshot of the author's emoji at creation time, kept for historical
    /// display even if the user later changes it.
    pub user_emoji: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing row: action fields plus the author's public fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionWithAuthor {
    pub id: Uuid,
    pub baby_profile_id: Uuid,
    pub action_type: String,
    pub details: Value,
    pub user_emoji: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: UserPublic,
}

// Request DTOs
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionRequest {
    pub baby_profile_id: Option<Uuid>,
    pub action_type: Option<ActionType>,
    pub details: Option<Value>,
    pub user_emoji: Option<String>,
    /// Optional backdating override for created/updated timestamps.
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActionRequest {
    pub details: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListActionsQuery {
    pub baby_profile_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diaper_details_require_a_kind() {
        let err = ActionDetails::validate(ActionType::Diaper, json!({})).unwrap_err();
        match err {
            ApiError::Validation(msg) => assert!(msg.contains("'diaper'"), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn diaper_details_accept_pee_with_comments() {
        let details =
            ActionDetails::validate(ActionType::Diaper, json!({ "type": "pee", "comments": "small" }))
                .unwrap();
        match details {
            ActionDetails::Diaper(d) => {
                assert_eq!(d.kind, DiaperKind::Pee);
                assert_eq!(d.comments.as_deref(), Some("small"));
            }
            other => panic!("expected diaper details, got {other:?}"),
        }
    }

    #[test]
    fn sleep_details_allow_open_ended_sessions() {
        let details = ActionDetails::validate(
            ActionType::Sleep,
            json!({ "startTime": "2024-03-01T20:15:00Z", "endTime": null }),
        )
        .unwrap();
        match details {
            ActionDetails::Timed(t) => assert!(t.end_time.is_none()),
            other => panic!("expected timed details, got {other:?}"),
        }
    }

    #[test]
    fn feed_details_require_a_start_time() {
        assert!(ActionDetails::validate(ActionType::Feed, json!({ "comments": "bottle" })).is_err());
    }

    #[test]
    fn other_details_require_a_title() {
        assert!(ActionDetails::validate(ActionType::Other, json!({ "comments": "zzz" })).is_err());
        let ok = ActionDetails::validate(
            ActionType::Other,
            json!({ "title": "First steps", "timestamp": "2024-05-01T09:00:00Z" }),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn validated_details_serialize_in_wire_case() {
        let details = ActionDetails::validate(
            ActionType::Feed,
            json!({ "startTime": "2024-03-01T08:00:00Z", "endTime": "2024-03-01T08:20:00Z" }),
        )
        .unwrap();
        let value = details.to_value();
        assert!(value.get("startTime").is_some());
        assert!(value.get("endTime").is_some());
    }
}
