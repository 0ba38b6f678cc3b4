use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{Coordinates, Located};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestCategory {
    FreeStuff,
    HelpNeeded,
    SkillsOffered,
}

impl RequestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestCategory::FreeStuff => "free-stuff",
            RequestCategory::HelpNeeded => "help-needed",
            RequestCategory::SkillsOffered => "skills-offered",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    #[default]
    Active,
    InProgress,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Active => "active",
            RequestStatus::InProgress => "in-progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationEstimate {
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "1hour")]
    OneHour,
    #[serde(rename = "1day")]
    OneDay,
    #[serde(rename = "multiple-days")]
    MultipleDays,
}

/// Row shape returned by the bounds and radius procedures.
///
/// The owner's profile is flattened into `user_*` columns and array columns may be null.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: RequestCategory,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub duration_estimate: Option<DurationEstimate>,
    #[serde(default)]
    pub skills_required: Option<Vec<String>>,
    #[serde(default)]
    pub compensation: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub location: Option<Coordinates>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub distance_meters: Option<f64>,
    #[serde(default)]
    pub user_full_name: Option<String>,
    #[serde(default)]
    pub user_avatar_url: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

/// Public profile of the request's owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestUser {
    pub id: Uuid,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A request as the map and list views consume it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestWithDistance {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: RequestCategory,
    pub subcategory: Option<String>,
    pub duration_estimate: Option<DurationEstimate>,
    pub skills_required: Vec<String>,
    pub compensation: Option<String>,
    pub images: Vec<String>,
    pub location: Option<Coordinates>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<RequestUser>,
}

impl From<RequestRow> for RequestWithDistance {
    fn from(row: RequestRow) -> Self {
        let user = row
            .user_full_name
            .filter(|name| !name.is_empty())
            .map(|full_name| RequestUser {
                id: row.user_id,
                full_name,
                avatar_url: row.user_avatar_url,
                email: row.user_email,
            });

        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            category: row.category,
            subcategory: row.subcategory,
            duration_estimate: row.duration_estimate,
            skills_required: row.skills_required.unwrap_or_default(),
            compensation: row.compensation,
            images: row.images.unwrap_or_default(),
            location: row.location,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
            distance_meters: row.distance_meters,
            user,
        }
    }
}

impl Located for RequestWithDistance {
    fn coordinates(&self) -> Option<Coordinates> {
        self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row_json() -> serde_json::Value {
        json!({
            "id": "6f1c2b1e-3a4d-4c5e-9f60-7a8b9c0d1e2f",
            "user_id": "0b1c2d3e-4f50-4617-8899-aabbccddeeff",
            "title": "Moving boxes",
            "description": "About twenty boxes",
            "category": "free-stuff",
            "subcategory": "household",
            "duration_estimate": null,
            "skills_required": null,
            "compensation": null,
            "images": ["a.jpg"],
            "location": { "latitude": 34.05, "longitude": -118.24 },
            "status": "active",
            "created_at": "2024-05-01T12:00:00Z",
            "updated_at": "2024-05-01T12:00:00Z",
            "expires_at": null,
            "distance_meters": 120.5,
            "user_full_name": "Sam Rivera",
            "user_avatar_url": null,
            "user_email": "sam@example.com"
        })
    }

    #[test]
    fn test_row_reshapes_user_and_defaults() {
        let row: RequestRow = serde_json::from_value(row_json()).unwrap();
        let request = RequestWithDistance::from(row);

        assert!(request.skills_required.is_empty());
        assert_eq!(request.images, vec!["a.jpg".to_string()]);
        assert_eq!(request.distance_meters, Some(120.5));

        let user = request.user.expect("user should be present");
        assert_eq!(user.id, request.user_id);
        assert_eq!(user.full_name, "Sam Rivera");
        assert_eq!(user.email.as_deref(), Some("sam@example.com"));
    }

    #[test]
    fn test_user_omitted_without_full_name() {
        let mut value = row_json();
        value["user_full_name"] = serde_json::Value::Null;
        let row: RequestRow = serde_json::from_value(value).unwrap();
        assert!(RequestWithDistance::from(row).user.is_none());

        let mut value = row_json();
        value["user_full_name"] = "".into();
        let row: RequestRow = serde_json::from_value(value).unwrap();
        assert!(RequestWithDistance::from(row).user.is_none());
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!(
            serde_json::from_str::<DurationEstimate>("\"15min\"").unwrap(),
            DurationEstimate::FifteenMinutes
        );
        assert_eq!(RequestCategory::SkillsOffered.as_str(), "skills-offered");
    }
}
