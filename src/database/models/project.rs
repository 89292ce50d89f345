use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub budget: Decimal,
    pub created_by: Option<Uuid>, // owner identity
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Insert payload; id and timestamps are assigned by the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub budget: Decimal,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Absent keeps the description, `Some(None)` (JSON `null`) clears it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Decimal>,
}

// tells an explicit `null` apart from a missing key
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_keeps_a_missing_description_apart_from_a_cleared_one() {
        let keep: ProjectPatch = serde_json::from_str(r#"{"name":"Depot"}"#).unwrap();
        let clear: ProjectPatch = serde_json::from_str(r#"{"description":null}"#).unwrap();
        let set: ProjectPatch = serde_json::from_str(r#"{"description":"two floors"}"#).unwrap();

        assert_eq!(keep.description, None);
        assert_eq!(clear.description, Some(None));
        assert_eq!(set.description, Some(Some("two floors".into())));

        let sent = serde_json::to_value(&ProjectPatch {
            description: Some(None),
            ..ProjectPatch::default()
        })
        .unwrap();
        assert_eq!(sent, serde_json::json!({ "description": null }));
    }
}
