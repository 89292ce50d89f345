use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Reference data, seeded by migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostCategory {
    pub id: String,    // stable key, e.g. "materials"
    pub name: String,
    pub icon: String,  // icon token
    pub color: String, // colour token
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
