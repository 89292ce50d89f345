use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub category_id: Option<String>,
    pub amount: Decimal,
    pub description: String,
    pub created_by: Option<Uuid>,
    pub date: DateTime<Utc>, // when the cost occurred
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCostEntry {
    pub project_id: Option<Uuid>,
    pub category_id: Option<String>,
    pub amount: Decimal,
    pub description: String,
    pub created_by: Option<Uuid>,
    pub date: DateTime<Utc>,
}
