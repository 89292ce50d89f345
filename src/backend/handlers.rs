// src/backend/handlers.rs
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::backend::auth::authenticate;
use crate::backend::error::ApiError;
use crate::backend::AppState;
use crate::database::db::queries::{self, ListQuery};
use crate::database::models::{
    CostCategory, CostEntry, NewCostEntry, NewProject, Project, ProjectPatch,
};
use crate::stats;
use crate::sync::{Direction, Record};

/// Tables exposed under `/rest/v1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestTable {
    Projects,
    CostEntries,
    CostCategories,
}

impl RestTable {
    pub fn from_path(name: &str) -> Result<Self, ApiError> {
        match name {
            Project::TABLE => Ok(Self::Projects),
            CostEntry::TABLE => Ok(Self::CostEntries),
            CostCategory::TABLE => Ok(Self::CostCategories),
            other => Err(ApiError::new(
                StatusCode::NOT_FOUND,
                "unknown_table",
                format!("no table named '{other}'"),
            )),
        }
    }
}

fn read_only(table: RestTable) -> ApiError {
    ApiError::new(
        StatusCode::METHOD_NOT_ALLOWED,
        "read_only",
        format!("{table:?} cannot be modified through this endpoint"),
    )
}

/// Turns `col=eq.value` and `order=col.dir` pairs into a [`ListQuery`].
pub fn parse_list_query(params: &[(String, String)]) -> Result<ListQuery, ApiError> {
    let mut query = ListQuery::default();
    for (key, value) in params {
        if key == "order" {
            let (column, dir) = value.rsplit_once('.').unwrap_or((value.as_str(), "asc"));
            let direction = Direction::parse(dir).ok_or_else(|| {
                ApiError::bad_request("invalid_order", format!("unknown direction '{dir}'"))
            })?;
            query.order = Some((column.to_string(), direction));
        } else {
            let expected = value.strip_prefix("eq.").ok_or_else(|| {
                ApiError::bad_request("invalid_filter", format!("only eq filters are supported: {key}={value}"))
            })?;
            query.filters.push((key.clone(), expected.to_string()));
        }
    }
    Ok(query)
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found())
}

fn body<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::bad_request("invalid_body", e.to_string()))
}

// GET /rest/v1/:table
pub async fn list_rows(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let table = RestTable::from_path(&table)?;
    let caller = authenticate(&state, &headers).await?;
    let query = parse_list_query(&params)?;
    let viewer = caller.identity.id;

    let response = match table {
        RestTable::Projects => Json(queries::list_projects(&state.db, viewer, &query).await?).into_response(),
        RestTable::CostEntries => {
            Json(queries::list_cost_entries(&state.db, viewer, &query).await?).into_response()
        }
        RestTable::CostCategories => Json(queries::list_categories(&state.db, &query).await?).into_response(),
    };
    Ok(response)
}

// POST /rest/v1/:table
pub async fn insert_row(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(table): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let table = RestTable::from_path(&table)?;
    let caller = authenticate(&state, &headers).await?;
    let user_id = caller.identity.id;

    match table {
        RestTable::Projects => {
            let new: NewProject = body(payload)?;
            if new.name.trim().is_empty() {
                return Err(ApiError::unprocessable("validation_failed", "project name is required"));
            }
            if new.budget < Decimal::ZERO {
                return Err(ApiError::unprocessable("validation_failed", "budget cannot be negative"));
            }
            if !stats::is_money(new.budget) {
                return Err(out_of_range("budget"));
            }
            let project = queries::create_project(&state.db, user_id, &new).await?;
            info!(project_id = %project.id, %user_id, "project inserted");
            Ok((StatusCode::CREATED, Json(project)).into_response())
        }
        RestTable::CostEntries => {
            let new: NewCostEntry = body(payload)?;
            if new.amount <= Decimal::ZERO {
                return Err(ApiError::unprocessable("validation_failed", "amount must be greater than zero"));
            }
            if !stats::is_money(new.amount) {
                return Err(out_of_range("amount"));
            }
            if new.description.trim().is_empty() {
                return Err(ApiError::unprocessable("validation_failed", "description is required"));
            }
            let project_id = new
                .project_id
                .ok_or_else(|| ApiError::unprocessable("validation_failed", "project_id is required"))?;
            if queries::get_project(&state.db, user_id, project_id).await?.is_none() {
                return Err(ApiError::forbidden("project does not belong to the caller"));
            }
            if let Some(category_id) = new.category_id.as_deref() {
                if !queries::category_exists(&state.db, category_id).await? {
                    return Err(ApiError::unprocessable(
                        "unknown_category",
                        format!("no category '{category_id}'"),
                    ));
                }
            }
            let entry = queries::create_cost_entry(&state.db, user_id, &new).await?;
            info!(cost_id = %entry.id, %project_id, %user_id, "cost entry inserted");
            Ok((StatusCode::CREATED, Json(entry)).into_response())
        }
        RestTable::CostCategories => Err(read_only(table)),
    }
}

fn out_of_range(field: &str) -> ApiError {
    ApiError::unprocessable(
        "validation_failed",
        format!("{field} must be at most {} with two decimals", stats::MAX_MONEY),
    )
}

// PATCH /rest/v1/:table/:id
pub async fn update_row(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((table, id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> Result<Json<Project>, ApiError> {
    let table = RestTable::from_path(&table)?;
    let caller = authenticate(&state, &headers).await?;
    if table != RestTable::Projects {
        return Err(read_only(table));
    }

    let patch: ProjectPatch = body(payload)?;
    if matches!(patch.name.as_deref(), Some(name) if name.trim().is_empty()) {
        return Err(ApiError::unprocessable("validation_failed", "project name is required"));
    }
    if matches!(patch.budget, Some(budget) if budget < Decimal::ZERO) {
        return Err(ApiError::unprocessable("validation_failed", "budget cannot be negative"));
    }
    if matches!(patch.budget, Some(budget) if !stats::is_money(budget)) {
        return Err(out_of_range("budget"));
    }
    let project_id = parse_id(&id)?;
    let project = queries::update_project(&state.db, caller.identity.id, project_id, &patch)
        .await?
        .ok_or_else(ApiError::not_found)?;
    info!(%project_id, "project updated");
    Ok(Json(project))
}

// DELETE /rest/v1/:table/:id
pub async fn delete_row(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((table, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let table = RestTable::from_path(&table)?;
    let caller = authenticate(&state, &headers).await?;
    let row_id = parse_id(&id)?;
    let user_id = caller.identity.id;

    let deleted = match table {
        RestTable::Projects => queries::delete_project(&state.db, user_id, row_id).await?,
        RestTable::CostEntries => queries::delete_cost_entry(&state.db, user_id, row_id).await?,
        RestTable::CostCategories => return Err(read_only(table)),
    };
    if !deleted {
        return Err(ApiError::not_found());
    }
    info!(?table, %row_id, %user_id, "row deleted");
    Ok(StatusCode::NO_CONTENT)
}
