use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use crate::database::db::columns::{self, timestamp};
use crate::database::models::{
    CostCategory, CostEntry, NewCostEntry, NewProject, Project, ProjectPatch,
};
use crate::sync::Direction;
/*
Data-table queries behind the REST endpoints.
Every project and cost-entry query is scoped to the calling identity:
projects belong to their owner, cost entries are visible to whoever created
them and to the owner of the project they are booked against.
 */

/// Parsed `col=eq.value` filters and an optional `order=col.dir`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filters: Vec<(String, String)>,
    pub order: Option<(String, Direction)>,
}

/// A filter or order column the table does not have.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown column '{0}'")]
pub struct UnknownColumn(pub String);

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Column(#[from] UnknownColumn),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

struct Table {
    name: &'static str,
    columns: &'static [&'static str],
    numeric: &'static [&'static str],
}

const PROJECTS: Table = Table {
    name: "projects",
    columns: &["id", "name", "description", "budget", "created_by", "created_at", "updated_at"],
    numeric: &["budget"],
};

const COST_ENTRIES: Table = Table {
    name: "cost_entries",
    columns: &[
        "id",
        "project_id",
        "category_id",
        "amount",
        "description",
        "created_by",
        "date",
        "created_at",
        "updated_at",
    ],
    numeric: &["amount"],
};

const COST_CATEGORIES: Table = Table {
    name: "cost_categories",
    columns: &["id", "name", "icon", "color", "created_at"],
    numeric: &[],
};

impl Table {
    fn column(&self, name: &str) -> Result<&'static str, UnknownColumn> {
        self.columns
            .iter()
            .copied()
            .find(|column| *column == name)
            .ok_or_else(|| UnknownColumn(name.to_string()))
    }

    fn select<'a>(&self, scope: &str) -> QueryBuilder<'a, Sqlite> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(self.columns.join(", "))
            .push(" FROM ")
            .push(self.name)
            .push(" WHERE ")
            .push(scope);
        qb
    }

    // Appends filters and ordering; column names come from the whitelist only.
    fn apply(&self, qb: &mut QueryBuilder<'_, Sqlite>, query: &ListQuery) -> Result<(), UnknownColumn> {
        for (name, value) in &query.filters {
            let column = self.column(name)?;
            qb.push(" AND ")
                .push(self.name)
                .push(".")
                .push(column)
                .push(" = ")
                .push_bind(value.clone());
        }
        if let Some((name, direction)) = &query.order {
            let column = self.column(name)?;
            let dir = match direction {
                Direction::Ascending => " ASC",
                Direction::Descending => " DESC",
            };
            qb.push(" ORDER BY ");
            if self.numeric.contains(&column) {
                qb.push("CAST(").push(column).push(" AS REAL)");
            } else {
                qb.push(column);
            }
            qb.push(dir);
        }
        Ok(())
    }
}

fn project_from_row(row: &SqliteRow) -> Result<Project, sqlx::Error> {
    Ok(Project {
        id: columns::uuid(row, "id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        budget: columns::decimal(row, "budget")?,
        created_by: columns::opt_uuid(row, "created_by")?,
        created_at: columns::time(row, "created_at")?,
        updated_at: columns::time(row, "updated_at")?,
    })
}

fn cost_from_row(row: &SqliteRow) -> Result<CostEntry, sqlx::Error> {
    Ok(CostEntry {
        id: columns::uuid(row, "id")?,
        project_id: columns::opt_uuid(row, "project_id")?,
        category_id: row.try_get("category_id")?,
        amount: columns::decimal(row, "amount")?,
        description: row.try_get("description")?,
        created_by: columns::opt_uuid(row, "created_by")?,
        date: columns::time(row, "date")?,
        created_at: columns::time(row, "created_at")?,
        updated_at: columns::time(row, "updated_at")?,
    })
}

fn category_from_row(row: &SqliteRow) -> Result<CostCategory, sqlx::Error> {
    Ok(CostCategory {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        icon: row.try_get("icon")?,
        color: row.try_get("color")?,
        created_at: columns::opt_time(row, "created_at")?,
    })
}

/*==========Project Queries=========== */

pub async fn list_projects(
    pool: &Pool<Sqlite>,
    owner: Uuid,
    query: &ListQuery,
) -> Result<Vec<Project>, QueryError> {
    let mut qb = PROJECTS.select("projects.created_by = ");
    qb.push_bind(owner.to_string());
    PROJECTS.apply(&mut qb, query)?;

    let projects = qb
        .build()
        .fetch_all(pool)
        .await?
        .iter()
        .map(project_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(projects)
}

pub async fn get_project(
    pool: &Pool<Sqlite>,
    owner: Uuid,
    project_id: Uuid,
) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT id, name, description, budget, created_by, created_at, updated_at
        FROM projects
        WHERE id = ? AND created_by = ?
        "#,
    )
    .bind(project_id.to_string())
    .bind(owner.to_string())
    .fetch_optional(pool)
    .await?
    .as_ref()
    .map(project_from_row)
    .transpose()
}

// The owner always comes from the bearer token, never from the payload.
pub async fn create_project(
    pool: &Pool<Sqlite>,
    owner: Uuid,
    project: &NewProject,
) -> Result<Project, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = timestamp(Utc::now());
    let row = sqlx::query(
        r#"
        INSERT INTO projects (id, name, description, budget, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id, name, description, budget, created_by, created_at, updated_at
        "#,
    )
    .bind(id.to_string())
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.budget.to_string())
    .bind(owner.to_string())
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await?;

    project_from_row(&row)
}

/// Applies the provided fields; `None` when the project is not the caller's.
pub async fn update_project(
    pool: &Pool<Sqlite>,
    owner: Uuid,
    project_id: Uuid,
    patch: &ProjectPatch,
) -> Result<Option<Project>, sqlx::Error> {
    // outer None keeps the column; a blank text clears it like null does
    let description = patch.description.as_ref().map(|text| {
        text.as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    });

    let row = sqlx::query(
        r#"
        UPDATE projects
        SET name        = COALESCE(?, name),
            description = CASE WHEN ? THEN ? ELSE description END,
            budget      = COALESCE(?, budget),
            updated_at  = ?
        WHERE id = ? AND created_by = ?
        RETURNING id, name, description, budget, created_by, created_at, updated_at
        "#,
    )
    .bind(&patch.name)
    .bind(description.is_some())
    .bind(description.flatten())
    .bind(patch.budget.map(|budget| budget.to_string()))
    .bind(timestamp(Utc::now()))
    .bind(project_id.to_string())
    .bind(owner.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(project_from_row).transpose()
}

// Delete project together with its cost entries
pub async fn delete_project(
    pool: &Pool<Sqlite>,
    owner: Uuid,
    project_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let owned = sqlx::query("SELECT 1 FROM projects WHERE id = ? AND created_by = ?")
        .bind(project_id.to_string())
        .bind(owner.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
    if !owned {
        return Ok(false);
    }

    let costs = sqlx::query("DELETE FROM cost_entries WHERE project_id = ?")
        .bind(project_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::debug!(%project_id, cost_entries = costs.rows_affected(), "project deleted with its costs");
    Ok(true)
}

/*==========Cost Entry Queries=========== */

const COST_SCOPE: &str = "(cost_entries.created_by = ";

fn cost_scope(viewer: Uuid) -> QueryBuilder<'static, Sqlite> {
    let mut qb = COST_ENTRIES.select(COST_SCOPE);
    qb.push_bind(viewer.to_string())
        .push(" OR cost_entries.project_id IN (SELECT p.id FROM projects p WHERE p.created_by = ")
        .push_bind(viewer.to_string())
        .push("))");
    qb
}

pub async fn list_cost_entries(
    pool: &Pool<Sqlite>,
    viewer: Uuid,
    query: &ListQuery,
) -> Result<Vec<CostEntry>, QueryError> {
    let mut qb = cost_scope(viewer);
    COST_ENTRIES.apply(&mut qb, query)?;

    let entries = qb
        .build()
        .fetch_all(pool)
        .await?
        .iter()
        .map(cost_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Inserts the entry as `creator`. The caller checks project ownership first.
pub async fn create_cost_entry(
    pool: &Pool<Sqlite>,
    creator: Uuid,
    entry: &NewCostEntry,
) -> Result<CostEntry, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = timestamp(Utc::now());
    let row = sqlx::query(
        r#"
        INSERT INTO cost_entries (
            id, project_id, category_id, amount, description,
            created_by, date, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id, project_id, category_id, amount, description,
                  created_by, date, created_at, updated_at
        "#,
    )
    .bind(id.to_string())
    .bind(entry.project_id.map(|p| p.to_string()))
    .bind(&entry.category_id)
    .bind(entry.amount.to_string())
    .bind(&entry.description)
    .bind(creator.to_string())
    .bind(timestamp(entry.date))
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await?;

    cost_from_row(&row)
}

pub async fn delete_cost_entry(
    pool: &Pool<Sqlite>,
    viewer: Uuid,
    entry_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM cost_entries
        WHERE id = ?
          AND (created_by = ?
               OR project_id IN (SELECT p.id FROM projects p WHERE p.created_by = ?))
        "#,
    )
    .bind(entry_id.to_string())
    .bind(viewer.to_string())
    .bind(viewer.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/*==========Category Queries=========== */

pub async fn list_categories(
    pool: &Pool<Sqlite>,
    query: &ListQuery,
) -> Result<Vec<CostCategory>, QueryError> {
    let mut qb = COST_CATEGORIES.select("1 = 1");
    COST_CATEGORIES.apply(&mut qb, query)?;

    let categories = qb
        .build()
        .fetch_all(pool)
        .await?
        .iter()
        .map(category_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub async fn category_exists(pool: &Pool<Sqlite>, category_id: &str) -> Result<bool, sqlx::Error> {
    let found = sqlx::query("SELECT 1 FROM cost_categories WHERE id = ?")
        .bind(category_id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}
