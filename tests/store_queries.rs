use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{Pool, Sqlite};
use tempfile::TempDir;
use uuid::Uuid;

use construction_cost_tracker::database::db::queries::{self, ListQuery};
use construction_cost_tracker::database::db::{connection, identity, migrate};
use construction_cost_tracker::database::models::{NewCostEntry, NewProject, ProjectPatch};
use construction_cost_tracker::sync::{Direction, VerificationKind};

async fn fresh_db() -> (TempDir, Pool<Sqlite>) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("tracker.db").display());
    let pool = connection::get_db_pool(&url).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    (dir, pool)
}

async fn user(pool: &Pool<Sqlite>, email: &str) -> Uuid {
    identity::create_user(pool, email, "hash", None).await.unwrap().id
}

fn project(name: &str, budget: i64) -> NewProject {
    NewProject {
        name: name.into(),
        description: None,
        budget: Decimal::from(budget),
        created_by: None,
    }
}

fn cost(project_id: Uuid, category: &str, amount: Decimal, description: &str) -> NewCostEntry {
    NewCostEntry {
        project_id: Some(project_id),
        category_id: Some(category.into()),
        amount,
        description: description.into(),
        created_by: None,
        date: Utc::now(),
    }
}

#[tokio::test]
async fn migrations_seed_the_category_catalogue() {
    let (_dir, pool) = fresh_db().await;
    let query = ListQuery {
        filters: vec![],
        order: Some(("name".into(), Direction::Ascending)),
    };

    let categories = queries::list_categories(&pool, &query).await.unwrap();

    assert_eq!(categories.len(), 8);
    assert_eq!(categories[0].id, "equipment");
    assert!(queries::category_exists(&pool, "materials").await.unwrap());
    assert!(!queries::category_exists(&pool, "drones").await.unwrap());
}

#[tokio::test]
async fn projects_are_scoped_to_their_owner() {
    let (_dir, pool) = fresh_db().await;
    let alice = user(&pool, "alice@site.ua").await;
    let bob = user(&pool, "bob@site.ua").await;

    let mut payload = project("Warehouse", 5000);
    // a forged owner in the payload is ignored
    payload.created_by = Some(bob);
    let created = queries::create_project(&pool, alice, &payload).await.unwrap();

    assert_eq!(created.created_by, Some(alice));
    assert_eq!(queries::list_projects(&pool, alice, &ListQuery::default()).await.unwrap().len(), 1);
    assert!(queries::list_projects(&pool, bob, &ListQuery::default()).await.unwrap().is_empty());
    assert!(queries::get_project(&pool, bob, created.id).await.unwrap().is_none());
    assert!(!queries::delete_project(&pool, bob, created.id).await.unwrap());
}

#[tokio::test]
async fn update_applies_only_the_given_fields() {
    let (_dir, pool) = fresh_db().await;
    let owner = user(&pool, "pm@site.ua").await;
    let mut payload = project("Cottage", 1000);
    payload.description = Some("two floors".into());
    let created = queries::create_project(&pool, owner, &payload).await.unwrap();

    let patch = ProjectPatch {
        budget: Some(Decimal::new(125050, 2)),
        ..ProjectPatch::default()
    };
    let updated = queries::update_project(&pool, owner, created.id, &patch)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.name, "Cottage");
    assert_eq!(updated.description.as_deref(), Some("two floors"));
    assert_eq!(updated.budget, Decimal::new(125050, 2));

    let clear = ProjectPatch {
        description: Some(None),
        ..ProjectPatch::default()
    };
    let cleared = queries::update_project(&pool, owner, created.id, &clear)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cleared.description, None);
}

#[tokio::test]
async fn deleting_a_project_removes_its_costs() {
    let (_dir, pool) = fresh_db().await;
    let owner = user(&pool, "pm@site.ua").await;
    let kept = queries::create_project(&pool, owner, &project("Kept", 100)).await.unwrap();
    let doomed = queries::create_project(&pool, owner, &project("Doomed", 100)).await.unwrap();
    queries::create_cost_entry(&pool, owner, &cost(kept.id, "labor", Decimal::from(10), "Shift"))
        .await
        .unwrap();
    queries::create_cost_entry(&pool, owner, &cost(doomed.id, "materials", Decimal::from(20), "Bricks"))
        .await
        .unwrap();

    assert!(queries::delete_project(&pool, owner, doomed.id).await.unwrap());

    let remaining = queries::list_cost_entries(&pool, owner, &ListQuery::default())
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].project_id, Some(kept.id));
}

#[tokio::test]
async fn cost_listing_filters_and_orders() {
    let (_dir, pool) = fresh_db().await;
    let owner = user(&pool, "pm@site.ua").await;
    let a = queries::create_project(&pool, owner, &project("A", 100)).await.unwrap();
    let b = queries::create_project(&pool, owner, &project("B", 100)).await.unwrap();

    let mut early = cost(a.id, "labor", Decimal::new(1500, 2), "Early");
    early.date = Utc::now() - Duration::days(2);
    let late = cost(a.id, "labor", Decimal::new(250, 2), "Late");
    queries::create_cost_entry(&pool, owner, &early).await.unwrap();
    queries::create_cost_entry(&pool, owner, &late).await.unwrap();
    queries::create_cost_entry(&pool, owner, &cost(b.id, "labor", Decimal::ONE, "Other project"))
        .await
        .unwrap();

    let by_date = ListQuery {
        filters: vec![("project_id".into(), a.id.to_string())],
        order: Some(("date".into(), Direction::Descending)),
    };
    let listed = queries::list_cost_entries(&pool, owner, &by_date).await.unwrap();
    let names: Vec<_> = listed.iter().map(|c| c.description.as_str()).collect();
    assert_eq!(names, ["Late", "Early"]);

    // amounts are stored as text but sort numerically
    let by_amount = ListQuery {
        filters: vec![("project_id".into(), a.id.to_string())],
        order: Some(("amount".into(), Direction::Ascending)),
    };
    let listed = queries::list_cost_entries(&pool, owner, &by_amount).await.unwrap();
    assert_eq!(listed[0].amount, Decimal::new(250, 2));

    let bad = ListQuery {
        filters: vec![("password_hash".into(), "x".into())],
        order: None,
    };
    assert!(matches!(
        queries::list_cost_entries(&pool, owner, &bad).await,
        Err(queries::QueryError::Column(_))
    ));
}

#[tokio::test]
async fn costs_are_visible_to_the_project_owner_and_the_creator() {
    let (_dir, pool) = fresh_db().await;
    let owner = user(&pool, "owner@site.ua").await;
    let helper = user(&pool, "helper@site.ua").await;
    let stranger = user(&pool, "stranger@site.ua").await;
    let site = queries::create_project(&pool, owner, &project("Site", 100)).await.unwrap();

    let entry = queries::create_cost_entry(&pool, helper, &cost(site.id, "transport", Decimal::TEN, "Truck"))
        .await
        .unwrap();

    assert_eq!(entry.created_by, Some(helper));
    for viewer in [owner, helper] {
        let seen = queries::list_cost_entries(&pool, viewer, &ListQuery::default()).await.unwrap();
        assert_eq!(seen.len(), 1);
    }
    assert!(queries::list_cost_entries(&pool, stranger, &ListQuery::default())
        .await
        .unwrap()
        .is_empty());
    assert!(!queries::delete_cost_entry(&pool, stranger, entry.id).await.unwrap());
    assert!(queries::delete_cost_entry(&pool, owner, entry.id).await.unwrap());
}

#[tokio::test]
async fn removed_category_leaves_the_entry_uncategorized() {
    let (_dir, pool) = fresh_db().await;
    let owner = user(&pool, "pm@site.ua").await;
    let site = queries::create_project(&pool, owner, &project("Site", 100)).await.unwrap();
    queries::create_cost_entry(&pool, owner, &cost(site.id, "permits", Decimal::ONE, "Stamp"))
        .await
        .unwrap();

    sqlx::query("DELETE FROM cost_categories WHERE id = 'permits'")
        .execute(&pool)
        .await
        .unwrap();

    let entries = queries::list_cost_entries(&pool, owner, &ListQuery::default()).await.unwrap();
    assert_eq!(entries[0].category_id, None);
}

#[tokio::test]
async fn sessions_and_tokens_expire_and_are_single_use() {
    let (_dir, pool) = fresh_db().await;
    let id = user(&pool, "pm@site.ua").await;
    let now = Utc::now();

    identity::insert_session(&pool, "live", id, now + Duration::hours(1)).await.unwrap();
    identity::insert_session(&pool, "stale", id, now - Duration::minutes(1)).await.unwrap();
    assert!(identity::session_user(&pool, "live", now).await.unwrap().is_some());
    assert!(identity::session_user(&pool, "stale", now).await.unwrap().is_none());

    identity::insert_auth_token(&pool, "confirm", id, VerificationKind::Signup, now + Duration::hours(1))
        .await
        .unwrap();
    assert!(identity::consume_auth_token(&pool, "confirm", VerificationKind::Recovery, now)
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        identity::consume_auth_token(&pool, "confirm", VerificationKind::Signup, now)
            .await
            .unwrap(),
        Some(id)
    );
    assert!(identity::consume_auth_token(&pool, "confirm", VerificationKind::Signup, now)
        .await
        .unwrap()
        .is_none());

    assert!(identity::purge_expired(&pool, now).await.unwrap() >= 1);
    assert!(identity::delete_session(&pool, "live").await.unwrap());
}
