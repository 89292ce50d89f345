use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::models::{CostCategory, CostEntry, NewCostEntry, Session};
use crate::error::{Error, ValidationError};
use crate::sync::contract::{DataStore, Direction, Select};
use crate::sync::session::SessionHandle;
use crate::sync::snapshot::Snapshot;
use crate::sync::validate;

/// Raw cost form input, as typed.
#[derive(Debug, Clone)]
pub struct CostDraft {
    pub project_id: Uuid,
    pub category_id: Option<String>,
    pub amount: String,
    pub description: String,
}

impl CostDraft {
    pub fn validate(&self) -> Result<(String, Decimal, String), ValidationError> {
        let category = self
            .category_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ValidationError::CategoryRequired)?;
        let amount = validate::amount(&self.amount)?;
        let description = validate::description(&self.description)?;
        Ok((category.to_string(), amount, description))
    }
}

/// Cost entries (optionally scoped to one project, latest first) and the
/// category reference list.
pub struct CostRepository<S> {
    store: Arc<S>,
    session: SessionHandle,
    scope: Option<Uuid>,
    costs: Snapshot<CostEntry>,
    categories: Snapshot<CostCategory>,
}

impl<S: DataStore> CostRepository<S> {
    pub fn new(store: Arc<S>, session: SessionHandle) -> Self {
        Self {
            store,
            session,
            scope: None,
            costs: Snapshot::default(),
            categories: Snapshot::default(),
        }
    }

    pub fn costs(&self) -> &[CostEntry] {
        self.costs.items()
    }

    pub fn snapshot(&self) -> &Snapshot<CostEntry> {
        &self.costs
    }

    pub fn categories(&self) -> &[CostCategory] {
        self.categories.items()
    }

    pub fn category_snapshot(&self) -> &Snapshot<CostCategory> {
        &self.categories
    }

    pub fn category(&self, id: &str) -> Option<&CostCategory> {
        self.categories().iter().find(|category| category.id == id)
    }

    /// Project filter applied by the last `list` call.
    pub fn scope(&self) -> Option<Uuid> {
        self.scope
    }

    /// Entries of the current snapshot that belong to `project_id`.
    pub fn project_costs(&self, project_id: Uuid) -> Vec<CostEntry> {
        self.costs()
            .iter()
            .filter(|cost| cost.project_id == Some(project_id))
            .cloned()
            .collect()
    }

    pub fn observe_session(&mut self) -> bool {
        let changed = self.session.take_transition();
        if changed {
            debug!("session changed; dropping cached costs and categories");
            self.costs.clear();
            self.categories.clear();
        }
        changed
    }

    fn still_current(&self, session: &Session) -> bool {
        self.session.identity_id() == Some(session.user.id)
    }

    /// Fetches cost entries, filtered to `project` when given. The filter is
    /// remembered for the refetch that follows each write.
    pub async fn list(&mut self, project: Option<Uuid>) -> Result<&[CostEntry], Error> {
        self.observe_session();
        let session = self.session.require()?;
        self.scope = project;
        self.costs.begin();

        let mut query = Select::new();
        if let Some(project_id) = project {
            query = query.eq("project_id", project_id);
        }
        let query = query.order_by("date", Direction::Descending);
        let fetched = self
            .store
            .select::<CostEntry>(&session.access_token, &query)
            .await;

        if !self.still_current(&session) {
            debug!("discarding cost fetch for a previous session");
            self.costs.abandon();
            return Err(Error::SessionChanged);
        }
        match fetched {
            Ok(costs) => {
                debug!(count = costs.len(), project_id = ?project, "costs fetched");
                self.costs.replace(costs);
                Ok(self.costs.items())
            }
            Err(err) => {
                warn!(error = %err, "cost fetch failed");
                self.costs.fail(err.to_string());
                Err(err.into())
            }
        }
    }

    pub async fn refresh(&mut self) -> Result<&[CostEntry], Error> {
        let scope = self.scope;
        self.list(scope).await
    }

    pub async fn list_categories(&mut self) -> Result<&[CostCategory], Error> {
        self.observe_session();
        let session = self.session.require()?;
        self.categories.begin();

        let query = Select::new().order_by("name", Direction::Ascending);
        let fetched = self
            .store
            .select::<CostCategory>(&session.access_token, &query)
            .await;

        if !self.still_current(&session) {
            self.categories.abandon();
            return Err(Error::SessionChanged);
        }
        match fetched {
            Ok(categories) => {
                debug!(count = categories.len(), "categories fetched");
                self.categories.replace(categories);
                Ok(self.categories.items())
            }
            Err(err) => {
                warn!(error = %err, "category fetch failed");
                self.categories.fail(err.to_string());
                Err(err.into())
            }
        }
    }

    async fn refetch(&mut self) {
        if let Err(err) = self.refresh().await {
            warn!(error = %err, "refetch after write failed");
        }
    }

    /// Records a cost dated now.
    pub async fn create(&mut self, draft: &CostDraft) -> Result<CostEntry, Error> {
        let (category_id, amount, description) = draft.validate()?;
        self.observe_session();
        let session = self.session.require()?;

        let row = NewCostEntry {
            project_id: Some(draft.project_id),
            category_id: Some(category_id),
            amount,
            description,
            created_by: Some(session.user.id),
            date: Utc::now(),
        };
        let created: CostEntry = self
            .store
            .insert(&session.access_token, &row)
            .await
            .map_err(|err| {
                warn!(project_id = %draft.project_id, error = %err, "cost create failed");
                Error::from(err)
            })?;
        info!(cost_id = %created.id, project_id = %draft.project_id, "cost recorded");

        self.refetch().await;
        Ok(created)
    }

    pub async fn delete(&mut self, id: Uuid) -> Result<(), Error> {
        self.observe_session();
        let session = self.session.require()?;

        self.store
            .delete::<CostEntry>(&session.access_token, &id.to_string())
            .await
            .map_err(|err| {
                warn!(cost_id = %id, error = %err, "cost delete failed");
                Error::from(err)
            })?;
        info!(cost_id = %id, "cost deleted");

        self.refetch().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::projects::{ProjectDraft, ProjectRepository};
    use crate::sync::session::{SessionConfig, SessionManager};
    use crate::sync::testing::{categories, FakeIdentity, MemoryStore};

    async fn signed_in() -> (SessionManager<FakeIdentity>, Arc<MemoryStore>) {
        let provider = Arc::new(FakeIdentity::new().with_account("pm@site.ua", "secret1", true));
        let manager = SessionManager::new(provider, SessionConfig::default());
        manager.sign_in("pm@site.ua", "secret1").await.unwrap();
        let store = Arc::new(MemoryStore::new().with_categories(&categories()));
        (manager, store)
    }

    async fn project(repo: &mut ProjectRepository<MemoryStore>, name: &str) -> Uuid {
        let draft = ProjectDraft {
            name: name.into(),
            description: String::new(),
            budget: "10000".into(),
        };
        repo.create(&draft).await.unwrap().id
    }

    fn cost(project_id: Uuid, category: &str, amount: &str, description: &str) -> CostDraft {
        CostDraft {
            project_id,
            category_id: Some(category.into()),
            amount: amount.into(),
            description: description.into(),
        }
    }

    #[tokio::test]
    async fn recorded_cost_shows_up_in_the_project_listing() {
        let (manager, store) = signed_in().await;
        let mut projects = ProjectRepository::new(Arc::clone(&store), manager.subscribe());
        let mut costs = CostRepository::new(Arc::clone(&store), manager.subscribe());
        let p = project(&mut projects, "P").await;

        costs
            .create(&cost(p, "materials", "1500.50", "Cement delivery"))
            .await
            .unwrap();
        let listed = costs.list(Some(p)).await.unwrap();

        let entry = listed
            .iter()
            .find(|c| c.description == "Cement delivery")
            .expect("entry listed");
        assert_eq!(entry.amount, Decimal::new(150050, 2));
        assert_eq!(entry.category_id.as_deref(), Some("materials"));
        assert_eq!(entry.project_id, Some(p));
    }

    #[tokio::test]
    async fn listing_is_scoped_and_latest_first() {
        let (manager, store) = signed_in().await;
        let mut projects = ProjectRepository::new(Arc::clone(&store), manager.subscribe());
        let mut costs = CostRepository::new(Arc::clone(&store), manager.subscribe());
        let a = project(&mut projects, "A").await;
        let b = project(&mut projects, "B").await;

        costs.list(Some(a)).await.unwrap();
        costs.create(&cost(a, "labor", "100", "Crew day 1")).await.unwrap();
        costs.create(&cost(b, "labor", "999", "Other site")).await.unwrap();
        costs.create(&cost(a, "labor", "120", "Crew day 2")).await.unwrap();

        assert_eq!(costs.scope(), Some(a));
        let descriptions: Vec<&str> = costs.costs().iter().map(|c| c.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Crew day 2", "Crew day 1"]);

        costs.list(None).await.unwrap();
        assert_eq!(costs.costs().len(), 3);
        assert_eq!(costs.project_costs(b).len(), 1);
    }

    #[tokio::test]
    async fn invalid_costs_never_reach_the_store() {
        let (manager, store) = signed_in().await;
        let mut costs = CostRepository::new(Arc::clone(&store), manager.subscribe());
        let p = Uuid::new_v4();

        let no_category = CostDraft {
            category_id: None,
            ..cost(p, "", "10", "Nails")
        };
        let cases = [
            (no_category, ValidationError::CategoryRequired),
            (cost(p, "materials", "0", "Nails"), ValidationError::NonPositiveAmount),
            (
                cost(p, "materials", "ten", "Nails"),
                ValidationError::InvalidAmount("ten".into()),
            ),
            (cost(p, "materials", "10", "   "), ValidationError::EmptyDescription),
        ];
        for (draft, expected) in cases {
            match costs.create(&draft).await {
                Err(Error::Validation(err)) => assert_eq!(err, expected),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn deleting_a_project_removes_its_costs() {
        let (manager, store) = signed_in().await;
        let mut projects = ProjectRepository::new(Arc::clone(&store), manager.subscribe());
        let mut costs = CostRepository::new(Arc::clone(&store), manager.subscribe());
        let keep = project(&mut projects, "Keep").await;
        let drop = project(&mut projects, "Drop").await;
        costs.create(&cost(keep, "labor", "5", "kept")).await.unwrap();
        costs.create(&cost(drop, "labor", "6", "gone 1")).await.unwrap();
        costs.create(&cost(drop, "materials", "7", "gone 2")).await.unwrap();

        projects.delete(drop).await.unwrap();
        let remaining_projects: Vec<Uuid> = projects.projects().iter().map(|p| p.id).collect();
        costs.list(None).await.unwrap();

        assert_eq!(remaining_projects, vec![keep]);
        assert_eq!(costs.costs().len(), 1);
        assert_eq!(costs.costs()[0].description, "kept");
        assert!(costs.list(Some(drop)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_cost_refetches_with_the_same_scope() {
        let (manager, store) = signed_in().await;
        let mut projects = ProjectRepository::new(Arc::clone(&store), manager.subscribe());
        let mut costs = CostRepository::new(Arc::clone(&store), manager.subscribe());
        let p = project(&mut projects, "P").await;
        costs.list(Some(p)).await.unwrap();
        let entry = costs.create(&cost(p, "labor", "40", "Scaffold")).await.unwrap();

        costs.delete(entry.id).await.unwrap();

        assert!(costs.costs().is_empty());
        assert_eq!(costs.scope(), Some(p));
    }

    #[tokio::test]
    async fn categories_are_ordered_by_name() {
        let (manager, store) = signed_in().await;
        let mut costs = CostRepository::new(store, manager.subscribe());

        let names: Vec<String> = costs
            .list_categories()
            .await
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect();

        assert_eq!(names, vec!["Equipment", "Labor", "Materials"]);
        assert_eq!(costs.category("labor").map(|c| c.name.as_str()), Some("Labor"));
    }

    #[tokio::test]
    async fn sign_out_drops_cached_costs() {
        let (manager, store) = signed_in().await;
        let mut costs = CostRepository::new(Arc::clone(&store), manager.subscribe());
        costs.list_categories().await.unwrap();

        manager.sign_out().await.unwrap();

        assert!(costs.observe_session());
        assert!(costs.categories().is_empty());
        assert!(matches!(costs.list(None).await, Err(Error::NotSignedIn)));
    }
}
