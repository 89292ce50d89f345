use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::models::{NewProject, Project, ProjectPatch, Session};
use crate::error::{Error, ValidationError};
use crate::sync::contract::{DataStore, Direction, Select};
use crate::sync::session::SessionHandle;
use crate::sync::snapshot::Snapshot;
use crate::sync::validate;

/// Raw project form input, as typed.
#[derive(Debug, Clone, Default)]
pub struct ProjectDraft {
    pub name: String,
    pub description: String,
    pub budget: String,
}

impl ProjectDraft {
    pub fn validate(&self) -> Result<(String, Option<String>, Decimal), ValidationError> {
        let name = validate::project_name(&self.name)?;
        let budget = validate::budget(&self.budget)?;
        Ok((name, validate::optional_text(&self.description), budget))
    }
}

/// Projects visible to the signed-in identity, newest first.
pub struct ProjectRepository<S> {
    store: Arc<S>,
    session: SessionHandle,
    snapshot: Snapshot<Project>,
}

impl<S: DataStore> ProjectRepository<S> {
    pub fn new(store: Arc<S>, session: SessionHandle) -> Self {
        Self {
            store,
            session,
            snapshot: Snapshot::default(),
        }
    }

    pub fn projects(&self) -> &[Project] {
        self.snapshot.items()
    }

    pub fn snapshot(&self) -> &Snapshot<Project> {
        &self.snapshot
    }

    pub fn get(&self, id: Uuid) -> Option<&Project> {
        self.projects().iter().find(|project| project.id == id)
    }

    /// Drops the cached list when the signed-in identity changed.
    pub fn observe_session(&mut self) -> bool {
        let changed = self.session.take_transition();
        if changed {
            debug!("session changed; dropping cached projects");
            self.snapshot.clear();
        }
        changed
    }

    fn still_current(&self, session: &Session) -> bool {
        self.session.identity_id() == Some(session.user.id)
    }

    /// Replaces the local list with a fresh fetch. On failure the previous
    /// list stays in place and the error is recorded on the snapshot.
    pub async fn list(&mut self) -> Result<&[Project], Error> {
        self.observe_session();
        let session = self.session.require()?;
        self.snapshot.begin();

        let query = Select::new().order_by("created_at", Direction::Descending);
        let fetched = self
            .store
            .select::<Project>(&session.access_token, &query)
            .await;

        if !self.still_current(&session) {
            debug!("discarding project fetch for a previous session");
            self.snapshot.abandon();
            return Err(Error::SessionChanged);
        }
        match fetched {
            Ok(projects) => {
                debug!(count = projects.len(), "projects fetched");
                self.snapshot.replace(projects);
                Ok(self.snapshot.items())
            }
            Err(err) => {
                warn!(error = %err, "project fetch failed");
                self.snapshot.fail(err.to_string());
                Err(err.into())
            }
        }
    }

    async fn refetch(&mut self) {
        if let Err(err) = self.list().await {
            warn!(error = %err, "refetch after write failed");
        }
    }

    pub async fn create(&mut self, draft: &ProjectDraft) -> Result<Project, Error> {
        let (name, description, budget) = draft.validate()?;
        self.observe_session();
        let session = self.session.require()?;

        let row = NewProject {
            name,
            description,
            budget,
            created_by: Some(session.user.id),
        };
        let created: Project = self
            .store
            .insert(&session.access_token, &row)
            .await
            .map_err(|err| {
                warn!(error = %err, "project create failed");
                Error::from(err)
            })?;
        info!(project_id = %created.id, "project created");

        self.refetch().await;
        Ok(created)
    }

    pub async fn update(&mut self, id: Uuid, draft: &ProjectDraft) -> Result<Project, Error> {
        let (name, description, budget) = draft.validate()?;
        self.observe_session();
        let session = self.session.require()?;

        let patch = ProjectPatch {
            name: Some(name),
            // an emptied field clears the stored description
            description: Some(description),
            budget: Some(budget),
        };
        let updated: Project = self
            .store
            .update(&session.access_token, &id.to_string(), &patch)
            .await
            .map_err(|err| {
                warn!(project_id = %id, error = %err, "project update failed");
                Error::from(err)
            })?;
        info!(project_id = %id, "project updated");

        self.refetch().await;
        Ok(updated)
    }

    /// Removes the project; the store deletes its cost entries with it.
    pub async fn delete(&mut self, id: Uuid) -> Result<(), Error> {
        self.observe_session();
        let session = self.session.require()?;

        self.store
            .delete::<Project>(&session.access_token, &id.to_string())
            .await
            .map_err(|err| {
                warn!(project_id = %id, error = %err, "project delete failed");
                Error::from(err)
            })?;
        info!(project_id = %id, "project deleted");

        self.refetch().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::session::{SessionConfig, SessionManager};
    use crate::sync::testing::{FakeIdentity, MemoryStore};

    async fn signed_in() -> (SessionManager<FakeIdentity>, Arc<MemoryStore>) {
        let provider = Arc::new(
            FakeIdentity::new()
                .with_account("pm@site.ua", "secret1", true)
                .with_account("other@site.ua", "secret1", true),
        );
        let manager = SessionManager::new(provider, SessionConfig::default());
        manager.sign_in("pm@site.ua", "secret1").await.unwrap();
        (manager, Arc::new(MemoryStore::new()))
    }

    fn draft(name: &str, budget: &str) -> ProjectDraft {
        ProjectDraft {
            name: name.into(),
            description: String::new(),
            budget: budget.into(),
        }
    }

    #[tokio::test]
    async fn create_refetches_newest_first() {
        let (manager, store) = signed_in().await;
        let mut repo = ProjectRepository::new(Arc::clone(&store), manager.subscribe());

        let first = repo.create(&draft("Warehouse", "100000")).await.unwrap();
        let second = repo.create(&draft("  Cottage ", "2500.5")).await.unwrap();

        let names: Vec<&str> = repo.projects().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Cottage", "Warehouse"]);
        assert_eq!(repo.projects()[0].id, second.id);
        assert_eq!(repo.projects()[1].id, first.id);
        assert_eq!(second.budget, Decimal::new(25005, 1));
        assert_eq!(
            second.created_by,
            Some(manager.current_session().unwrap().user.id)
        );
    }

    #[tokio::test]
    async fn empty_name_is_rejected_without_touching_the_store() {
        let (manager, store) = signed_in().await;
        let mut repo = ProjectRepository::new(Arc::clone(&store), manager.subscribe());

        let err = repo.create(&draft("   ", "1000")).await.unwrap_err();

        assert!(matches!(err, Error::Validation(ValidationError::EmptyName)));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn negative_budget_is_rejected_without_touching_the_store() {
        let (manager, store) = signed_in().await;
        let mut repo = ProjectRepository::new(Arc::clone(&store), manager.subscribe());

        let err = repo.create(&draft("Bridge", "-5")).await.unwrap_err();

        assert!(matches!(err, Error::Validation(ValidationError::NegativeBudget)));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_the_previous_list() {
        let (manager, store) = signed_in().await;
        let mut repo = ProjectRepository::new(Arc::clone(&store), manager.subscribe());
        repo.create(&draft("School", "900")).await.unwrap();

        store.fail_next();
        let err = repo.list().await.unwrap_err();

        assert!(matches!(err, Error::DataAccess(_)));
        assert_eq!(repo.projects().len(), 1);
        assert!(repo.snapshot().error().is_some());
        assert!(!repo.snapshot().is_loading());
    }

    #[tokio::test]
    async fn failed_create_leaves_local_state_unchanged() {
        let (manager, store) = signed_in().await;
        let mut repo = ProjectRepository::new(Arc::clone(&store), manager.subscribe());
        repo.create(&draft("School", "900")).await.unwrap();

        store.fail_next();
        assert!(repo.create(&draft("Gym", "300")).await.is_err());

        assert_eq!(repo.projects().len(), 1);
        assert_eq!(store.row_count("projects"), 1);
    }

    #[tokio::test]
    async fn update_and_delete_refetch() {
        let (manager, store) = signed_in().await;
        let mut repo = ProjectRepository::new(Arc::clone(&store), manager.subscribe());
        let keep = repo.create(&draft("Garage", "10")).await.unwrap();
        let doomed = repo.create(&draft("Shed", "20")).await.unwrap();

        let edited = ProjectDraft {
            name: "Garage extension".into(),
            description: "two bays".into(),
            budget: "15".into(),
        };
        repo.update(keep.id, &edited).await.unwrap();
        repo.delete(doomed.id).await.unwrap();

        assert_eq!(repo.projects().len(), 1);
        let project = repo.get(keep.id).unwrap();
        assert_eq!(project.name, "Garage extension");
        assert_eq!(project.description.as_deref(), Some("two bays"));
        assert_eq!(project.budget, Decimal::from(15));
        assert!(repo.get(doomed.id).is_none());
    }

    #[tokio::test]
    async fn session_transition_clears_cached_projects() {
        let (manager, store) = signed_in().await;
        let mut repo = ProjectRepository::new(Arc::clone(&store), manager.subscribe());
        repo.create(&draft("Depot", "50")).await.unwrap();
        assert_eq!(repo.projects().len(), 1);

        manager.sign_out().await.unwrap();

        assert!(repo.observe_session());
        assert!(repo.projects().is_empty());
        assert!(matches!(repo.list().await, Err(Error::NotSignedIn)));
    }

    #[tokio::test]
    async fn emptied_description_is_cleared_on_update() {
        let (manager, store) = signed_in().await;
        let mut repo = ProjectRepository::new(Arc::clone(&store), manager.subscribe());
        let created = repo
            .create(&ProjectDraft {
                description: "two floors".into(),
                ..draft("Cottage", "1000")
            })
            .await
            .unwrap();
        assert_eq!(created.description.as_deref(), Some("two floors"));

        let updated = repo.update(created.id, &draft("Cottage", "1200")).await.unwrap();

        assert_eq!(updated.description, None);
        assert_eq!(updated.budget, Decimal::from(1200));
        assert_eq!(repo.get(created.id).unwrap().description, None);
    }
}
