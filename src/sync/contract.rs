//! The two collaborator contracts the client consumes: the identity provider
//! and the table-based data store. The HTTP client in `cli::api` implements
//! both against the hosted store; tests use in-memory fakes.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::database::models::{AccessToken, CostCategory, CostEntry, Identity, Project, Session};
use crate::error::{ProviderError, StoreError};

/// A row type stored in a named remote table.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;
}

impl Record for Project {
    const TABLE: &'static str = "projects";
}

impl Record for CostEntry {
    const TABLE: &'static str = "cost_entries";
}

impl Record for CostCategory {
    const TABLE: &'static str = "cost_categories";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(Self::Ascending),
            "desc" => Some(Self::Descending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub direction: Direction,
}

/// Equality filters plus an optional order-by, the only query shape the store supports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Select {
    filters: Vec<(&'static str, String)>,
    order: Option<Order>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: impl ToString) -> Self {
        self.filters.push((column, value.to_string()));
        self
    }

    pub fn order_by(mut self, column: &'static str, direction: Direction) -> Self {
        self.order = Some(Order { column, direction });
        self
    }

    pub fn filters(&self) -> &[(&'static str, String)] {
        &self.filters
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// Query-string pairs in the `col=eq.value` / `order=col.dir` form.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|(column, value)| (column.to_string(), format!("eq.{value}")))
            .collect();
        if let Some(order) = &self.order {
            pairs.push((
                "order".into(),
                format!("{}.{}", order.column, order.direction.as_str()),
            ));
        }
        pairs
    }
}

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select<R: Record>(
        &self,
        token: &AccessToken,
        query: &Select,
    ) -> Result<Vec<R>, StoreError>;

    /// Inserts one row and returns it as stored.
    async fn insert<R: Record, I: Serialize + Sync>(
        &self,
        token: &AccessToken,
        row: &I,
    ) -> Result<R, StoreError>;

    async fn update<R: Record, P: Serialize + Sync>(
        &self,
        token: &AccessToken,
        id: &str,
        patch: &P,
    ) -> Result<R, StoreError>;

    async fn delete<R: Record>(&self, token: &AccessToken, id: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationKind {
    Signup,
    Recovery,
}

impl VerificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::Recovery => "recovery",
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Registers a pending identity; it cannot sign in until confirmed.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, ProviderError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ProviderError>;

    async fn sign_out(&self, token: &AccessToken) -> Result<(), ProviderError>;

    /// Recovers a previously established session, if any is still valid.
    async fn get_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Exchanges a confirmation or recovery token for a session.
    async fn verify(&self, token: &str, kind: VerificationKind) -> Result<Session, ProviderError>;

    async fn reset_password(&self, email: &str) -> Result<(), ProviderError>;

    async fn update_password(
        &self,
        token: &AccessToken,
        password: &str,
    ) -> Result<Identity, ProviderError>;

    async fn resend_confirmation(&self, email: &str) -> Result<(), ProviderError>;
}
