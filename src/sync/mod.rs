//! Client-side sync layer: session state plus the project and cost
//! repositories that mirror the hosted tables.

pub mod contract;
pub mod costs;
pub mod projects;
pub mod session;
pub mod snapshot;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use contract::{DataStore, Direction, IdentityProvider, Record, Select, VerificationKind};
pub use costs::{CostDraft, CostRepository};
pub use projects::{ProjectDraft, ProjectRepository};
pub use session::{AuthState, SessionConfig, SessionHandle, SessionManager};
pub use snapshot::Snapshot;
