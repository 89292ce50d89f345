pub mod auth;
pub mod category;
pub mod cost_entry;
pub mod identity;
pub mod project;

pub use auth::{CredentialsRequest, EmailRequest, ErrorBody, PasswordRequest, SignUpRequest, VerifyRequest};
pub use category::CostCategory;
pub use cost_entry::{CostEntry, NewCostEntry};
pub use identity::{AccessToken, Identity, Session};
pub use project::{NewProject, Project, ProjectPatch};
