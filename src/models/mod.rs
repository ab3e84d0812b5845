pub mod api;
pub mod deployment;
pub mod summary;

pub use api::{ApiEnvelope, ApiMessage, Project};
pub use deployment::Deployment;
pub use summary::{
    CleanupCheck, DeletionOutcome, DeletionRecord, ProjectReport, ProtectedDeployment,
    ProtectionReason, RunSummary,
};
