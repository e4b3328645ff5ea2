use std::future::Future;

use serde::{Deserialize, Serialize};

use super::declarations::DeclarationActor;
use super::domain::{ApplicationId, GsRecord};
use super::interview::InterviewRequest;

/// Storage abstraction so the workflow can be exercised in isolation.
///
/// Implementations must make `compare_and_swap` atomic: the write lands only if the stored
/// record still carries `expected_version`.
pub trait PersistenceGateway: Send + Sync {
    fn insert(&self, record: GsRecord) -> Result<GsRecord, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<GsRecord>, RepositoryError>;
    fn compare_and_swap(&self, record: GsRecord, expected_version: u64)
        -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record changed concurrently")]
    VersionConflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for declaration signing links (e-mail, SMS, portal inbox).
pub trait NotificationService: Send + Sync {
    fn resend_declaration_link(
        &self,
        application_id: &ApplicationId,
        actor: DeclarationActor,
        rotate_token: bool,
    ) -> impl Future<Output = Result<(), ExternalServiceError>> + Send;
}

/// Meeting provider used to book GS interviews.
pub trait MeetingService: Send + Sync {
    fn schedule_meeting(
        &self,
        application_id: &ApplicationId,
        request: &InterviewRequest,
    ) -> impl Future<Output = Result<MeetingId, ExternalServiceError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeetingId(pub String);

/// Failure reported by (or while calling) a third-party collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExternalServiceError {
    #[error("{service} did not respond within {timeout_ms}ms")]
    Timeout {
        service: &'static str,
        timeout_ms: u64,
    },
    #[error("{service} unavailable: {detail}")]
    Unavailable {
        service: &'static str,
        detail: String,
    },
    #[error("{service} rejected the request: {detail}")]
    Rejected {
        service: &'static str,
        detail: String,
    },
}
