use std::sync::Arc;

use tracing::debug;

use super::domain::{ApplicationId, GsRecord};
use super::error::GsError;
use super::repository::{PersistenceGateway, RepositoryError};

/// Optimistic read-modify-write over the persistence gateway.
pub(crate) struct WorkflowStore<P> {
    gateway: Arc<P>,
    write_attempts: u32,
}

impl<P> Clone for WorkflowStore<P> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            write_attempts: self.write_attempts,
        }
    }
}

impl<P> WorkflowStore<P>
where
    P: PersistenceGateway + 'static,
{
    pub(crate) fn new(gateway: Arc<P>, write_attempts: u32) -> Self {
        Self {
            gateway,
            write_attempts: write_attempts.max(1),
        }
    }

    pub(crate) fn insert(&self, record: GsRecord) -> Result<GsRecord, GsError> {
        match self.gateway.insert(record) {
            Ok(stored) => Ok(stored),
            Err(RepositoryError::Conflict) => Err(GsError::InvalidTransition(
                "GS assessment is already open for this application".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) fn load(&self, application_id: &ApplicationId) -> Result<GsRecord, GsError> {
        self.gateway
            .fetch(application_id)?
            .ok_or_else(|| GsError::NotFound(format!("application {application_id}")))
    }

    /// Apply `apply` to a fresh copy of the record and write it back conditionally.
    ///
    /// The closure re-runs against a newly loaded record after a version conflict, so it
    /// must derive everything from the record it is handed. Errors abort without writing,
    /// and a closure that leaves the record unchanged skips the write entirely.
    pub(crate) fn mutate<T, F>(&self, application_id: &ApplicationId, mut apply: F) -> Result<T, GsError>
    where
        F: FnMut(&mut GsRecord) -> Result<T, GsError>,
    {
        let mut attempt = 1;
        loop {
            let current = self.load(application_id)?;
            let mut next = current.clone();
            let value = apply(&mut next)?;

            if next == current {
                return Ok(value);
            }

            next.version = current.version + 1;
            match self.gateway.compare_and_swap(next, current.version) {
                Ok(()) => return Ok(value),
                Err(RepositoryError::VersionConflict) if attempt < self.write_attempts => {
                    debug!(%application_id, attempt, "gs record changed underneath us; retrying");
                    attempt += 1;
                }
                Err(RepositoryError::NotFound) => {
                    return Err(GsError::NotFound(format!("application {application_id}")))
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
