use gs_assessment::workflows::gs::{
    ApplicationId, DeclarationActor, ExternalServiceError, GsRecord, InterviewRequest, MeetingId,
    MeetingService, NotificationService, PersistenceGateway, RepositoryError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local GS record store. Each write is a compare-and-swap on the record version.
#[derive(Default, Clone)]
pub(crate) struct InMemoryGsRepository {
    records: Arc<Mutex<HashMap<ApplicationId, GsRecord>>>,
}

impl InMemoryGsRepository {
    fn guard(&self) -> Result<MutexGuard<'_, HashMap<ApplicationId, GsRecord>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl PersistenceGateway for InMemoryGsRepository {
    fn insert(&self, record: GsRecord) -> Result<GsRecord, RepositoryError> {
        let mut guard = self.guard()?;
        if guard.contains_key(&record.application_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.application_id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<GsRecord>, RepositoryError> {
        Ok(self.guard()?.get(id).cloned())
    }

    fn compare_and_swap(
        &self,
        record: GsRecord,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.guard()?;
        match guard.get(&record.application_id) {
            None => Err(RepositoryError::NotFound),
            Some(stored) if stored.version != expected_version => {
                Err(RepositoryError::VersionConflict)
            }
            Some(_) => {
                guard.insert(record.application_id.clone(), record);
                Ok(())
            }
        }
    }
}

/// Records resend requests in the service log until an outbound mailer is wired in.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotificationService;

impl NotificationService for LoggingNotificationService {
    async fn resend_declaration_link(
        &self,
        application_id: &ApplicationId,
        actor: DeclarationActor,
        rotate_token: bool,
    ) -> Result<(), ExternalServiceError> {
        info!(
            %application_id,
            actor = actor.label(),
            rotate_token,
            "declaration signing link queued"
        );
        Ok(())
    }
}

/// Hands out sequential meeting identifiers without contacting a provider.
#[derive(Default)]
pub(crate) struct InMemoryMeetingService {
    sequence: AtomicU64,
}

impl MeetingService for InMemoryMeetingService {
    async fn schedule_meeting(
        &self,
        application_id: &ApplicationId,
        request: &InterviewRequest,
    ) -> Result<MeetingId, ExternalServiceError> {
        let next = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let meeting_id = MeetingId(format!("mtg-{next:06}"));
        info!(
            %application_id,
            meeting_id = %meeting_id.0,
            start = %request.start,
            timezone = %request.timezone,
            "meeting reserved"
        );
        Ok(meeting_id)
    }
}
