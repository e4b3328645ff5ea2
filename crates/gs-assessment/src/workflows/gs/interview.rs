use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{ApplicationId, Caller};
use super::error::GsError;
use super::repository::{ExternalServiceError, MeetingId, MeetingService, PersistenceGateway};
use super::store::WorkflowStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewRequest {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: String,
    #[serde(default)]
    pub staff_id: Option<String>,
}

impl InterviewRequest {
    fn validate(&self) -> Result<(), GsError> {
        if self.title.trim().is_empty() {
            return Err(GsError::Validation("interview title is required".to_string()));
        }
        if self.timezone.trim().is_empty() {
            return Err(GsError::Validation("interview timezone is required".to_string()));
        }
        if self.end <= self.start {
            return Err(GsError::Validation(
                "interview must end after it starts".to_string(),
            ));
        }
        Ok(())
    }
}

/// A confirmed booking returned by the meeting provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewBooking {
    pub meeting_id: MeetingId,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: String,
    pub staff_id: Option<String>,
    pub booked_at: DateTime<Utc>,
}

/// Books interviews through the meeting provider. Never gates stage progression.
pub struct InterviewScheduler<P, M> {
    store: WorkflowStore<P>,
    meetings: Arc<M>,
    timeout: Duration,
}

impl<P, M> InterviewScheduler<P, M>
where
    P: PersistenceGateway + 'static,
    M: MeetingService + 'static,
{
    pub(crate) fn new(store: WorkflowStore<P>, meetings: Arc<M>, timeout: Duration) -> Self {
        Self {
            store,
            meetings,
            timeout,
        }
    }

    pub fn booking(
        &self,
        _caller: &Caller,
        application_id: &ApplicationId,
    ) -> Result<Option<InterviewBooking>, GsError> {
        Ok(self.store.load(application_id)?.interview)
    }

    /// Attempt a booking. Provider failures are logged and returned to the caller; stage
    /// state is never touched on failure and the record is not locked during the call.
    pub async fn schedule(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
        request: InterviewRequest,
    ) -> Result<InterviewBooking, GsError> {
        caller.require_staff("schedule interviews")?;
        request.validate()?;
        self.store.load(application_id)?;

        let call = self.meetings.schedule_meeting(application_id, &request);
        let meeting_id = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(meeting_id)) => meeting_id,
            Ok(Err(err)) => {
                warn!(%application_id, error = %err, "interview scheduling failed");
                return Err(err.into());
            }
            Err(_) => {
                let err = ExternalServiceError::Timeout {
                    service: "meeting provider",
                    timeout_ms: self.timeout.as_millis() as u64,
                };
                warn!(%application_id, error = %err, "interview scheduling timed out");
                return Err(err.into());
            }
        };

        let booking = InterviewBooking {
            meeting_id,
            title: request.title,
            start: request.start,
            end: request.end,
            timezone: request.timezone,
            staff_id: request.staff_id,
            booked_at: Utc::now(),
        };

        self.store.mutate(application_id, |record| {
            record.interview = Some(booking.clone());
            Ok(())
        })?;

        info!(
            %application_id,
            meeting_id = %booking.meeting_id.0,
            start = %booking.start,
            "gs interview booked"
        );
        Ok(booking)
    }
}
