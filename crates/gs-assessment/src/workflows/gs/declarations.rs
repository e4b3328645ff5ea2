use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::domain::{ApplicationId, Caller, CallerRole};
use super::error::GsError;
use super::repository::{NotificationService, PersistenceGateway};
use super::store::WorkflowStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationActor {
    Student,
    Agent,
}

impl DeclarationActor {
    pub const fn label(self) -> &'static str {
        match self {
            DeclarationActor::Student => "student",
            DeclarationActor::Agent => "agent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }

    fn submitted_by(self, caller: &Caller) -> bool {
        caller.is_staff()
            || matches!(
                (self, caller.role),
                (DeclarationActor::Student, CallerRole::Student)
                    | (DeclarationActor::Agent, CallerRole::Agent)
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationStatus {
    Pending,
    Submitted,
    Approved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub actor: DeclarationActor,
    pub status: DeclarationStatus,
    pub payload: Value,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Declaration {
    pub fn pending(actor: DeclarationActor) -> Self {
        Self {
            actor,
            status: DeclarationStatus::Pending,
            payload: Value::Null,
            submitted_at: None,
            approved_at: None,
        }
    }

    /// Store (or replace) the attestation. Locked once verified.
    pub fn submit(&mut self, payload: Value, now: DateTime<Utc>) -> Result<(), GsError> {
        if self.status == DeclarationStatus::Approved {
            return Err(GsError::InvalidTransition(format!(
                "{} declaration is already verified and cannot be edited",
                self.actor.label()
            )));
        }

        self.status = DeclarationStatus::Submitted;
        self.payload = payload;
        self.submitted_at = Some(now);
        Ok(())
    }

    /// Returns `true` when this call performed the approval.
    pub fn verify(&mut self, now: DateTime<Utc>) -> Result<bool, GsError> {
        match self.status {
            DeclarationStatus::Pending => Err(GsError::InvalidTransition(format!(
                "{} declaration has not been submitted",
                self.actor.label()
            ))),
            DeclarationStatus::Approved => Ok(false),
            DeclarationStatus::Submitted => {
                self.status = DeclarationStatus::Approved;
                self.approved_at = Some(now);
                Ok(true)
            }
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == DeclarationStatus::Approved
    }
}

/// The student and agent declarations for one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declarations {
    pub student: Declaration,
    pub agent: Declaration,
}

impl Declarations {
    pub fn new() -> Self {
        Self {
            student: Declaration::pending(DeclarationActor::Student),
            agent: Declaration::pending(DeclarationActor::Agent),
        }
    }

    pub fn get(&self, actor: DeclarationActor) -> &Declaration {
        match actor {
            DeclarationActor::Student => &self.student,
            DeclarationActor::Agent => &self.agent,
        }
    }

    pub fn get_mut(&mut self, actor: DeclarationActor) -> &mut Declaration {
        match actor {
            DeclarationActor::Student => &mut self.student,
            DeclarationActor::Agent => &mut self.agent,
        }
    }

    /// Declarations-stage gate.
    pub fn both_approved(&self) -> bool {
        self.student.is_approved() && self.agent.is_approved()
    }
}

impl Default for Declarations {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a best-effort link resend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkDispatch {
    pub actor: DeclarationActor,
    pub delivered: bool,
    pub rotated: bool,
}

/// Owns submission and approval of the two declarations.
pub struct DeclarationVerificationManager<P, N> {
    store: WorkflowStore<P>,
    notifications: Arc<N>,
    timeout: Duration,
}

impl<P, N> DeclarationVerificationManager<P, N>
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
{
    pub(crate) fn new(store: WorkflowStore<P>, notifications: Arc<N>, timeout: Duration) -> Self {
        Self {
            store,
            notifications,
            timeout,
        }
    }

    pub fn get(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
        actor: DeclarationActor,
    ) -> Result<Declaration, GsError> {
        if !actor.submitted_by(caller) {
            return Err(caller.forbidden(&format!("read the {} declaration", actor.label())));
        }
        let record = self.store.load(application_id)?;
        Ok(record.declarations.get(actor).clone())
    }

    pub fn submit(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
        actor: DeclarationActor,
        payload: Value,
    ) -> Result<Declaration, GsError> {
        if !actor.submitted_by(caller) {
            return Err(caller.forbidden(&format!("submit the {} declaration", actor.label())));
        }
        if !payload.is_object() {
            return Err(GsError::Validation(
                "declaration payload must be a JSON object".to_string(),
            ));
        }

        let declaration = self.store.mutate(application_id, |record| {
            let declaration = record.declarations.get_mut(actor);
            declaration.submit(payload.clone(), Utc::now())?;
            Ok(declaration.clone())
        })?;

        info!(%application_id, actor = actor.label(), caller = %caller.id, "gs declaration submitted");
        Ok(declaration)
    }

    pub fn verify(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
        actor: DeclarationActor,
    ) -> Result<Declaration, GsError> {
        caller.require_staff("verify declarations")?;

        let (declaration, newly_approved) = self.store.mutate(application_id, |record| {
            let declaration = record.declarations.get_mut(actor);
            let newly_approved = declaration.verify(Utc::now())?;
            Ok((declaration.clone(), newly_approved))
        })?;

        if newly_approved {
            info!(%application_id, actor = actor.label(), reviewer = %caller.id, "gs declaration verified");
        }
        Ok(declaration)
    }

    pub fn both_approved(
        &self,
        _caller: &Caller,
        application_id: &ApplicationId,
    ) -> Result<bool, GsError> {
        Ok(self.store.load(application_id)?.declarations.both_approved())
    }

    /// Ask the notification provider to resend the signing link. Provider failures and
    /// timeouts are logged and reported as `delivered: false`, never as errors.
    pub async fn resend_link(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
        actor: DeclarationActor,
        rotate_token: bool,
    ) -> Result<LinkDispatch, GsError> {
        caller.require_staff("resend declaration links")?;
        self.store.load(application_id)?;

        let call =
            self.notifications
                .resend_declaration_link(application_id, actor, rotate_token);
        let delivered = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(%application_id, actor = actor.label(), error = %err, "declaration link resend failed");
                false
            }
            Err(_) => {
                warn!(
                    %application_id,
                    actor = actor.label(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "declaration link resend timed out"
                );
                false
            }
        };

        Ok(LinkDispatch {
            actor,
            delivered,
            rotated: rotate_token && delivered,
        })
    }
}
