use crate::infra::{InMemoryGsRepository, InMemoryMeetingService, LoggingNotificationService};
use chrono::{Duration, Utc};
use clap::Args;
use gs_assessment::config::WorkflowConfig;
use gs_assessment::error::AppError;
use gs_assessment::workflows::gs::{
    Answer, ApplicantSnapshot, ApplicationId, AssessmentAnswers, Caller, CallerRole,
    DeclarationActor, GsStage, InterviewRequest, Recommendation, ReviewVerdict, RiskLevel,
    StageController, StageOverview, GS_DOCUMENT_COUNT, GS_DOCUMENT_LABELS,
};
use serde_json::json;
use std::sync::Arc;

type DemoController =
    StageController<InMemoryGsRepository, LoggingNotificationService, InMemoryMeetingService>;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Application identifier used for the walkthrough
    #[arg(long, default_value = "app-demo-0001")]
    pub(crate) application_id: String,
    /// Applicant name recorded when the workflow opens
    #[arg(long, default_value = "Amara Okafor")]
    pub(crate) applicant: String,
    /// Final decision to record
    #[arg(long, value_parser = parse_recommendation, default_value = "approved")]
    pub(crate) decision: Recommendation,
    /// Use the admin bulk-approval shortcut instead of reviewing documents one by one
    #[arg(long)]
    pub(crate) bulk_approve: bool,
}

fn parse_recommendation(raw: &str) -> Result<Recommendation, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "approved" => Ok(Recommendation::Approved),
        "not_approved" => Ok(Recommendation::NotApproved),
        "conditional_approval" => Ok(Recommendation::ConditionalApproval),
        other => Err(format!(
            "unknown decision '{other}' (expected approved, not_approved or conditional_approval)"
        )),
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        application_id,
        applicant,
        decision,
        bulk_approve,
    } = args;

    let controller: DemoController = StageController::new(
        Arc::new(InMemoryGsRepository::default()),
        Arc::new(LoggingNotificationService),
        Arc::new(InMemoryMeetingService::default()),
        WorkflowConfig {
            demo_mode: bulk_approve,
            ..WorkflowConfig::default()
        },
    );

    let staff = Caller::staff("staff-demo");
    let student = Caller::new("student-demo", CallerRole::Student);
    let agent = Caller::new("agent-demo", CallerRole::Agent);
    let id = ApplicationId(application_id);

    println!("GS assessment demo for {id}");
    controller.open(
        &staff,
        &id,
        ApplicantSnapshot {
            full_name: applicant,
            nationality: Some("Nigeria".to_string()),
            course_code: Some("MDS-2026".to_string()),
            intake: Some("2026-T1".to_string()),
            agent_name: Some("Harbour Education".to_string()),
        },
    )?;
    render_board(&controller.overview(&staff, &id)?);

    println!("\nStage 1: documents");
    for (index, label) in GS_DOCUMENT_LABELS.iter().enumerate() {
        let number = index as u8 + 1;
        controller.documents().upload(
            &student,
            &id,
            number,
            &format!("demo://{id}/document-{number}.pdf"),
        )?;
        println!("- uploaded {number}. {label}");
    }
    if bulk_approve {
        let approved = controller
            .documents()
            .approve_all(&Caller::admin("admin-demo"), &id)?;
        println!("- bulk approved {approved} documents");
    } else {
        for number in 1..=GS_DOCUMENT_COUNT as u8 {
            controller.documents().set_status(
                &staff,
                &id,
                number,
                ReviewVerdict::Approved,
                None,
            )?;
        }
        println!("- reviewed and approved {GS_DOCUMENT_COUNT} documents");
    }
    advance(&controller, &staff, &id, GsStage::Documents)?;

    println!("\nStage 2: declarations");
    for (caller, actor) in [
        (&student, DeclarationActor::Student),
        (&agent, DeclarationActor::Agent),
    ] {
        controller.declarations().submit(
            caller,
            &id,
            actor,
            json!({ "signed_by": caller.id, "genuine_intent": true }),
        )?;
        controller.declarations().verify(&staff, &id, actor)?;
        println!("- {} declaration submitted and verified", actor.label());
    }
    advance(&controller, &staff, &id, GsStage::Declarations)?;

    println!("\nStage 3: schedule");
    let start = Utc::now() + Duration::days(2);
    let booking = controller
        .interviews()
        .schedule(
            &staff,
            &id,
            InterviewRequest {
                title: "Genuine Student interview".to_string(),
                start,
                end: start + Duration::minutes(45),
                timezone: "Australia/Melbourne".to_string(),
                staff_id: Some(staff.id.clone()),
            },
        )
        .await?;
    println!(
        "- interview {} booked for {}",
        booking.meeting_id.0,
        booking.start.format("%Y-%m-%d %H:%M UTC")
    );
    advance(&controller, &staff, &id, GsStage::Schedule)?;

    println!("\nStage 4: interview");
    println!("- interview held");
    advance(&controller, &staff, &id, GsStage::Interview)?;

    println!("\nStage 5: assessment");
    let answers = demo_answers(decision);
    controller.assessments().save_draft(&staff, &id, answers.clone())?;
    let submitted = controller.assessments().submit(&staff, &id, answers)?;
    println!(
        "- assessment submitted ({}/{} and {}/{} questions answered)",
        submitted.answers.stage1_answered(),
        submitted.answers.stage1_answers.len(),
        submitted.answers.stage2_answered(),
        submitted.answers.stage2_answers.len()
    );
    let recorded = controller.assessments().finalize_decision(
        &staff,
        &id,
        decision,
        "Walkthrough decision recorded by the demo command",
    )?;
    println!(
        "- decision {} recorded by {}",
        recorded.final_decision.label(),
        recorded.decided_by
    );
    advance(&controller, &staff, &id, GsStage::Assessment)?;
    Ok(())
}

fn advance(
    controller: &DemoController,
    staff: &Caller,
    id: &ApplicationId,
    stage: GsStage,
) -> Result<(), AppError> {
    let progress = controller.complete_stage(staff, id, stage.index())?;
    println!("- {stage} stage completed");
    render_board(&StageOverview::from(&progress));
    Ok(())
}

fn demo_answers(decision: Recommendation) -> AssessmentAnswers {
    let mut answers = AssessmentAnswers {
        recommendation: Some(decision),
        risk_level: Some(RiskLevel::Low),
        notes: Some("Study plan aligns with prior qualifications".to_string()),
        ..AssessmentAnswers::default()
    };
    if decision == Recommendation::ConditionalApproval {
        answers.conditions = Some("Provide an updated financial statement".to_string());
    }
    for row in answers.stage1_answers.iter_mut() {
        row.answer = Answer::Yes;
        row.evidence_verified = true;
    }
    for row in answers.stage2_answers.iter_mut() {
        row.answer = Answer::Yes;
    }
    answers
}

fn render_board(overview: &StageOverview) {
    println!("Stage board (current stage {})", overview.current_stage + 1);
    for step in &overview.steps_progress {
        println!("- {}. {:<12} {:?}", step.index + 1, step.label, step.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_parser_accepts_known_values() {
        assert_eq!(
            parse_recommendation("Conditional_Approval"),
            Ok(Recommendation::ConditionalApproval)
        );
        assert!(parse_recommendation("maybe").is_err());
    }

    #[test]
    fn conditional_demo_answers_state_conditions() {
        let answers = demo_answers(Recommendation::ConditionalApproval);
        assert!(answers.conditions.is_some());
        assert!(answers.is_fully_answered());
    }

    #[tokio::test]
    async fn demo_walkthrough_completes_every_stage() {
        let args = DemoArgs {
            application_id: "app-demo-test".to_string(),
            applicant: "Test Applicant".to_string(),
            decision: Recommendation::NotApproved,
            bulk_approve: true,
        };
        run_demo(args).await.expect("demo completes");
    }
}
