//! Moderation reports: filed by anyone signed in, worked by staff.

use std::sync::Arc;

use rf_core::clock::Clock;
use rf_core::error::{AppError, Result};
use rf_core::models::{ActingIdentity, Capability, Report, ReportStatus, Target};
use rf_core::traits::{ContentRepo, ReportRepo};
use tracing::info;
use uuid::Uuid;

use crate::guard::permit;
use crate::validation::{check_length, REPORT_REASON_CHARS};

pub struct ReportDesk {
    reports: Arc<dyn ReportRepo>,
    content: Arc<dyn ContentRepo>,
    clock: Arc<dyn Clock>,
}

impl ReportDesk {
    pub fn new(reports: Arc<dyn ReportRepo>, content: Arc<dyn ContentRepo>, clock: Arc<dyn Clock>) -> Self {
        Self {
            reports,
            content,
            clock,
        }
    }

    pub async fn file(&self, actor: &ActingIdentity, target: Target, reason: &str) -> Result<Report> {
        let reason = reason.trim();
        check_length("reason", reason, REPORT_REASON_CHARS)?;
        if self.content.target_owner(target).await?.is_none() {
            return Err(AppError::not_found(target.entity(), target.id()));
        }

        let report = Report {
            id: Uuid::now_v7(),
            reporter_id: actor.id,
            target,
            reason: reason.to_string(),
            status: ReportStatus::Open,
            created_at: self.clock.now(),
        };
        self.reports.insert_report(&report).await?;
        info!(report_id = %report.id, target = target.entity(), "report filed");
        Ok(report)
    }

    pub async fn list(&self, actor: &ActingIdentity) -> Result<Vec<Report>> {
        permit(actor, Capability::Moderate)?;
        self.reports.list_reports().await
    }

    /// `open -> closed`, once.
    pub async fn close(&self, actor: &ActingIdentity, id: Uuid) -> Result<()> {
        permit(actor, Capability::Moderate)?;
        if self.reports.close_report(id).await? {
            info!(report_id = %id, moderator = %actor.id, "report closed");
            return Ok(());
        }

        match self.reports.find_report(id).await? {
            Some(_) => Err(AppError::ValidationError("report is already closed".into())),
            None => Err(AppError::not_found("report", id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rf_core::clock::ManualClock;
    use rf_core::models::Role;
    use rf_core::traits::{MockContentRepo, MockReportRepo};

    use super::*;

    fn desk(reports: MockReportRepo, content: MockContentRepo) -> ReportDesk {
        ReportDesk::new(Arc::new(reports), Arc::new(content), Arc::new(ManualClock::default()))
    }

    fn actor(role: Role) -> ActingIdentity {
        ActingIdentity {
            id: Uuid::now_v7(),
            role,
        }
    }

    #[tokio::test]
    async fn test_file_requires_existing_target_and_reason() {
        let mut content = MockContentRepo::new();
        content.expect_target_owner().returning(|_| Ok(None));
        let mut reports = MockReportRepo::new();
        reports.expect_insert_report().never();
        let desk = desk(reports, content);

        assert!(matches!(
            desk.file(&actor(Role::User), Target::Post(Uuid::now_v7()), "spam").await,
            Err(AppError::NotFound(..))
        ));
        assert!(matches!(
            desk.file(&actor(Role::User), Target::Post(Uuid::now_v7()), "  ").await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_file_creates_open_report() {
        let mut content = MockContentRepo::new();
        content
            .expect_target_owner()
            .returning(|_| Ok(Some(Uuid::now_v7())));
        let mut reports = MockReportRepo::new();
        reports
            .expect_insert_report()
            .withf(|r| r.status == ReportStatus::Open && r.reason == "spam")
            .times(1)
            .returning(|_| Ok(()));

        let report = desk(reports, content)
            .file(&actor(Role::User), Target::Comment(Uuid::now_v7()), " spam ")
            .await
            .unwrap();
        assert_eq!(report.status, ReportStatus::Open);
    }

    #[tokio::test]
    async fn test_close_outcomes() {
        let closed_id = Uuid::now_v7();
        let mut reports = MockReportRepo::new();
        reports.expect_close_report().returning(|_| Ok(false));
        reports.expect_find_report().returning(move |id| {
            Ok((id == closed_id).then(|| Report {
                id,
                reporter_id: Uuid::now_v7(),
                target: Target::Post(Uuid::now_v7()),
                reason: "spam".into(),
                status: ReportStatus::Closed,
                created_at: Utc::now(),
            }))
        });
        let desk = desk(reports, MockContentRepo::new());
        let moderator = actor(Role::Moderator);

        assert!(matches!(
            desk.close(&actor(Role::User), closed_id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            desk.close(&moderator, closed_id).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            desk.close(&moderator, Uuid::now_v7()).await,
            Err(AppError::NotFound(..))
        ));
    }
}
