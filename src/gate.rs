//! Single authority for "may the learner move on".

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::evidence::{Decision, EvidenceValidator};
use crate::models::UserProgress;
use crate::store::{unknown_user, ProgressStore};

#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Moved { from: i32, to: i32 },
    Denied(Decision),
    ProgramComplete,
}

pub struct AdvancementGate {
    store: Arc<dyn ProgressStore>,
    validator: Arc<EvidenceValidator>,
    total_weeks: i32,
}

impl AdvancementGate {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        validator: Arc<EvidenceValidator>,
        total_weeks: i32,
    ) -> Self {
        Self {
            store,
            validator,
            total_weeks,
        }
    }

    pub async fn can_advance(&self, user_id: i64, target_week: i32) -> anyhow::Result<Decision> {
        self.validator.can_advance(user_id, target_week).await
    }

    pub async fn week_completed(&self, user_id: i64, week: i32) -> anyhow::Result<bool> {
        Ok(self.can_advance(user_id, week + 1).await?.allowed)
    }

    pub async fn advance(&self, user_id: i64, today: NaiveDate) -> anyhow::Result<Advance> {
        let user = self
            .store
            .user(user_id)
            .await?
            .ok_or_else(|| unknown_user(user_id))?;

        let target = user.current_week + 1;
        if target > self.total_weeks {
            return Ok(Advance::ProgramComplete);
        }

        let decision = self.can_advance(user_id, target).await?;
        if !decision.allowed {
            return Ok(Advance::Denied(decision));
        }

        self.store.set_week(user_id, target, today).await?;
        info!(user_id, from = user.current_week, to = target, "learner advanced");
        Ok(Advance::Moved {
            from: user.current_week,
            to: target,
        })
    }

    /// Sends a learner back one week when the current week's deadline passed unfinished.
    /// Returns the week they were moved to.
    pub async fn reset_if_stalled(
        &self,
        user: &UserProgress,
        today: NaiveDate,
        deadline_days: i64,
    ) -> anyhow::Result<Option<i32>> {
        if user.current_week <= 1 {
            return Ok(None);
        }
        if (today - user.week_started_on).num_days() <= deadline_days {
            return Ok(None);
        }
        if self.week_completed(user.user_id, user.current_week).await? {
            return Ok(None);
        }

        let previous = user.current_week - 1;
        self.store.set_week(user.user_id, previous, today).await?;
        info!(
            user_id = user.user_id,
            from = user.current_week,
            to = previous,
            "stalled learner moved back"
        );
        Ok(Some(previous))
    }
}

/// Week the calendar says the learner should be in, counting from the start date.
pub fn scheduled_week(start: NaiveDate, today: NaiveDate, total_weeks: i32) -> i32 {
    let days = (today - start).num_days().max(0);
    ((days / 7) as i32 + 1).min(total_weeks)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::curriculum::Curriculum;
    use crate::evidence::tests::{record_exam, today, StubLinks};
    use crate::models::{EvidenceKind, EvidenceStatus};
    use crate::store::memory::MemoryStore;
    use crate::store::StatusUpdate;

    async fn setup() -> (Arc<MemoryStore>, AdvancementGate) {
        let store = Arc::new(MemoryStore::new());
        store.ensure_user(1, "ana", today()).await.unwrap();
        let curriculum = Arc::new(Curriculum::embedded().unwrap());
        let validator = EvidenceValidator::new(
            store.clone(),
            Arc::new(StubLinks::default()),
            curriculum.clone(),
            "https://api.github.com",
        )
        .unwrap();
        let gate = AdvancementGate::new(store.clone(), Arc::new(validator), curriculum.total_weeks);
        (store, gate)
    }

    async fn complete_week_one(store: &MemoryStore) {
        let approved = StatusUpdate {
            status: EvidenceStatus::Approved,
            score: Some(1.0),
            feedback: None,
            reviewed_on: Some(today()),
        };
        for kind in [
            EvidenceKind::ScreenshotProject,
            EvidenceKind::DeployedUrl,
            EvidenceKind::GithubRepository,
        ] {
            store.upsert_evidence(1, 1, kind, "ok", today()).await.unwrap();
            store.set_evidence_status(1, 1, kind, &approved).await.unwrap();
        }
        record_exam(store, 1, true).await;
    }

    #[test]
    fn scheduled_week_follows_calendar() {
        let start = today();
        assert_eq!(scheduled_week(start, start, 12), 1);
        assert_eq!(scheduled_week(start, start + Duration::days(6), 12), 1);
        assert_eq!(scheduled_week(start, start + Duration::days(7), 12), 2);
        assert_eq!(scheduled_week(start, start + Duration::days(400), 12), 12);
        assert_eq!(scheduled_week(start, start - Duration::days(3), 12), 1);
    }

    #[tokio::test]
    async fn advance_is_denied_until_week_is_complete() {
        let (store, gate) = setup().await;

        let outcome = gate.advance(1, today()).await.unwrap();
        assert!(matches!(outcome, Advance::Denied(_)));
        assert_eq!(store.user(1).await.unwrap().unwrap().current_week, 1);

        complete_week_one(&store).await;
        let outcome = gate.advance(1, today()).await.unwrap();
        assert_eq!(outcome, Advance::Moved { from: 1, to: 2 });
        assert_eq!(store.user(1).await.unwrap().unwrap().current_week, 2);
    }

    #[tokio::test]
    async fn last_week_reports_completion() {
        let (store, gate) = setup().await;
        store.set_week(1, 12, today()).await.unwrap();
        assert_eq!(gate.advance(1, today()).await.unwrap(), Advance::ProgramComplete);
    }

    #[tokio::test]
    async fn stalled_week_is_reset_once_deadline_passes() {
        let (store, gate) = setup().await;
        store.set_week(1, 2, today()).await.unwrap();
        let user = store.user(1).await.unwrap().unwrap();

        let on_time = gate
            .reset_if_stalled(&user, today() + Duration::days(7), 7)
            .await
            .unwrap();
        assert_eq!(on_time, None);

        let late = gate
            .reset_if_stalled(&user, today() + Duration::days(8), 7)
            .await
            .unwrap();
        assert_eq!(late, Some(1));
        assert_eq!(store.user(1).await.unwrap().unwrap().current_week, 1);
    }

    #[tokio::test]
    async fn first_week_is_never_reset() {
        let (store, gate) = setup().await;
        let user = store.user(1).await.unwrap().unwrap();
        let result = gate
            .reset_if_stalled(&user, today() + Duration::days(30), 7)
            .await
            .unwrap();
        assert_eq!(result, None);
    }
}
