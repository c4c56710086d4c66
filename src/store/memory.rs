use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::{unknown_user, ProgressStore, StatusUpdate};
use crate::models::{DailyLog, EvidenceKind, EvidenceRecord, EvidenceStatus, ExamResult, UserProgress};

#[derive(Default)]
struct State {
    users: HashMap<i64, UserProgress>,
    logs: HashMap<(i64, NaiveDate), f64>,
    evidence: HashMap<(i64, i32, EvidenceKind), EvidenceRecord>,
    exams: Vec<ExamResult>,
}

/// In-process store used by the service tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    fn update_user(
        &self,
        user_id: i64,
        f: impl FnOnce(&mut UserProgress),
    ) -> anyhow::Result<UserProgress> {
        self.with_state(|state| {
            let user = state.users.get_mut(&user_id).ok_or_else(|| unknown_user(user_id))?;
            f(user);
            Ok(user.clone())
        })
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn ensure_user(
        &self,
        user_id: i64,
        username: &str,
        today: NaiveDate,
    ) -> anyhow::Result<UserProgress> {
        Ok(self.with_state(|state| {
            state
                .users
                .entry(user_id)
                .or_insert_with(|| UserProgress::new(user_id, username, today))
                .clone()
        }))
    }

    async fn user(&self, user_id: i64) -> anyhow::Result<Option<UserProgress>> {
        Ok(self.with_state(|state| state.users.get(&user_id).cloned()))
    }

    async fn active_users(&self) -> anyhow::Result<Vec<UserProgress>> {
        let mut users: Vec<UserProgress> = self.with_state(|state| {
            state
                .users
                .values()
                .filter(|user| user.is_active())
                .cloned()
                .collect()
        });
        users.sort_by(|a, b| b.last_study_date.cmp(&a.last_study_date));
        Ok(users)
    }

    async fn record_study(
        &self,
        user_id: i64,
        hours: f64,
        today: NaiveDate,
    ) -> anyhow::Result<UserProgress> {
        let user = self.update_user(user_id, |user| user.apply_study(hours, today))?;
        self.with_state(|state| *state.logs.entry((user_id, today)).or_insert(0.0) += hours);
        Ok(user)
    }

    async fn record_project(&self, user_id: i64) -> anyhow::Result<UserProgress> {
        self.update_user(user_id, UserProgress::apply_project)
    }

    async fn record_concept(&self, user_id: i64) -> anyhow::Result<UserProgress> {
        self.update_user(user_id, UserProgress::apply_concept)
    }

    async fn set_week(&self, user_id: i64, week: i32, today: NaiveDate) -> anyhow::Result<()> {
        self.update_user(user_id, |user| {
            user.current_week = week;
            user.week_started_on = today;
        })?;
        Ok(())
    }

    async fn study_history(&self, user_id: i64, days: usize) -> anyhow::Result<Vec<DailyLog>> {
        let mut logs: Vec<DailyLog> = self.with_state(|state| {
            state
                .logs
                .iter()
                .filter(|((owner, _), _)| *owner == user_id)
                .map(|((owner, date), hours)| DailyLog {
                    user_id: *owner,
                    date: *date,
                    hours: *hours,
                })
                .collect()
        });
        logs.sort_by(|a, b| b.date.cmp(&a.date));
        logs.truncate(days);
        Ok(logs)
    }

    async fn upsert_evidence(
        &self,
        user_id: i64,
        week: i32,
        kind: EvidenceKind,
        content: &str,
        today: NaiveDate,
    ) -> anyhow::Result<EvidenceRecord> {
        Ok(self.with_state(|state| {
            let record = state
                .evidence
                .entry((user_id, week, kind))
                .or_insert_with(|| EvidenceRecord {
                    id: Uuid::new_v4(),
                    user_id,
                    week,
                    kind,
                    content: String::new(),
                    status: EvidenceStatus::PendingReview,
                    submitted_on: today,
                    reviewed_on: None,
                    score: None,
                    feedback: None,
                });
            record.content = content.to_string();
            record.status = EvidenceStatus::PendingReview;
            record.submitted_on = today;
            record.reviewed_on = None;
            record.score = None;
            record.feedback = None;
            record.clone()
        }))
    }

    async fn set_evidence_status(
        &self,
        user_id: i64,
        week: i32,
        kind: EvidenceKind,
        update: &StatusUpdate,
    ) -> anyhow::Result<bool> {
        Ok(self.with_state(|state| match state.evidence.get_mut(&(user_id, week, kind)) {
            Some(record) => {
                record.status = update.status;
                record.score = update.score;
                record.feedback = update.feedback.clone();
                record.reviewed_on = update.reviewed_on;
                true
            }
            None => false,
        }))
    }

    async fn week_evidence(&self, user_id: i64, week: i32) -> anyhow::Result<Vec<EvidenceRecord>> {
        Ok(self.with_state(|state| {
            state
                .evidence
                .values()
                .filter(|record| record.user_id == user_id && record.week == week)
                .cloned()
                .collect()
        }))
    }

    async fn next_attempt(&self, user_id: i64, week: i32) -> anyhow::Result<i32> {
        Ok(self.with_state(|state| {
            state
                .exams
                .iter()
                .filter(|result| result.user_id == user_id && result.week == week)
                .map(|result| result.attempt_number)
                .max()
                .unwrap_or(0)
                + 1
        }))
    }

    async fn insert_exam_result(&self, result: &ExamResult) -> anyhow::Result<()> {
        self.with_state(|state| state.exams.push(result.clone()));
        Ok(())
    }

    async fn latest_exam_result(
        &self,
        user_id: i64,
        week: i32,
    ) -> anyhow::Result<Option<ExamResult>> {
        Ok(self.with_state(|state| {
            state
                .exams
                .iter()
                .filter(|result| result.user_id == user_id && result.week == week)
                .max_by_key(|result| result.attempt_number)
                .cloned()
        }))
    }

    async fn exam_attempts(&self, user_id: i64, week: i32) -> anyhow::Result<Vec<ExamResult>> {
        let mut attempts: Vec<ExamResult> = self.with_state(|state| {
            state
                .exams
                .iter()
                .filter(|result| result.user_id == user_id && result.week == week)
                .cloned()
                .collect()
        });
        attempts.sort_by_key(|result| result.attempt_number);
        Ok(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    #[tokio::test]
    async fn same_day_logs_are_summed() {
        let store = MemoryStore::new();
        store.ensure_user(7, "ana", day(1)).await.unwrap();
        store.record_study(7, 1.0, day(1)).await.unwrap();
        store.record_study(7, 1.5, day(1)).await.unwrap();
        store.record_study(7, 2.0, day(2)).await.unwrap();

        let history = store.study_history(7, 7).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, day(2));
        assert!((history[1].hours - 2.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn ensure_user_keeps_existing_record() {
        let store = MemoryStore::new();
        store.ensure_user(7, "ana", day(1)).await.unwrap();
        store.record_project(7).await.unwrap();
        let again = store.ensure_user(7, "ana", day(9)).await.unwrap();

        assert_eq!(again.start_date, day(1));
        assert_eq!(again.projects_completed, 1);
    }

    #[tokio::test]
    async fn unknown_learner_is_an_error() {
        let store = MemoryStore::new();
        assert!(store.record_concept(99).await.is_err());
    }
}
