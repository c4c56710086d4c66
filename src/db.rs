use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::models::{
    Answers, DailyLog, EvidenceKind, EvidenceRecord, EvidenceStatus, ExamResult, UserProgress,
};
use crate::store::{unknown_user, ProgressStore, StatusUpdate};

const USER_COLUMNS: &str = "user_id, username, start_date, current_week, week_started_on, \
     total_points, projects_completed, concepts_mastered, total_hours, study_days, \
     current_streak, last_study_date";

const EVIDENCE_COLUMNS: &str = "id, user_id, week, evidence_type, content, status, \
     submitted_on, reviewed_on, score, feedback";

const EXAM_COLUMNS: &str = "id, user_id, week, attempt_number, score, passed, answers, taken_on";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Enrols a demo learner with a few days of history.
pub async fn seed(store: &PgStore, today: NaiveDate) -> anyhow::Result<i64> {
    let demo_id = 1001;
    let start = today - Duration::days(10);

    store.ensure_user(demo_id, "Avery Lee", start).await?;

    let sessions = [(4, 1.5), (3, 2.0), (2, 1.0), (1, 2.5), (0, 0.5)];
    for (days_ago, hours) in sessions {
        store
            .record_study(demo_id, hours, today - Duration::days(days_ago))
            .await?;
    }

    store.record_project(demo_id).await?;
    store.record_concept(demo_id).await?;
    store.record_concept(demo_id).await?;

    Ok(demo_id)
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies `change` to the locked learner and writes the counters back.
    async fn update_user<F>(&self, user_id: i64, change: F) -> anyhow::Result<UserProgress>
    where
        F: FnOnce(&mut UserProgress) + Send,
    {
        let mut tx = self.pool.begin().await?;
        let mut user = lock_user(&mut *tx, user_id).await?;
        change(&mut user);
        write_counters(&mut *tx, &user).await?;
        tx.commit().await.context("failed to commit learner update")?;
        Ok(user)
    }
}

/// Locks the learner row for the rest of the transaction.
async fn lock_user(conn: &mut PgConnection, user_id: i64) -> anyhow::Result<UserProgress> {
    let query =
        format!("SELECT {USER_COLUMNS} FROM study_mentor.users WHERE user_id = $1 FOR UPDATE");
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| unknown_user(user_id))?;

    user_from_row(&row)
}

async fn write_counters(conn: &mut PgConnection, user: &UserProgress) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE study_mentor.users
        SET total_points = $2, projects_completed = $3, concepts_mastered = $4,
            total_hours = $5, study_days = $6, current_streak = $7, last_study_date = $8
        WHERE user_id = $1
        "#,
    )
    .bind(user.user_id)
    .bind(user.total_points)
    .bind(user.projects_completed)
    .bind(user.concepts_mastered)
    .bind(user.total_hours)
    .bind(user.study_days)
    .bind(user.current_streak)
    .bind(user.last_study_date)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn user_from_row(row: &PgRow) -> anyhow::Result<UserProgress> {
    Ok(UserProgress {
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        start_date: row.try_get("start_date")?,
        current_week: row.try_get("current_week")?,
        week_started_on: row.try_get("week_started_on")?,
        total_points: row.try_get("total_points")?,
        projects_completed: row.try_get("projects_completed")?,
        concepts_mastered: row.try_get("concepts_mastered")?,
        total_hours: row.try_get("total_hours")?,
        study_days: row.try_get("study_days")?,
        current_streak: row.try_get("current_streak")?,
        last_study_date: row.try_get("last_study_date")?,
    })
}

fn evidence_from_row(row: &PgRow) -> anyhow::Result<EvidenceRecord> {
    let kind: String = row.try_get("evidence_type")?;
    let status: String = row.try_get("status")?;

    Ok(EvidenceRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        week: row.try_get("week")?,
        kind: kind.parse::<EvidenceKind>()?,
        content: row.try_get("content")?,
        status: status.parse::<EvidenceStatus>()?,
        submitted_on: row.try_get("submitted_on")?,
        reviewed_on: row.try_get("reviewed_on")?,
        score: row.try_get("score")?,
        feedback: row.try_get("feedback")?,
    })
}

fn exam_from_row(row: &PgRow) -> anyhow::Result<ExamResult> {
    let answers: Json<Answers> = row.try_get("answers")?;

    Ok(ExamResult {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        week: row.try_get("week")?,
        attempt_number: row.try_get("attempt_number")?,
        score: row.try_get("score")?,
        passed: row.try_get("passed")?,
        answers: answers.0,
        taken_on: row.try_get("taken_on")?,
    })
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn ensure_user(
        &self,
        user_id: i64,
        username: &str,
        today: NaiveDate,
    ) -> anyhow::Result<UserProgress> {
        let user = UserProgress::new(user_id, username, today);
        sqlx::query(
            r#"
            INSERT INTO study_mentor.users
            (user_id, username, start_date, current_week, week_started_on, total_points,
             projects_completed, concepts_mastered, total_hours, study_days, current_streak,
             last_study_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user.user_id)
        .bind(&user.username)
        .bind(user.start_date)
        .bind(user.current_week)
        .bind(user.week_started_on)
        .bind(user.total_points)
        .bind(user.projects_completed)
        .bind(user.concepts_mastered)
        .bind(user.total_hours)
        .bind(user.study_days)
        .bind(user.current_streak)
        .bind(user.last_study_date)
        .execute(&self.pool)
        .await?;

        self.user(user_id)
            .await?
            .ok_or_else(|| unknown_user(user_id))
    }

    async fn user(&self, user_id: i64) -> anyhow::Result<Option<UserProgress>> {
        let query = format!("SELECT {USER_COLUMNS} FROM study_mentor.users WHERE user_id = $1");
        let row = sqlx::query(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn active_users(&self) -> anyhow::Result<Vec<UserProgress>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM study_mentor.users \
             ORDER BY last_study_date DESC NULLS LAST"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut users = Vec::new();
        for row in &rows {
            let user = user_from_row(row)?;
            if user.is_active() {
                users.push(user);
            }
        }
        Ok(users)
    }

    async fn record_study(
        &self,
        user_id: i64,
        hours: f64,
        today: NaiveDate,
    ) -> anyhow::Result<UserProgress> {
        let mut tx = self.pool.begin().await?;

        let mut user = lock_user(&mut *tx, user_id).await?;
        user.apply_study(hours, today);
        write_counters(&mut *tx, &user).await?;

        sqlx::query(
            r#"
            INSERT INTO study_mentor.daily_progress AS dp (user_id, study_date, hours_studied)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, study_date) DO UPDATE
            SET hours_studied = dp.hours_studied + EXCLUDED.hours_studied
            "#,
        )
        .bind(user_id)
        .bind(today)
        .bind(hours)
        .execute(&mut *tx)
        .await?;

        tx.commit().await.context("failed to commit study log")?;
        Ok(user)
    }

    async fn record_project(&self, user_id: i64) -> anyhow::Result<UserProgress> {
        self.update_user(user_id, UserProgress::apply_project).await
    }

    async fn record_concept(&self, user_id: i64) -> anyhow::Result<UserProgress> {
        self.update_user(user_id, UserProgress::apply_concept).await
    }

    async fn set_week(&self, user_id: i64, week: i32, today: NaiveDate) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE study_mentor.users SET current_week = $2, week_started_on = $3 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(week)
        .bind(today)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(unknown_user(user_id));
        }
        Ok(())
    }

    async fn study_history(&self, user_id: i64, days: usize) -> anyhow::Result<Vec<DailyLog>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, study_date, hours_studied
            FROM study_mentor.daily_progress
            WHERE user_id = $1
            ORDER BY study_date DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(days as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut history = Vec::new();
        for row in rows {
            history.push(DailyLog {
                user_id: row.try_get("user_id")?,
                date: row.try_get("study_date")?,
                hours: row.try_get("hours_studied")?,
            });
        }

        Ok(history)
    }

    async fn upsert_evidence(
        &self,
        user_id: i64,
        week: i32,
        kind: EvidenceKind,
        content: &str,
        today: NaiveDate,
    ) -> anyhow::Result<EvidenceRecord> {
        let query = format!(
            "INSERT INTO study_mentor.evidence \
             (id, user_id, week, evidence_type, content, status, submitted_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id, week, evidence_type) DO UPDATE \
             SET content = EXCLUDED.content, status = EXCLUDED.status, \
                 submitted_on = EXCLUDED.submitted_on, \
                 reviewed_on = NULL, score = NULL, feedback = NULL \
             RETURNING {EVIDENCE_COLUMNS}"
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(week)
            .bind(kind.as_str())
            .bind(content)
            .bind(EvidenceStatus::PendingReview.as_str())
            .bind(today)
            .fetch_one(&self.pool)
            .await?;

        evidence_from_row(&row)
    }

    async fn set_evidence_status(
        &self,
        user_id: i64,
        week: i32,
        kind: EvidenceKind,
        update: &StatusUpdate,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE study_mentor.evidence
            SET status = $4, score = $5, feedback = $6, reviewed_on = $7
            WHERE user_id = $1 AND week = $2 AND evidence_type = $3
            "#,
        )
        .bind(user_id)
        .bind(week)
        .bind(kind.as_str())
        .bind(update.status.as_str())
        .bind(update.score)
        .bind(update.feedback.as_deref())
        .bind(update.reviewed_on)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn week_evidence(&self, user_id: i64, week: i32) -> anyhow::Result<Vec<EvidenceRecord>> {
        let query = format!(
            "SELECT {EVIDENCE_COLUMNS} FROM study_mentor.evidence \
             WHERE user_id = $1 AND week = $2"
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(week)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(evidence_from_row).collect()
    }

    async fn next_attempt(&self, user_id: i64, week: i32) -> anyhow::Result<i32> {
        let highest: Option<i32> = sqlx::query(
            "SELECT MAX(attempt_number) AS highest FROM study_mentor.exam_results \
             WHERE user_id = $1 AND week = $2",
        )
        .bind(user_id)
        .bind(week)
        .fetch_one(&self.pool)
        .await?
        .try_get("highest")?;

        Ok(highest.unwrap_or(0) + 1)
    }

    async fn insert_exam_result(&self, result: &ExamResult) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO study_mentor.exam_results
            (id, user_id, week, attempt_number, score, passed, answers, taken_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(result.id)
        .bind(result.user_id)
        .bind(result.week)
        .bind(result.attempt_number)
        .bind(result.score)
        .bind(result.passed)
        .bind(Json(&result.answers))
        .bind(result.taken_on)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_exam_result(
        &self,
        user_id: i64,
        week: i32,
    ) -> anyhow::Result<Option<ExamResult>> {
        let query = format!(
            "SELECT {EXAM_COLUMNS} FROM study_mentor.exam_results \
             WHERE user_id = $1 AND week = $2 \
             ORDER BY attempt_number DESC LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(week)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(exam_from_row).transpose()
    }

    async fn exam_attempts(&self, user_id: i64, week: i32) -> anyhow::Result<Vec<ExamResult>> {
        let query = format!(
            "SELECT {EXAM_COLUMNS} FROM study_mentor.exam_results \
             WHERE user_id = $1 AND week = $2 \
             ORDER BY attempt_number"
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(week)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(exam_from_row).collect()
    }
}
