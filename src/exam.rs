use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::curriculum::{Curriculum, Exam, Question};
use crate::error::{ExamError, ParseError};
use crate::models::{Answers, ExamResult, ScoreReport};
use crate::store::ProgressStore;

/// Score used when an exam has no auto-graded questions.
pub const NEUTRAL_SCORE: f64 = 0.5;

pub struct ExamStart<'a> {
    pub exam: &'a Exam,
    pub attempt: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerFeedback {
    /// `None` for questions that are reviewed by a person.
    pub correct: Option<bool>,
    pub message: String,
}

pub struct ExamEngine {
    store: Arc<dyn ProgressStore>,
    curriculum: Arc<Curriculum>,
    threshold: f64,
    max_attempts: i32,
}

impl ExamEngine {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        curriculum: Arc<Curriculum>,
        threshold: f64,
        max_attempts: i32,
    ) -> Self {
        Self {
            store,
            curriculum,
            threshold,
            max_attempts,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn exam(&self, week: i32) -> Result<&Exam, ExamError> {
        self.curriculum
            .exam(week)
            .ok_or(ExamError::NotConfigured(week))
    }

    async fn next_attempt(&self, user_id: i64, week: i32) -> Result<i32, ExamError> {
        let attempt = self.store.next_attempt(user_id, week).await?;
        if attempt > self.max_attempts {
            return Err(ExamError::MaxAttemptsReached {
                week,
                max: self.max_attempts,
            });
        }
        Ok(attempt)
    }

    pub async fn start(&self, user_id: i64, week: i32) -> Result<ExamStart<'_>, ExamError> {
        let exam = self.exam(week)?;
        let attempt = self.next_attempt(user_id, week).await?;
        Ok(ExamStart { exam, attempt })
    }

    pub fn check_answer(
        &self,
        week: i32,
        index: usize,
        answer: &str,
    ) -> Result<AnswerFeedback, ExamError> {
        let question = self
            .exam(week)?
            .questions
            .get(index)
            .ok_or(ExamError::QuestionNotFound { week, index })?;

        let feedback = match question {
            Question::MultipleChoice {
                correct,
                explanation,
                ..
            } => {
                let is_correct = answer.trim().eq_ignore_ascii_case(correct);
                AnswerFeedback {
                    correct: Some(is_correct),
                    message: if is_correct {
                        "Correct!".to_string()
                    } else {
                        explanation.clone()
                    },
                }
            }
            Question::Evidence { .. } => AnswerFeedback {
                correct: None,
                message: "Evidence registered for review".to_string(),
            },
            Question::Code { .. } => AnswerFeedback {
                correct: None,
                message: "Answer registered for manual review".to_string(),
            },
        };

        Ok(feedback)
    }

    /// Grades the multiple-choice questions; everything else is counted as pending review.
    pub fn score(&self, week: i32, answers: &Answers) -> Result<ScoreReport, ExamError> {
        let exam = self.exam(week)?;

        let auto_question_count = exam
            .questions
            .iter()
            .filter(|question| question.is_auto_graded())
            .count();

        let mut correct_count = 0;
        for (index, question) in exam.questions.iter().enumerate() {
            if let Question::MultipleChoice { correct, .. } = question {
                let given = answers.get(&index.to_string()).map(|a| a.trim());
                if given.is_some_and(|answer| answer.eq_ignore_ascii_case(correct)) {
                    correct_count += 1;
                }
            }
        }

        let score = if auto_question_count == 0 {
            NEUTRAL_SCORE
        } else {
            correct_count as f64 / auto_question_count as f64
        };

        Ok(ScoreReport {
            score,
            passed: score >= self.threshold,
            correct_count,
            auto_question_count,
            pending_review_count: exam.questions.len() - auto_question_count,
        })
    }

    /// Scores the answers and stores them as the next attempt.
    pub async fn submit(
        &self,
        user_id: i64,
        week: i32,
        answers: Answers,
        today: NaiveDate,
    ) -> Result<(ExamResult, ScoreReport), ExamError> {
        let report = self.score(week, &answers)?;
        let attempt_number = self.next_attempt(user_id, week).await?;

        let result = ExamResult {
            id: Uuid::new_v4(),
            user_id,
            week,
            attempt_number,
            score: report.score,
            passed: report.passed,
            answers,
            taken_on: today,
        };
        self.store.insert_exam_result(&result).await?;

        info!(
            user_id,
            week,
            attempt = attempt_number,
            score = report.score,
            passed = report.passed,
            "exam attempt recorded"
        );
        Ok((result, report))
    }

    pub async fn latest_result(
        &self,
        user_id: i64,
        week: i32,
    ) -> anyhow::Result<Option<ExamResult>> {
        self.store.latest_exam_result(user_id, week).await
    }

    pub async fn attempts(&self, user_id: i64, week: i32) -> anyhow::Result<Vec<ExamResult>> {
        self.store.exam_attempts(user_id, week).await
    }
}

/// Parses `0=B`-style pairs into an answer set.
pub fn parse_answers<S: AsRef<str>>(pairs: &[S]) -> Result<Answers, ParseError> {
    pairs
        .iter()
        .map(|pair| {
            let pair = pair.as_ref();
            let malformed = || ParseError::MalformedAnswer(pair.to_string());
            let (index, answer) = pair.split_once('=').ok_or_else(malformed)?;
            let index: usize = index.trim().parse().map_err(|_| malformed())?;
            let answer = answer.trim();
            if answer.is_empty() {
                return Err(malformed());
            }
            Ok((index.to_string(), answer.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    const TWO_QUESTIONS: &str = r#"
        total_weeks = 4
        points_target = 5.0
        phrases = ["keep going"]

        [[weeks]]
        number = 1
        title = "Basics"
        phase = "p"
        goal = "g"
        project = "x"
        estimated_time = "1h"
        tip = "t"
        daily_goal = "d"

        [weeks.exam]
        title = "Basics exam"

        [[weeks.exam.questions]]
        kind = "multiple_choice"
        prompt = "first"
        options = ["A) no", "B) yes"]
        correct = "B"

        [[weeks.exam.questions]]
        kind = "multiple_choice"
        prompt = "second"
        options = ["A) yes", "B) no", "C) maybe"]
        correct = "A"

        [[weeks.exam.questions]]
        kind = "evidence"
        prompt = "show it"
        required_evidence = ["deployed_url"]

        [[weeks]]
        number = 2
        title = "Review"
        phase = "p"
        goal = "g"
        project = "x"
        estimated_time = "1h"
        tip = "t"
        daily_goal = "d"

        [weeks.exam]
        title = "Review exam"

        [[weeks.exam.questions]]
        kind = "code"
        prompt = "explain"
    "#;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn engine() -> (Arc<MemoryStore>, ExamEngine) {
        let store = Arc::new(MemoryStore::new());
        let curriculum = Arc::new(Curriculum::from_toml(TWO_QUESTIONS).unwrap());
        let engine = ExamEngine::new(store.clone(), curriculum, 0.7, 3);
        (store, engine)
    }

    fn answers(pairs: &[&str]) -> Answers {
        parse_answers(pairs).unwrap()
    }

    #[test]
    fn half_right_fails_threshold() {
        let (_, engine) = engine();
        let report = engine.score(1, &answers(&["0=B", "1=C"])).unwrap();

        assert!((report.score - 0.5).abs() < f64::EPSILON);
        assert!(!report.passed);
        assert_eq!(report.correct_count, 1);
        assert_eq!(report.auto_question_count, 2);
        assert_eq!(report.pending_review_count, 1);
    }

    #[test]
    fn all_right_passes_case_insensitively() {
        let (_, engine) = engine();
        let report = engine.score(1, &answers(&["0=b", "1=A"])).unwrap();

        assert!((report.score - 1.0).abs() < f64::EPSILON);
        assert!(report.passed);
    }

    #[test]
    fn exam_without_auto_questions_scores_neutral() {
        let (_, engine) = engine();
        let report = engine.score(2, &Answers::new()).unwrap();

        assert!((report.score - NEUTRAL_SCORE).abs() < f64::EPSILON);
        assert!(!report.passed);
        assert_eq!(report.pending_review_count, 1);
    }

    #[test]
    fn missing_exam_is_reported() {
        let (_, engine) = engine();
        assert!(matches!(
            engine.score(3, &Answers::new()),
            Err(ExamError::NotConfigured(3))
        ));
    }

    #[test]
    fn per_question_feedback() {
        let (_, engine) = engine();
        assert_eq!(engine.check_answer(1, 0, "b").unwrap().correct, Some(true));
        assert_eq!(engine.check_answer(1, 1, "B").unwrap().correct, Some(false));
        assert_eq!(engine.check_answer(1, 2, "url").unwrap().correct, None);
        assert!(matches!(
            engine.check_answer(1, 9, "A"),
            Err(ExamError::QuestionNotFound { week: 1, index: 9 })
        ));
    }

    #[tokio::test]
    async fn attempts_increase_from_one() {
        let (_, engine) = engine();

        for expected in 1..=3 {
            let start = engine.start(5, 1).await.unwrap();
            assert_eq!(start.attempt, expected);
            let (result, _) = engine
                .submit(5, 1, answers(&["0=A"]), day())
                .await
                .unwrap();
            assert_eq!(result.attempt_number, expected);
        }

        let latest = engine.latest_result(5, 1).await.unwrap().unwrap();
        assert_eq!(latest.attempt_number, 3);
        assert_eq!(engine.attempts(5, 1).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn fourth_attempt_is_refused_without_new_row() {
        let (store, engine) = engine();
        for _ in 0..3 {
            engine.submit(5, 1, Answers::new(), day()).await.unwrap();
        }

        assert!(matches!(
            engine.start(5, 1).await,
            Err(ExamError::MaxAttemptsReached { week: 1, max: 3 })
        ));
        assert!(engine.submit(5, 1, Answers::new(), day()).await.is_err());
        assert_eq!(store.exam_attempts(5, 1).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn latest_attempt_decides() {
        let (_, engine) = engine();
        engine
            .submit(5, 1, answers(&["0=B", "1=A"]), day())
            .await
            .unwrap();
        engine
            .submit(5, 1, answers(&["0=C"]), day())
            .await
            .unwrap();

        let latest = engine.latest_result(5, 1).await.unwrap().unwrap();
        assert!(!latest.passed);
        assert!(engine.latest_result(5, 2).await.unwrap().is_none());
    }

    #[test]
    fn padded_indexes_grade_like_plain_ones() {
        let (_, engine) = engine();
        for first in ["0=B", "00=B", "+0=B"] {
            let report = engine.score(1, &answers(&[first, "1=A"])).unwrap();
            assert_eq!(report.correct_count, 2, "{first}");
        }
        assert_eq!(answers(&["007=c"]).get("7").map(String::as_str), Some("c"));
    }

    #[test]
    fn answer_pairs_must_be_well_formed() {
        assert!(parse_answers(&["0=B", " 1 = a "]).is_ok());
        assert!(parse_answers(&["B"]).is_err());
        assert!(parse_answers(&["x=B"]).is_err());
        assert!(parse_answers(&["0="]).is_err());
    }
}
