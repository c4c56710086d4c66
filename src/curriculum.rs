//! Static program content: weeks, exams, evidence guides and phrases.
//!
//! Parsed once at startup from TOML and shared read-only afterwards.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::CurriculumError;
use crate::models::EvidenceKind;

const DEFAULT_CURRICULUM: &str = include_str!("../curriculum/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct Curriculum {
    pub total_weeks: i32,
    pub points_target: f64,
    pub phrases: Vec<String>,
    #[serde(default)]
    pub evidence_types: BTreeMap<String, EvidenceGuide>,
    pub weeks: Vec<WeekContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceGuide {
    pub description: String,
    pub requirements: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeekContent {
    pub number: i32,
    pub title: String,
    pub phase: String,
    pub goal: String,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    pub project: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    pub estimated_time: String,
    pub tip: String,
    pub daily_goal: String,
    pub exam: Option<Exam>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Exam {
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Question {
    MultipleChoice {
        prompt: String,
        options: Vec<String>,
        correct: String,
        #[serde(default)]
        explanation: String,
    },
    Evidence {
        prompt: String,
        required_evidence: Vec<EvidenceKind>,
        #[serde(default)]
        validation_criteria: Vec<String>,
    },
    Code {
        prompt: String,
        #[serde(default)]
        expected_concepts: Vec<String>,
    },
}

impl Question {
    pub fn prompt(&self) -> &str {
        match self {
            Question::MultipleChoice { prompt, .. }
            | Question::Evidence { prompt, .. }
            | Question::Code { prompt, .. } => prompt,
        }
    }

    pub fn is_auto_graded(&self) -> bool {
        matches!(self, Question::MultipleChoice { .. })
    }
}

impl Curriculum {
    pub fn embedded() -> anyhow::Result<Self> {
        Self::from_toml(DEFAULT_CURRICULUM).context("embedded curriculum is invalid")
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read curriculum {}", path.display()))?;
                Self::from_toml(&raw)
                    .with_context(|| format!("invalid curriculum {}", path.display()))
            }
            None => Self::embedded(),
        }
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let curriculum: Curriculum = toml::from_str(raw)?;
        curriculum.validate()?;
        Ok(curriculum)
    }

    fn validate(&self) -> Result<(), CurriculumError> {
        if self.total_weeks < 1 {
            return Err(CurriculumError::NoWeeks(self.total_weeks));
        }
        if self.points_target <= 0.0 || !self.points_target.is_finite() {
            return Err(CurriculumError::InvalidPointsTarget(self.points_target));
        }
        if self.phrases.is_empty() {
            return Err(CurriculumError::NoPhrases);
        }

        let mut seen = HashSet::new();
        for week in &self.weeks {
            if week.number < 1 || week.number > self.total_weeks {
                return Err(CurriculumError::WeekOutOfRange {
                    week: week.number,
                    total: self.total_weeks,
                });
            }
            if !seen.insert(week.number) {
                return Err(CurriculumError::DuplicateWeek(week.number));
            }

            let questions = week.exam.iter().flat_map(|exam| exam.questions.iter());
            for (index, question) in questions.enumerate() {
                if let Question::MultipleChoice {
                    options, correct, ..
                } = question
                {
                    let known = options
                        .iter()
                        .any(|option| option_letter(option).eq_ignore_ascii_case(correct));
                    if !known {
                        return Err(CurriculumError::UnknownCorrectOption {
                            week: week.number,
                            index,
                            correct: correct.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    pub fn week(&self, number: i32) -> Option<&WeekContent> {
        self.weeks.iter().find(|week| week.number == number)
    }

    /// Content for `number`, or the job-search placeholder once the program is done.
    pub fn week_content(&self, number: i32) -> Cow<'_, WeekContent> {
        match self.week(number) {
            Some(week) => Cow::Borrowed(week),
            None => Cow::Owned(graduation_week(number)),
        }
    }

    pub fn exam(&self, week: i32) -> Option<&Exam> {
        self.week(week).and_then(|content| content.exam.as_ref())
    }

    /// Union of the evidence types demanded by the week's exam questions.
    /// Weeks without an exam require nothing.
    pub fn required_evidence(&self, week: i32) -> BTreeSet<EvidenceKind> {
        self.exam(week)
            .into_iter()
            .flat_map(|exam| exam.questions.iter())
            .filter_map(|question| match question {
                Question::Evidence {
                    required_evidence, ..
                } => Some(required_evidence.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn evidence_guide(&self, kind: EvidenceKind) -> Option<&EvidenceGuide> {
        self.evidence_types.get(kind.as_str())
    }

    pub fn phrase_for(&self, date: NaiveDate) -> &str {
        let digest = Sha256::digest(date.format("%Y-%m-%d").to_string().as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let index = (u64::from_be_bytes(prefix) % self.phrases.len() as u64) as usize;
        &self.phrases[index]
    }
}

/// First character of an option such as "B) Flexbox is for 1D layouts".
pub fn option_letter(option: &str) -> &str {
    option
        .char_indices()
        .nth(1)
        .map(|(end, _)| &option[..end])
        .unwrap_or(option)
}

fn graduation_week(number: i32) -> WeekContent {
    WeekContent {
        number,
        title: "Program Completed".to_string(),
        phase: "Job Search".to_string(),
        goal: "Congratulations, you have finished the program".to_string(),
        videos: vec!["Review and polish your portfolio".to_string()],
        tools: vec!["LinkedIn".to_string(), "AngelList".to_string(), "Indeed".to_string()],
        project: "Active job search".to_string(),
        requirements: vec![
            "Apply to 5 positions a day".to_string(),
            "Network on LinkedIn".to_string(),
            "Keep improving the portfolio".to_string(),
        ],
        estimated_time: "Full-time job hunting".to_string(),
        tip: "Time to land that job!".to_string(),
        daily_goal: "Apply to 5 positions a day".to_string(),
        exam: None,
    }
}
