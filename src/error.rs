use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unknown evidence type '{0}'")]
    UnknownEvidenceType(String),
    #[error("unknown evidence status '{0}'")]
    UnknownStatus(String),
    #[error("expected <question>=<answer>, got '{0}'")]
    MalformedAnswer(String),
}

#[derive(Debug, Error)]
pub enum ExamError {
    #[error("no exam configured for week {0}")]
    NotConfigured(i32),
    #[error("maximum attempts reached ({max}) for week {week}; contact your mentor")]
    MaxAttemptsReached { week: i32, max: i32 },
    #[error("question {index} not found in the week {week} exam")]
    QuestionNotFound { week: i32, index: usize },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum CurriculumError {
    #[error("week {0} is defined more than once")]
    DuplicateWeek(i32),
    #[error("week {week} is outside the program (1..={total})")]
    WeekOutOfRange { week: i32, total: i32 },
    #[error("week {week}, question {index}: correct option '{correct}' is not among the options")]
    UnknownCorrectOption {
        week: i32,
        index: usize,
        correct: String,
    },
    #[error("the phrase list is empty")]
    NoPhrases,
    #[error("total_weeks must be at least 1, got {0}")]
    NoWeeks(i32),
    #[error("points_target must be positive, got {0}")]
    InvalidPointsTarget(f64),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}
