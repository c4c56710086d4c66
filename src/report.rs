//! Text replies for the learner and the markdown progress report.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::curriculum::{Curriculum, Question};
use crate::evidence::Decision;
use crate::exam::{AnswerFeedback, ExamStart};
use crate::gate::Advance;
use crate::models::{
    DailyLog, EvidenceKind, EvidenceState, EvidenceStatus, ExamResult, ScoreReport, UserProgress,
    ValidationOutcome,
};
use crate::stats;

fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

pub fn welcome(user: &UserProgress, curriculum: &Curriculum) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Welcome, {}!", user.username);
    let _ = writeln!(
        output,
        "You are enrolled in a {}-week program starting {}.",
        curriculum.total_weeks, user.start_date
    );
    let _ = writeln!(
        output,
        "Goal: {} points (1 per project, 0.5 per mastered concept).",
        curriculum.points_target
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Rule of thumb: 70% building, 30% watching tutorials.");
    let _ = writeln!(output, "Use `week` to see what to work on today.");
    output
}

pub fn week_message(curriculum: &Curriculum, user: &UserProgress, scheduled_week: i32) -> String {
    let week = curriculum.week_content(user.current_week);
    let mut output = String::new();

    let _ = writeln!(
        output,
        "WEEK {}/{} - {}",
        user.current_week, curriculum.total_weeks, week.title
    );
    if scheduled_week > user.current_week {
        let _ = writeln!(output, "(the calendar says week {scheduled_week})");
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "Phase: {}", week.phase);
    let _ = writeln!(output, "Goal: {}", week.goal);
    let _ = writeln!(output, "Project: {}", week.project);
    for requirement in &week.requirements {
        let _ = writeln!(output, "  - {requirement}");
    }
    let _ = writeln!(output, "Estimated time: {}", week.estimated_time);
    let _ = writeln!(output, "Daily goal: {}", week.daily_goal);

    if !week.videos.is_empty() {
        let _ = writeln!(output, "Videos: {}", week.videos.join("; "));
    }
    if !week.tools.is_empty() {
        let _ = writeln!(output, "Tools: {}", week.tools.join("; "));
    }
    let _ = writeln!(output, "Tip: {}", week.tip);

    output
}

pub fn progress_message(user: &UserProgress, curriculum: &Curriculum, today: NaiveDate) -> String {
    let points = user.total_points;
    let points_pct = (points / curriculum.points_target * 100.0).min(100.0);
    let program_pct = (user.current_week as f64 / curriculum.total_weeks as f64 * 100.0).min(100.0);
    let level = stats::level(points);
    let badges = stats::badges(user, today);

    let mut output = String::new();
    let _ = writeln!(output, "YOUR PROGRESS");
    let _ = writeln!(output, "Level {level}: {}", stats::level_name(level));
    let _ = writeln!(output, "{} {:.1}%", stats::progress_bar(points_pct), points_pct);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Program: week {}/{} ({:.1}%)",
        user.current_week, curriculum.total_weeks, program_pct
    );
    let _ = writeln!(
        output,
        "Points: {:.1}/{} ({} projects, {} concepts)",
        points, curriculum.points_target, user.projects_completed, user.concepts_mastered
    );
    let _ = writeln!(output, "Hours: {:.1}h over {} days", user.total_hours, user.study_days);
    let _ = writeln!(output, "Streak: {} days", user.streak_on(today));
    let _ = writeln!(output, "Pace: {}", stats::pace_feedback(user.current_week, points));
    let _ = writeln!(output, "Next: {}", stats::next_milestone(points));

    if badges.is_empty() {
        let _ = writeln!(output, "Keep going to unlock badges!");
    } else {
        let _ = writeln!(output, "Badges: {}", badges.join(" | "));
    }

    output
}

pub fn study_logged(hours: f64, user: &UserProgress, today: NaiveDate) -> String {
    let streak = user.streak_on(today);
    let mut output = String::new();

    let _ = writeln!(output, "{}", stats::hours_reaction(hours));
    let _ = writeln!(output, "Logged: {hours}h");
    let _ = writeln!(output, "Total: {:.1}h", user.total_hours);
    let _ = writeln!(output, "Streak: {streak} days");
    let _ = writeln!(output, "Study days: {}", user.study_days);

    for milestone in stats::study_milestones(user.total_hours, streak) {
        let _ = writeln!(output, "{milestone}");
    }

    output
}

pub fn project_completed(user: &UserProgress, curriculum: &Curriculum) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Project for week {} completed! +1 point", user.current_week);
    let _ = writeln!(
        output,
        "Points: {:.1}/{} ({:.1}%)",
        user.total_points,
        curriculum.points_target,
        user.total_points / curriculum.points_target * 100.0
    );
    let _ = writeln!(output, "Projects: {}", user.projects_completed);

    if user.current_week < curriculum.total_weeks {
        let next = curriculum.week_content(user.current_week + 1);
        let _ = writeln!(
            output,
            "Next up, week {}: {} (submit your evidence and pass the exam to unlock it)",
            user.current_week + 1,
            next.title
        );
    } else {
        let _ = writeln!(output, "Time to apply for junior positions!");
    }

    output
}

pub fn concept_completed(user: &UserProgress, curriculum: &Curriculum) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Concept mastered! +0.5 points");
    let _ = writeln!(
        output,
        "Points: {:.1}/{}",
        user.total_points, curriculum.points_target
    );
    let _ = writeln!(output, "Concepts: {}", user.concepts_mastered);
    output
}

pub fn objectives_message(user: &UserProgress, curriculum: &Curriculum) -> String {
    let week = curriculum.week_content(user.current_week);
    let target = stats::week_target(user.current_week);
    let mut output = String::new();

    let _ = writeln!(output, "YOUR OBJECTIVES");
    let _ = writeln!(
        output,
        "Week {}/{}: {}",
        user.current_week, curriculum.total_weeks, week.title
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Goal: {}", week.goal);
    let _ = writeln!(output, "Project: {}", week.project);
    let _ = writeln!(output, "Daily goal: {}", week.daily_goal);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Points: {:.1}/{}",
        user.total_points, curriculum.points_target
    );
    let _ = writeln!(output, "Week {} target: {target:.1} points", user.current_week);
    let _ = writeln!(output, "{}", stats::points_status(user.total_points, target));
    let _ = writeln!(output);

    if user.projects_completed < user.current_week {
        let _ = writeln!(output, "To finish this week: complete the project {}", week.project);
    } else {
        let _ = writeln!(output, "Project done! Polish the details or move on.");
    }
    let _ = writeln!(output, "Tip: {}", week.tip);
    output
}

pub fn next_week_message(user: &UserProgress, curriculum: &Curriculum) -> String {
    let mut output = String::new();

    if user.current_week >= curriculum.total_weeks {
        let _ = writeln!(output, "PROGRAM COMPLETE!");
        let _ = writeln!(output);
        let _ = writeln!(output, "Next professional steps:");
        for step in [
            "Apply for junior and trainee roles",
            "Keep building personal projects",
            "Contribute to open source",
            "Grow your professional network",
            "Specialise in one framework",
        ] {
            let _ = writeln!(output, "  - {step}");
        }
        return output;
    }

    let next_number = user.current_week + 1;
    let next = curriculum.week_content(next_number);
    let _ = writeln!(output, "WHAT COMES NEXT");
    let _ = writeln!(
        output,
        "Week {next_number}/{}: {}",
        curriculum.total_weeks, next.title
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Goal: {}", next.goal);
    let _ = writeln!(output, "Project: {}", next.project);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Points: {:.1}/{}",
        user.total_points, curriculum.points_target
    );
    let _ = writeln!(
        output,
        "Week {next_number} target: {:.1} points",
        stats::week_target(next_number)
    );
    let _ = writeln!(output, "Tip: {}", next.tip);
    let _ = writeln!(output);
    let _ = writeln!(output, "Finish the current week first!");
    output
}

pub fn history_message(logs: &[DailyLog]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "STUDY HISTORY");

    if logs.is_empty() {
        let _ = writeln!(output, "No study sessions logged yet.");
        return output;
    }

    for log in logs {
        let _ = writeln!(output, "- {}: {:.1}h", log.date, log.hours);
    }
    let total: f64 = logs.iter().map(|log| log.hours).sum();
    let _ = writeln!(output, "Total: {:.1}h over {} days", total, logs.len());
    output
}

pub fn evidence_outcome(
    kind: EvidenceKind,
    week: i32,
    outcome: &ValidationOutcome,
    curriculum: &Curriculum,
) -> String {
    let mut output = String::new();
    let heading = match outcome.status {
        EvidenceStatus::Approved => "Evidence approved",
        EvidenceStatus::PendingReview => "Evidence received",
        EvidenceStatus::Invalid => "Evidence rejected",
        EvidenceStatus::Missing => "Evidence missing",
    };

    let _ = writeln!(output, "{heading}: {kind} (week {week})");
    let _ = writeln!(output, "{}", outcome.message);
    if outcome.status == EvidenceStatus::Invalid {
        if let Some(guide) = curriculum.evidence_guide(kind) {
            let _ = writeln!(output, "Expected: {} ({})", guide.description, guide.requirements);
        }
    }
    output
}

pub fn exam_intro(week: i32, start: &ExamStart<'_>) -> String {
    let mut output = String::new();
    let questions = &start.exam.questions;

    let _ = writeln!(output, "EXAM WEEK {week} - {}", start.exam.title);
    let _ = writeln!(output, "Attempt #{}", start.attempt);

    for (index, question) in questions.iter().enumerate() {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Question {}/{} [{index}]: {}",
            index + 1,
            questions.len(),
            question.prompt()
        );
        match question {
            Question::MultipleChoice { options, .. } => {
                for option in options {
                    let _ = writeln!(output, "  {option}");
                }
            }
            Question::Evidence {
                required_evidence,
                validation_criteria,
                ..
            } => {
                let kinds: Vec<&str> = required_evidence.iter().map(|kind| kind.as_str()).collect();
                let _ = writeln!(output, "  Submit evidence: {}", kinds.join(", "));
                for criterion in validation_criteria {
                    let _ = writeln!(output, "  - {criterion}");
                }
            }
            Question::Code {
                expected_concepts, ..
            } => {
                let _ = writeln!(output, "  Free answer, reviewed manually.");
                if !expected_concepts.is_empty() {
                    let _ = writeln!(output, "  Concepts: {}", expected_concepts.join(", "));
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Submit with: exam submit --week {week} --answer 0=B ...");
    output
}

pub fn answer_feedback(feedback: &AnswerFeedback) -> String {
    match feedback.correct {
        Some(true) => format!("Correct! {}", feedback.message),
        Some(false) => format!("Not quite. {}", feedback.message),
        None => feedback.message.clone(),
    }
}

pub fn exam_result(week: i32, result: &ExamResult, report: &ScoreReport, threshold: f64) -> String {
    let mut output = String::new();
    let verdict = if report.passed { "PASSED" } else { "NOT PASSED" };

    let _ = writeln!(output, "EXAM WEEK {week}: {verdict}");
    let _ = writeln!(
        output,
        "Score: {} ({}/{} automatic questions, {} needed)",
        percent(report.score),
        report.correct_count,
        report.auto_question_count,
        percent(threshold)
    );
    if report.pending_review_count > 0 {
        let _ = writeln!(
            output,
            "{} question(s) pending manual or evidence review",
            report.pending_review_count
        );
    }
    let _ = writeln!(output, "Attempt #{}", result.attempt_number);
    output
}

pub fn latest_result_line(result: Option<&ExamResult>) -> String {
    match result {
        Some(result) if result.passed => format!("Passed ({})", percent(result.score)),
        Some(result) => format!(
            "Not passed ({}) - attempt #{}",
            percent(result.score),
            result.attempt_number
        ),
        None => "Not taken".to_string(),
    }
}

/// Approved evidence plus a passed exam, out of the required evidence plus the exam.
fn requirements_done(
    evidence: &BTreeMap<EvidenceKind, EvidenceState>,
    latest: Option<&ExamResult>,
) -> (usize, usize) {
    let approved = evidence
        .values()
        .filter(|state| state.status == EvidenceStatus::Approved)
        .count();
    let exam = usize::from(latest.is_some_and(|result| result.passed));
    (approved + exam, evidence.len() + 1)
}

pub fn validation_status(
    week: i32,
    evidence: &BTreeMap<EvidenceKind, EvidenceState>,
    latest: Option<&ExamResult>,
    decision: &Decision,
) -> String {
    let mut output = String::new();
    let (done, total) = requirements_done(evidence, latest);
    let pct = done as f64 / total as f64 * 100.0;

    let _ = writeln!(output, "VALIDATION STATUS - WEEK {week}");
    let _ = writeln!(output, "{} {done}/{total} requirements ({pct:.0}%)", stats::progress_bar(pct));
    let _ = writeln!(output);
    let _ = writeln!(output, "Evidence:");

    if evidence.is_empty() {
        let _ = writeln!(output, "  none required this week");
    }
    for (kind, state) in evidence {
        let label = match state.status {
            EvidenceStatus::Approved => "approved",
            EvidenceStatus::PendingReview => "pending review",
            EvidenceStatus::Invalid => "rejected",
            EvidenceStatus::Missing => "missing",
        };
        let _ = write!(output, "  {kind}: {label}");
        if let Some(score) = state.score {
            let _ = write!(output, " (score {score:.2})");
        }
        if let Some(feedback) = state.feedback.as_deref().filter(|f| !f.is_empty()) {
            let _ = write!(output, " - {feedback}");
        }
        let _ = writeln!(output);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Exam: {}", latest_result_line(latest));
    let _ = writeln!(output);
    if decision.allowed {
        let _ = writeln!(output, "You can move on to the next week.");
    } else {
        let _ = writeln!(output, "Blocked: {}", decision.reason);
    }
    output
}

pub fn advance_message(outcome: &Advance, curriculum: &Curriculum) -> String {
    match outcome {
        Advance::Moved { from, to } => format!(
            "Week {from} complete! Welcome to week {to}: {}",
            curriculum.week_content(*to).title
        ),
        Advance::Denied(decision) => format!("You cannot advance yet. {}", decision.reason),
        Advance::ProgramComplete => {
            "Congratulations, you have completed the whole program! Time to apply for junior roles."
                .to_string()
        }
    }
}

pub fn daily_reminder(user: &UserProgress, total_weeks: i32, today: NaiveDate) -> String {
    let streak = user.streak_on(today);
    let mut output = String::new();

    let _ = writeln!(output, "Good morning, {}!", user.username);
    let _ = writeln!(output);
    if streak >= 5 {
        let _ = writeln!(output, "Incredible {streak}-day streak! You are unstoppable.");
    } else if streak > 0 {
        let _ = writeln!(output, "{streak}-day streak. Keep the momentum!");
    } else {
        let _ = writeln!(output, "New day, new chance. Start your streak today.");
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "Week {}/{}", user.current_week, total_weeks);
    let _ = writeln!(output, "Hours so far: {:.1}h", user.total_hours);
    let _ = writeln!(output);
    let _ = writeln!(output, "Today: at least one hour of coding, then log it with `study`.");
    output
}

pub fn motivation_message(user: &UserProgress, phrase: &str) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Good evening, {}!", user.username);
    let _ = writeln!(output);
    let _ = writeln!(output, "Inspiration of the day:");
    let _ = writeln!(output, "{phrase}");
    let _ = writeln!(output);
    let _ = writeln!(output, "What did you learn today? Which challenge did you beat?");
    output
}

pub fn reset_notice(from: i32, to: i32) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "WEEK RESET: week {from} -> week {to}");
    let _ = writeln!(
        output,
        "The requirements for week {from} were not completed before the deadline."
    );
    let _ = writeln!(
        output,
        "To move on you need: every required evidence approved and the exam passed."
    );
    let _ = writeln!(output, "Use `status` to see what is missing. You can do it!");
    output
}

/// Markdown summary of a learner's standing, for mentors.
pub fn build_report(
    user: &UserProgress,
    curriculum: &Curriculum,
    evidence: &BTreeMap<EvidenceKind, EvidenceState>,
    latest: Option<&ExamResult>,
    history: &[DailyLog],
    today: NaiveDate,
) -> String {
    let week = curriculum.week_content(user.current_week);
    let level = stats::level(user.total_points);
    let mut output = String::new();

    let _ = writeln!(output, "# Study Mentor Report");
    let _ = writeln!(
        output,
        "Generated for {} on {} (enrolled {})",
        user.username, today, user.start_date
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Standing");
    let _ = writeln!(
        output,
        "- Week {}/{}: {}",
        user.current_week, curriculum.total_weeks, week.title
    );
    let _ = writeln!(
        output,
        "- Level {level} ({}), {:.1}/{} points",
        stats::level_name(level),
        user.total_points,
        curriculum.points_target
    );
    let _ = writeln!(
        output,
        "- {} projects, {} concepts",
        user.projects_completed, user.concepts_mastered
    );
    let _ = writeln!(
        output,
        "- {:.1}h over {} days, current streak {}",
        user.total_hours,
        user.study_days,
        user.streak_on(today)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Week {} Requirements", user.current_week);
    if evidence.is_empty() {
        let _ = writeln!(output, "No evidence required this week.");
    } else {
        for (kind, state) in evidence {
            let _ = writeln!(output, "- {kind}: {}", state.status);
        }
    }
    let _ = writeln!(output, "- exam: {}", latest_result_line(latest));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Study Sessions");
    if history.is_empty() {
        let _ = writeln!(output, "No study sessions logged yet.");
    } else {
        for log in history {
            let _ = writeln!(output, "- {}: {:.1}h", log.date, log.hours);
        }
    }

    output
}
