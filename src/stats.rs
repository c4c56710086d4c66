use chrono::NaiveDate;

use crate::models::UserProgress;

pub const MILESTONES: [f64; 5] = [3.0, 6.0, 9.0, 12.0, 15.0];
pub const POINTS_PER_WEEK: f64 = 1.25;

pub fn level(points: f64) -> u8 {
    match points {
        p if p >= 12.0 => 5,
        p if p >= 9.0 => 4,
        p if p >= 6.0 => 3,
        p if p >= 3.0 => 2,
        _ => 1,
    }
}

pub fn level_name(level: u8) -> &'static str {
    match level {
        1 => "Beginner Coder",
        2 => "Aspiring Developer",
        3 => "Intermediate Builder",
        4 => "Advanced Creator",
        5 => "Job Ready Developer",
        _ => "Coding Master",
    }
}

/// Points a learner on pace has collected by the end of `week`.
pub fn week_target(week: i32) -> f64 {
    week as f64 * POINTS_PER_WEEK
}

pub fn points_status(points: f64, target: f64) -> String {
    if points >= target {
        "Target reached!".to_string()
    } else {
        format!("{:.1} points to go", target - points)
    }
}

pub fn pace_feedback(week: i32, points: f64) -> &'static str {
    let expected = week_target(week);

    if points >= expected + 1.0 {
        "Excellent pace, you are ahead of schedule"
    } else if points >= expected {
        "Perfect pace, right on target"
    } else if points >= expected - 1.0 {
        "Good pace, room to improve"
    } else {
        "Pick up the pace, you can do it"
    }
}

pub fn next_milestone(points: f64) -> String {
    match MILESTONES.iter().find(|milestone| points < **milestone) {
        Some(milestone) => format!(
            "{:.1} points to the next milestone ({})",
            milestone - points,
            milestone
        ),
        None => "All milestones completed!".to_string(),
    }
}

/// Ten-cell bar for a 0-100 percentage.
pub fn progress_bar(percentage: f64) -> String {
    let filled = ((percentage.clamp(0.0, 100.0)) / 10.0).floor() as usize;
    format!("{}{}", "▓".repeat(filled), "░".repeat(10 - filled))
}

pub fn badges(user: &UserProgress, today: NaiveDate) -> Vec<&'static str> {
    let mut badges = Vec::new();
    let streak = user.streak_on(today);

    if streak >= 10 {
        badges.push("STREAK MASTER");
    } else if streak >= 5 {
        badges.push("CONSISTENT");
    }

    if user.total_hours >= 100.0 {
        badges.push("CENTURY");
    } else if user.total_hours >= 50.0 {
        badges.push("DEDICATED");
    }

    if user.projects_completed >= 5 {
        badges.push("BUILDER");
    }

    badges
}

/// Celebrations for round numbers of hours or streak days.
pub fn study_milestones(total_hours: f64, streak: i32) -> Vec<String> {
    let mut reached = Vec::new();

    let hours = total_hours.floor() as i64;
    if [10, 25, 50, 100].contains(&hours) {
        reached.push(format!("{hours}h milestone!"));
    }
    if [5, 10, 15, 21, 30].contains(&streak) {
        reached.push(format!("{streak}-day streak!"));
    }

    reached
}

pub fn hours_reaction(hours: f64) -> &'static str {
    match hours {
        h if h >= 4.0 => "BEAST MODE ON!",
        h if h >= 3.0 => "Excellent dedication!",
        h if h >= 2.0 => "Great work!",
        h if h >= 1.0 => "Perfect, consistency is key",
        _ => "Every minute counts!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_point_tiers() {
        assert_eq!(level(0.0), 1);
        assert_eq!(level(2.5), 1);
        assert_eq!(level(3.0), 2);
        assert_eq!(level(6.5), 3);
        assert_eq!(level(9.0), 4);
        assert_eq!(level(15.0), 5);
        assert_eq!(level_name(level(12.0)), "Job Ready Developer");
    }

    #[test]
    fn pace_compares_against_expected_points() {
        assert_eq!(pace_feedback(2, 3.6), "Excellent pace, you are ahead of schedule");
        assert_eq!(pace_feedback(2, 2.5), "Perfect pace, right on target");
        assert_eq!(pace_feedback(2, 1.5), "Good pace, room to improve");
        assert_eq!(pace_feedback(4, 1.0), "Pick up the pace, you can do it");
    }

    #[test]
    fn weekly_target_grows_with_the_week() {
        assert!((week_target(4) - 5.0).abs() < f64::EPSILON);
        assert_eq!(points_status(5.5, week_target(4)), "Target reached!");
        assert_eq!(points_status(2.0, week_target(3)), "1.8 points to go");
    }

    #[test]
    fn milestone_reports_remaining_points() {
        assert_eq!(next_milestone(1.5), "1.5 points to the next milestone (3)");
        assert_eq!(next_milestone(15.0), "All milestones completed!");
    }

    #[test]
    fn progress_bar_has_ten_cells() {
        assert_eq!(progress_bar(0.0), "░░░░░░░░░░");
        assert_eq!(progress_bar(45.0), "▓▓▓▓░░░░░░");
        assert_eq!(progress_bar(250.0), "▓▓▓▓▓▓▓▓▓▓");
    }

    #[test]
    fn badges_need_current_streak() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 10).unwrap();
        let mut user = UserProgress::new(1, "ana", today);
        user.current_streak = 6;
        user.last_study_date = Some(today);
        user.total_hours = 55.0;
        assert_eq!(badges(&user, today), vec!["CONSISTENT", "DEDICATED"]);

        let later = NaiveDate::from_ymd_opt(2026, 7, 20).unwrap();
        assert_eq!(badges(&user, later), vec!["DEDICATED"]);
    }

    #[test]
    fn milestones_fire_on_round_numbers() {
        assert_eq!(study_milestones(25.4, 5), vec!["25h milestone!", "5-day streak!"]);
        assert!(study_milestones(26.0, 6).is_empty());
    }
}
