use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::habit::Habit;
use crate::progress;

/// Snapshot of a single habit's advance toward its goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HabitProgress {
    pub days_elapsed: i64,
    pub completions_remaining: u32,
    /// Share of `target_completions` reached, capped at 100.
    pub progress_percent: f64,
    pub timeframe_days_remaining: Option<i64>,
}

impl HabitProgress {
    pub fn for_habit(habit: &Habit, today: NaiveDate) -> Self {
        let days_elapsed = progress::days_elapsed(habit.start_date, today);
        let completions_remaining = habit
            .target_completions
            .saturating_sub(habit.completed_days);
        let progress_percent = if habit.target_completions == 0 {
            0.0
        } else {
            let share = f64::from(habit.completed_days) / f64::from(habit.target_completions);
            (share * 100.0).min(100.0)
        };
        let timeframe_days_remaining = habit
            .timeframe
            .map(|window| (i64::from(window) - days_elapsed).max(0));
        Self {
            days_elapsed,
            completions_remaining,
            progress_percent,
            timeframe_days_remaining,
        }
    }
}

/// Aggregates across every habit, as shown on the stats overview.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OverviewStats {
    pub total_habits: usize,
    /// Habits with a live streak.
    pub active_habits: usize,
    pub average_streak: f64,
    pub average_completion_rate: f64,
}

impl OverviewStats {
    pub fn from_habits(habits: &[Habit]) -> Self {
        if habits.is_empty() {
            return Self::default();
        }
        let total = habits.len();
        let active = habits.iter().filter(|habit| habit.streak > 0).count();
        let streak_sum: u64 = habits.iter().map(|habit| u64::from(habit.streak)).sum();
        let rate_sum: u64 = habits
            .iter()
            .map(|habit| u64::from(habit.completion_rate))
            .sum();
        Self {
            total_habits: total,
            active_habits: active,
            average_streak: streak_sum as f64 / total as f64,
            average_completion_rate: rate_sum as f64 / total as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::{HabitLogEntry, DEFAULT_TARGET_COMPLETIONS};
    use chrono::DateTime;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("test date")
    }

    fn habit(name: &str, streak: u32, completion_rate: u8) -> Habit {
        Habit {
            id: name.to_lowercase(),
            name: name.to_string(),
            description: String::new(),
            target_completions: DEFAULT_TARGET_COMPLETIONS,
            timeframe: None,
            track_streak: true,
            target_time: None,
            start_date: date("2025-11-01"),
            created_at: DateTime::from_timestamp(0, 0).expect("epoch"),
            logs: Vec::new(),
            completed_days: 0,
            completion_rate,
            streak,
        }
    }

    #[test]
    fn overview_of_no_habits_is_all_zero() {
        let stats = OverviewStats::from_habits(&[]);
        assert_eq!(stats, OverviewStats::default());
    }

    #[test]
    fn overview_averages_streaks_and_rates() {
        let habits = vec![
            habit("Meditate", 4, 80),
            habit("Run", 0, 50),
            habit("Read", 2, 20),
        ];
        let stats = OverviewStats::from_habits(&habits);
        assert_eq!(stats.total_habits, 3);
        assert_eq!(stats.active_habits, 2);
        assert!((stats.average_streak - 2.0).abs() < f64::EPSILON);
        assert!((stats.average_completion_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn habit_progress_tracks_remaining_work() {
        let mut subject = habit("Run", 0, 50);
        subject.target_completions = 10;
        subject.completed_days = 4;
        subject.timeframe = Some(30);

        let snapshot = HabitProgress::for_habit(&subject, date("2025-11-07"));
        assert_eq!(snapshot.days_elapsed, 6);
        assert_eq!(snapshot.completions_remaining, 6);
        assert!((snapshot.progress_percent - 40.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.timeframe_days_remaining, Some(24));
    }

    #[test]
    fn habit_progress_saturates_past_the_goal() {
        let mut subject = habit("Run", 0, 100);
        subject.target_completions = 5;
        subject.completed_days = 9;
        subject.timeframe = Some(3);
        subject.logs = vec![HabitLogEntry {
            date: date("2025-11-01"),
            completed: true,
            time: None,
            mood: None,
        }];

        let snapshot = HabitProgress::for_habit(&subject, date("2025-11-07"));
        assert_eq!(snapshot.completions_remaining, 0);
        assert!((snapshot.progress_percent - 100.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.timeframe_days_remaining, Some(0));
    }
}
