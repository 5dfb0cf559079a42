use std::collections::HashMap;

use chrono::NaiveDate;

use crate::habit::HabitLogEntry;

/// Merge an entry into a log collection, keyed by calendar date.
///
/// Replaces the entry sharing `entry.date` in place, otherwise appends; the
/// relative order of all other entries is preserved and no two entries ever
/// share a date.
pub fn upsert_log(logs: &[HabitLogEntry], entry: HabitLogEntry) -> Vec<HabitLogEntry> {
    let mut merged = logs.to_vec();
    match merged.iter().position(|existing| existing.date == entry.date) {
        Some(index) => merged[index] = entry,
        None => merged.push(entry),
    }
    merged
}

pub fn completed_days(logs: &[HabitLogEntry]) -> u32 {
    logs.iter().filter(|entry| entry.completed).count() as u32
}

/// Percentage of logged days marked completed, rounded half-up. Empty logs
/// report 0.
pub fn completion_rate(logs: &[HabitLogEntry]) -> u8 {
    if logs.is_empty() {
        return 0;
    }
    let completed = completed_days(logs) as f64;
    (completed / logs.len() as f64 * 100.0).round() as u8
}

/// Consecutive completed days ending at `today`.
///
/// Walks backward one calendar day at a time; a missing date or a
/// `completed = false` entry anywhere in the walk, including at `today`
/// itself, ends the run. A streak that stopped yesterday counts 0.
pub fn streak(logs: &[HabitLogEntry], today: NaiveDate) -> u32 {
    let by_date: HashMap<NaiveDate, bool> = logs
        .iter()
        .map(|entry| (entry.date, entry.completed))
        .collect();

    let mut run = 0;
    let mut cursor = today;
    while by_date.get(&cursor).copied().unwrap_or(false) {
        run += 1;
        let Some(previous) = cursor.pred_opt() else {
            break;
        };
        cursor = previous;
    }
    run
}

/// Whole days since the habit started.
pub fn days_elapsed(start_date: NaiveDate, today: NaiveDate) -> i64 {
    (today - start_date).num_days()
}
