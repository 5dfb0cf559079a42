use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque identifier assigned by the backing store.
pub type HabitId = String;

pub const DEFAULT_TARGET_COMPLETIONS: u32 = 21;

/// A single day's completion record. At most one entry exists per calendar
/// date within a habit; logging the same date again replaces the entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitLogEntry {
    pub date: NaiveDate,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

/// Habit configuration plus its log history and derived statistics.
///
/// `logs` and the derived fields default when absent so documents written
/// before a habit was ever logged still decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    #[serde(default)]
    pub id: HabitId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub target_completions: u32,
    #[serde(default)]
    pub timeframe: Option<u32>,
    #[serde(default)]
    pub track_streak: bool,
    #[serde(default)]
    pub target_time: Option<NaiveTime>,
    pub start_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub logs: Vec<HabitLogEntry>,
    #[serde(default)]
    pub completed_days: u32,
    #[serde(default)]
    pub completion_rate: u8,
    #[serde(default)]
    pub streak: u32,
}

impl Habit {
    /// Log entry recorded for the given calendar date, if any.
    pub fn log_on(&self, date: NaiveDate) -> Option<&HabitLogEntry> {
        self.logs.iter().find(|entry| entry.date == date)
    }
}

/// Raw create/edit form input. Numeric fields arrive as text and are coerced
/// by [`HabitDraft::validate`]; blank text falls back to the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub target_completions: Option<String>,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub track_streak: bool,
    #[serde(default)]
    pub target_time: Option<NaiveTime>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("habit name must not be empty")]
    EmptyName,
    #[error("{field} must be a positive whole number, got `{value}`")]
    BadNumber { field: &'static str, value: String },
}

/// Configuration fields after form coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitConfig {
    pub name: String,
    pub description: String,
    pub target_completions: u32,
    pub timeframe: Option<u32>,
    pub track_streak: bool,
    pub target_time: Option<NaiveTime>,
}

impl HabitDraft {
    pub fn validate(&self) -> Result<HabitConfig, DraftError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DraftError::EmptyName);
        }
        let target_completions =
            parse_positive("target_completions", self.target_completions.as_deref())?
                .unwrap_or(DEFAULT_TARGET_COMPLETIONS);
        let timeframe = parse_positive("timeframe", self.timeframe.as_deref())?;
        Ok(HabitConfig {
            name: name.to_string(),
            description: self.description.clone(),
            target_completions,
            timeframe,
            track_streak: self.track_streak,
            target_time: self.target_time,
        })
    }
}

fn parse_positive(field: &'static str, raw: Option<&str>) -> Result<Option<u32>, DraftError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<u32>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(DraftError::BadNumber {
            field,
            value: trimmed.to_string(),
        }),
    }
}
