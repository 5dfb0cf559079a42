use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use habit_domain::clock::{Clock, SystemClock};
use habit_domain::habit::{DraftError, Habit, HabitDraft, HabitId, HabitLogEntry};
use habit_domain::progress;
use habit_domain::stats::{HabitProgress, OverviewStats};

use crate::store::{Document, DocumentStore, ErrorHandler, SnapshotHandler, StoreError, Subscription};

#[derive(Debug, Error)]
pub enum HabitError {
    #[error(transparent)]
    Validation(#[from] DraftError),
    #[error("log date {date} is outside [{start}, {today}]")]
    InvalidDate {
        date: NaiveDate,
        start: NaiveDate,
        today: NaiveDate,
    },
    #[error("habit not found: {0}")]
    NotFound(HabitId),
    /// A decline, not a failure: another operation on this habit was in
    /// flight and nothing was touched.
    #[error("habit {0} is busy with another operation")]
    Busy(HabitId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Sole writer of persisted habits.
///
/// Mediates between callers and the document store, keeps derived statistics
/// consistent with the log history, and serializes mutating operations per
/// habit id. Every mutation either persists the whole updated aggregate in
/// one write or leaves the stored state untouched.
pub struct HabitService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    collection: String,
    in_flight: Mutex<HashSet<HabitId>>,
}

pub struct HabitServiceBuilder {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    user_id: String,
}

impl HabitServiceBuilder {
    pub fn new(store: Arc<dyn DocumentStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            user_id: user_id.into(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> HabitService {
        HabitService {
            store: self.store,
            clock: self.clock,
            collection: format!("users/{}/habits", self.user_id),
            in_flight: Mutex::new(HashSet::new()),
        }
    }
}

impl HabitService {
    pub fn builder(store: Arc<dyn DocumentStore>, user_id: impl Into<String>) -> HabitServiceBuilder {
        HabitServiceBuilder::new(store, user_id)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Validates the draft and persists a fresh habit with empty history and
    /// zeroed statistics. Returns the habit carrying its store-assigned id.
    pub fn create(&self, draft: &HabitDraft) -> Result<Habit, HabitError> {
        let config = draft.validate()?;
        let mut habit = Habit {
            id: String::new(),
            name: config.name,
            description: config.description,
            target_completions: config.target_completions,
            timeframe: config.timeframe,
            track_streak: config.track_streak,
            target_time: config.target_time,
            start_date: self.clock.today(),
            created_at: self.clock.now(),
            logs: Vec::new(),
            completed_days: 0,
            completion_rate: 0,
            streak: 0,
        };
        let fields = encode(&habit)?;
        habit.id = self.store.add(&self.collection, fields)?;
        debug!(habit_id = %habit.id, name = %habit.name, "habit created");
        Ok(habit)
    }

    /// Overlays the editable configuration fields. `start_date`,
    /// `created_at`, the log history, and every derived field stay as
    /// persisted.
    pub fn update(&self, habit_id: &str, draft: &HabitDraft) -> Result<Habit, HabitError> {
        let _guard = self.claim(habit_id)?;
        let config = draft.validate()?;
        let mut habit = self.load(habit_id)?;
        habit.name = config.name;
        habit.description = config.description;
        habit.target_completions = config.target_completions;
        habit.timeframe = config.timeframe;
        habit.track_streak = config.track_streak;
        habit.target_time = config.target_time;
        self.persist(&habit)?;
        debug!(%habit_id, "habit configuration updated");
        Ok(habit)
    }

    /// Records completion for a date (default today), merging by date and
    /// recomputing every derived field before the single persisting write.
    pub fn log_progress(
        &self,
        habit_id: &str,
        completed: bool,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
        mood: Option<String>,
    ) -> Result<Habit, HabitError> {
        let _guard = self.claim(habit_id)?;
        let mut habit = self.load(habit_id)?;

        let today = self.clock.today();
        let log_date = date.unwrap_or(today);
        if log_date > today || log_date < habit.start_date {
            return Err(HabitError::InvalidDate {
                date: log_date,
                start: habit.start_date,
                today,
            });
        }

        let entry = HabitLogEntry {
            date: log_date,
            completed,
            time: Some(time.unwrap_or_else(|| self.clock.time_of_day())),
            mood,
        };
        habit.logs = progress::upsert_log(&habit.logs, entry);
        habit.completed_days = progress::completed_days(&habit.logs);
        habit.completion_rate = progress::completion_rate(&habit.logs);
        habit.streak = if habit.track_streak {
            progress::streak(&habit.logs, today)
        } else {
            0
        };

        self.persist(&habit)?;
        debug!(%habit_id, date = %log_date, completed, "habit progress logged");
        Ok(habit)
    }

    pub fn delete(&self, habit_id: &str) -> Result<(), HabitError> {
        let _guard = self.claim(habit_id)?;
        self.store.delete(&self.collection, habit_id)?;
        debug!(%habit_id, "habit deleted");
        Ok(())
    }

    /// All habits, deduplicated by id: the first occurrence keeps its
    /// position, the last occurrence wins.
    pub fn list(&self) -> Result<Vec<Habit>, HabitError> {
        let docs = self.store.get_all(&self.collection)?;
        Ok(decode_feed(docs))
    }

    /// Live updates; each delivered batch is decoded and deduplicated the
    /// same way as [`HabitService::list`].
    pub fn subscribe(
        &self,
        on_change: impl Fn(Vec<Habit>) + Send + Sync + 'static,
        on_error: impl Fn(StoreError) + Send + Sync + 'static,
    ) -> Result<Subscription, HabitError> {
        let on_snapshot: SnapshotHandler = Arc::new(move |docs: Vec<Document>| {
            on_change(decode_feed(docs));
        });
        let on_error: ErrorHandler = Arc::new(on_error);
        Ok(self
            .store
            .subscribe(&self.collection, on_snapshot, on_error)?)
    }

    pub fn habit_progress(&self, habit_id: &str) -> Result<HabitProgress, HabitError> {
        let habit = self.load(habit_id)?;
        Ok(HabitProgress::for_habit(&habit, self.clock.today()))
    }

    pub fn overview(&self) -> Result<OverviewStats, HabitError> {
        Ok(OverviewStats::from_habits(&self.list()?))
    }

    /// Marks the habit in flight for the lifetime of the returned guard; a
    /// second claim while one is held is declined with [`HabitError::Busy`].
    fn claim(&self, habit_id: &str) -> Result<FlightGuard<'_>, HabitError> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(habit_id.to_string()) {
            debug!(%habit_id, "operation declined, habit already in flight");
            return Err(HabitError::Busy(habit_id.to_string()));
        }
        Ok(FlightGuard {
            set: &self.in_flight,
            id: habit_id.to_string(),
        })
    }

    fn load(&self, habit_id: &str) -> Result<Habit, HabitError> {
        let doc = self
            .store
            .get_one(&self.collection, habit_id)?
            .ok_or_else(|| HabitError::NotFound(habit_id.to_string()))?;
        Ok(decode(doc)?)
    }

    fn persist(&self, habit: &Habit) -> Result<(), HabitError> {
        let fields = encode(habit)?;
        self.store.update(&self.collection, &habit.id, fields)?;
        Ok(())
    }
}

struct FlightGuard<'a> {
    set: &'a Mutex<HashSet<HabitId>>,
    id: HabitId,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

fn decode(doc: Document) -> Result<Habit, StoreError> {
    let Document { id, fields } = doc;
    match serde_json::from_value::<Habit>(fields) {
        Ok(mut habit) => {
            habit.id = id;
            Ok(habit)
        }
        Err(source) => Err(StoreError::Malformed { id, source }),
    }
}

fn encode(habit: &Habit) -> Result<Value, StoreError> {
    let mut fields = serde_json::to_value(habit).map_err(|source| StoreError::Malformed {
        id: habit.id.clone(),
        source,
    })?;
    if let Some(map) = fields.as_object_mut() {
        map.remove("id");
    }
    Ok(fields)
}

/// Undecodable documents are dropped from bulk feeds rather than failing the
/// whole batch.
fn decode_feed(docs: Vec<Document>) -> Vec<Habit> {
    let mut habits = Vec::with_capacity(docs.len());
    for doc in docs {
        match decode(doc) {
            Ok(habit) => habits.push(habit),
            Err(err) => warn!(error = %err, "skipping undecodable habit document"),
        }
    }
    dedupe_by_id(habits)
}

fn dedupe_by_id(habits: Vec<Habit>) -> Vec<Habit> {
    let mut deduped: Vec<Habit> = Vec::with_capacity(habits.len());
    let mut index_of: HashMap<HabitId, usize> = HashMap::new();
    for habit in habits {
        match index_of.get(&habit.id) {
            Some(&at) => deduped[at] = habit,
            None => {
                index_of.insert(habit.id.clone(), deduped.len());
                deduped.push(habit);
            }
        }
    }
    deduped
}
