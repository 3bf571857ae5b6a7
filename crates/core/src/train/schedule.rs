//! Train schedule enumeration.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use tracing::{debug, info};
use track_view_map::prelude::*;

use crate::editoast::{ApiError, EditoastApi, TrainScheduleSummary};

/// A train to show and when it leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub id: TrainId,
    pub departure: DateTime<Utc>,
}

/// Trains of a timetable, by ascending departure then id.
#[derive(Debug, Clone, Default)]
pub struct TrainSchedule {
    entries: Vec<ScheduleEntry>,
}

impl TrainSchedule {
    /// Builds a schedule, keeping the first entry seen for a repeated id.
    pub fn from_entries(entries: impl IntoIterator<Item = ScheduleEntry>) -> Self {
        let entries = entries
            .into_iter()
            .unique_by(|entry| entry.id)
            .sorted_by_key(|entry| (entry.departure, entry.id))
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest departure, the zero of every occupancy time.
    pub fn time_origin(&self) -> Option<DateTime<Utc>> {
        self.entries.first().map(|entry| entry.departure)
    }

    pub fn get(&self, id: TrainId) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }
}

impl From<&TrainScheduleSummary> for ScheduleEntry {
    fn from(summary: &TrainScheduleSummary) -> Self {
        Self {
            id: summary.id,
            departure: summary.start_time,
        }
    }
}

/// Walks every schedule page, starting from page 1 and following `next`.
pub async fn load_schedule(api: &dyn EditoastApi) -> Result<TrainSchedule, ApiError> {
    let mut entries = Vec::new();
    let mut visited = HashSet::new();
    let mut page = Some(1);

    while let Some(current) = page {
        if !visited.insert(current) {
            return Err(ApiError::Malformed(format!(
                "schedule pages loop back to page {current}"
            )));
        }

        let response = api.train_schedules(current).await?;
        debug!(page = current, trains = response.results.len(), "loaded schedule page");

        entries.extend(response.results.iter().map(ScheduleEntry::from));
        page = response.next;
    }

    let schedule = TrainSchedule::from_entries(entries);
    info!(
        trains = schedule.len(),
        pages = visited.len(),
        origin = ?schedule.time_origin(),
        "loaded train schedule"
    );
    Ok(schedule)
}

/// Hands out schedule entries one at a time, earliest departure first.
#[derive(Debug, Clone, Default)]
pub struct TrainPicker {
    next: usize,
}

impl TrainPicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next entry not handed out yet.
    pub fn pick(&mut self, schedule: &TrainSchedule) -> Option<ScheduleEntry> {
        let entry = schedule.entries().get(self.next).copied()?;
        self.next += 1;
        Some(entry)
    }

    pub fn picked(&self) -> usize {
        self.next
    }

    /// Makes every train pickable again.
    pub fn reset(&mut self) {
        self.next = 0;
    }
}
