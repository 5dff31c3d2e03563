use std::sync::Arc;

use chrono::NaiveDate;

use crate::calendar::SlotCalendar;
use crate::model::Slot;

use super::{EngineError, ReservationStore};

/// Per-slot free/taken view of one date.
///
/// Advisory only: the answer can be stale by the time a booking is attempted,
/// and nothing is cached between calls.
pub struct AvailabilityQuery {
    store: Arc<dyn ReservationStore>,
    calendar: SlotCalendar,
}

impl AvailabilityQuery {
    pub fn new(store: Arc<dyn ReservationStore>, calendar: SlotCalendar) -> Self {
        Self { store, calendar }
    }

    pub fn calendar(&self) -> &SlotCalendar {
        &self.calendar
    }

    /// One store lookup per calendar slot, ascending by time.
    pub async fn available_slots(&self, date: NaiveDate) -> Result<Vec<Slot>, EngineError> {
        let times = self.calendar.slots();
        let mut slots = Vec::with_capacity(times.len());
        for time in times {
            let taken = self.store.exists_at(date, time).await?;
            slots.push(Slot {
                time,
                available: !taken,
            });
        }
        Ok(slots)
    }
}
