use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{info, warn};
use ulid::Ulid;

use crate::calendar::SlotCalendar;
use crate::limits::MAX_PARTY_SIZE;
use crate::model::*;

use super::{EngineError, ReservationStore};

pub(crate) fn validate_party_size(party_size: u32) -> Result<(), EngineError> {
    if party_size == 0 || party_size > MAX_PARTY_SIZE {
        return Err(EngineError::InvalidPartySize(party_size));
    }
    Ok(())
}

pub(crate) fn validate_slot(calendar: &SlotCalendar, time: NaiveTime) -> Result<(), EngineError> {
    if !calendar.contains(time) {
        return Err(EngineError::InvalidSlot(time));
    }
    Ok(())
}

/// The single write path for reservations.
///
/// Validation happens up front; the conflict check itself is never done here
/// as a separate read. It is delegated to the store's atomic
/// `insert_if_absent`, so a `SlotTaken` from the store is the only conflict
/// signal and is never retried.
pub struct BookingGuard {
    store: Arc<dyn ReservationStore>,
    calendar: SlotCalendar,
}

impl BookingGuard {
    pub fn new(store: Arc<dyn ReservationStore>, calendar: SlotCalendar) -> Self {
        Self { store, calendar }
    }

    pub async fn book(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        party_size: u32,
        account_id: AccountId,
    ) -> Result<Reservation, EngineError> {
        validate_slot(&self.calendar, time)?;
        validate_party_size(party_size)?;

        let reservation = Reservation {
            id: Ulid::new(),
            visit_date: date,
            visit_time: time,
            party_size,
            account_id,
        };

        match self.store.insert_if_absent(reservation).await {
            Ok(stored) => {
                metrics::counter!(crate::observability::BOOKINGS_TOTAL).increment(1);
                info!(
                    "booked {} for account {account_id}: {date} {time}, party of {party_size}",
                    stored.id
                );
                Ok(stored)
            }
            Err(e @ EngineError::SlotTaken { .. }) => {
                metrics::counter!(crate::observability::SLOT_CONFLICTS_TOTAL).increment(1);
                warn!("account {account_id}: {e}");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}
