use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use crate::calendar::SlotCalendar;
use crate::engine::{AvailabilityQuery, BookingGuard, EngineError, ReservationStore};
use crate::identity::{AccountLookup, Identity};
use crate::model::*;

/// Reservation use cases. Every caller-dependent operation takes the
/// caller's identity as an argument.
pub struct ReservationService {
    availability: AvailabilityQuery,
    guard: BookingGuard,
    store: Arc<dyn ReservationStore>,
    accounts: Arc<dyn AccountLookup>,
}

impl ReservationService {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        accounts: Arc<dyn AccountLookup>,
        calendar: SlotCalendar,
    ) -> Self {
        Self {
            availability: AvailabilityQuery::new(store.clone(), calendar),
            guard: BookingGuard::new(store.clone(), calendar),
            store,
            accounts,
        }
    }

    pub fn calendar(&self) -> &SlotCalendar {
        self.availability.calendar()
    }

    /// Public, read-only.
    pub async fn list_availability(&self, date: NaiveDate) -> Result<Vec<Slot>, EngineError> {
        self.availability.available_slots(date).await
    }

    pub async fn book(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        party_size: u32,
        identity: &Identity,
    ) -> Result<Reservation, EngineError> {
        let account = self.account(identity.account_id).await?;
        self.guard.book(date, time, party_size, account.id).await
    }

    /// Admin only. Ascending by visit time, each with the owner's details.
    pub async fn list_for_date(
        &self,
        date: NaiveDate,
        role: Role,
    ) -> Result<Vec<ReservationSummary>, EngineError> {
        if !role.is_admin() {
            return Err(EngineError::Forbidden);
        }
        let mut reservations = self.store.find_by_date(date).await?;
        reservations.sort_by_key(|r| r.visit_time);

        let mut out = Vec::with_capacity(reservations.len());
        for r in &reservations {
            let account = self.account(r.account_id).await?;
            out.push(ReservationSummary::new(r, &account));
        }
        Ok(out)
    }

    pub async fn list_mine(&self, identity: &Identity) -> Result<Vec<ReservationSummary>, EngineError> {
        let account = self.account(identity.account_id).await?;
        let reservations = self.store.find_by_account(account.id).await?;
        Ok(reservations
            .iter()
            .filter(|r| r.account_id == account.id)
            .map(|r| ReservationSummary::new(r, &account))
            .collect())
    }

    async fn account(&self, id: AccountId) -> Result<Account, EngineError> {
        self.accounts
            .find_account(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("account {id}")))
    }
}
