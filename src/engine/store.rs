use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::model::*;

use super::{Engine, EngineError};

/// Persistence contract for reservations.
///
/// `insert_if_absent` is the only write and must be atomic with respect to
/// every other caller: for one `(date, time)` exactly one insert succeeds and
/// the rest fail with `SlotTaken`, leaving nothing behind.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn exists_at(&self, date: NaiveDate, time: NaiveTime) -> Result<bool, EngineError>;

    async fn insert_if_absent(&self, reservation: Reservation) -> Result<Reservation, EngineError>;

    /// Reservations on `date`, ascending by visit time.
    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<Reservation>, EngineError>;

    async fn find_by_account(&self, account_id: AccountId) -> Result<Vec<Reservation>, EngineError>;
}

#[async_trait]
impl ReservationStore for Engine {
    async fn exists_at(&self, date: NaiveDate, time: NaiveTime) -> Result<bool, EngineError> {
        Ok(Engine::exists_at(self, date, time).await)
    }

    async fn insert_if_absent(&self, reservation: Reservation) -> Result<Reservation, EngineError> {
        Engine::insert_if_absent(self, reservation).await
    }

    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<Reservation>, EngineError> {
        Ok(self.reservations_on(date).await)
    }

    async fn find_by_account(&self, account_id: AccountId) -> Result<Vec<Reservation>, EngineError> {
        Ok(self.reservations_of(account_id))
    }
}

/// Volatile store. The slot map's entry API plays the part of a unique
/// constraint over `(visit_date, visit_time)`.
pub struct InMemoryStore {
    slots: DashMap<SlotKey, Reservation>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    async fn exists_at(&self, date: NaiveDate, time: NaiveTime) -> Result<bool, EngineError> {
        Ok(self.slots.contains_key(&SlotKey::new(date, time)))
    }

    async fn insert_if_absent(&self, reservation: Reservation) -> Result<Reservation, EngineError> {
        match self.slots.entry(reservation.key()) {
            Entry::Occupied(_) => Err(EngineError::SlotTaken {
                date: reservation.visit_date,
                time: reservation.visit_time,
            }),
            Entry::Vacant(slot) => {
                slot.insert(reservation.clone());
                Ok(reservation)
            }
        }
    }

    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<Reservation>, EngineError> {
        let mut found: Vec<Reservation> = self
            .slots
            .iter()
            .filter(|e| e.key().date == date)
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|r| r.visit_time);
        Ok(found)
    }

    async fn find_by_account(&self, account_id: AccountId) -> Result<Vec<Reservation>, EngineError> {
        // Ulids grow with creation time, so id order approximates booking order.
        let mut found: Vec<Reservation> = self
            .slots
            .iter()
            .filter(|e| e.value().account_id == account_id)
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|r| r.id);
        Ok(found)
    }
}
