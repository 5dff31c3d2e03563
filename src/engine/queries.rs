use chrono::{NaiveDate, NaiveTime};

use crate::model::*;

use super::Engine;

impl Engine {
    pub async fn exists_at(&self, date: NaiveDate, time: NaiveTime) -> bool {
        let Some(day) = self.existing_day(&date) else {
            return false;
        };
        let guard = day.read().await;
        guard.at(time).is_some()
    }

    /// All reservations on `date`, ascending by visit time.
    pub async fn reservations_on(&self, date: NaiveDate) -> Vec<Reservation> {
        let Some(day) = self.existing_day(&date) else {
            return Vec::new();
        };
        let guard = day.read().await;
        guard.reservations.clone()
    }

    /// All reservations owned by `account_id`, in booking order.
    pub fn reservations_of(&self, account_id: AccountId) -> Vec<Reservation> {
        self.by_account
            .get(&account_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }
}
