use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Opaque account reference handed out by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The uniqueness key: at most one reservation per `(date, time)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl SlotKey {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }
}

/// A booked visit. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub visit_date: NaiveDate,
    pub visit_time: NaiveTime,
    pub party_size: u32,
    pub account_id: AccountId,
}

impl Reservation {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.visit_date, self.visit_time)
    }
}

/// One bookable start time and whether it is still free. Computed per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub time: NaiveTime,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_USER")]
    User,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Account record owned by the account collaborator; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Reservation joined with its owner's display fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationSummary {
    pub id: Ulid,
    pub visit_date: NaiveDate,
    pub visit_time: NaiveTime,
    #[serde(rename = "numberOfGuests")]
    pub party_size: u32,
    pub first_name: String,
    pub last_name: String,
    pub user_email: String,
}

impl ReservationSummary {
    pub fn new(reservation: &Reservation, account: &Account) -> Self {
        Self {
            id: reservation.id,
            visit_date: reservation.visit_date,
            visit_time: reservation.visit_time,
            party_size: reservation.party_size,
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            user_email: account.email.clone(),
        }
    }
}

/// Reservations booked on one visit date, sorted by `visit_time`.
#[derive(Debug, Clone)]
pub struct DayState {
    pub date: NaiveDate,
    pub reservations: Vec<Reservation>,
}

impl DayState {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            reservations: Vec::new(),
        }
    }

    pub fn at(&self, time: NaiveTime) -> Option<&Reservation> {
        self.reservations
            .binary_search_by_key(&time, |r| r.visit_time)
            .ok()
            .map(|pos| &self.reservations[pos])
    }

    /// Insert keeping sort order. Returns false (and leaves state untouched)
    /// when the slot is already held.
    pub fn insert(&mut self, reservation: Reservation) -> bool {
        match self
            .reservations
            .binary_search_by_key(&reservation.visit_time, |r| r.visit_time)
        {
            Ok(_) => false,
            Err(pos) => {
                self.reservations.insert(pos, reservation);
                true
            }
        }
    }
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ReservationBooked(Reservation),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn reservation(h: u32) -> Reservation {
        Reservation {
            id: Ulid::new(),
            visit_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            visit_time: t(h),
            party_size: 2,
            account_id: AccountId(1),
        }
    }

    #[test]
    fn day_state_keeps_time_order() {
        let mut day = DayState::new(NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        assert!(day.insert(reservation(14)));
        assert!(day.insert(reservation(10)));
        assert!(day.insert(reservation(12)));
        let times: Vec<_> = day.reservations.iter().map(|r| r.visit_time).collect();
        assert_eq!(times, vec![t(10), t(12), t(14)]);
        assert!(day.at(t(12)).is_some());
        assert!(day.at(t(11)).is_none());
    }

    #[test]
    fn day_state_rejects_second_booking_for_slot() {
        let mut day = DayState::new(NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        let first = reservation(11);
        assert!(day.insert(first.clone()));
        assert!(!day.insert(reservation(11)));
        assert_eq!(day.reservations.len(), 1);
        assert_eq!(day.at(t(11)), Some(&first));
    }

    #[test]
    fn summary_uses_wire_field_names() {
        let r = reservation(11);
        let account = Account {
            id: AccountId(1),
            first_name: "Jan".into(),
            last_name: "Kowalski".into(),
            email: "jan@example.com".into(),
        };
        let json = serde_json::to_value(ReservationSummary::new(&r, &account)).unwrap();
        assert_eq!(json["visitDate"], "2024-09-01");
        assert_eq!(json["visitTime"], "11:00:00");
        assert_eq!(json["numberOfGuests"], 2);
        assert_eq!(json["userEmail"], "jan@example.com");
    }

    #[test]
    fn role_wire_names() {
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), "ROLE_ADMIN");
        let role: Role = serde_json::from_str("\"ROLE_USER\"").unwrap();
        assert!(!role.is_admin());
    }
}
