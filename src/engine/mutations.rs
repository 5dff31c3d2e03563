use crate::model::*;

use super::{apply, wal_append, Engine, EngineError};

impl Engine {
    /// Store `reservation` unless its `(date, time)` is already booked.
    ///
    /// The day's write lock is held across the check, the WAL fsync and the
    /// in-memory apply, so concurrent callers for the same slot are strictly
    /// ordered: the first commits, every later one sees `SlotTaken`. If the
    /// WAL append fails nothing is applied.
    ///
    /// Once the check passes, the append and apply run in a detached task
    /// that owns the lock. Dropping the returned future after that point
    /// only discards the result; the booking still lands in both the log
    /// and memory before the slot is released.
    pub async fn insert_if_absent(&self, reservation: Reservation) -> Result<Reservation, EngineError> {
        let day = self.day(reservation.visit_date);
        let mut guard = day.write_owned().await;

        if guard.at(reservation.visit_time).is_some() {
            return Err(EngineError::SlotTaken {
                date: reservation.visit_date,
                time: reservation.visit_time,
            });
        }

        let by_account = self.by_account.clone();
        let wal_tx = self.wal_tx.clone();
        let commit = tokio::spawn(async move {
            wal_append(&wal_tx, Event::ReservationBooked(reservation.clone())).await?;
            apply(&by_account, &mut guard, reservation.clone());
            Ok::<_, EngineError>(reservation)
        });

        commit
            .await
            .map_err(|e| EngineError::WalError(format!("commit task failed: {e}")))?
    }
}
