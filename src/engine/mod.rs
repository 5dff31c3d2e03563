mod availability;
mod error;
mod guard;
mod mutations;
mod queries;
mod store;

pub use availability::AvailabilityQuery;
pub use error::EngineError;
pub use guard::BookingGuard;
pub use store::{InMemoryStore, ReservationStore};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::warn;

use crate::model::*;
use crate::wal::Wal;

pub type SharedDayState = Arc<RwLock<DayState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) struct WalAppend {
    event: Event,
    response: oneshot::Sender<io::Result<()>>,
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalAppend>) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::error!("WAL flush to {} failed: {e}", wal.path().display());
        }

        for append in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = append.response.send(r);
        }
    }
}

/// Stage and sync the whole batch, or leave the file as it was before it.
fn flush_batch(wal: &mut Wal, batch: &[WalAppend]) -> io::Result<()> {
    let result = batch
        .iter()
        .try_for_each(|append| wal.append_buffered(&append.event))
        .and_then(|()| wal.flush_sync());
    if result.is_err() {
        if let Err(e) = wal.rollback() {
            tracing::error!("WAL rollback of {} failed: {e}", wal.path().display());
        }
    }
    result
}

/// Write event to WAL via the background group-commit writer.
pub(super) async fn wal_append(wal_tx: &mpsc::Sender<WalAppend>, event: Event) -> Result<(), EngineError> {
    let (tx, rx) = oneshot::channel();
    wal_tx
        .send(WalAppend { event, response: tx })
        .await
        .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
    rx.await
        .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
        .map_err(|e| EngineError::WalError(e.to_string()))
}

pub(super) type AccountIndex = DashMap<AccountId, Vec<Reservation>>;

/// Apply a committed reservation (no locking; caller holds the day lock).
pub(super) fn apply(by_account: &AccountIndex, day: &mut DayState, reservation: Reservation) {
    let account_id = reservation.account_id;
    if day.insert(reservation.clone()) {
        by_account.entry(account_id).or_default().push(reservation);
    }
}

/// Durable reservation store: per-date state guarded by an async RwLock,
/// with every booking written to the WAL before it becomes visible.
pub struct Engine {
    pub(super) days: DashMap<NaiveDate, SharedDayState>,
    /// Owner → reservations, in booking order.
    pub(super) by_account: Arc<AccountIndex>,
    pub(super) wal_tx: mpsc::Sender<WalAppend>,
}

impl Engine {
    /// Replay the WAL at `wal_path` and start its writer task.
    /// Must be called from within a tokio runtime.
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let (wal, events) = Wal::recover(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            days: DashMap::new(),
            by_account: Arc::new(DashMap::new()),
            wal_tx,
        };

        // Sole owner of these Arcs during replay, so try_write never contends.
        // Never use blocking_write here: we may already be inside the runtime.
        let mut loaded = 0usize;
        for event in events {
            let Event::ReservationBooked(reservation) = event;
            let day = engine.day(reservation.visit_date);
            let Ok(mut guard) = day.try_write() else {
                continue;
            };
            if guard.at(reservation.visit_time).is_some() {
                warn!(
                    "replay: skipping {} for already booked slot {} {}",
                    reservation.id, reservation.visit_date, reservation.visit_time
                );
                continue;
            }
            apply(&engine.by_account, &mut guard, reservation);
            loaded += 1;
        }
        metrics::gauge!(crate::observability::RESERVATIONS_LOADED).set(loaded as f64);

        Ok(engine)
    }

    /// The state for `date`, created empty on first touch.
    pub(super) fn day(&self, date: NaiveDate) -> SharedDayState {
        self.days
            .entry(date)
            .or_insert_with(|| Arc::new(RwLock::new(DayState::new(date))))
            .value()
            .clone()
    }

    /// Existing state for `date` without creating one.
    pub(super) fn existing_day(&self, date: &NaiveDate) -> Option<SharedDayState> {
        self.days.get(date).map(|e| e.value().clone())
    }

    pub fn reservation_count(&self) -> usize {
        self.by_account.iter().map(|e| e.value().len()).sum()
    }
}
