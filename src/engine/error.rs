use chrono::{NaiveDate, NaiveTime};

#[derive(Debug)]
pub enum EngineError {
    SlotTaken { date: NaiveDate, time: NaiveTime },
    Unauthenticated,
    Forbidden,
    NotFound(String),
    InvalidSlot(NaiveTime),
    InvalidPartySize(u32),
    LimitExceeded(&'static str),
    WalError(String),
    Config(String),
}

impl EngineError {
    /// Stable identifier for the wire.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::SlotTaken { .. } => "slot_taken",
            EngineError::Unauthenticated => "unauthenticated",
            EngineError::Forbidden => "forbidden",
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidSlot(_) => "invalid_slot",
            EngineError::InvalidPartySize(_) => "invalid_party_size",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::WalError(_) => "internal",
            EngineError::Config(_) => "config",
        }
    }

    /// Caller mistakes, as opposed to broken collaborators or storage.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            EngineError::NotFound(_) | EngineError::WalError(_) | EngineError::Config(_)
        )
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::SlotTaken { date, time } => {
                write!(f, "slot {date} {time} is already booked")
            }
            EngineError::Unauthenticated => write!(f, "authentication required"),
            EngineError::Forbidden => write!(f, "admin privileges required"),
            EngineError::NotFound(what) => write!(f, "not found: {what}"),
            EngineError::InvalidSlot(time) => {
                write!(f, "{time} is not a bookable slot start")
            }
            EngineError::InvalidPartySize(n) => write!(f, "invalid party size: {n}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
            EngineError::Config(e) => write!(f, "config error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
