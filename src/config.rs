use std::path::PathBuf;

use chrono::{NaiveTime, TimeDelta};

use crate::calendar::SlotCalendar;
use crate::engine::EngineError;

/// Process configuration, read from `VISITBOOK_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// `None` keeps reservations in memory only.
    pub data_dir: Option<PathBuf>,
    pub accounts_file: Option<PathBuf>,
    pub max_connections: usize,
    pub metrics_port: Option<u16>,
    pub calendar: SlotCalendar,
}

impl Config {
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let bind = get("VISITBOOK_BIND").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&get, "VISITBOOK_PORT", 7400u16)?;
        let data_dir = match get("VISITBOOK_DATA_DIR") {
            Some(dir) if dir.is_empty() => None,
            Some(dir) => Some(PathBuf::from(dir)),
            None => Some(PathBuf::from("./data")),
        };
        let accounts_file = get("VISITBOOK_ACCOUNTS").map(PathBuf::from);
        let max_connections = parse_or(&get, "VISITBOOK_MAX_CONNECTIONS", 256usize)?;
        let metrics_port = match get("VISITBOOK_METRICS_PORT") {
            Some(raw) => Some(parse("VISITBOOK_METRICS_PORT", &raw)?),
            None => None,
        };

        let defaults = SlotCalendar::default();
        let opening = time_or(&get, "VISITBOOK_OPENING", defaults.opening())?;
        let closing = time_or(&get, "VISITBOOK_CLOSING", defaults.closing())?;
        let step_minutes = parse_or(&get, "VISITBOOK_STEP_MINUTES", defaults.step().num_minutes())?;
        let step = TimeDelta::try_minutes(step_minutes)
            .ok_or_else(|| EngineError::Config(format!("step of {step_minutes} minutes out of range")))?;
        let calendar = SlotCalendar::new(opening, closing, step)?;

        if max_connections == 0 {
            return Err(EngineError::Config("VISITBOOK_MAX_CONNECTIONS must be positive".into()));
        }

        Ok(Self {
            bind,
            port,
            data_dir,
            accounts_file,
            max_connections,
            metrics_port,
            calendar,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("reservations.wal"))
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, EngineError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| EngineError::Config(format!("{key}={raw}: {e}")))
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, EngineError>
where
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => parse(key, &raw),
        None => Ok(default),
    }
}

fn time_or(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: NaiveTime,
) -> Result<NaiveTime, EngineError> {
    match get(key) {
        Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .map_err(|e| EngineError::Config(format!("{key}={raw}: {e}"))),
        None => Ok(default),
    }
}
