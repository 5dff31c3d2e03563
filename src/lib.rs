pub mod calendar;
pub mod config;
pub mod engine;
pub mod identity;
pub mod limits;
pub mod model;
pub mod observability;
pub mod service;
pub mod wal;
pub mod wire;
