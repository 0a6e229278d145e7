// Core data model for the gridcast pipeline: configuration, week catalogue,
// the per-player-per-week record store, ownership and schedule inputs, and
// CSV ingestion. The football engines live in `gridcast-football`.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod ingest;
pub mod player;
pub mod roster;
pub mod schedule;
pub mod week;
