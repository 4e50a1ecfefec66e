//! Domain types and persisted-store queries for half-hourly meter readings.
//!
//! The store is SQLite, reached through an explicitly passed [`sqlx::SqlitePool`].

pub mod db;
pub mod domain;
