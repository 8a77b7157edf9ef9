//! The cutting-workshop backend.
//!
//! `db` owns the SQLite schema and every query, `workers` layers account
//! rules (password hashing, role checks) over it, and `api` exposes both as
//! JSON under `/api`. `server` wires them into a running process.

pub mod api;
pub mod db;
pub mod models;
pub mod server;
pub mod workers;
