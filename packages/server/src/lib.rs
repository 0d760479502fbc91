//! Multiplayer word-grid game server.
//!
//! Players join a room by its 6-digit code and race to trace words on a shared
//! letter grid. Each room is owned by a single worker task; the shared store
//! only carries snapshots and cross-instance fan-out.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
