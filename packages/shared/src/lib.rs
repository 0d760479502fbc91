//! Utilities shared by the gridword packages.

pub mod logger;
pub mod time;
