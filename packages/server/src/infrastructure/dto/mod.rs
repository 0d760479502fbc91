//! Data Transfer Objects (DTOs) for the game server.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket message DTOs
//! - `http`: HTTP API response DTOs
//! - `store`: shared store service DTOs

pub mod conversion;
pub mod http;
pub mod store;
pub mod websocket;
