//! HTTP and WebSocket front ends: the game server and the shared store service.

mod handler;
mod server;
mod signal;
pub mod state;
mod store_server;

pub use server::Server;
pub use store_server::StoreServer;
