mod http;
mod store;
mod websocket;

pub use http::{get_room_detail, get_rooms, health_check};
pub use store::{
    acquire_lock, delete_value, get_value, list_keys, publish, release_lock, set_value,
    subscribe_handler,
};
pub use websocket::websocket_handler;
