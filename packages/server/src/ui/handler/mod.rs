mod http;
mod websocket;

pub use http::{health_check, hub_status};
pub use websocket::websocket_handler;
