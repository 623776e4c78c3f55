//! WebSocket relay hub server.

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::{HubConfig, Server};
