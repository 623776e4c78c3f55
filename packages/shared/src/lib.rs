//! Shared building blocks for the doorbridge hub, controller and radio tools.
//!
//! Everything here is free of runtime wiring: logging setup, the clock
//! abstraction, the websocket wire format, the time-sliced login token and
//! the GPIO pin seam.

pub mod gpio;
pub mod logger;
pub mod time;
pub mod token;
pub mod wire;
