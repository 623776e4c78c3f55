//! doorbridge relay hub.
//!
//! Authenticates the on-site controller (doorclient) and browser sessions
//! (webclients) over WebSocket, stages unlock instructions for the controller
//! and routes acknowledgments and broadcasts back to the browsers.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
