//! Hub connection of the door controller.

mod dispatcher;
mod domain;
mod runner;
mod session;

pub use dispatcher::UnlockDispatcher;
pub use domain::{HubInstruction, interpret_frame};
pub use runner::run_listener;
pub use session::run_listener_session;
