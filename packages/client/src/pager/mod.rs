//! Call button and paging.

mod button;
mod console;
mod supervisor;

pub use button::{Debouncer, PageListener};
pub use console::{ConsoleLauncher, ExpectOutcome, ExpectSession, PjsuaLauncher};
pub use supervisor::{PageSupervisor, PageThrottle};
