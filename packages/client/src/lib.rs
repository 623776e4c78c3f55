pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod executor;
pub mod listener;
pub mod pager;

pub use config::{ControllerConfig, DoorSpec, ExecutorMode};
pub use coordinator::{Controller, ControllerHandle, Hardware};
pub use error::{ClientError, ConfigError, ConsoleError, WorkerError};
