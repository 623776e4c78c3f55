//! Controller configuration.

use std::{str::FromStr, time::Duration};

use doorbridge_radio::RadioSettings;

use crate::error::ConfigError;

/// Pause between hub reconnect attempts.
///
/// The listener reconnects as soon as a session ends; this short pause only
/// keeps a hub that refuses connections from being hammered in a tight loop.
/// `DOORCLIENT_RECONNECT_DELAY_MS=0` removes the pause.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// Wait for console output outside registration.
pub const DEFAULT_EXPECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How a door is actuated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorSpec {
    /// Buzzer relay on a local GPIO pin
    Gpio(u32),
    /// Remote receiver reached over LoRa at this address
    Radio(u16),
}

impl FromStr for DoorSpec {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidDoorSpec(value.to_string());
        let value = value.trim();
        match value.strip_prefix("radio:") {
            Some(address) => address.trim().parse().map(Self::Radio).map_err(|_| invalid()),
            None => value.parse().map(Self::Gpio).map_err(|_| invalid()),
        }
    }
}

/// Whether doors share one executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExecutorMode {
    /// One executor per door; doors actuate independently
    #[default]
    PerDoor,
    /// One executor for every door; unlock cycles run one after another
    Shared,
}

#[derive(Debug, Clone)]
pub struct ListenerSettings {
    /// Hub websocket URL
    pub server: String,
    pub secret: String,
    /// Pause between reconnect attempts, `Duration::ZERO` for none
    pub reconnect_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub mode: ExecutorMode,
    pub unlocked_duration: Duration,
    /// Paging stays suspended this long after a door relocks
    pub page_cooldown: Duration,
}

#[derive(Debug, Clone)]
pub struct ButtonSettings {
    pub pin: u32,
    pub bounce: Duration,
    pub hold: Duration,
}

#[derive(Debug, Clone)]
pub struct PagerSettings {
    pub paging_sip: String,
    /// Longest time a confirmed call is held open
    pub paging_duration: Duration,
    pub throttle: Duration,
    /// Ping the console this often; `None` disables it
    pub drain_every: Option<Duration>,
    /// Bound on each registration attempt
    pub registration_timeout: Duration,
    /// Bound on every other wait for console output
    pub expect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub doors: Vec<DoorSpec>,
    pub listener: ListenerSettings,
    pub executor: ExecutorSettings,
    pub button: ButtonSettings,
    pub pager: PagerSettings,
    pub radio: RadioSettings,
    pub radio_device: String,
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.doors.is_empty() {
            return Err(ConfigError::NoDoors);
        }
        Ok(())
    }

    pub fn uses_radio(&self) -> bool {
        self.doors.iter().any(|door| matches!(door, DoorSpec::Radio(_)))
    }
}
