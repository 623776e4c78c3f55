//! GPIO pin seam used by actuators and buttons.
//!
//! Production code drives pins through the Linux sysfs interface; tests use
//! [`MemoryPin`], which records its level in shared memory.

use std::{
    fs,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use thiserror::Error;

const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("failed to export gpio {pin}: {source}")]
    Export {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("gpio {pin} I/O error: {source}")]
    Io {
        pin: u32,
        #[source]
        source: std::io::Error,
    },
}

/// A digital output (relay, buzzer, LED).
pub trait OutputPin: Send {
    fn set_high(&mut self) -> Result<(), GpioError>;
    fn set_low(&mut self) -> Result<(), GpioError>;
}

/// A digital input (call button).
pub trait InputPin: Send {
    /// `true` while the input is asserted, after applying polarity.
    fn is_active(&mut self) -> Result<bool, GpioError>;
}

/// Pin driven through `/sys/class/gpio`.
#[derive(Debug)]
pub struct SysfsPin {
    pin: u32,
    value_path: PathBuf,
    active_low: bool,
}

impl SysfsPin {
    /// Export `pin` as an output, initially low.
    pub fn output(pin: u32) -> Result<Self, GpioError> {
        Self::export(pin, "low", false)
    }

    /// Export `pin` as an input. Buttons wired to ground with a pull-up are
    /// `active_low`.
    pub fn input(pin: u32, active_low: bool) -> Result<Self, GpioError> {
        Self::export(pin, "in", active_low)
    }

    fn export(pin: u32, direction: &str, active_low: bool) -> Result<Self, GpioError> {
        let root = PathBuf::from(SYSFS_GPIO_ROOT);
        let pin_dir = root.join(format!("gpio{pin}"));
        if !pin_dir.exists() {
            fs::write(root.join("export"), pin.to_string())
                .map_err(|source| GpioError::Export { pin, source })?;
            // udev needs a moment to fix permissions on the new node
            thread::sleep(Duration::from_millis(100));
        }
        fs::write(pin_dir.join("direction"), direction)
            .map_err(|source| GpioError::Io { pin, source })?;
        Ok(Self {
            pin,
            value_path: pin_dir.join("value"),
            active_low,
        })
    }

    fn write(&self, level: bool) -> Result<(), GpioError> {
        fs::write(&self.value_path, if level { "1" } else { "0" })
            .map_err(|source| GpioError::Io {
                pin: self.pin,
                source,
            })
    }
}

impl OutputPin for SysfsPin {
    fn set_high(&mut self) -> Result<(), GpioError> {
        self.write(true)
    }

    fn set_low(&mut self) -> Result<(), GpioError> {
        self.write(false)
    }
}

impl InputPin for SysfsPin {
    fn is_active(&mut self) -> Result<bool, GpioError> {
        let raw = fs::read_to_string(&self.value_path).map_err(|source| GpioError::Io {
            pin: self.pin,
            source,
        })?;
        let high = raw.trim() == "1";
        Ok(high != self.active_low)
    }
}

/// In-memory pin. Clones share state, so a test can keep one handle while
/// the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryPin {
    level: Arc<AtomicBool>,
    activations: Arc<AtomicUsize>,
}

impl MemoryPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }

    /// Number of low-to-high transitions seen so far.
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    /// Drive the level from the outside, e.g. to simulate a button press.
    pub fn set_level(&self, high: bool) {
        let was_high = self.level.swap(high, Ordering::SeqCst);
        if high && !was_high {
            self.activations.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl OutputPin for MemoryPin {
    fn set_high(&mut self) -> Result<(), GpioError> {
        self.set_level(true);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), GpioError> {
        self.set_level(false);
        Ok(())
    }
}

impl InputPin for MemoryPin {
    fn is_active(&mut self) -> Result<bool, GpioError> {
        Ok(self.is_high())
    }
}
