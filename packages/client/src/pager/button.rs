//! Call button input.

use std::time::Duration;

use doorbridge_shared::gpio::InputPin;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::spawn_blocking,
    time::{Instant, MissedTickBehavior, interval},
};

use crate::{config::ButtonSettings, error::WorkerError, events::PageRequest};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Turns raw button samples into press events.
///
/// Level changes closer than `bounce` to the previous accepted change are
/// ignored. A press fires once after the button has been held for `hold`
/// and rearms on release.
#[derive(Debug, Clone)]
pub struct Debouncer {
    bounce: Duration,
    hold: Duration,
    active: bool,
    last_change: Option<Instant>,
    fired: bool,
}

impl Debouncer {
    pub fn new(bounce: Duration, hold: Duration) -> Self {
        Self {
            bounce,
            hold,
            active: false,
            last_change: None,
            fired: false,
        }
    }

    /// Feed one sample; returns `true` when a press completes.
    pub fn update(&mut self, active: bool, now: Instant) -> bool {
        if active != self.active {
            if self
                .last_change
                .is_some_and(|changed| now.duration_since(changed) < self.bounce)
            {
                return false;
            }
            self.active = active;
            self.last_change = Some(now);
            self.fired = false;
        }

        match self.last_change {
            Some(pressed_at) if self.active && !self.fired => {
                if now.duration_since(pressed_at) >= self.hold {
                    self.fired = true;
                    return true;
                }
                false
            }
            _ => false,
        }
    }
}

/// Polls the call button and queues page requests.
///
/// Each sample is read on the blocking pool; sysfs reads can stall.
pub struct PageListener {
    pin: Box<dyn InputPin>,
    debouncer: Debouncer,
    pages: mpsc::Sender<PageRequest>,
}

impl PageListener {
    pub fn new(pin: Box<dyn InputPin>, settings: &ButtonSettings, pages: mpsc::Sender<PageRequest>) -> Self {
        Self {
            pin,
            debouncer: Debouncer::new(settings.bounce, settings.hold),
            pages,
        }
    }

    pub async fn run(self) -> Result<(), WorkerError> {
        tracing::info!(worker = "page-listener", "Starting page listener");
        let Self {
            mut pin,
            mut debouncer,
            pages,
        } = self;
        let mut ticker = interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let now = ticker.tick().await;
            let (returned, sample) = spawn_blocking(move || {
                let sample = pin.is_active();
                (pin, sample)
            })
            .await
            .map_err(|e| WorkerError::Panicked(e.to_string()))?;
            pin = returned;
            if !debouncer.update(sample?, now) {
                continue;
            }

            tracing::info!(worker = "page-listener", "Call button held, enqueueing page");
            match pages.try_send(PageRequest { requested_at: now }) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(worker = "page-listener", "Page queue full, dropping press");
                }
                Err(TrySendError::Closed(_)) => return Err(WorkerError::ChannelClosed("page")),
            }
        }
    }
}
