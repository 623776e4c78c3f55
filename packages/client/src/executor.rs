//! Door actuation.
//!
//! An executor owns one or more doors and runs their unlock cycles one at a
//! time. Per door it remembers when the door last relocked and discards any
//! command received before that instant.

use std::{collections::HashMap, sync::Arc, time::Duration};

use doorbridge_radio::transmitter::RadioRequest;
use doorbridge_shared::gpio::OutputPin;
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, sleep},
};

use crate::{
    error::WorkerError,
    events::{ActuationStatus, Outbound, UnlockCommand},
};

pub enum DoorActuator {
    /// Relay driven directly from a GPIO pin
    Gpio(Box<dyn OutputPin>),
    /// Remote receiver; it relocks on its own timer
    Radio {
        address: u16,
        requests: mpsc::Sender<RadioRequest>,
    },
}

impl DoorActuator {
    async fn engage(&mut self) -> Result<(), WorkerError> {
        match self {
            Self::Gpio(pin) => Ok(pin.set_high()?),
            Self::Radio { address, requests } => requests
                .send(RadioRequest::Unlock { address: *address })
                .await
                .map_err(|_| WorkerError::ChannelClosed("radio request")),
        }
    }

    fn release(&mut self) -> Result<(), WorkerError> {
        match self {
            Self::Gpio(pin) => Ok(pin.set_low()?),
            Self::Radio { .. } => Ok(()),
        }
    }
}

pub struct UnlockExecutor {
    name: String,
    doors: HashMap<usize, DoorActuator>,
    last_relock: HashMap<usize, Instant>,
    commands: mpsc::Receiver<UnlockCommand>,
    outbound: mpsc::Sender<Outbound>,
    status: Arc<watch::Sender<ActuationStatus>>,
    unlocked_duration: Duration,
    page_cooldown: Duration,
}

impl UnlockExecutor {
    pub fn new(
        name: impl Into<String>,
        doors: HashMap<usize, DoorActuator>,
        commands: mpsc::Receiver<UnlockCommand>,
        outbound: mpsc::Sender<Outbound>,
        status: Arc<watch::Sender<ActuationStatus>>,
    ) -> Self {
        Self {
            name: name.into(),
            doors,
            last_relock: HashMap::new(),
            commands,
            outbound,
            status,
            unlocked_duration: Duration::from_secs(10),
            page_cooldown: Duration::from_secs(2),
        }
    }

    pub fn with_unlocked_duration(mut self, unlocked_duration: Duration) -> Self {
        self.unlocked_duration = unlocked_duration;
        self
    }

    pub fn with_page_cooldown(mut self, page_cooldown: Duration) -> Self {
        self.page_cooldown = page_cooldown;
        self
    }

    /// Serve commands until the queue closes.
    pub async fn run(mut self) -> Result<(), WorkerError> {
        tracing::info!(worker = %self.name, "Starting unlock executor for doors {:?}", self.door_list());
        while let Some(command) = self.commands.recv().await {
            self.handle(command).await?;
        }
        Err(WorkerError::ChannelClosed("unlock"))
    }

    /// Run one unlock cycle, unless the command is stale.
    pub async fn handle(&mut self, command: UnlockCommand) -> Result<(), WorkerError> {
        let door = command.door;
        if self.is_stale(&command) {
            tracing::info!(worker = %self.name, "Discarding stale unlock for door {}", door);
            return Ok(());
        }
        let Some(actuator) = self.doors.get_mut(&door) else {
            tracing::warn!(worker = %self.name, "Door {} is not handled here", door);
            return Ok(());
        };

        let suspended_until = Instant::now() + self.unlocked_duration + self.page_cooldown;
        self.status.send_modify(|status| {
            status.paging_suspended_until = Some(
                status
                    .paging_suspended_until
                    .map_or(suspended_until, |until| until.max(suspended_until)),
            );
        });

        tracing::info!(worker = %self.name, "Door {} unlocking", door);
        actuator.engage().await?;
        if let Some(msgid) = &command.msgid {
            report(&self.outbound, msgid, false, format!("door {door} unlocked")).await?;
        }

        sleep(self.unlocked_duration).await;

        let released = actuator.release();
        self.last_relock.insert(door, Instant::now());
        released?;
        tracing::info!(worker = %self.name, "Door {} relocked", door);
        if let Some(msgid) = &command.msgid {
            report(&self.outbound, msgid, true, format!("door {door} relocked")).await?;
        }
        Ok(())
    }

    /// A command received at or before the door's last relock is stale.
    pub fn is_stale(&self, command: &UnlockCommand) -> bool {
        self.last_relock
            .get(&command.door)
            .is_some_and(|relocked| command.received_at <= *relocked)
    }

    fn door_list(&self) -> Vec<usize> {
        let mut doors: Vec<usize> = self.doors.keys().copied().collect();
        doors.sort_unstable();
        doors
    }
}

async fn report(
    outbound: &mpsc::Sender<Outbound>,
    msgid: &str,
    is_final: bool,
    body: String,
) -> Result<(), WorkerError> {
    outbound
        .send(Outbound::Ack {
            msgid: msgid.to_string(),
            is_final,
            body,
        })
        .await
        .map_err(|_| WorkerError::ChannelClosed("outbound"))
}
