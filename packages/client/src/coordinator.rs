//! Wires the workers together and supervises them.
//!
//! Every worker runs as its own task and talks to the others only through
//! bounded channels. The first worker to exit, for whatever reason, stops
//! the whole controller.

use std::{collections::HashMap, sync::Arc};

use doorbridge_radio::{
    LineProtocolEngine, RadioSettings,
    transmitter::{RadioEvent, RadioRequest, ReyaxTransmitter},
};
use doorbridge_shared::gpio::{InputPin, OutputPin};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, watch},
    task::JoinSet,
    time::Instant,
};

use crate::{
    config::{ControllerConfig, DoorSpec, ExecutorMode},
    error::{ConfigError, WorkerError},
    events::{ActuationStatus, Outbound, PageRequest, UnlockCommand},
    executor::{DoorActuator, UnlockExecutor},
    listener::{UnlockDispatcher, run_listener},
    pager::{ConsoleLauncher, PageListener, PageSupervisor},
};

const UNLOCK_QUEUE: usize = 16;
const PAGE_QUEUE: usize = 8;
const OUTBOUND_QUEUE: usize = 64;
const RADIO_QUEUE: usize = 16;

/// Byte stream to the radio module.
pub trait RadioStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> RadioStream for T {}

/// Hardware handles the controller drives.
pub struct Hardware {
    /// Output pin for each GPIO door, keyed by door index
    pub door_pins: HashMap<usize, Box<dyn OutputPin>>,
    pub button: Box<dyn InputPin>,
    pub console: Box<dyn ConsoleLauncher>,
    /// Required when any door is `radio:<address>`
    pub radio: Option<Box<dyn RadioStream>>,
}

/// Pushes work onto the same queues the hub and the call button use.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    unlock: UnlockDispatcher,
    pages: mpsc::Sender<PageRequest>,
}

impl ControllerHandle {
    /// Unlock `door` as if the hub had asked; no acks are sent.
    pub fn request_unlock(&self, door: usize) -> Result<bool, WorkerError> {
        self.unlock.dispatch(UnlockCommand {
            door,
            received_at: Instant::now(),
            msgid: None,
        })
    }

    /// Page as if the call button had been held.
    pub async fn request_page(&self) -> Result<(), WorkerError> {
        self.pages
            .send(PageRequest {
                requested_at: Instant::now(),
            })
            .await
            .map_err(|_| WorkerError::ChannelClosed("page"))
    }
}

pub struct Controller {
    workers: JoinSet<(String, Result<(), WorkerError>)>,
}

impl Controller {
    /// Spawn every worker. Must be called inside a tokio runtime.
    pub fn start(
        config: ControllerConfig,
        mut hardware: Hardware,
    ) -> Result<(Self, ControllerHandle), ConfigError> {
        let mut workers = JoinSet::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (page_tx, page_rx) = mpsc::channel(PAGE_QUEUE);
        let (status_tx, status_rx) = watch::channel(ActuationStatus::default());
        let status_tx = Arc::new(status_tx);

        config.validate()?;
        let radio_requests = match hardware.radio.take() {
            Some(stream) if config.uses_radio() => Some(spawn_radio(
                &mut workers,
                stream,
                &config.radio,
                outbound_tx.clone(),
            )),
            None if config.uses_radio() => return Err(ConfigError::MissingRadio),
            _ => None,
        };

        let mut actuators = Vec::with_capacity(config.doors.len());
        for (door, spec) in config.doors.iter().enumerate() {
            let actuator = match (spec, &radio_requests) {
                (DoorSpec::Gpio(_), _) => DoorActuator::Gpio(
                    hardware
                        .door_pins
                        .remove(&door)
                        .ok_or(ConfigError::MissingDoorPin(door))?,
                ),
                (DoorSpec::Radio(address), Some(requests)) => DoorActuator::Radio {
                    address: *address,
                    requests: requests.clone(),
                },
                (DoorSpec::Radio(_), None) => return Err(ConfigError::MissingRadio),
            };
            actuators.push((door, actuator));
        }

        let executor_settings = &config.executor;
        let build = |name: String, doors: HashMap<usize, DoorActuator>, commands| {
            UnlockExecutor::new(name, doors, commands, outbound_tx.clone(), status_tx.clone())
                .with_unlocked_duration(executor_settings.unlocked_duration)
                .with_page_cooldown(executor_settings.page_cooldown)
        };
        let dispatcher = match executor_settings.mode {
            ExecutorMode::PerDoor => {
                let mut senders = Vec::with_capacity(actuators.len());
                for (door, actuator) in actuators {
                    let (tx, rx) = mpsc::channel(UNLOCK_QUEUE);
                    senders.push(tx);
                    let name = format!("executor-{door}");
                    let executor = build(name.clone(), HashMap::from([(door, actuator)]), rx);
                    workers.spawn(async move { (name, executor.run().await) });
                }
                UnlockDispatcher::PerDoor(senders)
            }
            ExecutorMode::Shared => {
                let (tx, rx) = mpsc::channel(UNLOCK_QUEUE);
                let doors = actuators.len();
                let executor = build("executor".to_string(), actuators.into_iter().collect(), rx);
                workers.spawn(async move { ("executor".to_string(), executor.run().await) });
                UnlockDispatcher::Shared { doors, sender: tx }
            }
        };

        let listener = run_listener(config.listener.clone(), dispatcher.clone(), outbound_rx);
        workers.spawn(async move { ("listener".to_string(), listener.await) });

        let page_listener = PageListener::new(hardware.button, &config.button, page_tx.clone());
        workers.spawn(async move { ("page-listener".to_string(), page_listener.run().await) });

        let supervisor = PageSupervisor::new(hardware.console, config.pager.clone(), page_rx, status_rx);
        workers.spawn(async move { ("pager".to_string(), supervisor.run().await) });

        tracing::info!("Started {} workers", workers.len());
        let handle = ControllerHandle {
            unlock: dispatcher,
            pages: page_tx,
        };
        Ok((Self { workers }, handle))
    }

    /// Wait for the first worker to exit, then stop the rest.
    pub async fn run(mut self) -> Result<(), WorkerError> {
        let Some(joined) = self.workers.join_next().await else {
            return Ok(());
        };
        self.workers.abort_all();

        match joined {
            Ok((name, Ok(()))) => {
                tracing::error!("Worker {} exited", name);
                Err(WorkerError::Stopped(name))
            }
            Ok((name, Err(e))) => {
                tracing::error!("Worker {} failed: {}", name, e);
                Err(e)
            }
            Err(e) => {
                tracing::error!("Worker panicked: {}", e);
                Err(WorkerError::Panicked(e.to_string()))
            }
        }
    }
}

/// Spawn the transmitter engine and the task that reports relocks to the hub.
fn spawn_radio(
    workers: &mut JoinSet<(String, Result<(), WorkerError>)>,
    stream: Box<dyn RadioStream>,
    settings: &RadioSettings,
    outbound: mpsc::Sender<Outbound>,
) -> mpsc::Sender<RadioRequest> {
    let (request_tx, request_rx) = mpsc::channel(RADIO_QUEUE);
    let (event_tx, mut event_rx) = mpsc::channel(RADIO_QUEUE);

    let mut engine = LineProtocolEngine::new(stream, ReyaxTransmitter::new(request_rx, event_tx))
        .with_commands(settings.setup_commands());
    workers.spawn(async move { ("radio".to_string(), engine.run().await.map_err(WorkerError::from)) });

    workers.spawn(async move {
        while let Some(RadioEvent::Relocked { address }) = event_rx.recv().await {
            let body = format!("radio door at {address} relocked");
            if outbound.send(Outbound::Broadcast(body)).await.is_err() {
                return ("radio-events".to_string(), Err(WorkerError::ChannelClosed("outbound")));
            }
        }
        ("radio-events".to_string(), Err(WorkerError::ChannelClosed("radio event")))
    });

    request_tx
}
