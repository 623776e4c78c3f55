//! On-site door controller.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin doorbridge-client -- --server ws://127.0.0.1:8001/ws --secret s3 --door 18
//! ```

use std::{collections::HashMap, time::Duration};

use clap::Parser;
use doorbridge_client::{
    Controller, ControllerConfig, DoorSpec, ExecutorMode, Hardware,
    config::{
        ButtonSettings, DEFAULT_EXPECT_TIMEOUT, DEFAULT_RECONNECT_DELAY, ExecutorSettings,
        ListenerSettings, PagerSettings,
    },
    coordinator::RadioStream,
    pager::PjsuaLauncher,
};
use doorbridge_radio::{RadioSettings, serial::open_radio};
use doorbridge_shared::{
    gpio::{GpioError, OutputPin, SysfsPin},
    logger::setup_logger,
};

#[derive(Parser, Debug)]
#[command(name = "doorbridge-client")]
#[command(about = "Door controller: unlocks doors on hub instructions and pages on the call button", long_about = None)]
struct Args {
    /// Hub websocket URL
    #[arg(long, env = "DOORCLIENT_SERVER", default_value = "ws://127.0.0.1:8001/ws")]
    server: String,

    /// Shared secret, identical to the hub's
    #[arg(long, env = "DOORCLIENT_SECRET")]
    secret: String,

    /// Door actuator: a GPIO pin number or radio:<address>. Repeat per door;
    /// the first is door 0.
    #[arg(long = "door", env = "DOORCLIENT_DOORS", value_delimiter = ',', required = true)]
    doors: Vec<DoorSpec>,

    /// Seconds a door stays unlocked
    #[arg(long, env = "DOORCLIENT_DOOR_UNLOCKED_DURATION", default_value_t = 10)]
    door_unlocked_duration: u64,

    #[arg(long, env = "DOORCLIENT_EXECUTOR_MODE", value_enum, default_value_t = ExecutorMode::PerDoor)]
    executor_mode: ExecutorMode,

    #[arg(long, env = "DOORCLIENT_CALLBUTTON_GPIO_PIN", default_value_t = 16)]
    callbutton_gpio_pin: u32,

    /// Milliseconds
    #[arg(long, env = "DOORCLIENT_CALLBUTTON_BOUNCETIME", default_value_t = 60)]
    callbutton_bouncetime: u64,

    /// Milliseconds the button must be held to page
    #[arg(long, env = "DOORCLIENT_CALLBUTTON_HOLDTIME", default_value_t = 250)]
    callbutton_holdtime: u64,

    #[arg(long, env = "DOORCLIENT_PJSUA_BIN", default_value = "pjsua")]
    pjsua_bin: String,

    #[arg(long, env = "DOORCLIENT_PJSUA_CONFIG_FILE", default_value = "pjsua.conf")]
    pjsua_config_file: String,

    #[arg(long, env = "DOORCLIENT_PAGING_SIP", default_value = "sip:7000@127.0.0.1:5065")]
    paging_sip: String,

    /// Seconds a confirmed page call is held
    #[arg(long, env = "DOORCLIENT_PAGING_DURATION", default_value_t = 100)]
    paging_duration: u64,

    /// Seconds after a page during which further pages are ignored
    #[arg(long, env = "DOORCLIENT_PAGE_THROTTLE_DURATION", default_value_t = 30)]
    page_throttle_duration: u64,

    /// Milliseconds between hub reconnect attempts; 0 reconnects at once
    #[arg(long, env = "DOORCLIENT_RECONNECT_DELAY_MS", default_value_t = DEFAULT_RECONNECT_DELAY.as_millis() as u64)]
    reconnect_delay_ms: u64,

    /// Ping the console every N seconds; 0 disables
    #[arg(long, env = "DOORCLIENT_DRAINEVERY", default_value_t = 0)]
    drainevery: u64,

    /// Seconds per registration attempt
    #[arg(long, env = "DOORCLIENT_REGISTRATION_TIMEOUT", default_value_t = 10)]
    registration_timeout: u64,

    /// Seconds paging stays suspended after a door relocks
    #[arg(long, env = "DOORCLIENT_UNLOCK_PAGE_COOLDOWN", default_value_t = 2)]
    unlock_page_cooldown: u64,

    #[arg(long, env = "DOORCLIENT_RADIO_DEVICE", default_value = "/dev/ttyUSB0")]
    radio_device: String,

    #[arg(long, env = "DOORCLIENT_RADIO_BAUD", default_value_t = 115_200)]
    radio_baud: u32,

    #[arg(long, env = "DOORCLIENT_RADIO_BAND", default_value_t = 915_000_000)]
    radio_band: u32,

    #[arg(long, env = "DOORCLIENT_RADIO_NETWORK_ID", default_value_t = 18)]
    radio_network_id: u8,

    #[arg(long, env = "DOORCLIENT_RADIO_ADDRESS", default_value_t = 2)]
    radio_address: u16,

    #[arg(long, env = "DOORCLIENT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn config(&self) -> ControllerConfig {
        ControllerConfig {
            doors: self.doors.clone(),
            listener: ListenerSettings {
                server: self.server.clone(),
                secret: self.secret.clone(),
                reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            },
            executor: ExecutorSettings {
                mode: self.executor_mode,
                unlocked_duration: Duration::from_secs(self.door_unlocked_duration),
                page_cooldown: Duration::from_secs(self.unlock_page_cooldown),
            },
            button: ButtonSettings {
                pin: self.callbutton_gpio_pin,
                bounce: Duration::from_millis(self.callbutton_bouncetime),
                hold: Duration::from_millis(self.callbutton_holdtime),
            },
            pager: PagerSettings {
                paging_sip: self.paging_sip.clone(),
                paging_duration: Duration::from_secs(self.paging_duration),
                throttle: Duration::from_secs(self.page_throttle_duration),
                drain_every: (self.drainevery > 0).then(|| Duration::from_secs(self.drainevery)),
                registration_timeout: Duration::from_secs(self.registration_timeout),
                expect_timeout: DEFAULT_EXPECT_TIMEOUT,
            },
            radio: RadioSettings {
                band: self.radio_band,
                network_id: self.radio_network_id,
                baud: self.radio_baud,
                address: self.radio_address,
            },
            radio_device: self.radio_device.clone(),
        }
    }
}

type DoorPins = HashMap<usize, Box<dyn OutputPin>>;

/// Export the door relays and the call button through sysfs.
fn open_pins(doors: &[DoorSpec], button_pin: u32) -> Result<(DoorPins, SysfsPin), GpioError> {
    let mut door_pins: DoorPins = HashMap::new();
    for (door, spec) in doors.iter().enumerate() {
        if let DoorSpec::Gpio(pin) = spec {
            tracing::info!("Door {} uses gpio {}", door, pin);
            door_pins.insert(door, Box::new(SysfsPin::output(*pin)?));
        }
    }

    // call button wired to ground with a pull-up
    let button = SysfsPin::input(button_pin, true)?;
    Ok((door_pins, button))
}

/// Open the sysfs pins, the serial radio and the console launcher.
async fn open_hardware(
    config: &ControllerConfig,
    args: &Args,
) -> Result<Hardware, Box<dyn std::error::Error>> {
    let doors = config.doors.clone();
    let button_pin = config.button.pin;
    let (door_pins, button) =
        tokio::task::spawn_blocking(move || open_pins(&doors, button_pin)).await??;
    let button = Box::new(button);

    let radio = if config.uses_radio() {
        let stream = open_radio(&config.radio_device, config.radio.baud).await?;
        Some(Box::new(stream) as Box<dyn RadioStream>)
    } else {
        None
    };

    Ok(Hardware {
        door_pins,
        button,
        console: Box::new(PjsuaLauncher {
            bin: args.pjsua_bin.clone(),
            config_file: args.pjsua_config_file.clone(),
        }),
        radio,
    })
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.config();
    config.validate()?;
    let hardware = open_hardware(&config, &args).await?;

    let (controller, _handle) = Controller::start(config, hardware)?;
    tokio::select! {
        result = controller.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, shutting down"),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    if let Err(e) = run(args).await {
        tracing::error!("Controller stopped: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_delay_flag() {
        // テスト項目: 再接続の待ち時間は既定で 1 秒、0 を指定すると待たずに再接続する
        // given (前提条件):
        let base = ["doorbridge-client", "--secret", "s3", "--door", "18"];

        // when (操作):
        let default = Args::try_parse_from(base).unwrap().config();
        let immediate = Args::try_parse_from(base.into_iter().chain(["--reconnect-delay-ms", "0"]))
            .unwrap()
            .config();

        // then (期待する結果):
        assert_eq!(default.listener.reconnect_delay, Duration::from_secs(1));
        assert_eq!(immediate.listener.reconnect_delay, Duration::ZERO);
    }
}
