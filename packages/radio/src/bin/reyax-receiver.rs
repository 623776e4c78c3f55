//! Door-side radio receiver.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin reyax-receiver -- --device /dev/ttyUSB0 --unlock-gpio-pin 16
//! ```

use std::time::Duration;

use clap::Parser;
use doorbridge_radio::{
    LineProtocolEngine, ProtocolError, RadioSettings, receiver::DoorReceiver, serial::open_radio,
};
use doorbridge_shared::{gpio::SysfsPin, logger::setup_logger};

#[derive(Parser, Debug)]
#[command(name = "reyax-receiver")]
#[command(about = "Unlocks a door when the controller asks over LoRa", long_about = None)]
struct Args {
    /// Serial device the Reyax module is attached to
    #[arg(long, env = "REYAX_DEVICE", default_value = "/dev/ttyUSB0")]
    device: String,

    #[arg(long, env = "REYAX_BAUD", default_value_t = 115_200)]
    baud: u32,

    /// Carrier frequency in Hz
    #[arg(long, env = "REYAX_BAND", default_value_t = 915_000_000)]
    band: u32,

    #[arg(long, env = "REYAX_NETWORK_ID", default_value_t = 18)]
    network_id: u8,

    /// This module's address
    #[arg(long, env = "REYAX_ADDRESS", default_value_t = 1)]
    address: u16,

    /// Only unlock requests from this address are honored
    #[arg(long, env = "REYAX_AUTHORIZED_SENDER", default_value_t = 2)]
    authorized_sender: u16,

    #[arg(long, env = "REYAX_UNLOCK_GPIO_PIN", default_value_t = 16)]
    unlock_gpio_pin: u32,

    /// Status LED pin; no blinking without it
    #[arg(long, env = "REYAX_LED_GPIO_PIN")]
    led_gpio_pin: Option<u32>,

    /// Seconds the door stays unlocked
    #[arg(long, env = "REYAX_UNLOCKED_DURATION", default_value_t = 5)]
    unlocked_duration: u64,

    #[arg(long, env = "REYAX_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

async fn run(args: Args) -> Result<(), ProtocolError> {
    let settings = RadioSettings {
        band: args.band,
        network_id: args.network_id,
        baud: args.baud,
        address: args.address,
    };
    let unlock_pin = SysfsPin::output(args.unlock_gpio_pin)?;
    let led = args.led_gpio_pin.map(SysfsPin::output).transpose()?;
    let receiver = DoorReceiver::new(
        args.authorized_sender,
        Duration::from_secs(args.unlocked_duration),
        unlock_pin,
        led,
    );

    let stream = open_radio(&args.device, args.baud).await?;
    let mut engine = LineProtocolEngine::new(stream, receiver).with_commands(settings.setup_commands());
    tracing::info!(
        "Receiver {} listening for unlocks from {}",
        settings.address,
        args.authorized_sender
    );
    engine.run().await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    if let Err(e) = run(args).await {
        tracing::error!("Receiver stopped: {}", e);
        std::process::exit(1);
    }
}
