//! doorbridge relay hub.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin doorbridge-server -- --secret s3 --password-file passwords.txt
//! ```

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use doorbridge_server::{
    infrastructure::credentials::PasswordFileStore,
    ui::{HubConfig, Server},
};
use doorbridge_shared::{logger::setup_logger, time::SystemClock, token::TOKEN_VALID_SECS};

#[derive(Parser, Debug)]
#[command(name = "doorbridge-server")]
#[command(about = "WebSocket relay hub between door controllers and browsers", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "DOORSERVER_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "DOORSERVER_PORT", default_value_t = 8001)]
    port: u16,

    /// Shared secret presented by the door controller
    #[arg(long, env = "DOORSERVER_WSSECRET", hide_env_values = true)]
    secret: String,

    /// Password file with `name = hash[:doors]` lines
    #[arg(long, env = "DOORSERVER_PASSWORD_FILE", default_value = "passwords.txt")]
    password_file: PathBuf,

    /// Length of a login token time slice, in seconds
    #[arg(long, env = "DOORSERVER_TOKEN_VALID_SECS", default_value_t = TOKEN_VALID_SECS)]
    token_valid_secs: u64,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "DOORSERVER_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let credentials = match PasswordFileStore::load(&args.password_file) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    if credentials.is_empty() {
        tracing::warn!("No users loaded; every webclient will be rejected");
    }

    let config = HubConfig {
        secret: args.secret,
        token_valid_secs: args.token_valid_secs,
    };
    let server = Server::in_memory(config, Arc::new(credentials), Arc::new(SystemClock));
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
