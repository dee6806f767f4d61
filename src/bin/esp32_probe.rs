//! esp32_probe - check the serial link to the actuator board.
//!
//! Lists serial ports, connects (discovering the board when no port is
//! given), optionally sends one servo command, and prints any reply.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::time::Duration;

use aura_arm::transport::{validate_port, Command, DEFAULT_READ_TIMEOUT};
use aura_arm::ArmConfig;
use aura_arm::Transport;

#[derive(Parser, Debug)]
#[command(author, version, about = "Probe the actuator board's serial link")]
struct Args {
    /// Serial device. Discovered when omitted.
    port: Option<String>,

    /// List serial ports and exit.
    #[arg(long)]
    list: bool,

    /// Servo pulse widths: base,shoulder,elbow[,wrist].
    #[arg(long, value_delimiter = ',')]
    servos: Option<Vec<u16>>,

    /// How long to wait for a reply, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT.as_millis() as u64)]
    reply_timeout_ms: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut settings = ArmConfig::load(None)?.transport_settings();
    if let Some(port) = args.port.as_deref() {
        settings.port = Some(validate_port(port)?);
    }
    let mut transport = Transport::serial(settings);

    let ports = transport.available_ports();
    if ports.is_empty() {
        log::info!("no serial ports found");
    }
    for port in &ports {
        log::info!("{} - {}", port.device, port.description);
    }
    if args.list {
        return Ok(());
    }

    let mut session = transport.session();
    if !session.connected() {
        return Err(anyhow!("could not connect to the actuator board"));
    }
    log::info!("connected on {}", session.port().unwrap_or("?"));

    let command = match args.servos.as_deref() {
        Some(us) => Command::from_us_list(us)?,
        None => Command::Ping,
    };
    if !session.send(&command) {
        return Err(anyhow!("command was not delivered"));
    }
    log::info!("sent {:?}", command);

    match session.read_response(Duration::from_millis(args.reply_timeout_ms)) {
        Some(reply) => log::info!("reply: {}", reply),
        None => log::info!("no reply"),
    }
    Ok(())
}
