//! Command injection utility
//!
//! Publishes one `{"state": "ON"|"OFF"}` command to a topic, the way a
//! dashboard would, so a running node can be exercised by hand.
//!
//! ## Usage
//!
//! ```bash
//! send-command --topic ttpu/iot/node/led/red --state ON
//! send-command --broker-url mqtt://localhost:1883 --topic ttpu/iot/node/led/red --state off
//! ```

use clap::{Parser, ValueEnum};
use nodeagent::config::MqttSection;
use nodeagent::hardware::ActuatorState;
use nodeagent::protocol::{validate_topic, STATE_FIELD};
use nodeagent::transport::mqtt::MqttTransport;
use nodeagent::transport::{InboundQueue, MessagingTransport};
use serde_json::json;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, ValueEnum)]
#[value(rename_all = "UPPER")]
enum StateArg {
    #[value(alias = "on")]
    On,
    #[value(alias = "off")]
    Off,
}

impl From<StateArg> for ActuatorState {
    fn from(state: StateArg) -> Self {
        match state {
            StateArg::On => ActuatorState::On,
            StateArg::Off => ActuatorState::Off,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "send-command",
    about = "Publish an ON/OFF command to a node's actuator topic"
)]
struct Args {
    /// Actuator topic to publish to
    #[arg(long)]
    topic: String,

    /// Desired actuator state
    #[arg(long, value_enum)]
    state: StateArg,

    /// MQTT broker URL
    #[arg(long, default_value = "mqtt://localhost:1883")]
    broker_url: String,

    /// Environment variable holding the broker username
    #[arg(long)]
    username_env: Option<String>,

    /// Environment variable holding the broker password
    #[arg(long)]
    password_env: Option<String>,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = validate_topic(&args.topic) {
        eprintln!("Invalid topic: {e}");
        process::exit(2);
    }

    let config = MqttSection {
        broker_url: args.broker_url.clone(),
        username_env: args.username_env.clone(),
        password_env: args.password_env.clone(),
        retry_delay_ms: 5_000,
        keep_alive_secs: 60,
        connect_timeout_ms: 3_000,
        pump_window_ms: 50,
    };
    let username = args.username_env.as_ref().and_then(|n| std::env::var(n).ok());
    let password = args.password_env.as_ref().and_then(|n| std::env::var(n).ok());

    let client_id = format!(
        "send-command-{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
    );

    let mut transport = MqttTransport::new(config);
    println!("Connecting to {}...", args.broker_url);
    if !transport.connect(&client_id, username.as_deref(), password.as_deref()) {
        eprintln!(
            "Connection failed: {}",
            transport.last_error().unwrap_or("unknown error")
        );
        process::exit(1);
    }

    let state = ActuatorState::from(args.state);
    let payload = json!({ STATE_FIELD: state.to_string() }).to_string();
    if !transport.publish(&args.topic, payload.as_bytes()) {
        eprintln!("Publish was not accepted");
        process::exit(1);
    }

    // The connection only writes while it is polled
    let mut sink = InboundQueue::new(1);
    for _ in 0..4 {
        transport.pump(&mut sink);
    }
    transport.disconnect();

    println!("Sent {payload} to {}", args.topic);
}
