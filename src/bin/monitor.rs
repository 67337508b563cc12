//! Telemetry monitor
//!
//! Watches one node's light and button topics and prints each decoded
//! message together with the recent button history. Reconnects on its own
//! when the broker goes away.
//!
//! ## Usage
//!
//! ```bash
//! monitor
//! monitor --broker-url mqtt://localhost:1883 --format compact
//! monitor --topic-prefix site/a --format json
//! ```

use clap::{Parser, ValueEnum};
use nodeagent::config::MqttSection;
use nodeagent::monitor::{TelemetryView, ViewUpdate, DEFAULT_EVENT_HISTORY};
use nodeagent::observability::init_default_logging;
use nodeagent::protocol::{validate_topic, EdgeKind};
use nodeagent::transport::mqtt::MqttTransport;
use nodeagent::transport::{InboundQueue, MessagingTransport};
use serde_json::json;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Colored, with the recent button history
    Pretty,
    /// One line per message
    Compact,
    /// One JSON object per message
    Json,
}

#[derive(Parser)]
#[command(name = "monitor", about = "Watch a node's light readings and button events")]
struct Args {
    /// Topic prefix of the node
    #[arg(long, default_value = "ttpu/iot/node")]
    topic_prefix: String,

    /// Light topic, overriding `<prefix>/sensors/light`
    #[arg(long)]
    light_topic: Option<String>,

    /// Button topic, overriding `<prefix>/events/button`
    #[arg(long)]
    button_topic: Option<String>,

    /// MQTT broker URL
    #[arg(long, default_value = "mqtt://broker.hivemq.com:1883")]
    broker_url: String,

    /// Environment variable holding the broker username
    #[arg(long)]
    username_env: Option<String>,

    /// Environment variable holding the broker password
    #[arg(long)]
    password_env: Option<String>,

    /// Button events to keep
    #[arg(long, default_value_t = DEFAULT_EVENT_HISTORY)]
    history: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    format: OutputFormat,

    /// Seconds between reconnection attempts
    #[arg(long, default_value_t = 5)]
    retry_secs: u64,
}

const RESET: &str = "\x1b[0m";
const LIGHT_COLOR: &str = "\x1b[93m";
const PRESSED_COLOR: &str = "\x1b[92m";
const RELEASED_COLOR: &str = "\x1b[94m";
const HISTORY_COLOR: &str = "\x1b[90m";

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn edge_color(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Pressed => PRESSED_COLOR,
        EdgeKind::Released => RELEASED_COLOR,
    }
}

fn format_update(
    update: &ViewUpdate,
    view: &TelemetryView,
    format: &OutputFormat,
) -> Option<String> {
    let line = match (format, update) {
        (_, ViewUpdate::Ignored | ViewUpdate::Rejected) => return None,
        (OutputFormat::Json, ViewUpdate::Reading(reading)) => json!({
            "topic": view.light_topic(),
            "light": reading.value,
            "timestamp": reading.timestamp_millis,
        })
        .to_string(),
        (OutputFormat::Json, ViewUpdate::Edge(event)) => json!({
            "topic": view.button_topic(),
            "event": event.kind,
            "timestamp": event.timestamp_millis,
        })
        .to_string(),
        (OutputFormat::Compact, ViewUpdate::Reading(reading)) => format!(
            "[light] {} at {}",
            reading.value, reading.timestamp_millis
        ),
        (OutputFormat::Compact, ViewUpdate::Edge(event)) => format!(
            "[button] {} at {}",
            event.kind.as_str(),
            event.timestamp_millis
        ),
        (OutputFormat::Pretty, ViewUpdate::Reading(reading)) => format!(
            "{LIGHT_COLOR}[LIGHT]{RESET} {} (node time {} ms)",
            reading.value, reading.timestamp_millis
        ),
        (OutputFormat::Pretty, ViewUpdate::Edge(event)) => {
            let history: Vec<String> = view
                .recent_events()
                .map(|e| format!("{}@{}", e.kind.as_str(), e.timestamp_millis))
                .collect();
            format!(
                "{}[BUTTON]{RESET} {} (node time {} ms)\n{HISTORY_COLOR}  recent: {}{RESET}",
                edge_color(event.kind),
                event.kind.as_str(),
                event.timestamp_millis,
                history.join(", ")
            )
        }
    };
    Some(line)
}

fn connect(transport: &mut MqttTransport, view: &mut TelemetryView, args: &Args) -> bool {
    let username = args.username_env.as_ref().and_then(|n| std::env::var(n).ok());
    let password = args.password_env.as_ref().and_then(|n| std::env::var(n).ok());
    let client_id = format!("nodeagent-monitor-{}", process::id());

    if !transport.connect(&client_id, username.as_deref(), password.as_deref()) {
        view.set_disconnected(transport.last_error());
        warn!(
            broker = %args.broker_url,
            error = transport.last_error().unwrap_or("unknown error"),
            "Monitor connection failed"
        );
        return false;
    }

    let topics = [view.light_topic().to_string(), view.button_topic().to_string()];
    for topic in &topics {
        if !transport.subscribe(topic) {
            warn!(topic = %topic, "Subscription was not accepted");
        }
    }
    view.set_connected();
    info!(
        broker = %args.broker_url,
        light = %topics[0],
        button = %topics[1],
        "Monitoring node"
    );
    true
}

fn main() {
    let args = Args::parse();
    init_default_logging(None);

    let light_topic = args
        .light_topic
        .clone()
        .unwrap_or_else(|| format!("{}/sensors/light", args.topic_prefix));
    let button_topic = args
        .button_topic
        .clone()
        .unwrap_or_else(|| format!("{}/events/button", args.topic_prefix));
    for topic in [&light_topic, &button_topic] {
        if let Err(e) = validate_topic(topic) {
            eprintln!("Invalid topic: {e}");
            process::exit(2);
        }
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&shutdown)) {
            eprintln!("Failed to install signal handler: {e}");
            process::exit(1);
        }
    }

    let config = MqttSection {
        broker_url: args.broker_url.clone(),
        username_env: args.username_env.clone(),
        password_env: args.password_env.clone(),
        retry_delay_ms: args.retry_secs.max(1) * 1_000,
        keep_alive_secs: 60,
        connect_timeout_ms: 3_000,
        pump_window_ms: 100,
    };
    let retry_delay = Duration::from_millis(config.retry_delay_ms);
    let mut transport = MqttTransport::new(config);
    let mut view = TelemetryView::with_history(light_topic, button_topic, args.history);
    let mut inbox = InboundQueue::new(64);
    let mut next_attempt = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        if !transport.is_connected() {
            if view.status().connected {
                view.set_disconnected(transport.last_error());
                warn!("Monitor lost its broker session");
            }
            if Instant::now() < next_attempt {
                thread::sleep(Duration::from_millis(100));
                continue;
            }
            next_attempt = Instant::now() + retry_delay;
            if !connect(&mut transport, &mut view, &args) {
                continue;
            }
        }

        transport.pump(&mut inbox);
        let dropped = inbox.take_overflow_count();
        if dropped > 0 {
            warn!(dropped, "Monitor inbox overflowed");
        }
        let messages: Vec<_> = inbox.drain().collect();
        for message in messages {
            let update = view.handle(&message, epoch_millis());
            if let Some(line) = format_update(&update, &view, &args.format) {
                println!("{line}");
            }
        }
    }

    transport.disconnect();
    info!(rejected = view.rejected_count(), "Monitor stopped");
}
