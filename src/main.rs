use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use cnclink::console::ConsoleInput;
use cnclink::{
    init_logging, link_config_from, list_ports, Config, DeviceLink, BUILD_DATE, VERSION,
};

/// Console front end for the CncLink device link
///
/// Prints every link event as a JSON line on stdout and sends each stdin
/// line to the device. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "cnclink", version)]
struct Args {
    /// Configuration file (.toml or .json); defaults to the platform config dir
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port, overriding config and MASLOW_SERIAL_PORT
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate, overriding config
    #[arg(short, long)]
    baud: Option<u32>,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => match cnclink_settings::default_config_path() {
            Ok(path) => Config::load_or_default(&path)?,
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Config::default()
            }
        },
    };

    config.apply_env_overrides();
    config.apply_port_override(args.port.clone());
    if let Some(baud) = args.baud {
        config.link.baud_rate = baud;
    }
    config.validate()?;
    Ok(config)
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::error!("Failed to serialize output: {}", e),
    }
}

async fn connect(link: &DeviceLink) {
    let connecting = link.clone();
    match tokio::task::spawn_blocking(move || connecting.connect()).await {
        Ok(Ok(port)) => tracing::info!("Link up on {}", port),
        Ok(Err(e)) => tracing::error!("Connect failed: {}", e),
        Err(e) => tracing::error!("Connect task failed: {}", e),
    }
}

async fn disconnect(link: &DeviceLink) {
    let closing = link.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || closing.disconnect()).await {
        tracing::error!("Disconnect task failed: {}", e);
    }
}

/// Handle one console line; returns false when the console should exit
async fn handle_input(link: &DeviceLink, input: ConsoleInput) -> bool {
    let window = link.config().command_window;

    let (command, result) = match input {
        ConsoleInput::Quit => return false,
        ConsoleInput::Status => {
            print_json(&link.status());
            return true;
        }
        ConsoleInput::Connect => {
            connect(link).await;
            return true;
        }
        ConsoleInput::Disconnect => {
            disconnect(link).await;
            return true;
        }
        ConsoleInput::EmergencyStop => {
            let stopping = link.clone();
            let result = tokio::task::spawn_blocking(move || stopping.emergency_stop(window))
                .await
                .map_err(|e| cnclink::Error::other(e.to_string()))
                .and_then(|r| r);
            ("emergency_stop".to_string(), result)
        }
        ConsoleInput::Realtime(realtime) => {
            let sending = link.clone();
            let result =
                tokio::task::spawn_blocking(move || sending.send_realtime(realtime, window))
                    .await
                    .map_err(|e| cnclink::Error::other(e.to_string()))
                    .and_then(|r| r);
            (realtime.as_command(), result)
        }
        ConsoleInput::Maslow(maslow) => {
            let command = maslow.to_command();
            let result = link.send_command_async(command.clone(), window).await;
            (command, result)
        }
        ConsoleInput::Raw(command) => {
            let result = link.send_command_async(command.clone(), window).await;
            (command, result)
        }
    };

    match result {
        Ok(responses) => print_json(&serde_json::json!({
            "type": "command_response",
            "command": command,
            "success": true,
            "responses": responses,
        })),
        Err(e) => print_json(&serde_json::json!({
            "type": "command_response",
            "command": command,
            "success": false,
            "error": e.to_string(),
        })),
    }
    true
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs)?;

    if args.list_ports {
        for port in list_ports()? {
            print_json(&port);
        }
        return Ok(());
    }

    tracing::info!("CncLink {} (built {})", VERSION, BUILD_DATE);
    let config = load_config(&args)?;
    let link = DeviceLink::serial(link_config_from(&config.link));

    let mut subscription = link.subscribe();
    let subscription_id = subscription.id;
    let printer = tokio::spawn(async move {
        while let Some(event) = subscription.receiver.recv().await {
            print_json(&event);
        }
    });
    let services = link.spawn_services();

    connect(&link).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match ConsoleInput::parse(&line) {
                    Ok(Some(input)) => {
                        if !handle_input(&link, input).await {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    disconnect(&link).await;
    services.shutdown();

    // Flush what is still queued, then close the printer's channel
    link.bus().drain_once(link.queue());
    link.unsubscribe(subscription_id);
    printer.await?;

    Ok(())
}
