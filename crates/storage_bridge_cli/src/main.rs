//! CLI smoke and replay entry point.
//!
//! # Responsibility
//! - Verify `storage_bridge_core` / `storage_bridge_host` linkage.
//! - Replay JSON-lines host messages through one connected page and print
//!   every outbound message, for protocol debugging without a browser.

use clap::Parser;
use log::info;
use serde_json::{json, Value};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};
use storage_bridge_core::{
    init_logging_from_config, BridgeConfig, InMemorySettings, MessageSink, OutboundMessage,
    TabHost, Url, WindowHandle,
};
use storage_bridge_host::{core_version, ping, HostBridge};

/// Smoke-test the storage bridge and replay recorded page messages.
#[derive(Parser, Debug)]
#[command(name = "storage-bridge", version)]
struct Cli {
    /// JSON bridge config; `STORAGE_BRIDGE_*` environment overrides apply on top.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON-lines file of `{"name": ..., "userInfo": {...}}` messages, or `-` for stdin.
    #[arg(long)]
    replay: Option<String>,
}

/// Connected page that writes each outbound message as one JSON line.
struct LinePage<W> {
    out: Mutex<W>,
}

impl<W: Write> LinePage<W> {
    fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn print(&self, line: Value) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(out, "{line}");
    }
}

impl<W: Write + Send> MessageSink for LinePage<W> {
    fn dispatch(&self, message: OutboundMessage) {
        self.print(json!({ "name": message.name(), "userInfo": message.user_info() }));
    }
}

/// Pretends a single window is active and prints every tab it is asked to open.
struct PrintedTabs<W> {
    page: Arc<LinePage<W>>,
}

impl<W: Write + Send> TabHost for PrintedTabs<W> {
    fn active_window(&self) -> Option<WindowHandle> {
        Some(WindowHandle::new(0))
    }

    fn open_background_tab(&self, window: WindowHandle, url: &Url) {
        self.page
            .print(json!({ "name": "open-tab", "window": window.id(), "url": url.as_str() }));
    }
}

fn load_config(path: Option<&Path>) -> Result<BridgeConfig, String> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|err| format!("failed to read config `{}`: {err}", path.display()))?;
            BridgeConfig::from_json_str(&raw).map_err(|err| err.to_string())?
        }
        None => BridgeConfig::default(),
    };
    config
        .with_overrides(|key| std::env::var(key).ok())
        .map_err(|err| err.to_string())
}

fn bridge_for<W>(config: &BridgeConfig, page: &Arc<LinePage<W>>) -> HostBridge
where
    W: Write + Send + 'static,
{
    HostBridge::new(
        config,
        Arc::new(InMemorySettings::new()),
        Arc::new(PrintedTabs {
            page: Arc::clone(page),
        }),
    )
}

/// Sends every non-blank line through one page; returns the messages handled.
fn replay<W: Write + Send + 'static>(
    bridge: &HostBridge,
    page: Arc<LinePage<W>>,
    input: impl BufRead,
) -> Result<usize, String> {
    let page_id = bridge.connect_page(page);
    let mut handled = 0;
    for (index, line) in input.lines().enumerate() {
        let line = line.map_err(|err| format!("failed to read line {}: {err}", index + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(&line)
            .map_err(|err| format!("line {} is not valid JSON: {err}", index + 1))?;
        let Some(name) = record.get("name").and_then(Value::as_str) else {
            return Err(format!("line {} has no string `name`", index + 1));
        };
        bridge.message_received_value(page_id, name, record.get("userInfo"));
        handled += 1;
    }
    bridge.drain_tab_requests();
    Ok(handled)
}

fn run(cli: Cli) -> Result<(), String> {
    let config = load_config(cli.config.as_deref())?;
    init_logging_from_config(&config)?;

    println!("storage_bridge ping={}", ping());
    println!("storage_bridge version={}", core_version());

    let Some(source) = cli.replay else {
        return Ok(());
    };
    let page = Arc::new(LinePage::new(io::stdout()));
    let bridge = bridge_for(&config, &page);

    let handled = if source == "-" {
        replay(&bridge, page, io::stdin().lock())?
    } else {
        let file = std::fs::File::open(&source)
            .map_err(|err| format!("failed to open replay file `{source}`: {err}"))?;
        replay(&bridge, page, BufReader::new(file))?
    };
    info!("event=replay_done module=cli status=ok messages={handled}");
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("storage-bridge: {err}");
            ExitCode::FAILURE
        }
    }
}
