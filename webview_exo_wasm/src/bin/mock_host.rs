use crossbeam_channel::Receiver;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};
use webview_exo_wasm::mock_page::{ManualTimers, MockPage};
use webview_exo_wasm::{
    logging, BridgeConfig, ButtonStates, HostAction, PressedButton, SharedBridge,
};

const HOST_QUEUE_CAP: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Command {
    Get,
    Sync { states: ButtonStates },
    Action { action: HostAction },
    CloseUi,
    OpenUi { escapes: u32 },
    Press { button: Option<String> },
    Advance { ms: u64 },
    Report,
}

struct Harness {
    page: MockPage,
    timers: ManualTimers,
    bridge: SharedBridge,
    host_rx: Option<Receiver<String>>,
}

impl Harness {
    fn run(&mut self, command: Command) -> Value {
        match command {
            Command::Get => match self.bridge.get_button_states(&self.page) {
                Some(states) => json!({ "op": "get", "states": states }),
                None => json!({ "op": "get", "skipped": true }),
            },
            Command::Sync { states } => {
                let outcome = self.bridge.sync_buttons(&self.page, &states);
                json!({ "op": "sync", "outcome": outcome })
            }
            Command::Action { action } => match self.bridge.send_action(&self.page, action) {
                Ok(()) => json!({ "op": "action", "sent": action }),
                Err(e) => json!({ "op": "action", "error": e.to_string() }),
            },
            Command::CloseUi => {
                self.bridge.reset_player_ui(
                    &self.page,
                    &mut self.timers,
                    Box::new(|outcome| emit(&json!({ "op": "close_ui_done", "outcome": outcome }))),
                );
                json!({ "op": "close_ui", "pending_timers": self.timers.pending_len() })
            }
            Command::OpenUi { escapes } => {
                self.page.close_ui_after_escapes(escapes);
                json!({ "op": "open_ui", "escapes": escapes })
            }
            Command::Press { button } => {
                let pressed = match button.as_deref().map(PressedButton::from_str) {
                    None => None,
                    Some(Ok(b)) => Some(b),
                    Some(Err(e)) => return json!({ "op": "press", "error": e.to_string() }),
                };
                self.bridge.set_last_button(pressed);
                json!({ "op": "press", "button": pressed.map(PressedButton::as_str) })
            }
            Command::Advance { ms } => {
                let by = Duration::from_millis(ms);
                self.page.advance(by);
                let due = self.timers.advance(by);
                let fired = due.len();
                for ticket in due {
                    self.bridge.on_close_timer(&self.page, &mut self.timers, ticket);
                }
                json!({ "op": "advance", "ms": ms, "timers_fired": fired })
            }
            Command::Report => json!({ "op": "report", "controls": self.bridge.mapping_report(&self.page) }),
        }
    }

    fn drain_host(&self) {
        let Some(rx) = &self.host_rx else {
            return;
        };
        while let Ok(action) = rx.try_recv() {
            emit(&json!({ "op": "host", "action": action }));
        }
    }
}

fn emit(value: &Value) {
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "{value}");
    let _ = out.flush();
}

fn parse_arg_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn load_config(args: &[String]) -> Result<BridgeConfig, webview_exo_wasm::BridgeError> {
    if let Some(path) = parse_arg_value(args, "--config").map(PathBuf::from) {
        return BridgeConfig::from_file(&path);
    }
    Ok(BridgeConfig::from_env()?.unwrap_or_default())
}

fn main() {
    logging::init();
    let args: Vec<String> = std::env::args().collect();

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    let bridge = match SharedBridge::new(&config) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let page = MockPage::youtube_tv();
    let host_rx = if args.iter().any(|a| a == "--no-host") {
        None
    } else {
        Some(page.connect_host(HOST_QUEUE_CAP))
    };

    let mut harness = Harness {
        page,
        timers: ManualTimers::default(),
        bridge,
        host_rx,
    };
    info!("mock_host ready, reading commands from stdin");

    for line in io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Command>(&line) {
            Ok(command) => {
                let result = harness.run(command);
                emit(&result);
                harness.drain_host();
            }
            Err(e) => {
                warn!("bad command: {e}");
                emit(&json!({ "error": e.to_string() }));
            }
        }
    }
}
