use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use dapline_core::{ModuleRecord, SessionId, SessionTracker};

use crate::read_input;

/// Execute `dapline modules`: replay a protocol log and print the module
/// table it produces.
///
/// The log holds one protocol message per line, as sent by the adapter.
pub fn run_modules(file: &str, session_id: Option<Uuid>, json: bool) -> Result<()> {
    let raw = read_input(file)?;
    let modules = replay(&raw, session_id.map(SessionId::from).unwrap_or_default());

    if json {
        println!("{}", serde_json::to_string_pretty(&modules)?);
    } else {
        print!("{}", render(&modules));
    }
    Ok(())
}

fn replay(log: &str, session: SessionId) -> Vec<ModuleRecord> {
    let tracker = Arc::new(SessionTracker::new());
    let observer = tracker.observer(session);

    for (index, line) in log.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(message) => observer.on_did_send_message(&message),
            Err(e) => warn!(line = index + 1, error = %e, "skipping line that is not JSON"),
        }
    }

    tracker.modules_for(session)
}

fn render(modules: &[ModuleRecord]) -> String {
    if modules.is_empty() {
        return "No modules loaded.\n".to_string();
    }

    let mut out = String::new();
    for module in modules {
        match &module.symbol_status {
            Some(status) => out.push_str(&format!("{}  ({status})\n", module.name)),
            None => out.push_str(&format!("{}\n", module.name)),
        }
        for property in module.properties() {
            out.push_str(&format!("    {} {}\n", property.key, property.value));
        }
    }
    out
}
