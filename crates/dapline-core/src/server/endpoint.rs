//! The network endpoint a server-mode adapter announces on stdout.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Arguments appended to every server launch to request an ephemeral port.
pub const CONNECTION_ARGS: [&str; 2] = ["--connection", "connect://localhost:0"];

static CONNECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"connection://\[([^\]]+)\]:(\d+)").expect("connection pattern is a valid regex")
});

/// Where a running shared adapter accepts connections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]:{}", self.host, self.port)
    }
}

/// Extract the first `connection://[host]:port` announcement from a chunk of
/// adapter output.
///
/// A port outside the `u16` range is not an announcement.
pub fn parse_connection(chunk: &str) -> Option<ServerEndpoint> {
    let captures = CONNECTION_PATTERN.captures(chunk)?;
    let port = captures[2].parse().ok()?;
    Some(ServerEndpoint {
        host: captures[1].to_string(),
        port,
    })
}

/// Longest unterminated line carried between reads.
const MAX_PENDING: usize = 1024;

/// Finds the announcement in adapter output as it arrives.
///
/// The unterminated last line of each read is carried into the next, so an
/// announcement split across reads is still found. A match that runs to the
/// end of the buffered text is held back until more output, or
/// [`finish`](Self::finish), shows the port is complete.
#[derive(Debug, Default)]
pub struct AnnouncementScanner {
    pending: String,
}

impl AnnouncementScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one chunk of output, returning the endpoint once it is complete.
    pub fn feed(&mut self, chunk: &str) -> Option<ServerEndpoint> {
        self.pending.push_str(chunk);
        let complete = CONNECTION_PATTERN
            .find(&self.pending)
            .map(|m| m.end() < self.pending.len());

        match complete {
            Some(true) => {
                let endpoint = parse_connection(&self.pending);
                self.pending.clear();
                endpoint
            }
            // The port may continue in the next read.
            Some(false) => None,
            None => {
                self.keep_last_line();
                None
            }
        }
    }

    /// Match whatever is still buffered. Call once output has ended.
    pub fn finish(&mut self) -> Option<ServerEndpoint> {
        let endpoint = parse_connection(&self.pending);
        self.pending.clear();
        endpoint
    }

    fn keep_last_line(&mut self) {
        if let Some(newline) = self.pending.rfind('\n') {
            self.pending.drain(..=newline);
        }
        if self.pending.len() > MAX_PENDING {
            let mut cut = self.pending.len() - MAX_PENDING;
            while !self.pending.is_char_boundary(cut) {
                cut += 1;
            }
            self.pending.drain(..cut);
        }
    }
}
