//! Shared `lldb-dap` server lifecycle.
//!
//! At most one adapter runs in server mode per [`ServerManager`]. It is
//! started lazily by the first launch that needs it and reused by every
//! later launch with the same command line.
//!
//! ```text
//! Idle --start--> Starting --announce--> Running
//!  ^                 |                      |
//!  +----exit/error---+----------------------+
//!  +----restart/dispose (from any state)----+
//! ```
//!
//! While `Starting`, the pending endpoint is a shared future stored in the
//! state itself, so concurrent callers join one spawn instead of racing to
//! create their own.

pub mod endpoint;
pub mod probe;
pub mod prompt;

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::configuration::SpawnOptions;
use crate::error::ServerStartError;

pub use endpoint::{AnnouncementScanner, CONNECTION_ARGS, ServerEndpoint, parse_connection};
pub use probe::{SERVER_MODE_MARKER, supports_server_mode};
pub use prompt::{FixedDecision, RestartDecision, RestartPrompt, RestartRequest};

/// How long a terminated server gets to exit before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

type PendingEndpoint = Shared<BoxFuture<'static, Result<ServerEndpoint, ServerStartError>>>;

/// Bookkeeping for the one spawned server process.
struct ServerProcess {
    /// Distinguishes this spawn from earlier ones so a stale supervisor
    /// cannot clear state that belongs to a newer process.
    generation: u64,
    /// `[path, ...args]` exactly as spawned.
    spawn_args: Vec<String>,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    shutdown: CancellationToken,
    supervisor: JoinHandle<()>,
}

impl ServerProcess {
    fn restart_request(&self, requested: &[String]) -> RestartRequest {
        RestartRequest {
            pid: self.pid,
            running: self.spawn_args.clone(),
            requested: requested.to_vec(),
        }
    }
}

enum ServerState {
    Idle,
    Starting {
        process: ServerProcess,
        pending: PendingEndpoint,
    },
    Running {
        process: ServerProcess,
        endpoint: ServerEndpoint,
    },
}

impl ServerState {
    fn process(&self) -> Option<&ServerProcess> {
        match self {
            ServerState::Idle => None,
            ServerState::Starting { process, .. } | ServerState::Running { process, .. } => {
                Some(process)
            }
        }
    }

    fn generation(&self) -> Option<u64> {
        self.process().map(|p| p.generation)
    }

    /// Move to `Idle`, returning the process that was live, if any.
    fn clear(&mut self) -> Option<ServerProcess> {
        match std::mem::replace(self, ServerState::Idle) {
            ServerState::Idle => None,
            ServerState::Starting { process, .. } | ServerState::Running { process, .. } => {
                Some(process)
            }
        }
    }
}

struct Slot {
    state: ServerState,
    next_generation: u64,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Snapshot of the manager state for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    Idle,
    Starting {
        pid: Option<u32>,
        args: Vec<String>,
    },
    Running {
        pid: Option<u32>,
        args: Vec<String>,
        endpoint: ServerEndpoint,
        started_at: DateTime<Utc>,
    },
}

enum Step {
    Ready(ServerEndpoint),
    Join(PendingEndpoint),
    Ask { request: RestartRequest, generation: u64 },
}

/// Owner of the shared adapter server.
pub struct ServerManager {
    slot: Arc<Mutex<Slot>>,
    prompt: Arc<dyn RestartPrompt>,
}

impl std::fmt::Debug for ServerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerManager")
            .field("status", &self.status())
            .finish()
    }
}

impl ServerManager {
    /// Create an idle manager that consults `prompt` when a running server's
    /// arguments differ from a new request.
    pub fn new(prompt: Arc<dyn RestartPrompt>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                state: ServerState::Idle,
                next_generation: 0,
            })),
            prompt,
        }
    }

    pub fn status(&self) -> ServerStatus {
        let slot = lock(&self.slot);
        match &slot.state {
            ServerState::Idle => ServerStatus::Idle,
            ServerState::Starting { process, .. } => ServerStatus::Starting {
                pid: process.pid,
                args: process.spawn_args.clone(),
            },
            ServerState::Running { process, endpoint } => ServerStatus::Running {
                pid: process.pid,
                args: process.spawn_args.clone(),
                endpoint: endpoint.clone(),
                started_at: process.started_at,
            },
        }
    }

    /// Start the server, or reuse the one already running.
    ///
    /// [`CONNECTION_ARGS`] are appended to `args`. A live server spawned with
    /// the same `[path, ...args]` is reused as-is. A live server with
    /// different arguments triggers the restart prompt.
    ///
    /// Returns `Ok(None)` when the prompt was cancelled or dismissed.
    pub async fn start(
        &self,
        path: &Path,
        args: &[String],
        options: &SpawnOptions,
    ) -> Result<Option<ServerEndpoint>, ServerStartError> {
        let mut dap_args = args.to_vec();
        dap_args.extend(CONNECTION_ARGS.iter().map(|a| a.to_string()));

        let mut requested = Vec::with_capacity(dap_args.len() + 1);
        requested.push(path.to_string_lossy().into_owned());
        requested.extend(dap_args.iter().cloned());

        // Generation the user chose to keep despite mismatched arguments.
        let mut accepted: Option<u64> = None;

        loop {
            let step = {
                let mut slot = lock(&self.slot);
                let live = match &slot.state {
                    ServerState::Idle => None,
                    ServerState::Starting { process, pending } => {
                        Some((process, Step::Join(pending.clone())))
                    }
                    ServerState::Running { process, endpoint } => {
                        Some((process, Step::Ready(endpoint.clone())))
                    }
                };

                match live {
                    Some((process, reuse))
                        if process.spawn_args == requested
                            || accepted == Some(process.generation) =>
                    {
                        reuse
                    }
                    Some((process, _)) => Step::Ask {
                        request: process.restart_request(&requested),
                        generation: process.generation,
                    },
                    None => Step::Join(spawn_server(
                        &self.slot,
                        &mut slot,
                        path,
                        &dap_args,
                        requested.clone(),
                        options,
                    )?),
                }
            };

            match step {
                Step::Ready(endpoint) => return Ok(Some(endpoint)),
                Step::Join(pending) => return pending.await.map(Some),
                Step::Ask {
                    request,
                    generation,
                } => {
                    let decision = self
                        .prompt
                        .ask(&request)
                        .await
                        .unwrap_or(RestartDecision::Cancel);
                    info!(?decision, pid = ?request.pid, "restart prompt answered");

                    match decision {
                        RestartDecision::Cancel => return Ok(None),
                        RestartDecision::UseExisting => accepted = Some(generation),
                        RestartDecision::Restart => self.stop_generation(generation).await,
                    }
                }
            }
        }
    }

    /// Stop the server, if any, and forget all cached state.
    ///
    /// Callers waiting on an in-flight start observe
    /// [`ServerStartError::Stopped`].
    pub fn dispose(&self) {
        let process = lock(&self.slot).state.clear();
        if let Some(process) = process {
            info!(pid = ?process.pid, "stopping debug adapter server");
            process.shutdown.cancel();
        }
    }

    /// Like [`dispose`](Self::dispose), but waits until the process has
    /// exited.
    pub async fn shutdown(&self) {
        let process = lock(&self.slot).state.clear();
        if let Some(process) = process {
            info!(pid = ?process.pid, "shutting down debug adapter server");
            process.shutdown.cancel();
            if let Err(e) = process.supervisor.await {
                warn!(error = %e, "server supervisor task failed");
            }
        }
    }

    /// Stop the process of `generation`, if it is still the live one, and
    /// wait for it to exit.
    async fn stop_generation(&self, generation: u64) {
        let process = {
            let mut slot = lock(&self.slot);
            if slot.state.generation() == Some(generation) {
                slot.state.clear()
            } else {
                None
            }
        };
        if let Some(process) = process {
            info!(pid = ?process.pid, "restarting debug adapter server");
            process.shutdown.cancel();
            if let Err(e) = process.supervisor.await {
                warn!(error = %e, "server supervisor task failed");
            }
        }
    }
}

impl Drop for ServerManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Spawn the server and move the slot to `Starting`. Runs under the slot lock.
fn spawn_server(
    slot_handle: &Arc<Mutex<Slot>>,
    slot: &mut Slot,
    path: &Path,
    dap_args: &[String],
    spawn_args: Vec<String>,
    options: &SpawnOptions,
) -> Result<PendingEndpoint, ServerStartError> {
    let mut command = Command::new(path);
    command
        .args(dap_args)
        .envs(&options.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &options.cwd {
        command.current_dir(cwd);
    }

    let child = command.spawn().map_err(|e| ServerStartError::Spawn {
        command: spawn_args.join(" "),
        message: e.to_string(),
    })?;
    let pid = child.id();

    let generation = slot.next_generation;
    slot.next_generation += 1;

    let (announce_tx, announce_rx) = oneshot::channel();
    let pending: PendingEndpoint = announce_rx
        .map(|received| received.unwrap_or(Err(ServerStartError::Stopped)))
        .boxed()
        .shared();

    let shutdown = CancellationToken::new();
    info!(pid = ?pid, args = %spawn_args.join(" "), "spawned debug adapter server");

    let supervisor = tokio::spawn(supervise(
        Arc::clone(slot_handle),
        generation,
        child,
        announce_tx,
        shutdown.clone(),
    ));

    slot.state = ServerState::Starting {
        process: ServerProcess {
            generation,
            spawn_args,
            pid,
            started_at: Utc::now(),
            shutdown,
            supervisor,
        },
        pending: pending.clone(),
    };

    Ok(pending)
}

/// Watch one server process until it exits or is told to stop.
///
/// Stdout is scanned in arrival order for the connection announcement; once
/// it is seen the rest of the output is drained without parsing.
async fn supervise(
    slot: Arc<Mutex<Slot>>,
    generation: u64,
    mut child: Child,
    announce: oneshot::Sender<Result<ServerEndpoint, ServerStartError>>,
    shutdown: CancellationToken,
) {
    let pid = child.id();

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(log_stderr(stderr, pid));
    }
    let mut chunks: BoxStream<'static, String> = match child.stdout.take() {
        Some(stdout) => output_chunks(stdout).boxed(),
        None => stream::pending().boxed(),
    };
    let mut announcer = Announcer {
        slot: &slot,
        generation,
        pid,
        scanner: AnnouncementScanner::new(),
        announce: Some(announce),
    };
    let mut stdout_open = true;

    let failure = loop {
        // Output already written is consumed before the exit status.
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                terminate(&mut child).await;
                break ServerStartError::Stopped;
            }
            chunk = chunks.next() => match chunk {
                Some(text) => announcer.feed(&text),
                None => {
                    announcer.finish();
                    // Stdout closed; keep waiting for the exit status.
                    stdout_open = false;
                    chunks = stream::pending().boxed();
                }
            },
            status = child.wait() => {
                if stdout_open && announcer.is_pending() {
                    drain_after_exit(&mut chunks, &mut announcer).await;
                }
                break match status {
                    Ok(status) => ServerStartError::ExitedEarly {
                        code: status.code(),
                        signal: exit_signal(&status),
                    },
                    Err(e) => ServerStartError::Process(e.to_string()),
                };
            }
        }
    };

    clear_generation(&slot, generation);

    match announcer.announce.take() {
        Some(tx) => {
            warn!(pid = ?pid, error = %failure, "debug adapter server failed before announcing a connection");
            let _ = tx.send(Err(failure));
        }
        None => info!(pid = ?pid, reason = %failure, "debug adapter server stopped"),
    }
}

/// How long output left in the pipe is read after the server exits.
const EXIT_DRAIN: Duration = Duration::from_secs(1);

/// Scan output the server wrote before exiting but that was not read yet.
async fn drain_after_exit(chunks: &mut BoxStream<'static, String>, announcer: &mut Announcer<'_>) {
    let drained = tokio::time::timeout(EXIT_DRAIN, async {
        while let Some(text) = chunks.next().await {
            announcer.feed(&text);
            if !announcer.is_pending() {
                return;
            }
        }
        announcer.finish();
    })
    .await;
    if drained.is_err() {
        debug!(pid = ?announcer.pid, "server output still open after exit");
    }
}

/// Delivers the first announced endpoint to the callers awaiting a start.
struct Announcer<'a> {
    slot: &'a Mutex<Slot>,
    generation: u64,
    pid: Option<u32>,
    scanner: AnnouncementScanner,
    announce: Option<oneshot::Sender<Result<ServerEndpoint, ServerStartError>>>,
}

impl Announcer<'_> {
    fn is_pending(&self) -> bool {
        self.announce.is_some()
    }

    fn feed(&mut self, text: &str) {
        if !self.is_pending() {
            trace!(pid = ?self.pid, output = %text.trim_end(), "server output");
            return;
        }
        if let Some(endpoint) = self.scanner.feed(text) {
            self.send(endpoint);
        }
    }

    fn finish(&mut self) {
        if !self.is_pending() {
            return;
        }
        if let Some(endpoint) = self.scanner.finish() {
            self.send(endpoint);
        }
    }

    fn send(&mut self, endpoint: ServerEndpoint) {
        info!(pid = ?self.pid, %endpoint, "debug adapter server is accepting connections");
        mark_running(self.slot, self.generation, &endpoint);
        if let Some(tx) = self.announce.take() {
            let _ = tx.send(Ok(endpoint));
        }
    }
}

fn mark_running(slot: &Mutex<Slot>, generation: u64, endpoint: &ServerEndpoint) {
    let mut slot = lock(slot);
    slot.state = match std::mem::replace(&mut slot.state, ServerState::Idle) {
        ServerState::Starting { process, .. } if process.generation == generation => {
            ServerState::Running {
                process,
                endpoint: endpoint.clone(),
            }
        }
        other => other,
    };
}

fn clear_generation(slot: &Mutex<Slot>, generation: u64) {
    let mut slot = lock(slot);
    if slot.state.generation() == Some(generation) {
        slot.state.clear();
    }
}

fn output_chunks(mut stdout: ChildStdout) -> impl Stream<Item = String> + Send + 'static {
    async_stream::stream! {
        let mut buf = vec![0u8; 4096];
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => yield String::from_utf8_lossy(&buf[..n]).into_owned(),
                Err(e) => {
                    warn!(error = %e, "error reading debug adapter server stdout");
                    break;
                }
            }
        }
    }
}

async fn log_stderr(stderr: ChildStderr, pid: Option<u32>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(pid = ?pid, line = %line, "server stderr");
    }
}

/// SIGTERM, then SIGKILL if the process outlives the grace period.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: pid belongs to a child we spawned and have not reaped.
            let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            if ret != 0 {
                warn!(pid, "SIGTERM failed, proceeding to SIGKILL");
            }
        }

        match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
            Ok(Ok(_)) => {
                debug!("server exited after SIGTERM");
                return;
            }
            _ => debug!("server did not exit after SIGTERM, sending SIGKILL"),
        }
    }

    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill debug adapter server");
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
