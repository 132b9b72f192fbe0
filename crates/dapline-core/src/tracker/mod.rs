//! Per-session module tables built from observed protocol traffic.
//!
//! Each session's table keeps modules in the order they were first reported.
//! Every applied `module` event fires [`ModulesChanged`] for its session; a
//! session ending fires it with no session. Notifications carry no diff:
//! listeners re-query the tracker.

pub mod module;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use uuid::Uuid;

pub use module::{ModuleEvent, ModuleId, ModuleProperty, ModuleReason, ModuleRecord};

const CHANGE_BUFFER: usize = 256;

/// Identifies one debug session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A module table changed. `session` is `None` when a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModulesChanged {
    pub session: Option<SessionId>,
}

#[derive(Default)]
struct TrackerState {
    tables: HashMap<SessionId, Vec<ModuleRecord>>,
    active: Option<SessionId>,
}

pub struct SessionTracker {
    state: Mutex<TrackerState>,
    changes: broadcast::Sender<ModulesChanged>,
}

impl fmt::Debug for SessionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("SessionTracker")
            .field("sessions", &state.tables.len())
            .field("active", &state.active)
            .finish()
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTracker {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            state: Mutex::new(TrackerState::default()),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, session: Option<SessionId>) {
        // No receivers is fine.
        let _ = self.changes.send(ModulesChanged { session });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModulesChanged> {
        self.changes.subscribe()
    }

    /// Change notifications as a stream. Notifications lost to a slow
    /// consumer are skipped.
    pub fn changes(&self) -> impl Stream<Item = ModulesChanged> + Send + 'static {
        BroadcastStream::new(self.changes.subscribe()).filter_map(|change| match change {
            Ok(change) => Some(change),
            Err(e) => {
                debug!(error = %e, "module change listener fell behind");
                None
            }
        })
    }

    /// Feed one protocol message sent by `session`'s adapter.
    ///
    /// Anything other than a `module` event is ignored.
    pub fn on_did_send_message(&self, session: SessionId, message: &Value) {
        match ModuleEvent::from_message(message) {
            None => {}
            Some(Ok(event)) => self.apply_module_event(session, event),
            Some(Err(e)) => warn!(%session, error = %e, "ignoring malformed module event"),
        }
    }

    /// Apply a decoded `module` event and notify listeners.
    ///
    /// A reason other than `new`, `changed` or `removed` is logged and leaves
    /// the table as it was, though the session still gets a table.
    pub fn apply_module_event(&self, session: SessionId, event: ModuleEvent) {
        {
            let mut state = self.lock();
            let modules = state.tables.entry(session).or_default();
            let position = modules.iter().position(|m| m.id == event.module.id);

            match event.reason() {
                ModuleReason::New | ModuleReason::Changed => match position {
                    Some(index) => modules[index] = event.module,
                    None => modules.push(event.module),
                },
                ModuleReason::Removed => {
                    if let Some(index) = position {
                        modules.remove(index);
                    }
                }
                ModuleReason::Other(reason) => {
                    warn!(%session, reason = %reason, "unexpected module event reason");
                }
            }
        }
        self.notify(Some(session));
    }

    /// Forget `session`'s table. Listeners are told no session is current.
    pub fn on_exit(&self, session: SessionId) {
        let removed = self.lock().tables.remove(&session);
        debug!(
            %session,
            modules = removed.map_or(0, |m| m.len()),
            "debug session ended"
        );
        self.notify(None);
    }

    /// Modules for `session` in load order. Empty for unknown sessions.
    pub fn modules_for(&self, session: SessionId) -> Vec<ModuleRecord> {
        self.lock()
            .tables
            .get(&session)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_modules(&self, session: SessionId) -> bool {
        self.lock().tables.contains_key(&session)
    }

    pub fn sessions(&self) -> Vec<SessionId> {
        self.lock().tables.keys().copied().collect()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.lock().active
    }

    /// Record which session the front-end is showing and notify listeners.
    pub fn set_active_session(&self, session: Option<SessionId>) {
        self.lock().active = session;
        self.notify(session);
    }

    /// Whether module data is available for display: the active session
    /// exists and has a table.
    pub fn show_modules(&self) -> bool {
        let state = self.lock();
        state
            .active
            .is_some_and(|active| state.tables.contains_key(&active))
    }

    /// Hooks for one session's message stream.
    pub fn observer(self: &Arc<Self>, session: SessionId) -> SessionObserver {
        SessionObserver {
            tracker: Arc::clone(self),
            session,
        }
    }
}

/// A [`SessionTracker`] bound to one session.
#[derive(Debug, Clone)]
pub struct SessionObserver {
    tracker: Arc<SessionTracker>,
    session: SessionId,
}

impl SessionObserver {
    pub fn on_did_send_message(&self, message: &Value) {
        self.tracker.on_did_send_message(self.session, message);
    }

    pub fn on_exit(&self) {
        self.tracker.on_exit(self.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn module_event(reason: &str, id: i64) -> Value {
        json!({
            "type": "event",
            "event": "module",
            "body": {"reason": reason, "module": {"id": id, "name": format!("mod{id}")}},
        })
    }

    fn ids(tracker: &SessionTracker, session: SessionId) -> Vec<ModuleId> {
        tracker
            .modules_for(session)
            .into_iter()
            .map(|m| m.id)
            .collect()
    }

    #[test]
    fn new_changed_removed_sequence() {
        let tracker = SessionTracker::new();
        let session = SessionId::new();
        tracker.on_did_send_message(session, &module_event("new", 1));
        tracker.on_did_send_message(session, &module_event("changed", 1));
        tracker.on_did_send_message(session, &module_event("new", 2));
        tracker.on_did_send_message(session, &module_event("removed", 1));
        assert_eq!(ids(&tracker, session), vec![ModuleId::Number(2)]);

        tracker.on_did_send_message(session, &module_event("new", 3));
        assert_eq!(
            ids(&tracker, session),
            vec![ModuleId::Number(2), ModuleId::Number(3)]
        );
    }

    #[test]
    fn update_replaces_in_place() {
        let tracker = SessionTracker::new();
        let session = SessionId::new();
        tracker.on_did_send_message(session, &module_event("new", 1));
        tracker.on_did_send_message(session, &module_event("new", 2));

        let mut changed = module_event("changed", 1);
        changed["body"]["module"]["symbolStatus"] = json!("Symbols loaded.");
        tracker.on_did_send_message(session, &changed);

        let modules = tracker.modules_for(session);
        assert_eq!(modules[0].id, ModuleId::Number(1));
        assert_eq!(modules[0].symbol_status.as_deref(), Some("Symbols loaded."));
        assert_eq!(modules[1].id, ModuleId::Number(2));
    }

    #[test]
    fn changed_for_unseen_module_appends() {
        let tracker = SessionTracker::new();
        let session = SessionId::new();
        tracker.on_did_send_message(session, &module_event("changed", 9));
        assert_eq!(ids(&tracker, session), vec![ModuleId::Number(9)]);
    }

    #[test]
    fn removing_unknown_module_is_a_noop() {
        let tracker = SessionTracker::new();
        let session = SessionId::new();
        tracker.on_did_send_message(session, &module_event("new", 1));
        tracker.on_did_send_message(session, &module_event("removed", 42));
        assert_eq!(ids(&tracker, session), vec![ModuleId::Number(1)]);
    }

    #[test]
    fn unknown_reason_leaves_table_untouched_but_notifies() {
        let tracker = SessionTracker::new();
        let session = SessionId::new();
        let mut rx = tracker.subscribe();
        tracker.on_did_send_message(session, &module_event("reloaded", 1));

        assert!(tracker.has_modules(session));
        assert!(tracker.modules_for(session).is_empty());
        assert_eq!(rx.try_recv().unwrap().session, Some(session));
    }

    #[test]
    fn sessions_are_independent() {
        let tracker = SessionTracker::new();
        let a = SessionId::new();
        let b = SessionId::new();
        tracker.on_did_send_message(a, &module_event("new", 1));
        tracker.on_did_send_message(b, &module_event("new", 2));

        let mut sessions = tracker.sessions();
        sessions.sort_by_key(|s| *s.as_uuid());
        let mut expected = vec![a, b];
        expected.sort_by_key(|s| *s.as_uuid());
        assert_eq!(sessions, expected);

        tracker.on_exit(a);
        assert!(tracker.modules_for(a).is_empty());
        assert_eq!(ids(&tracker, b), vec![ModuleId::Number(2)]);
        assert_eq!(tracker.sessions(), vec![b]);
    }

    #[test]
    fn exit_notifies_without_session() {
        let tracker = Arc::new(SessionTracker::new());
        let session = SessionId::new();
        let observer = tracker.observer(session);
        observer.on_did_send_message(&module_event("new", 1));

        let mut rx = tracker.subscribe();
        observer.on_exit();
        assert_eq!(rx.try_recv().unwrap(), ModulesChanged { session: None });
        assert!(!tracker.has_modules(session));
    }

    #[test]
    fn non_module_messages_do_not_notify() {
        let tracker = SessionTracker::new();
        let mut rx = tracker.subscribe();
        tracker.on_did_send_message(
            SessionId::new(),
            &json!({"type": "event", "event": "output", "body": {"output": "hi"}}),
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn show_modules_follows_active_session() {
        let tracker = SessionTracker::new();
        let session = SessionId::new();
        assert!(!tracker.show_modules());

        let mut rx = tracker.subscribe();
        tracker.set_active_session(Some(session));
        assert_eq!(tracker.active_session(), Some(session));
        assert_eq!(rx.try_recv().unwrap().session, Some(session));
        assert!(!tracker.show_modules());

        tracker.on_did_send_message(session, &module_event("new", 1));
        assert!(tracker.show_modules());

        tracker.on_exit(session);
        assert!(!tracker.show_modules());
    }

    #[tokio::test]
    async fn change_stream_yields_notifications() {
        let tracker = SessionTracker::new();
        let session = SessionId::new();
        let mut changes = Box::pin(tracker.changes());

        tracker.on_did_send_message(session, &module_event("new", 1));
        tracker.on_exit(session);

        assert_eq!(changes.next().await.unwrap().session, Some(session));
        assert_eq!(changes.next().await.unwrap().session, None);
    }
}
