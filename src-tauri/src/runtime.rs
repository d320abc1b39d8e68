use crate::commands::SessionDto;
use crate::state::AppState;
use autospot_core::{AuthEvent, AuthSnapshot, Subscription};
use tracing::debug;

pub const SESSION_CHANGED: &str = "session-changed";

pub trait EventSink: Send + Sync + 'static {
    fn emit_json(&self, event: &str, payload: serde_json::Value);
}

/// Loads the persisted session and starts forwarding session changes. The
/// bridge stays attached while the returned subscription is alive.
pub fn start(state: &AppState) -> Subscription {
    start_with_sink(state, NoopSink)
}

pub fn start_with_sink(state: &AppState, sink: impl EventSink) -> Subscription {
    let subscription = state
        .auth
        .subscribe(move |event: AuthEvent, snapshot: &AuthSnapshot| {
            emit_session(&sink, event, snapshot);
        });
    state.auth.initialize();
    subscription
}

fn emit_session(sink: &impl EventSink, event: AuthEvent, snapshot: &AuthSnapshot) {
    debug!(event = event.as_str(), "forwarding session change");
    let mut payload = serde_json::to_value(SessionDto::from(snapshot)).unwrap_or_default();
    if let Some(fields) = payload.as_object_mut() {
        fields.insert("event".into(), event.as_str().into());
    }
    sink.emit_json(SESSION_CHANGED, payload);
}

struct NoopSink;

impl EventSink for NoopSink {
    fn emit_json(&self, _event: &str, _payload: serde_json::Value) {}
}

#[cfg(feature = "tauri-app")]
pub struct TauriSink {
    app: tauri::AppHandle,
}

#[cfg(feature = "tauri-app")]
impl TauriSink {
    pub fn new(app: tauri::AppHandle) -> Self {
        Self { app }
    }
}

#[cfg(feature = "tauri-app")]
impl EventSink for TauriSink {
    fn emit_json(&self, event: &str, payload: serde_json::Value) {
        use tauri::Manager;
        let _ = self.app.emit_all(event, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autospot_core::session_store::NoopSessionStore;
    use autospot_core::{AuthContext, MemoryBackend};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CaptureSink {
        seen: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
    }

    impl EventSink for CaptureSink {
        fn emit_json(&self, event: &str, payload: serde_json::Value) {
            if let Ok(mut guard) = self.seen.lock() {
                guard.push((event.to_string(), payload));
            }
        }
    }

    #[test]
    fn forwards_session_changes_until_dropped() {
        let auth = AuthContext::new(Arc::new(MemoryBackend::new()), Arc::new(NoopSessionStore));
        let state = AppState::new(auth);

        let sink = CaptureSink::default();
        let subscription = start_with_sink(&state, sink.clone());
        state
            .auth
            .sign_up("a@b.com", "secret123", "Ana Lopez")
            .expect("sign up");

        let seen = sink.seen.lock().expect("lock").clone();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(name, _)| name == SESSION_CHANGED));
        assert_eq!(seen[0].1["event"], "INITIAL_SESSION");
        assert_eq!(seen[0].1["signed_in"], false);
        assert_eq!(seen[1].1["event"], "SIGNED_IN");
        assert_eq!(seen[1].1["email"], "a@b.com");

        drop(subscription);
        state.auth.sign_out().expect("sign out");
        assert_eq!(sink.seen.lock().expect("lock").len(), 2);
    }
}
