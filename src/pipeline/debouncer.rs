use crate::db::models::ViolationEvent;
use log::{debug, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Default)]
struct DebounceState {
    armed: bool,
    /// Bumped whenever the pending timer is cancelled or fires; a timer only
    /// emits while its own generation is still current.
    generation: u64,
}

/// Turns a per-frame presence signal into confirmed violations: presence has
/// to hold for the whole window before one event is emitted.
pub struct DetectionDebouncer {
    session_id: Uuid,
    window: Duration,
    state: Arc<Mutex<DebounceState>>,
    pending: Option<JoinHandle<()>>,
    events: mpsc::Sender<ViolationEvent>,
}

impl DetectionDebouncer {
    pub fn new(session_id: Uuid, window: Duration, events: mpsc::Sender<ViolationEvent>) -> Self {
        Self {
            session_id,
            window,
            state: Arc::new(Mutex::new(DebounceState::default())),
            pending: None,
            events,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().map(|s| s.armed).unwrap_or(false)
    }

    /// Feed one frame's presence value, in frame order
    pub fn observe(&mut self, present: bool) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        match (present, state.armed) {
            (true, false) => {
                state.armed = true;
                state.generation += 1;
                let generation = state.generation;
                drop(state);
                self.arm(generation);
            }
            (false, true) => {
                state.armed = false;
                state.generation += 1;
                drop(state);
                if let Some(pending) = self.pending.take() {
                    pending.abort();
                }
                debug!("Session {}: presence lost, confirmation cancelled", self.session_id);
            }
            _ => {}
        }
    }

    fn arm(&mut self, generation: u64) {
        debug!(
            "Session {}: target present, confirming in {:?}",
            self.session_id, self.window
        );

        // The window runs from the observation, not from when the task is first polled.
        let deadline = Instant::now() + self.window;
        let state = self.state.clone();
        let events = self.events.clone();
        let session_id = self.session_id;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            {
                let mut state = match state.lock() {
                    Ok(state) => state,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if !state.armed || state.generation != generation {
                    return;
                }
                state.armed = false;
                state.generation += 1;
            }

            if events.send(ViolationEvent::new(session_id)).await.is_err() {
                warn!("Session {}: violation confirmed but nobody is listening", session_id);
            }
        }));
    }
}

impl Drop for DetectionDebouncer {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}
