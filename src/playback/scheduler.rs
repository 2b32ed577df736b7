// Timeline playback scheduler
//
// Each call to `schedule` starts an independent playback: its events are
// dispatched to the AudioOutput at `start + event.time` and a completion
// callback runs once the last sound had time to ring out. A playback moves
// Idle -> Scheduled -> Completed | Cancelled; both end states are final and
// exactly one of them is reached.

use super::{AudioOutput, NoteEvent};
use crate::timeline::{ScheduledEvent, Timeline};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Extra time after the last event before playback counts as complete
pub const COMPLETION_MARGIN: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Scheduled,
    Completed,
    Cancelled,
}

impl PlaybackState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackState::Completed | PlaybackState::Cancelled)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Scheduled => write!(f, "scheduled"),
            PlaybackState::Completed => write!(f, "completed"),
            PlaybackState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Handle to one scheduled timeline
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    id: Uuid,
    state: Arc<watch::Sender<PlaybackState>>,
    cancel_token: CancellationToken,
}

impl PlaybackHandle {
    fn new() -> Self {
        let (state, _) = watch::channel(PlaybackState::Idle);
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(state),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Move `from -> to`; false if the handle was in any other state
    fn transition(&self, from: PlaybackState, to: PlaybackState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Cancel pending events and the completion callback.
    ///
    /// Returns false when there was nothing to cancel (already completed or
    /// cancelled); calling it again is harmless.
    pub fn cancel(&self) -> bool {
        let cancelled = self.transition(PlaybackState::Scheduled, PlaybackState::Cancelled);
        if cancelled {
            self.cancel_token.cancel();
            log::info!("Playback {} cancelled", self.id);
        }
        cancelled
    }

    /// Wait until the playback completes or is cancelled
    pub async fn wait(&self) -> PlaybackState {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }
}

fn offset(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::ZERO)
}

pub struct PlaybackScheduler {
    output: Arc<dyn AudioOutput>,
    margin: Duration,
    handles: Mutex<Vec<PlaybackHandle>>,
}

impl PlaybackScheduler {
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            margin: COMPLETION_MARGIN,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Schedule every event of `timeline` relative to now.
    ///
    /// `on_complete` runs once after the total duration plus the completion
    /// margin, unless the playback is cancelled first. Must be called from
    /// within a tokio runtime.
    pub fn schedule<F>(&self, timeline: Timeline, on_complete: F) -> PlaybackHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = PlaybackHandle::new();
        handle.transition(PlaybackState::Idle, PlaybackState::Scheduled);

        let start = Instant::now();
        let total = timeline.total_duration_secs();
        let completion_at = start + offset(total) + self.margin;

        let mut events: Vec<ScheduledEvent> = timeline.events;
        events.sort_by(|a, b| a.time.total_cmp(&b.time));

        log::info!(
            "Scheduling {} events over {:.2}s (playback {})",
            events.len(),
            total,
            handle.id
        );

        {
            let mut handles = self.handles.lock();
            handles.retain(|h| !h.is_finished());
            handles.push(handle.clone());
        }

        let output = Arc::clone(&self.output);
        let task_handle = handle.clone();
        tokio::spawn(async move {
            let token = task_handle.cancel_token.clone();

            for event in events {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => return,
                    _ = sleep_until(start + offset(event.time)) => {}
                }
                if task_handle.state() != PlaybackState::Scheduled {
                    return;
                }
                output.play_note(&NoteEvent::from(&event));
            }

            tokio::select! {
                biased;

                _ = token.cancelled() => return,
                _ = sleep_until(completion_at) => {}
            }

            if task_handle.transition(PlaybackState::Scheduled, PlaybackState::Completed) {
                log::info!("Playback {} completed", task_handle.id);
                on_complete();
            }
        });

        handle
    }

    /// Cancel one playback; idempotent
    pub fn cancel(&self, handle: &PlaybackHandle) -> bool {
        handle.cancel()
    }

    /// Cancel every playback that is still running, returning how many were stopped
    pub fn cancel_all(&self) -> usize {
        let handles: Vec<PlaybackHandle> = self.handles.lock().drain(..).collect();
        handles.iter().filter(|h| h.cancel()).count()
    }

    /// Playbacks that are still scheduled
    pub fn active_count(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.is_finished()).count()
    }
}
