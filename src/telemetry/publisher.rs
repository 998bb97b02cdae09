use crate::playback::PlaybackSnapshot;
use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Periodic position/progress snapshot
pub const TOPIC_UPDATE: &str = "run:update";
/// A new pass over the route started
pub const TOPIC_LOOP: &str = "run:loop";
/// All configured loops finished
pub const TOPIC_COMPLETED: &str = "run:completed";
/// Non-fatal run problem (sink failure) or a fault that ended the run
pub const TOPIC_ERROR: &str = "run:error";
/// Run cancelled by `stop`
pub const TOPIC_STOPPED: &str = "run:stopped";

/// Notification emitted by a running engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RunEvent {
    Update(PlaybackSnapshot),
    #[serde(rename_all = "camelCase")]
    LoopStarted { current_loop: u32 },
    Completed(PlaybackSnapshot),
    Stopped(PlaybackSnapshot),
    #[serde(rename_all = "camelCase")]
    Error { message: String, fatal: bool },
}

impl RunEvent {
    /// Topic this event is published under
    pub fn topic(&self) -> &'static str {
        match self {
            RunEvent::Update(_) => TOPIC_UPDATE,
            RunEvent::LoopStarted { .. } => TOPIC_LOOP,
            RunEvent::Completed(_) => TOPIC_COMPLETED,
            RunEvent::Stopped(_) => TOPIC_STOPPED,
            RunEvent::Error { .. } => TOPIC_ERROR,
        }
    }
}

/// Fire-and-forget outlet for run events
///
/// Called from the engine's tick task, so implementations must not block.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: RunEvent);

    /// Publish under the event's own topic
    fn emit(&self, event: RunEvent) {
        self.publish(event.topic(), event);
    }
}

/// Fans events out to any number of async subscribers
///
/// Slow subscribers lose the oldest events (see `broadcast` lag semantics).
pub struct BroadcastPublisher {
    sender: broadcast::Sender<(String, RunEvent)>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(String, RunEvent)> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, topic: &str, payload: RunEvent) {
        // no subscribers is fine
        let _ = self.sender.send((topic.to_string(), payload));
    }
}

/// Records every event; handy for tests and post-run inspection
#[derive(Default)]
pub struct MemoryPublisher {
    events: Mutex<Vec<(String, RunEvent)>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events so far
    pub fn events(&self) -> Vec<(String, RunEvent)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events published under `topic`
    pub fn on_topic(&self, topic: &str) -> Vec<RunEvent> {
        self.events()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, e)| e)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventPublisher for MemoryPublisher {
    fn publish(&self, topic: &str, payload: RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((topic.to_string(), payload));
        }
    }
}

/// Writes events to the log instead of delivering them anywhere
#[derive(Default)]
pub struct TracingPublisher;

impl EventPublisher for TracingPublisher {
    fn publish(&self, topic: &str, payload: RunEvent) {
        match payload {
            RunEvent::Update(s) => debug!(
                topic,
                loop_ = s.current_loop,
                point = s.point_index,
                distance_m = %format!("{:.1}", s.total_distance_meters),
                speed_kmh = %format!("{:.2}", s.current_speed_kmh),
                "Run update"
            ),
            RunEvent::LoopStarted { current_loop } => info!(topic, current_loop, "Loop started"),
            RunEvent::Completed(s) | RunEvent::Stopped(s) => info!(
                topic,
                distance_m = %format!("{:.0}", s.total_distance_meters),
                elapsed_ms = s.elapsed_time_ms,
                "Run ended"
            ),
            RunEvent::Error { message, fatal } => warn!(topic, fatal, "{}", message),
        }
    }
}
