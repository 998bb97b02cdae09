use async_trait::async_trait;
use crate::core::Coordinate;
use crate::telemetry::sink::{PositionSink, SinkResult};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A call received by [`MockPositionSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Set { device_id: String, position: Coordinate },
    Reset { device_id: String },
}

/// In-memory position sink for testing without a device
///
/// Records every call, and can be told to fail or to take a while to answer.
pub struct MockPositionSink {
    name: String,
    calls: Mutex<Vec<SinkCall>>,
    failing: AtomicBool,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockPositionSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent call return an error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every subsequent call
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.lock().await = latency;
    }

    /// All calls so far, in order
    pub async fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().await.clone()
    }

    /// Positions set for `device_id`, in order
    pub async fn positions_for(&self, device_id: &str) -> Vec<Coordinate> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                SinkCall::Set { device_id: d, position } if d == device_id => Some(*position),
                _ => None,
            })
            .collect()
    }

    pub async fn reset_count(&self, device_id: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| matches!(call, SinkCall::Reset { device_id: d } if d == device_id))
            .count()
    }

    /// Highest number of calls that were ever running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn handle(&self, call: SinkCall) -> SinkResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = *self.latency.lock().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let result = if self.failing.load(Ordering::SeqCst) {
            Err("Device not responding".into())
        } else {
            self.calls.lock().await.push(call);
            Ok(())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl PositionSink for MockPositionSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set_position(&self, device_id: &str, position: Coordinate) -> SinkResult<()> {
        self.handle(SinkCall::Set {
            device_id: device_id.to_string(),
            position,
        })
        .await
    }

    async fn reset_position(&self, device_id: &str) -> SinkResult<()> {
        self.handle(SinkCall::Reset {
            device_id: device_id.to_string(),
        })
        .await
    }
}

/// Sink that only logs what it would send; used for dry runs
#[derive(Default)]
pub struct LoggingSink {
    sent: AtomicU64,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PositionSink for LoggingSink {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn set_position(&self, device_id: &str, position: Coordinate) -> SinkResult<()> {
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            device = device_id,
            lat = format!("{:.6}", position.latitude),
            lon = format!("{:.6}", position.longitude),
            n,
            "Set simulated location"
        );
        Ok(())
    }

    async fn reset_position(&self, device_id: &str) -> SinkResult<()> {
        info!(device = device_id, "Reset simulated location");
        Ok(())
    }
}
