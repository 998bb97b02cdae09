//! Registry of per-device location sessions
//!
//! Every device that has received a simulated position has one
//! [`DeviceSession`]. The session's gate serializes position calls for that
//! device, so two engines (or an engine and a one-off teleport) never drive
//! overlapping location-simulation sessions on the same phone.

use async_trait::async_trait;
use crate::core::Coordinate;
use crate::telemetry::sink::{PositionSink, SinkResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Per-device session state
pub struct DeviceSession {
    device_id: String,
    /// Held for the duration of each sink call
    gate: Mutex<()>,
    positions_set: AtomicU64,
    resets: AtomicU64,
    failures: AtomicU64,
    last_position: Mutex<Option<(Coordinate, DateTime<Utc>)>>,
}

impl DeviceSession {
    fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            gate: Mutex::new(()),
            positions_set: AtomicU64::new(0),
            resets: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_position: Mutex::new(None),
        }
    }

    /// Last position successfully pushed, with the time it was pushed
    pub async fn last_position(&self) -> Option<(Coordinate, DateTime<Utc>)> {
        *self.last_position.lock().await
    }

    pub async fn info(&self) -> SessionInfo {
        let last = self.last_position().await;
        SessionInfo {
            device_id: self.device_id.clone(),
            positions_set: self.positions_set.load(Ordering::SeqCst),
            resets: self.resets.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
            last_position: last.map(|(c, _)| c),
            last_update: last.map(|(_, t)| t),
        }
    }
}

/// Statistics for one device session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub device_id: String,
    pub positions_set: u64,
    pub resets: u64,
    pub failures: u64,
    pub last_position: Option<Coordinate>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Device id -> session map, owned by the application context
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<DeviceSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session for `device_id`, creating it on first use
    pub async fn insert(&self, device_id: &str) -> Arc<DeviceSession> {
        if let Some(session) = self.sessions.read().await.get(device_id) {
            return session.clone();
        }
        self.sessions
            .write()
            .await
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(DeviceSession::new(device_id)))
            .clone()
    }

    pub async fn get(&self, device_id: &str) -> Option<Arc<DeviceSession>> {
        self.sessions.read().await.get(device_id).cloned()
    }

    /// Forget a device; in-flight calls holding the old session finish normally
    pub async fn remove(&self, device_id: &str) -> Option<Arc<DeviceSession>> {
        self.sessions.write().await.remove(device_id)
    }

    /// Statistics for every known device, sorted by id
    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Arc<DeviceSession>> = self.sessions.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(sessions.len());
        for session in sessions {
            infos.push(session.info().await);
        }
        infos.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        infos
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Sink wrapper that routes every call through the device's session gate
pub struct SerializedSink<S> {
    inner: S,
    registry: Arc<SessionRegistry>,
}

impl<S: PositionSink> SerializedSink<S> {
    pub fn new(inner: S, registry: Arc<SessionRegistry>) -> Self {
        Self { inner, registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: PositionSink> PositionSink for SerializedSink<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn set_position(&self, device_id: &str, position: Coordinate) -> SinkResult<()> {
        let session = self.registry.insert(device_id).await;
        let _gate = session.gate.lock().await;

        let result = self.inner.set_position(device_id, position).await;
        match &result {
            Ok(()) => {
                session.positions_set.fetch_add(1, Ordering::SeqCst);
                *session.last_position.lock().await = Some((position, Utc::now()));
            }
            Err(_) => {
                session.failures.fetch_add(1, Ordering::SeqCst);
            }
        }
        result
    }

    async fn reset_position(&self, device_id: &str) -> SinkResult<()> {
        let session = self.registry.insert(device_id).await;
        let _gate = session.gate.lock().await;

        let result = self.inner.reset_position(device_id).await;
        match &result {
            Ok(()) => {
                session.resets.fetch_add(1, Ordering::SeqCst);
                *session.last_position.lock().await = None;
            }
            Err(_) => {
                session.failures.fetch_add(1, Ordering::SeqCst);
            }
        }
        result
    }
}
