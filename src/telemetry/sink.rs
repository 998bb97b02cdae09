use async_trait::async_trait;
use crate::core::Coordinate;
use std::error::Error;
use std::sync::Arc;

/// Result type for position sink operations
pub type SinkResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Trait for whatever actually moves a device's reported location
///
/// Implementations wrap a device-communication library (location simulation
/// service, developer tunnel, ...). One sink may serve many devices and many
/// engines at once, so methods take `&self`.
#[async_trait]
pub trait PositionSink: Send + Sync {
    /// Get the name of this sink
    fn name(&self) -> &str;

    /// Make `device_id` report `position` as its location
    async fn set_position(&self, device_id: &str, position: Coordinate) -> SinkResult<()>;

    /// Stop simulating and let `device_id` report its real location again
    async fn reset_position(&self, device_id: &str) -> SinkResult<()>;
}

#[async_trait]
impl<T: PositionSink + ?Sized> PositionSink for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn set_position(&self, device_id: &str, position: Coordinate) -> SinkResult<()> {
        (**self).set_position(device_id, position).await
    }

    async fn reset_position(&self, device_id: &str) -> SinkResult<()> {
        (**self).reset_position(device_id).await
    }
}
