pub mod mock;
pub mod publisher;
pub mod registry;
pub mod sink;

pub use mock::{LoggingSink, MockPositionSink, SinkCall};
pub use publisher::{
    BroadcastPublisher, EventPublisher, MemoryPublisher, RunEvent, TracingPublisher,
    TOPIC_COMPLETED, TOPIC_ERROR, TOPIC_LOOP, TOPIC_STOPPED, TOPIC_UPDATE,
};
pub use registry::{DeviceSession, SerializedSink, SessionInfo, SessionRegistry};
pub use sink::{PositionSink, SinkResult};
