mod types;
pub mod queue;
pub mod hooks;

pub use types::{CanonicalEvent, EventKind};
pub use queue::{event_queue, EventConsumer, EventProducer, QueueStats};
pub use hooks::{BackgroundClip, GameHooks, LogHooks};
