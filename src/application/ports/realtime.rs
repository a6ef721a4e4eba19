//! Real-time publish port

use crate::notifications::Event;

/// Sink for real-time dashboard events.
///
/// Publishing never blocks and never fails; a sink with no listeners simply
/// drops the event.
pub trait RealtimePublisher: Send + Sync {
    fn publish(&self, event: Event);
}

/// Publisher that discards everything (CLI one-shot runs, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl RealtimePublisher for NoopPublisher {
    fn publish(&self, _event: Event) {}
}
