use crate::record::MessageRecord;

/// Receives every inbound record after it has been stored.
///
/// Called on the subscriber thread; implementations must not block for long.
pub trait EventSink: Send + Sync {
    fn on_message(&self, record: &MessageRecord);
}

/// Discards notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_message(&self, _record: &MessageRecord) {}
}

impl<F> EventSink for F
where
    F: Fn(&MessageRecord) + Send + Sync,
{
    fn on_message(&self, record: &MessageRecord) {
        self(record)
    }
}
