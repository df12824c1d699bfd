use chrono::{DateTime, Utc};

/// Contract every published event satisfies.
///
/// An event is a fact about a committed change: it is immutable, carries a
/// schema version so consumers can recognize payloads they predate, and is
/// emitted only after the state it describes has been durably stored.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable wire name, `"cart.item_added"` style.
    fn event_type(&self) -> &'static str;

    /// Schema version of this event type's payload.
    fn version(&self) -> u32;

    /// Business time: when the change happened, not when it was delivered.
    fn occurred_at(&self) -> DateTime<Utc>;
}
