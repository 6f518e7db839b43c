//! The contract every domain event satisfies.

use chrono::{DateTime, Utc};

/// A committed domain fact.
///
/// Implementors are plain data: once emitted by an aggregate they are never
/// mutated, only appended and replayed. The type name and schema version
/// together identify the serialized shape on the wire.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted identifier, `"<module>.<aggregate>.<happening>"`
    /// (e.g. `"invoicing.invoice.payment_recorded"`).
    fn event_type(&self) -> &'static str;

    /// Schema version of the serialized payload. Bump on an incompatible
    /// shape change so replaying consumers can pick the right decoder.
    fn version(&self) -> u32 {
        1
    }

    /// Business time: when the fact happened, not when it was stored.
    fn occurred_at(&self) -> DateTime<Utc>;
}
