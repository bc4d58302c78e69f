use flashpool_bus::{CollaboratorBus, Outbound};

/// Enqueue collaborator work. A closed bus means the engine is shutting
/// down; the in-memory state is already committed, so this only logs.
pub(crate) fn publish_all(bus: &CollaboratorBus, items: impl IntoIterator<Item = Outbound>) {
    for item in items {
        let kind = item.kind();
        if let Err(e) = bus.publish(item) {
            tracing::warn!(kind, error = %e, "Collaborator work not enqueued");
        }
    }
}
