use apothek_core::ActorId;

/// Identity of the staff member behind a request.
///
/// Authentication happens upstream of this service; every domain route only
/// needs to know who to attribute ledger entries and lifecycle changes to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor_id: ActorId,
}

impl ActorContext {
    pub fn new(actor_id: ActorId) -> Self {
        Self { actor_id }
    }

    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }
}
