use tracing::warn;
use uuid::Uuid;

use crate::{
    models::store::Store,
    storage::{Storage, StorageError},
};

pub mod payments;
pub mod proposals;
pub mod signatures;

/// Saves `store`; on failure puts `snapshot` back so the in-memory store is
/// left exactly as it was before the operation.
fn persist(store: &mut Store, storage: &impl Storage, snapshot: Store) -> Result<(), StorageError> {
    if let Err(e) = storage.save(store) {
        warn!(error = %e, "save failed, discarding in-memory changes");
        *store = snapshot;
        return Err(e);
    }
    Ok(())
}

fn resolve(store: &Store, reference: &str) -> Option<Uuid> {
    store.find_proposal(reference).map(|p| p.id)
}
