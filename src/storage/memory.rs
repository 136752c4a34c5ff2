use std::cell::{Cell, RefCell};
use std::path::PathBuf;

use crate::{
    models::store::Store,
    storage::{Storage, StorageError},
};

/// In-memory storage for service tests. Counts saves and can be told to
/// fail the next ones.
#[derive(Default)]
pub struct MemoryStorage {
    saved: RefCell<Option<Store>>,
    saves: Cell<usize>,
    failing: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    pub fn fail_saves(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn last_saved(&self) -> Option<Store> {
        self.saved.borrow().clone()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Store, StorageError> {
        Ok(self.saved.borrow().clone().unwrap_or_default())
    }

    fn save(&self, store: &Store) -> Result<(), StorageError> {
        if self.failing.get() {
            return Err(StorageError::SaveFailed {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::other("backend unavailable"),
            });
        }
        self.saves.set(self.saves.get() + 1);
        *self.saved.borrow_mut() = Some(store.clone());
        Ok(())
    }
}
