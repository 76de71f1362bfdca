//! In-memory parent directory.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::domain::foundation::{DomainError, ParentId};
use crate::ports::ParentDirectory;

/// In-memory implementation of the ParentDirectory port.
#[derive(Default)]
pub struct InMemoryParentDirectory {
    parents: Mutex<HashSet<ParentId>>,
}

impl InMemoryParentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a known parent account.
    pub fn register(&self, parent_id: ParentId) {
        self.parents.lock().unwrap().insert(parent_id);
    }
}

#[async_trait]
impl ParentDirectory for InMemoryParentDirectory {
    async fn exists(&self, parent_id: &ParentId) -> Result<bool, DomainError> {
        Ok(self.parents.lock().unwrap().contains(parent_id))
    }
}
