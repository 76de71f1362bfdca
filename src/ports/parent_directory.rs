//! Parent directory port - existence checks against the account store.
//!
//! The reconciliation core only needs to know whether a parent account
//! referenced by a checkout link is real; the bot side owns the full
//! profile.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ParentId};

#[async_trait]
pub trait ParentDirectory: Send + Sync {
    /// Whether a parent account with this id exists.
    async fn exists(&self, parent_id: &ParentId) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_directory_is_object_safe() {
        fn _accepts_dyn(_directory: &dyn ParentDirectory) {}
    }
}
