//! User directory: case-insensitive name resolution with create-on-first-use.

use log::debug;

use crate::error::{MetadataError, Result};
use crate::service::MetadataService;

/// Canonical form of a user name.
pub fn normalize_user_name(name: &str) -> String {
    name.to_uppercase()
}

impl MetadataService {
    /// Resolve a user name to its id, creating the user on first use.
    ///
    /// Two callers racing on an unseen name may both insert; the store ignores
    /// the losing insert and both re-select the same id. Empty names are
    /// rejected with [`MetadataError::InvalidInput`].
    pub fn find_or_add_user(&self, name: &str) -> Result<i64> {
        let normalized = checked_user_name(name)?;
        if let Some(id) = self.store.find_user_id(&normalized)? {
            return Ok(id);
        }
        let id = self.store.insert_user(&normalized)?;
        debug!("registered user {normalized} as {id}");
        Ok(id)
    }

    /// Resolve a user name without creating it.
    pub fn find_user(&self, name: &str) -> Result<Option<i64>> {
        let normalized = checked_user_name(name)?;
        self.store.find_user_id(&normalized)
    }

    /// Resolve a project name to its id, creating the project on first write.
    pub(crate) fn resolve_project(&self, name: &str) -> Result<i64> {
        if name.trim().is_empty() {
            return Err(MetadataError::InvalidInput(
                "project name is empty".to_string(),
            ));
        }
        self.store.ensure_project(name)
    }
}

fn checked_user_name(name: &str) -> Result<String> {
    if name.trim().is_empty() {
        return Err(MetadataError::InvalidInput("user name is empty".to_string()));
    }
    Ok(normalize_user_name(name))
}
