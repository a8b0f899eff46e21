//! Mock implementation of ResourceStorage for testing

use crate::error::CatalogError;
use crate::metadata::EntityRef;
use crate::storage::{reference_components, resource_reference, validate_filename, ResourceStorage, StoredFile};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// In-memory file map keyed by reference
pub struct MockResourceStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockResourceStore {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
        }
    }

    fn files(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, CatalogError> {
        self.files
            .lock()
            .map_err(|_| CatalogError::Internal("mock resource store lock poisoned".to_string()))
    }

    /// Number of stored files
    pub fn file_count(&self) -> usize {
        self.files().map(|files| files.len()).unwrap_or(0)
    }
}

impl Default for MockResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceStorage for MockResourceStore {
    fn save(&self, owner: EntityRef, filename: &str, data: &[u8]) -> Result<StoredFile, CatalogError> {
        validate_filename(filename)?;
        let reference = resource_reference(owner, filename);
        self.files()?.insert(reference.clone(), data.to_vec());
        Ok(StoredFile::new(reference, data))
    }

    fn read(&self, reference: &str) -> Result<Vec<u8>, CatalogError> {
        reference_components(reference)?;
        self.files()?
            .get(reference)
            .cloned()
            .ok_or(CatalogError::NotFound)
    }

    fn remove(&self, reference: &str) -> Result<bool, CatalogError> {
        reference_components(reference)?;
        Ok(self.files()?.remove(reference).is_some())
    }

    fn exists(&self, reference: &str) -> Result<bool, CatalogError> {
        reference_components(reference)?;
        Ok(self.files()?.contains_key(reference))
    }
}
