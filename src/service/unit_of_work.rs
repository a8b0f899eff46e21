//! One request's catalog transaction plus the file removals it has earned
//!
//! File removals are only carried out once the catalog transaction has
//! committed, and only for references no remaining PATH resource points at.
//! Dropping a unit of work without committing rolls the catalog back and
//! forgets the removals, so no file is lost for a failed request. Files
//! written during a failed request are left in place and logged.

use crate::error::CatalogError;
use crate::metadata::{CatalogTx, EntityRef, EntityType};
use crate::storage::ResourceStorage;
use log::{debug, info, warn};

pub struct UnitOfWork<'a> {
    tx: Box<dyn CatalogTx + 'a>,
    storage: &'a dyn ResourceStorage,
    pending_removals: Vec<String>,
    written: WrittenFiles,
    request_id: String,
}

/// Files saved by the request. Warns on drop unless the request committed.
struct WrittenFiles {
    request_id: String,
    references: Vec<String>,
    committed: bool,
}

impl Drop for WrittenFiles {
    fn drop(&mut self) {
        if !self.committed && !self.references.is_empty() {
            warn!(
                "[{}] Rolled back; {} written file(s) left on disk: {}",
                self.request_id,
                self.references.len(),
                self.references.join(", ")
            );
        }
    }
}

impl<'a> UnitOfWork<'a> {
    pub fn new(tx: Box<dyn CatalogTx + 'a>, storage: &'a dyn ResourceStorage, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        Self {
            tx,
            storage,
            pending_removals: Vec::new(),
            written: WrittenFiles {
                request_id: request_id.clone(),
                references: Vec::new(),
                committed: false,
            },
            request_id,
        }
    }

    pub fn tx(&mut self) -> &mut (dyn CatalogTx + 'a) {
        self.tx.as_mut()
    }

    /// NotFound unless the product or dataset exists
    pub fn require_entity(&mut self, owner: EntityRef) -> Result<(), CatalogError> {
        let exists = match owner.entity_type {
            EntityType::Product => self.tx.get_product(owner.id)?.is_some(),
            EntityType::Dataset => self.tx.get_dataset(owner.id)?.is_some(),
        };
        if exists {
            Ok(())
        } else {
            Err(CatalogError::NotFound)
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Remove `reference` from storage once the transaction commits
    pub fn schedule_removal(&mut self, reference: impl Into<String>) {
        let reference = reference.into();
        debug!("[{}] Scheduling removal of {}", self.request_id, reference);
        if !self.pending_removals.contains(&reference) {
            self.pending_removals.push(reference);
        }
    }

    pub fn pending_removals(&self) -> &[String] {
        &self.pending_removals
    }

    /// Note a file saved to storage on behalf of this request
    pub fn record_written(&mut self, reference: impl Into<String>) {
        let reference = reference.into();
        if !self.written.references.contains(&reference) {
            self.written.references.push(reference);
        }
    }

    /// Commit the transaction, then remove scheduled files that no resource
    /// points at any more. Returns how many files were actually removed.
    pub fn commit(self) -> Result<usize, CatalogError> {
        let UnitOfWork {
            mut tx,
            storage,
            pending_removals,
            mut written,
            request_id,
        } = self;

        let mut releasable = Vec::with_capacity(pending_removals.len());
        for reference in pending_removals {
            if tx.reference_in_use(&reference)? {
                debug!("[{}] Keeping {}, still referenced", request_id, reference);
            } else {
                releasable.push(reference);
            }
        }

        tx.commit()?;
        written.committed = true;

        let mut removed = 0;
        for reference in &releasable {
            match storage.remove(reference) {
                Ok(true) => removed += 1,
                Ok(false) => debug!("[{}] {} was already gone", request_id, reference),
                Err(e) => warn!("[{}] Failed to remove {} after commit: {}", request_id, reference, e),
            }
        }
        if !releasable.is_empty() {
            info!(
                "[{}] Committed; removed {} of {} released files",
                request_id,
                removed,
                releasable.len()
            );
        }
        Ok(removed)
    }
}
