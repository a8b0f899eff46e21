//! Resource reference lifecycle
//!
//! LINK resources are plain catalog rows. PATH resources also own a file
//! under the resource root: it is written before the row that points at it,
//! and removed only after the transaction that dropped the last row pointing
//! at it commits.

use crate::error::CatalogError;
use crate::metadata::{EntityRef, ReferenceType, ResourceFields, ResourceId, ResourceRecord, ResourceType};
use crate::service::unit_of_work::UnitOfWork;
use crate::storage::{validate_filename, ResourceStorage, StoredFile};
use log::{error, info};
use std::sync::Arc;

/// Changes a client may make to an existing resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceUpdate {
    pub title: Option<String>,
    pub resource_type: ResourceType,
    /// New target for LINK resources. PATH resources only accept their
    /// current reference here.
    pub reference: Option<String>,
}

pub struct StorageService {
    storage: Arc<dyn ResourceStorage>,
}

impl StorageService {
    pub fn new(storage: Arc<dyn ResourceStorage>) -> Self {
        Self { storage }
    }

    fn require_resource(uow: &mut UnitOfWork<'_>, id: ResourceId) -> Result<ResourceRecord, CatalogError> {
        uow.tx().get_resource(id)?.ok_or(CatalogError::NotFound)
    }

    /// Insert a LINK resource and link it to `owner`
    pub fn attach_link(
        &self,
        uow: &mut UnitOfWork<'_>,
        owner: EntityRef,
        resource_type: ResourceType,
        reference: &str,
        title: Option<String>,
    ) -> Result<ResourceId, CatalogError> {
        uow.require_entity(owner)?;
        if reference.trim().is_empty() {
            return Err(CatalogError::validation("reference must not be empty"));
        }

        let id = uow.tx().insert_resource(&ResourceFields {
            title,
            reference: reference.to_string(),
            reference_type: ReferenceType::Link,
            resource_type,
        })?;
        uow.tx().add_link(owner, id)?;

        info!("[{}] Linked resource {} to {}", uow.request_id(), id, owner);
        Ok(id)
    }

    /// Store `data` under the owner's directory and record it as a PATH resource
    pub fn attach_file(
        &self,
        uow: &mut UnitOfWork<'_>,
        owner: EntityRef,
        resource_type: ResourceType,
        data: &[u8],
        filename: &str,
        title: Option<String>,
    ) -> Result<ResourceId, CatalogError> {
        uow.require_entity(owner)?;
        validate_filename(filename)?;

        let stored = self.storage.save(owner, filename, data)?;
        uow.record_written(stored.reference.clone());
        let fields = ResourceFields {
            title,
            reference: stored.reference.clone(),
            reference_type: ReferenceType::Path,
            resource_type,
        };

        let recorded = match uow.tx().insert_resource(&fields) {
            Ok(id) => uow.tx().add_link(owner, id).map(|_| id),
            Err(e) => Err(e),
        };
        match recorded {
            Ok(id) => {
                info!(
                    "[{}] Attached file resource {} to {} ({} bytes, md5 {})",
                    uow.request_id(),
                    id,
                    owner,
                    stored.size,
                    stored.checksum
                );
                Ok(id)
            }
            Err(e) => {
                Self::log_orphan(uow, &stored, &e);
                Err(e)
            }
        }
    }

    /// Swap the file behind a resource linked to `owner`
    ///
    /// The new file is written first. The old file is scheduled for removal
    /// only when the resource was a PATH resource pointing elsewhere.
    pub fn replace_file(
        &self,
        uow: &mut UnitOfWork<'_>,
        resource_id: ResourceId,
        owner: EntityRef,
        data: &[u8],
        filename: &str,
    ) -> Result<(), CatalogError> {
        let existing = Self::require_resource(uow, resource_id)?;
        if !uow.tx().is_linked(owner, resource_id)? {
            return Err(CatalogError::NotFound);
        }
        validate_filename(filename)?;

        let stored = self.storage.save(owner, filename, data)?;
        uow.record_written(stored.reference.clone());
        let fields = ResourceFields {
            title: existing.fields.title.clone(),
            reference: stored.reference.clone(),
            reference_type: ReferenceType::Path,
            resource_type: existing.fields.resource_type,
        };

        if let Err(e) = uow.tx().update_resource(resource_id, &fields) {
            Self::log_orphan(uow, &stored, &e);
            return Err(e);
        }

        if existing.is_path() && existing.fields.reference != stored.reference {
            uow.schedule_removal(existing.fields.reference);
        }
        info!(
            "[{}] Replaced file of resource {} with {} ({} bytes)",
            uow.request_id(),
            resource_id,
            stored.reference,
            stored.size
        );
        Ok(())
    }

    /// Delete a resource row; its file goes once the unit of work commits
    pub fn delete_resource(&self, uow: &mut UnitOfWork<'_>, resource_id: ResourceId) -> Result<(), CatalogError> {
        let removed = uow
            .tx()
            .delete_resource(resource_id)?
            .ok_or(CatalogError::NotFound)?;
        if removed.is_path() {
            uow.schedule_removal(removed.fields.reference);
        }
        info!("[{}] Deleted resource {}", uow.request_id(), resource_id);
        Ok(())
    }

    pub fn get_resource(&self, uow: &mut UnitOfWork<'_>, resource_id: ResourceId) -> Result<ResourceRecord, CatalogError> {
        Self::require_resource(uow, resource_id)
    }

    /// Update title and type; LINK resources may also be repointed
    pub fn update_resource(&self, uow: &mut UnitOfWork<'_>, resource_id: ResourceId, update: &ResourceUpdate) -> Result<(), CatalogError> {
        let existing = Self::require_resource(uow, resource_id)?;

        let reference = match (existing.fields.reference_type, &update.reference) {
            (_, None) => existing.fields.reference.clone(),
            (ReferenceType::Link, Some(reference)) => {
                if reference.trim().is_empty() {
                    return Err(CatalogError::validation("reference must not be empty"));
                }
                reference.clone()
            }
            (ReferenceType::Path, Some(reference)) => {
                if *reference != existing.fields.reference {
                    return Err(CatalogError::validation(
                        "the reference of a file resource is replaced by uploading a new file",
                    ));
                }
                reference.clone()
            }
        };

        uow.tx().update_resource(
            resource_id,
            &ResourceFields {
                title: update.title.clone(),
                reference,
                reference_type: existing.fields.reference_type,
                resource_type: update.resource_type,
            },
        )?;
        info!("[{}] Updated resource {}", uow.request_id(), resource_id);
        Ok(())
    }

    fn log_orphan(uow: &UnitOfWork<'_>, stored: &StoredFile, cause: &CatalogError) {
        error!(
            "[{}] File {} was written but its resource row could not be recorded ({}); the file is orphaned",
            uow.request_id(),
            stored.reference,
            cause
        );
    }
}
