//! Local filesystem resource storage

use crate::error::CatalogError;
use crate::metadata::EntityRef;
use crate::storage::{resolve_reference, resource_reference, validate_filename, ResourceStorage, StoredFile};
use log::{debug, info, warn};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Files stored under a root directory on local disk
pub struct LocalResourceStore {
    root: PathBuf,
}

impl LocalResourceStore {
    /// Use `root` as the resource root, creating it if needed
    pub fn new(root: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            fs::create_dir_all(&root)?;
            info!("Created resource root {}", root.display());
        }
        Ok(Self { root })
    }
}

/// Write `data` to a sibling temp file and rename it over `path`, so readers
/// never see a truncated or half written file.
fn write_atomically(path: &Path, data: &[u8]) -> io::Result<()> {
    let filename = path.file_name().and_then(|name| name.to_str()).unwrap_or("resource");
    let temp_path = path.with_file_name(format!(
        ".{}.tmp-{}",
        filename,
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    let result = written.and_then(|_| fs::rename(&temp_path, path));
    if result.is_err() {
        if let Err(e) = fs::remove_file(&temp_path) {
            debug!("Could not clean up {}: {}", temp_path.display(), e);
        }
    }
    result
}

impl ResourceStorage for LocalResourceStore {
    fn save(&self, owner: EntityRef, filename: &str, data: &[u8]) -> Result<StoredFile, CatalogError> {
        validate_filename(filename)?;
        let reference = resource_reference(owner, filename);
        let path = resolve_reference(&self.root, &reference)?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        write_atomically(&path, data)?;

        let stored = StoredFile::new(reference, data);
        info!(
            "Stored {} ({} bytes, md5 {})",
            stored.reference, stored.size, stored.checksum
        );
        Ok(stored)
    }

    fn read(&self, reference: &str) -> Result<Vec<u8>, CatalogError> {
        let path = resolve_reference(&self.root, reference)?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CatalogError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, reference: &str) -> Result<bool, CatalogError> {
        let path = resolve_reference(&self.root, reference)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed resource file {}", reference);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Resource file {} already absent", reference);
                Ok(false)
            }
            Err(e) => {
                warn!("Failed to remove resource file {}: {}", reference, e);
                Err(e.into())
            }
        }
    }

    fn exists(&self, reference: &str) -> Result<bool, CatalogError> {
        Ok(resolve_reference(&self.root, reference)?.is_file())
    }
}
