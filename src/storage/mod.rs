//! Resource File Storage Abstraction
//!
//! Uploaded resource files live under a resource root as
//! `<entity_type>/<entity_id>/<filename>`. The root-relative path is the
//! reference stored on `PATH` resources; backends resolve it back to bytes.
//! Nothing outside the root is ever read, written or removed.

pub mod config;
pub mod local_store;
pub mod mock_store;


use crate::error::CatalogError;
use crate::metadata::EntityRef;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Receipt for a stored file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    /// Root-relative path, always `/`-separated
    pub reference: String,
    pub size: u64,
    /// Hex MD5 of the stored bytes
    pub checksum: String,
}

impl StoredFile {
    pub fn new(reference: String, data: &[u8]) -> Self {
        Self {
            reference,
            size: data.len() as u64,
            checksum: format!("{:x}", md5::compute(data)),
        }
    }
}

/// Trait defining the resource file storage interface
pub trait ResourceStorage: Send + Sync {
    /// Write `data` as `filename` in the owner's directory, overwriting any
    /// file of the same name
    fn save(&self, owner: EntityRef, filename: &str, data: &[u8]) -> Result<StoredFile, CatalogError>;

    /// Read a stored file; `NotFound` if it is absent
    fn read(&self, reference: &str) -> Result<Vec<u8>, CatalogError>;

    /// Remove a stored file. Returns false when there was nothing to remove.
    fn remove(&self, reference: &str) -> Result<bool, CatalogError>;

    fn exists(&self, reference: &str) -> Result<bool, CatalogError>;
}

/// Reject filenames that could name a directory or leave the owner directory
pub fn validate_filename(filename: &str) -> Result<(), CatalogError> {
    if filename.is_empty() {
        return Err(CatalogError::validation("filename must not be empty"));
    }
    if filename == "." || filename == ".." {
        return Err(CatalogError::validation(format!("invalid filename: {}", filename)));
    }
    if filename.contains(['/', '\\', '\0']) {
        return Err(CatalogError::validation(format!(
            "filename must not contain path separators: {}",
            filename.escape_default()
        )));
    }
    Ok(())
}

/// Root-relative reference for a file owned by `owner`
pub fn resource_reference(owner: EntityRef, filename: &str) -> String {
    format!("{}/{}/{}", owner.entity_type.as_str(), owner.id, filename)
}

/// Split a stored reference into validated components
pub fn reference_components(reference: &str) -> Result<Vec<&str>, CatalogError> {
    let components: Vec<&str> = reference.split('/').collect();
    for component in &components {
        validate_filename(component)
            .map_err(|_| CatalogError::validation(format!("invalid resource reference: {}", reference.escape_default())))?;
    }
    Ok(components)
}

/// Resolve a reference to a path under `root`
pub fn resolve_reference(root: &Path, reference: &str) -> Result<PathBuf, CatalogError> {
    let mut path = root.to_path_buf();
    for component in reference_components(reference)? {
        path.push(component);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("thumbnail.png").is_ok());
        assert!(validate_filename("..hidden").is_ok());
        assert!(validate_filename("report v2.pdf").is_ok());

        for bad in ["", ".", "..", "a/b", "..\\evil", "nul\0byte", "/etc/passwd"] {
            let err = validate_filename(bad).unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)), "{:?} accepted", bad);
        }
    }

    #[test]
    fn test_resource_reference_layout() {
        assert_eq!(
            resource_reference(EntityRef::dataset(12), "cover.jpg"),
            "dataset/12/cover.jpg"
        );
    }

    #[test]
    fn test_resolve_reference_stays_under_root() {
        let root = Path::new("/srv/resources");
        assert_eq!(
            resolve_reference(root, "product/3/t.png").unwrap(),
            PathBuf::from("/srv/resources/product/3/t.png")
        );

        for escape in ["../outside", "product/../../etc", "/abs/path", "product//t.png", "product/3/"] {
            assert!(resolve_reference(root, escape).is_err(), "{} resolved", escape);
        }
    }

    #[test]
    fn test_stored_file_checksum() {
        let stored = StoredFile::new("product/1/a.txt".to_string(), b"hello");
        assert_eq!(stored.size, 5);
        assert_eq!(stored.checksum, "5d41402abc4b2a76b9719d911017c592");
    }
}
