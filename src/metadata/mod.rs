//! Catalog Metadata Layer Abstraction
//!
//! This module defines the catalog records (products, datasets, resources,
//! simulations) and the storage interface behind them. Backends implement
//! [`CatalogStore`], which hands out one [`CatalogTx`] per request so that
//! every mutation of a request commits or rolls back together.

pub mod config;
pub mod sqlite_store;
pub mod mock_store;


use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CatalogError;

pub type ProductId = i64;
pub type DatasetId = i64;
pub type ResourceId = i64;
pub type SimulationId = i64;

/// Kind of entity a resource can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Product,
    Dataset,
}

impl EntityType {
    /// Directory name under the resource root
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Product => "product",
            EntityType::Dataset => "dataset",
        }
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "product" => Ok(EntityType::Product),
            "dataset" => Ok(EntityType::Dataset),
            _ => Err(format!("Unknown entity type: {}", s)),
        }
    }
}

/// An entity that owns resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub id: i64,
}

impl EntityRef {
    pub fn product(id: ProductId) -> Self {
        Self { entity_type: EntityType::Product, id }
    }

    pub fn dataset(id: DatasetId) -> Self {
        Self { entity_type: EntityType::Dataset, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type.as_str(), self.id)
    }
}

/// How a resource's reference is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    /// External URL, never touches local storage
    Link,
    /// Path relative to the resource root
    Path,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Link => "LINK",
            ReferenceType::Path => "PATH",
        }
    }
}

impl FromStr for ReferenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LINK" => Ok(ReferenceType::Link),
            "PATH" => Ok(ReferenceType::Path),
            _ => Err(format!("Unknown reference type: {}", s)),
        }
    }
}

/// What a resource is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    CoverImage,
    Thumbnail,
    DataAccessUrl,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::CoverImage => "COVER_IMAGE",
            ResourceType::Thumbnail => "THUMBNAIL",
            ResourceType::DataAccessUrl => "DATA_ACCESS_URL",
        }
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "COVER_IMAGE" => Ok(ResourceType::CoverImage),
            "THUMBNAIL" => Ok(ResourceType::Thumbnail),
            "DATA_ACCESS_URL" => Ok(ResourceType::DataAccessUrl),
            _ => Err(format!("Unknown resource type: {}", s)),
        }
    }
}

/// Scalar fields of a product, replaced as a whole on update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFields {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(deserialize_with = "deserialize_bound")]
    pub north_bound: f64,
    #[serde(deserialize_with = "deserialize_bound")]
    pub south_bound: f64,
    #[serde(deserialize_with = "deserialize_bound")]
    pub east_bound: f64,
    #[serde(deserialize_with = "deserialize_bound")]
    pub west_bound: f64,
    #[serde(default)]
    pub horizontal_resolution: Option<String>,
    #[serde(default)]
    pub vertical_extent: Option<String>,
    #[serde(default)]
    pub vertical_resolution: Option<String>,
    #[serde(default)]
    pub temporal_extent: Option<String>,
    #[serde(default)]
    pub temporal_resolution: Option<String>,
    #[serde(default)]
    pub variables: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub id: ProductId,
    #[serde(flatten)]
    pub fields: ProductFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetFields {
    pub product_id: ProductId,
    pub title: String,
    pub identifier: String,
    #[serde(rename = "type")]
    pub dataset_type: String,
    pub folder_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetRecord {
    pub id: DatasetId,
    #[serde(flatten)]
    pub fields: DatasetFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceFields {
    pub title: Option<String>,
    pub reference: String,
    pub reference_type: ReferenceType,
    pub resource_type: ResourceType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    #[serde(flatten)]
    pub fields: ResourceFields,
}

impl ResourceRecord {
    pub fn is_path(&self) -> bool {
        self.fields.reference_type == ReferenceType::Path
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationFields {
    pub title: String,
    pub folder_path: String,
    pub data_access_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRecord {
    pub id: SimulationId,
    #[serde(flatten)]
    pub fields: SimulationFields,
}

/// Bounds arrive either as JSON numbers or as decimal strings
fn deserialize_bound<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Bound {
        Number(f64),
        Text(String),
    }

    match Bound::deserialize(deserializer)? {
        Bound::Number(value) => Ok(value),
        Bound::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid bound: {}", text))),
    }
}

/// Storage backend for the catalog
pub trait CatalogStore: Send + Sync {
    /// Open a transaction. Dropping it without [`CatalogTx::commit`] rolls back.
    fn begin(&self) -> Result<Box<dyn CatalogTx + '_>, CatalogError>;
}

/// One open catalog transaction
///
/// Lookups return `Ok(None)` (or `false`) for absent ids; callers decide
/// whether that is a 404. Deleting a product or dataset returns the resources
/// that were linked to nothing else and have been deleted with it.
pub trait CatalogTx {
    fn insert_product(&mut self, fields: &ProductFields) -> Result<ProductId, CatalogError>;
    fn get_product(&mut self, id: ProductId) -> Result<Option<ProductRecord>, CatalogError>;
    fn list_products(&mut self) -> Result<Vec<ProductRecord>, CatalogError>;
    fn update_product(&mut self, id: ProductId, fields: &ProductFields) -> Result<bool, CatalogError>;
    fn delete_product(&mut self, id: ProductId) -> Result<Option<Vec<ResourceRecord>>, CatalogError>;

    /// Product that `id` supersedes, if any
    fn superseded_product(&mut self, id: ProductId) -> Result<Option<ProductId>, CatalogError>;
    /// Lowest product id that supersedes `id`, if any
    fn superseding_product(&mut self, id: ProductId) -> Result<Option<ProductId>, CatalogError>;
    /// Replace or clear the single outgoing supersession edge of `id`
    fn set_supersedes(&mut self, id: ProductId, superseded: Option<ProductId>) -> Result<(), CatalogError>;
    /// Products that are not the target of any supersession edge
    fn list_catalog_products(&mut self) -> Result<Vec<ProductRecord>, CatalogError>;

    fn insert_dataset(&mut self, fields: &DatasetFields) -> Result<DatasetId, CatalogError>;
    fn get_dataset(&mut self, id: DatasetId) -> Result<Option<DatasetRecord>, CatalogError>;
    fn list_datasets(&mut self) -> Result<Vec<DatasetRecord>, CatalogError>;
    fn list_product_datasets(&mut self, product_id: ProductId) -> Result<Vec<DatasetRecord>, CatalogError>;
    fn update_dataset(&mut self, id: DatasetId, fields: &DatasetFields) -> Result<bool, CatalogError>;
    fn delete_dataset(&mut self, id: DatasetId) -> Result<Option<Vec<ResourceRecord>>, CatalogError>;

    fn insert_resource(&mut self, fields: &ResourceFields) -> Result<ResourceId, CatalogError>;
    fn get_resource(&mut self, id: ResourceId) -> Result<Option<ResourceRecord>, CatalogError>;
    fn update_resource(&mut self, id: ResourceId, fields: &ResourceFields) -> Result<bool, CatalogError>;
    fn delete_resource(&mut self, id: ResourceId) -> Result<Option<ResourceRecord>, CatalogError>;

    fn add_link(&mut self, owner: EntityRef, resource_id: ResourceId) -> Result<(), CatalogError>;
    fn remove_link(&mut self, owner: EntityRef, resource_id: ResourceId) -> Result<bool, CatalogError>;
    fn list_linked(&mut self, owner: EntityRef) -> Result<Vec<ResourceRecord>, CatalogError>;
    fn is_linked(&mut self, owner: EntityRef, resource_id: ResourceId) -> Result<bool, CatalogError>;
    /// Whether any PATH resource still points at `reference`
    fn reference_in_use(&mut self, reference: &str) -> Result<bool, CatalogError>;

    fn insert_simulation(&mut self, fields: &SimulationFields) -> Result<SimulationId, CatalogError>;
    fn get_simulation(&mut self, id: SimulationId) -> Result<Option<SimulationRecord>, CatalogError>;
    fn list_simulations(&mut self) -> Result<Vec<SimulationRecord>, CatalogError>;
    fn update_simulation(&mut self, id: SimulationId, fields: &SimulationFields) -> Result<bool, CatalogError>;
    fn delete_simulation(&mut self, id: SimulationId) -> Result<bool, CatalogError>;
    fn set_product_simulations(&mut self, product_id: ProductId, simulation_ids: &[SimulationId]) -> Result<(), CatalogError>;
    fn list_product_simulations(&mut self, product_id: ProductId) -> Result<Vec<SimulationRecord>, CatalogError>;

    fn commit(self: Box<Self>) -> Result<(), CatalogError>;
}
