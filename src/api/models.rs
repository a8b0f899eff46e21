//! Request and response bodies

use crate::metadata::{
    EntityRef, EntityType, ProductFields, ProductId, ProductRecord, ReferenceType, ResourceRecord, ResourceType,
    SimulationId, SimulationRecord, DatasetRecord,
};
use crate::service::metadata_service::{CatalogProduct, DatasetDetail, ProductDetail, ProductInput};
use crate::service::storage_service::ResourceUpdate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ProductIn {
    #[serde(flatten)]
    pub fields: ProductFields,
    #[serde(default)]
    pub superseded_product_id: Option<ProductId>,
    #[serde(default)]
    pub simulation_ids: Vec<SimulationId>,
}

impl From<ProductIn> for ProductInput {
    fn from(body: ProductIn) -> Self {
        ProductInput {
            fields: body.fields,
            superseded_product_id: body.superseded_product_id,
            simulation_ids: body.simulation_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetModel {
    #[serde(flatten)]
    pub dataset: DatasetRecord,
    pub data_access_urls: Vec<ResourceRecord>,
    pub cover_image: Option<ResourceRecord>,
}

impl From<DatasetDetail> for DatasetModel {
    fn from(detail: DatasetDetail) -> Self {
        DatasetModel {
            dataset: detail.dataset,
            data_access_urls: detail.data_access_urls,
            cover_image: detail.cover_image,
        }
    }
}

/// Product detail view
#[derive(Debug, Clone, Serialize)]
pub struct ProductModel {
    #[serde(flatten)]
    pub product: ProductRecord,
    pub superseded_product_id: Option<ProductId>,
    pub superseded_by_product_id: Option<ProductId>,
    pub datasets: Vec<DatasetModel>,
    pub resources: Vec<ResourceRecord>,
    pub simulations: Vec<SimulationRecord>,
}

impl From<ProductDetail> for ProductModel {
    fn from(detail: ProductDetail) -> Self {
        ProductModel {
            product: detail.product,
            superseded_product_id: detail.superseded_product_id,
            superseded_by_product_id: detail.superseded_by_product_id,
            datasets: detail.datasets.into_iter().map(DatasetModel::from).collect(),
            resources: detail.resources,
            simulations: detail.simulations,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogProductModel {
    #[serde(flatten)]
    pub product: ProductRecord,
    pub thumbnail: Option<ResourceRecord>,
}

impl From<CatalogProduct> for CatalogProductModel {
    fn from(entry: CatalogProduct) -> Self {
        CatalogProductModel {
            product: entry.product,
            thumbnail: entry.thumbnail,
        }
    }
}

/// Link resource attached by JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceIn {
    #[serde(default)]
    pub title: Option<String>,
    pub reference: String,
    /// Only LINK is accepted here; files arrive through multipart uploads
    #[serde(default)]
    pub reference_type: Option<ReferenceType>,
    pub resource_type: ResourceType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceUpdateIn {
    #[serde(default)]
    pub title: Option<String>,
    pub resource_type: ResourceType,
    #[serde(default)]
    pub reference: Option<String>,
}

impl From<ResourceUpdateIn> for ResourceUpdate {
    fn from(body: ResourceUpdateIn) -> Self {
        ResourceUpdate {
            title: body.title,
            resource_type: body.resource_type,
            reference: body.reference,
        }
    }
}

/// Query of `PUT /{entity}/{id}/resource`
#[derive(Debug, Clone, Deserialize)]
pub struct FileUploadQuery {
    pub resource_type: ResourceType,
    #[serde(default)]
    pub title: Option<String>,
}

/// Query of `PUT /resource/{id}/file`
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceFileQuery {
    pub entity_type: EntityType,
    pub entity_id: i64,
}

impl ReplaceFileQuery {
    pub fn owner(&self) -> EntityRef {
        EntityRef {
            entity_type: self.entity_type,
            id: self.entity_id,
        }
    }
}
