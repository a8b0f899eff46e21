//! Catalog entity operations on top of the CatalogStore trait

use crate::error::CatalogError;
use crate::metadata::{
    CatalogStore, DatasetFields, DatasetId, DatasetRecord, EntityRef, ProductFields, ProductId,
    ProductRecord, ResourceRecord, ResourceType, SimulationFields, SimulationId, SimulationRecord,
};
use crate::service::request_context::RequestContext;
use crate::service::unit_of_work::UnitOfWork;
use crate::storage::ResourceStorage;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// Product as written by clients
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInput {
    pub fields: ProductFields,
    pub superseded_product_id: Option<ProductId>,
    pub simulation_ids: Vec<SimulationId>,
}

/// Dataset with its resources split out by role
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetDetail {
    pub dataset: DatasetRecord,
    pub data_access_urls: Vec<ResourceRecord>,
    pub cover_image: Option<ResourceRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductDetail {
    pub product: ProductRecord,
    pub superseded_product_id: Option<ProductId>,
    /// Lowest id among the products superseding this one
    pub superseded_by_product_id: Option<ProductId>,
    pub datasets: Vec<DatasetDetail>,
    pub resources: Vec<ResourceRecord>,
    pub simulations: Vec<SimulationRecord>,
}

/// Catalog listing entry
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogProduct {
    pub product: ProductRecord,
    pub thumbnail: Option<ResourceRecord>,
}

fn first_of_type(resources: &[ResourceRecord], resource_type: ResourceType) -> Option<ResourceRecord> {
    resources
        .iter()
        .find(|r| r.fields.resource_type == resource_type)
        .cloned()
}

/// Metadata service owning the catalog store and the resource storage that
/// units of work clean up after
pub struct MetadataService {
    store: Arc<dyn CatalogStore>,
    storage: Arc<dyn ResourceStorage>,
}

impl MetadataService {
    pub fn new(store: Arc<dyn CatalogStore>, storage: Arc<dyn ResourceStorage>) -> Self {
        Self { store, storage }
    }

    /// Open the unit of work for one request
    pub fn begin(&self, context: &RequestContext) -> Result<UnitOfWork<'_>, CatalogError> {
        debug!("[{}] Beginning unit of work for {}", context.request_id, context.actor());
        let tx = self.store.begin()?;
        Ok(UnitOfWork::new(tx, self.storage.as_ref(), context.request_id.clone()))
    }

    fn require_product(uow: &mut UnitOfWork<'_>, id: ProductId) -> Result<ProductRecord, CatalogError> {
        uow.tx().get_product(id)?.ok_or(CatalogError::NotFound)
    }

    fn require_dataset(uow: &mut UnitOfWork<'_>, id: DatasetId) -> Result<DatasetRecord, CatalogError> {
        uow.tx().get_dataset(id)?.ok_or(CatalogError::NotFound)
    }

    /// Fail with 422 unless every referenced simulation exists
    fn check_simulations(uow: &mut UnitOfWork<'_>, ids: &[SimulationId]) -> Result<(), CatalogError> {
        for id in ids {
            if uow.tx().get_simulation(*id)?.is_none() {
                return Err(CatalogError::validation(format!("simulation {} does not exist", id)));
            }
        }
        Ok(())
    }

    fn check_parent_product(uow: &mut UnitOfWork<'_>, product_id: ProductId) -> Result<(), CatalogError> {
        if uow.tx().get_product(product_id)?.is_none() {
            return Err(CatalogError::validation(format!("product {} does not exist", product_id)));
        }
        Ok(())
    }

    fn schedule_released(uow: &mut UnitOfWork<'_>, released: Vec<ResourceRecord>) {
        for resource in released {
            if resource.is_path() {
                uow.schedule_removal(resource.fields.reference);
            }
        }
    }

    // Products

    pub fn create_product(&self, uow: &mut UnitOfWork<'_>, input: &ProductInput) -> Result<ProductId, CatalogError> {
        Self::check_simulations(uow, &input.simulation_ids)?;
        if let Some(superseded) = input.superseded_product_id {
            Self::check_parent_product(uow, superseded)?;
        }

        let id = uow.tx().insert_product(&input.fields)?;
        if input.superseded_product_id.is_some() {
            self.set_supersedes(uow, id, input.superseded_product_id)?;
        }
        uow.tx().set_product_simulations(id, &input.simulation_ids)?;

        info!("[{}] Created product {} ({})", uow.request_id(), id, input.fields.title);
        Ok(id)
    }

    /// Full replace of scalar fields, supersession edge and simulations
    pub fn update_product(&self, uow: &mut UnitOfWork<'_>, id: ProductId, input: &ProductInput) -> Result<(), CatalogError> {
        Self::require_product(uow, id)?;
        Self::check_simulations(uow, &input.simulation_ids)?;

        uow.tx().update_product(id, &input.fields)?;
        self.set_supersedes(uow, id, input.superseded_product_id)?;
        uow.tx().set_product_simulations(id, &input.simulation_ids)?;

        info!("[{}] Updated product {}", uow.request_id(), id);
        Ok(())
    }

    pub fn get_product(&self, uow: &mut UnitOfWork<'_>, id: ProductId) -> Result<ProductDetail, CatalogError> {
        let product = Self::require_product(uow, id)?;
        let superseded_product_id = uow.tx().superseded_product(id)?;
        let superseded_by_product_id = uow.tx().superseding_product(id)?;

        let mut datasets = Vec::new();
        for dataset in uow.tx().list_product_datasets(id)? {
            datasets.push(Self::dataset_detail(uow, dataset)?);
        }

        Ok(ProductDetail {
            product,
            superseded_product_id,
            superseded_by_product_id,
            datasets,
            resources: uow.tx().list_linked(EntityRef::product(id))?,
            simulations: uow.tx().list_product_simulations(id)?,
        })
    }

    pub fn list_products(&self, uow: &mut UnitOfWork<'_>) -> Result<Vec<ProductRecord>, CatalogError> {
        uow.tx().list_products()
    }

    /// Products not superseded by any other, each with its first thumbnail
    pub fn list_catalog_products(&self, uow: &mut UnitOfWork<'_>) -> Result<Vec<CatalogProduct>, CatalogError> {
        let products = uow.tx().list_catalog_products()?;
        let mut catalog = Vec::with_capacity(products.len());
        for product in products {
            let resources = uow.tx().list_linked(EntityRef::product(product.id))?;
            catalog.push(CatalogProduct {
                thumbnail: first_of_type(&resources, ResourceType::Thumbnail),
                product,
            });
        }
        Ok(catalog)
    }

    /// Point `id` at the product it supersedes, or clear the edge
    pub fn set_supersedes(&self, uow: &mut UnitOfWork<'_>, id: ProductId, superseded: Option<ProductId>) -> Result<(), CatalogError> {
        Self::require_product(uow, id)?;

        let Some(target) = superseded else {
            uow.tx().set_supersedes(id, None)?;
            return Ok(());
        };
        Self::check_parent_product(uow, target)?;

        uow.tx().set_supersedes(id, Some(target))?;
        if self.closes_cycle(uow, id, target)? {
            warn!(
                "[{}] Product {} superseding {} forms a supersession cycle",
                uow.request_id(),
                id,
                target
            );
        }
        Ok(())
    }

    /// Whether following supersession edges from `target` leads back to `id`
    fn closes_cycle(&self, uow: &mut UnitOfWork<'_>, id: ProductId, target: ProductId) -> Result<bool, CatalogError> {
        let mut seen = HashSet::new();
        let mut current = target;
        while seen.insert(current) {
            if current == id {
                return Ok(true);
            }
            match uow.tx().superseded_product(current)? {
                Some(next) => current = next,
                None => return Ok(false),
            }
        }
        Ok(false)
    }

    /// Delete a product with its datasets and the resources only they used
    pub fn delete_product(&self, uow: &mut UnitOfWork<'_>, id: ProductId) -> Result<(), CatalogError> {
        let released = uow.tx().delete_product(id)?.ok_or(CatalogError::NotFound)?;
        info!(
            "[{}] Deleted product {} releasing {} resources",
            uow.request_id(),
            id,
            released.len()
        );
        Self::schedule_released(uow, released);
        Ok(())
    }

    /// Resources linked to a product or dataset
    pub fn list_resources(&self, uow: &mut UnitOfWork<'_>, owner: EntityRef) -> Result<Vec<ResourceRecord>, CatalogError> {
        uow.require_entity(owner)?;
        uow.tx().list_linked(owner)
    }

    // Datasets

    fn dataset_detail(uow: &mut UnitOfWork<'_>, dataset: DatasetRecord) -> Result<DatasetDetail, CatalogError> {
        let resources = uow.tx().list_linked(EntityRef::dataset(dataset.id))?;
        Ok(DatasetDetail {
            data_access_urls: resources
                .iter()
                .filter(|r| r.fields.resource_type == ResourceType::DataAccessUrl)
                .cloned()
                .collect(),
            cover_image: first_of_type(&resources, ResourceType::CoverImage),
            dataset,
        })
    }

    pub fn create_dataset(&self, uow: &mut UnitOfWork<'_>, fields: &DatasetFields) -> Result<DatasetId, CatalogError> {
        Self::check_parent_product(uow, fields.product_id)?;
        let id = uow.tx().insert_dataset(fields)?;
        info!("[{}] Created dataset {} under product {}", uow.request_id(), id, fields.product_id);
        Ok(id)
    }

    pub fn get_dataset(&self, uow: &mut UnitOfWork<'_>, id: DatasetId) -> Result<DatasetDetail, CatalogError> {
        let dataset = Self::require_dataset(uow, id)?;
        Self::dataset_detail(uow, dataset)
    }

    pub fn list_datasets(&self, uow: &mut UnitOfWork<'_>) -> Result<Vec<DatasetRecord>, CatalogError> {
        uow.tx().list_datasets()
    }

    pub fn list_product_datasets(&self, uow: &mut UnitOfWork<'_>, product_id: ProductId) -> Result<Vec<DatasetDetail>, CatalogError> {
        let mut details = Vec::new();
        for dataset in uow.tx().list_product_datasets(product_id)? {
            details.push(Self::dataset_detail(uow, dataset)?);
        }
        Ok(details)
    }

    pub fn update_dataset(&self, uow: &mut UnitOfWork<'_>, id: DatasetId, fields: &DatasetFields) -> Result<(), CatalogError> {
        Self::require_dataset(uow, id)?;
        Self::check_parent_product(uow, fields.product_id)?;
        uow.tx().update_dataset(id, fields)?;
        info!("[{}] Updated dataset {}", uow.request_id(), id);
        Ok(())
    }

    pub fn delete_dataset(&self, uow: &mut UnitOfWork<'_>, id: DatasetId) -> Result<(), CatalogError> {
        let released = uow.tx().delete_dataset(id)?.ok_or(CatalogError::NotFound)?;
        info!(
            "[{}] Deleted dataset {} releasing {} resources",
            uow.request_id(),
            id,
            released.len()
        );
        Self::schedule_released(uow, released);
        Ok(())
    }

    // Simulations

    pub fn create_simulation(&self, uow: &mut UnitOfWork<'_>, fields: &SimulationFields) -> Result<SimulationId, CatalogError> {
        let id = uow.tx().insert_simulation(fields)?;
        info!("[{}] Created simulation {}", uow.request_id(), id);
        Ok(id)
    }

    pub fn get_simulation(&self, uow: &mut UnitOfWork<'_>, id: SimulationId) -> Result<SimulationRecord, CatalogError> {
        uow.tx().get_simulation(id)?.ok_or(CatalogError::NotFound)
    }

    pub fn list_simulations(&self, uow: &mut UnitOfWork<'_>) -> Result<Vec<SimulationRecord>, CatalogError> {
        uow.tx().list_simulations()
    }

    pub fn update_simulation(&self, uow: &mut UnitOfWork<'_>, id: SimulationId, fields: &SimulationFields) -> Result<(), CatalogError> {
        if !uow.tx().update_simulation(id, fields)? {
            return Err(CatalogError::NotFound);
        }
        Ok(())
    }

    pub fn delete_simulation(&self, uow: &mut UnitOfWork<'_>, id: SimulationId) -> Result<(), CatalogError> {
        if !uow.tx().delete_simulation(id)? {
            return Err(CatalogError::NotFound);
        }
        info!("[{}] Deleted simulation {}", uow.request_id(), id);
        Ok(())
    }
}
