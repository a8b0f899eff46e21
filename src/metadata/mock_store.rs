//! Mock implementation of the CatalogStore trait for testing

use crate::error::CatalogError;
use crate::metadata::{
    CatalogStore, CatalogTx, DatasetFields, DatasetId, DatasetRecord, EntityRef, EntityType,
    ProductFields, ProductId, ProductRecord, ReferenceType, ResourceFields, ResourceId, ResourceRecord,
    SimulationFields, SimulationId, SimulationRecord,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct MockData {
    products: BTreeMap<ProductId, ProductFields>,
    /// product_id -> superseded_product_id
    versions: BTreeMap<ProductId, ProductId>,
    datasets: BTreeMap<DatasetId, DatasetFields>,
    resources: BTreeMap<ResourceId, ResourceFields>,
    product_resources: BTreeSet<(ProductId, ResourceId)>,
    dataset_resources: BTreeSet<(DatasetId, ResourceId)>,
    simulations: BTreeMap<SimulationId, SimulationFields>,
    product_simulations: BTreeSet<(ProductId, SimulationId)>,
    last_id: i64,
}

impl MockData {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn links(&self, entity_type: EntityType) -> &BTreeSet<(i64, ResourceId)> {
        match entity_type {
            EntityType::Product => &self.product_resources,
            EntityType::Dataset => &self.dataset_resources,
        }
    }

    fn links_mut(&mut self, entity_type: EntityType) -> &mut BTreeSet<(i64, ResourceId)> {
        match entity_type {
            EntityType::Product => &mut self.product_resources,
            EntityType::Dataset => &mut self.dataset_resources,
        }
    }

    fn entity_exists(&self, owner: EntityRef) -> bool {
        match owner.entity_type {
            EntityType::Product => self.products.contains_key(&owner.id),
            EntityType::Dataset => self.datasets.contains_key(&owner.id),
        }
    }

    /// Delete the given products and datasets with everything hanging off
    /// them, then the resources that were linked to nothing else.
    fn remove_entities(&mut self, products: &BTreeSet<ProductId>, datasets: &BTreeSet<DatasetId>) -> Vec<ResourceRecord> {
        let candidates: BTreeSet<ResourceId> = self
            .product_resources
            .iter()
            .filter(|(p, _)| products.contains(p))
            .map(|(_, r)| *r)
            .chain(
                self.dataset_resources
                    .iter()
                    .filter(|(d, _)| datasets.contains(d))
                    .map(|(_, r)| *r),
            )
            .collect();

        let exclusive: Vec<ResourceId> = candidates
            .into_iter()
            .filter(|r| {
                !self
                    .product_resources
                    .iter()
                    .any(|(p, lr)| lr == r && !products.contains(p))
                    && !self
                        .dataset_resources
                        .iter()
                        .any(|(d, lr)| lr == r && !datasets.contains(d))
            })
            .collect();

        for id in products {
            self.products.remove(id);
        }
        for id in datasets {
            self.datasets.remove(id);
        }
        self.versions
            .retain(|p, s| !products.contains(p) && !products.contains(&*s));
        self.product_resources.retain(|(p, _)| !products.contains(p));
        self.dataset_resources.retain(|(d, _)| !datasets.contains(d));
        self.product_simulations.retain(|(p, _)| !products.contains(p));

        exclusive
            .into_iter()
            .filter_map(|id| {
                self.resources
                    .remove(&id)
                    .map(|fields| ResourceRecord { id, fields })
            })
            .collect()
    }
}

fn foreign_key(what: &str, id: i64) -> CatalogError {
    CatalogError::Internal(format!("foreign key violation: {} {} does not exist", what, id))
}

/// In-memory catalog; transactions work on a copy that replaces the shared
/// state on commit.
pub struct MockCatalogStore {
    data: Mutex<MockData>,
}

impl MockCatalogStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(MockData::default()),
        }
    }
}

impl Default for MockCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore for MockCatalogStore {
    fn begin(&self) -> Result<Box<dyn CatalogTx + '_>, CatalogError> {
        let guard = self
            .data
            .lock()
            .map_err(|_| CatalogError::Internal("mock catalog lock poisoned".to_string()))?;
        let working = guard.clone();
        Ok(Box::new(MockCatalogTx { guard, working }))
    }
}

pub struct MockCatalogTx<'a> {
    guard: MutexGuard<'a, MockData>,
    working: MockData,
}

impl CatalogTx for MockCatalogTx<'_> {
    fn insert_product(&mut self, fields: &ProductFields) -> Result<ProductId, CatalogError> {
        let id = self.working.next_id();
        self.working.products.insert(id, fields.clone());
        Ok(id)
    }

    fn get_product(&mut self, id: ProductId) -> Result<Option<ProductRecord>, CatalogError> {
        Ok(self.working.products.get(&id).map(|fields| ProductRecord {
            id,
            fields: fields.clone(),
        }))
    }

    fn list_products(&mut self) -> Result<Vec<ProductRecord>, CatalogError> {
        Ok(self
            .working
            .products
            .iter()
            .map(|(id, fields)| ProductRecord { id: *id, fields: fields.clone() })
            .collect())
    }

    fn update_product(&mut self, id: ProductId, fields: &ProductFields) -> Result<bool, CatalogError> {
        match self.working.products.get_mut(&id) {
            Some(existing) => {
                *existing = fields.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_product(&mut self, id: ProductId) -> Result<Option<Vec<ResourceRecord>>, CatalogError> {
        if !self.working.products.contains_key(&id) {
            return Ok(None);
        }
        let datasets: BTreeSet<DatasetId> = self
            .working
            .datasets
            .iter()
            .filter(|(_, d)| d.product_id == id)
            .map(|(dataset_id, _)| *dataset_id)
            .collect();
        let products = BTreeSet::from([id]);
        Ok(Some(self.working.remove_entities(&products, &datasets)))
    }

    fn superseded_product(&mut self, id: ProductId) -> Result<Option<ProductId>, CatalogError> {
        Ok(self.working.versions.get(&id).copied())
    }

    fn superseding_product(&mut self, id: ProductId) -> Result<Option<ProductId>, CatalogError> {
        Ok(self
            .working
            .versions
            .iter()
            .filter(|(_, superseded)| **superseded == id)
            .map(|(product_id, _)| *product_id)
            .min())
    }

    fn set_supersedes(&mut self, id: ProductId, superseded: Option<ProductId>) -> Result<(), CatalogError> {
        match superseded {
            Some(superseded_id) => {
                if !self.working.products.contains_key(&id) {
                    return Err(foreign_key("product", id));
                }
                if !self.working.products.contains_key(&superseded_id) {
                    return Err(foreign_key("product", superseded_id));
                }
                self.working.versions.insert(id, superseded_id);
            }
            None => {
                self.working.versions.remove(&id);
            }
        }
        Ok(())
    }

    fn list_catalog_products(&mut self) -> Result<Vec<ProductRecord>, CatalogError> {
        let superseded: BTreeSet<ProductId> = self.working.versions.values().copied().collect();
        Ok(self
            .working
            .products
            .iter()
            .filter(|(id, _)| !superseded.contains(id))
            .map(|(id, fields)| ProductRecord { id: *id, fields: fields.clone() })
            .collect())
    }

    fn insert_dataset(&mut self, fields: &DatasetFields) -> Result<DatasetId, CatalogError> {
        if !self.working.products.contains_key(&fields.product_id) {
            return Err(foreign_key("product", fields.product_id));
        }
        let id = self.working.next_id();
        self.working.datasets.insert(id, fields.clone());
        Ok(id)
    }

    fn get_dataset(&mut self, id: DatasetId) -> Result<Option<DatasetRecord>, CatalogError> {
        Ok(self.working.datasets.get(&id).map(|fields| DatasetRecord {
            id,
            fields: fields.clone(),
        }))
    }

    fn list_datasets(&mut self) -> Result<Vec<DatasetRecord>, CatalogError> {
        Ok(self
            .working
            .datasets
            .iter()
            .map(|(id, fields)| DatasetRecord { id: *id, fields: fields.clone() })
            .collect())
    }

    fn list_product_datasets(&mut self, product_id: ProductId) -> Result<Vec<DatasetRecord>, CatalogError> {
        Ok(self
            .working
            .datasets
            .iter()
            .filter(|(_, fields)| fields.product_id == product_id)
            .map(|(id, fields)| DatasetRecord { id: *id, fields: fields.clone() })
            .collect())
    }

    fn update_dataset(&mut self, id: DatasetId, fields: &DatasetFields) -> Result<bool, CatalogError> {
        if !self.working.datasets.contains_key(&id) {
            return Ok(false);
        }
        if !self.working.products.contains_key(&fields.product_id) {
            return Err(foreign_key("product", fields.product_id));
        }
        self.working.datasets.insert(id, fields.clone());
        Ok(true)
    }

    fn delete_dataset(&mut self, id: DatasetId) -> Result<Option<Vec<ResourceRecord>>, CatalogError> {
        if !self.working.datasets.contains_key(&id) {
            return Ok(None);
        }
        let datasets = BTreeSet::from([id]);
        Ok(Some(self.working.remove_entities(&BTreeSet::new(), &datasets)))
    }

    fn insert_resource(&mut self, fields: &ResourceFields) -> Result<ResourceId, CatalogError> {
        let id = self.working.next_id();
        self.working.resources.insert(id, fields.clone());
        Ok(id)
    }

    fn get_resource(&mut self, id: ResourceId) -> Result<Option<ResourceRecord>, CatalogError> {
        Ok(self.working.resources.get(&id).map(|fields| ResourceRecord {
            id,
            fields: fields.clone(),
        }))
    }

    fn update_resource(&mut self, id: ResourceId, fields: &ResourceFields) -> Result<bool, CatalogError> {
        match self.working.resources.get_mut(&id) {
            Some(existing) => {
                *existing = fields.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_resource(&mut self, id: ResourceId) -> Result<Option<ResourceRecord>, CatalogError> {
        let removed = self.working.resources.remove(&id);
        if removed.is_some() {
            self.working.product_resources.retain(|(_, r)| *r != id);
            self.working.dataset_resources.retain(|(_, r)| *r != id);
        }
        Ok(removed.map(|fields| ResourceRecord { id, fields }))
    }

    fn add_link(&mut self, owner: EntityRef, resource_id: ResourceId) -> Result<(), CatalogError> {
        if !self.working.entity_exists(owner) {
            return Err(foreign_key(owner.entity_type.as_str(), owner.id));
        }
        if !self.working.resources.contains_key(&resource_id) {
            return Err(foreign_key("resource", resource_id));
        }
        self.working
            .links_mut(owner.entity_type)
            .insert((owner.id, resource_id));
        Ok(())
    }

    fn remove_link(&mut self, owner: EntityRef, resource_id: ResourceId) -> Result<bool, CatalogError> {
        Ok(self
            .working
            .links_mut(owner.entity_type)
            .remove(&(owner.id, resource_id)))
    }

    fn list_linked(&mut self, owner: EntityRef) -> Result<Vec<ResourceRecord>, CatalogError> {
        let data = &self.working;
        Ok(data
            .links(owner.entity_type)
            .iter()
            .filter(|(entity_id, _)| *entity_id == owner.id)
            .filter_map(|(_, resource_id)| {
                data.resources.get(resource_id).map(|fields| ResourceRecord {
                    id: *resource_id,
                    fields: fields.clone(),
                })
            })
            .collect())
    }

    fn is_linked(&mut self, owner: EntityRef, resource_id: ResourceId) -> Result<bool, CatalogError> {
        Ok(self
            .working
            .links(owner.entity_type)
            .contains(&(owner.id, resource_id)))
    }

    fn reference_in_use(&mut self, reference: &str) -> Result<bool, CatalogError> {
        Ok(self
            .working
            .resources
            .values()
            .any(|fields| fields.reference_type == ReferenceType::Path && fields.reference == reference))
    }

    fn insert_simulation(&mut self, fields: &SimulationFields) -> Result<SimulationId, CatalogError> {
        let id = self.working.next_id();
        self.working.simulations.insert(id, fields.clone());
        Ok(id)
    }

    fn get_simulation(&mut self, id: SimulationId) -> Result<Option<SimulationRecord>, CatalogError> {
        Ok(self.working.simulations.get(&id).map(|fields| SimulationRecord {
            id,
            fields: fields.clone(),
        }))
    }

    fn list_simulations(&mut self) -> Result<Vec<SimulationRecord>, CatalogError> {
        Ok(self
            .working
            .simulations
            .iter()
            .map(|(id, fields)| SimulationRecord { id: *id, fields: fields.clone() })
            .collect())
    }

    fn update_simulation(&mut self, id: SimulationId, fields: &SimulationFields) -> Result<bool, CatalogError> {
        match self.working.simulations.get_mut(&id) {
            Some(existing) => {
                *existing = fields.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_simulation(&mut self, id: SimulationId) -> Result<bool, CatalogError> {
        let removed = self.working.simulations.remove(&id).is_some();
        self.working.product_simulations.retain(|(_, s)| *s != id);
        Ok(removed)
    }

    fn set_product_simulations(&mut self, product_id: ProductId, simulation_ids: &[SimulationId]) -> Result<(), CatalogError> {
        if let Some(missing) = simulation_ids
            .iter()
            .find(|id| !self.working.simulations.contains_key(id))
        {
            return Err(foreign_key("simulation", *missing));
        }
        self.working
            .product_simulations
            .retain(|(p, _)| *p != product_id);
        for simulation_id in simulation_ids {
            self.working
                .product_simulations
                .insert((product_id, *simulation_id));
        }
        Ok(())
    }

    fn list_product_simulations(&mut self, product_id: ProductId) -> Result<Vec<SimulationRecord>, CatalogError> {
        let data = &self.working;
        Ok(data
            .product_simulations
            .iter()
            .filter(|(p, _)| *p == product_id)
            .filter_map(|(_, simulation_id)| {
                data.simulations.get(simulation_id).map(|fields| SimulationRecord {
                    id: *simulation_id,
                    fields: fields.clone(),
                })
            })
            .collect())
    }

    fn commit(self: Box<Self>) -> Result<(), CatalogError> {
        let MockCatalogTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ReferenceType, ResourceType};

    fn link(reference: &str) -> ResourceFields {
        ResourceFields {
            title: Some("docs".to_string()),
            reference: reference.to_string(),
            reference_type: ReferenceType::Link,
            resource_type: ResourceType::DataAccessUrl,
        }
    }

    fn product() -> ProductFields {
        ProductFields {
            title: "mock".to_string(),
            description: "mock product".to_string(),
            doi: Some("10.1000/mock".to_string()),
            north_bound: 1.0,
            south_bound: -1.0,
            east_bound: 1.0,
            west_bound: -1.0,
            horizontal_resolution: None,
            vertical_extent: None,
            vertical_resolution: None,
            temporal_extent: None,
            temporal_resolution: None,
            variables: None,
        }
    }

    #[test]
    fn test_mock_changes_visible_only_after_commit() {
        let store = MockCatalogStore::new();

        {
            let mut tx = store.begin().unwrap();
            tx.insert_product(&product()).unwrap();
        }
        assert!(store.begin().unwrap().list_products().unwrap().is_empty());

        let mut tx = store.begin().unwrap();
        let id = tx.insert_product(&product()).unwrap();
        tx.commit().unwrap();

        let mut tx = store.begin().unwrap();
        assert_eq!(tx.get_product(id).unwrap().unwrap().fields.doi.as_deref(), Some("10.1000/mock"));
    }

    #[test]
    fn test_mock_rejects_dangling_references() {
        let store = MockCatalogStore::new();
        let mut tx = store.begin().unwrap();

        let dataset = DatasetFields {
            product_id: 99,
            title: "orphan".to_string(),
            identifier: "x".to_string(),
            dataset_type: "netcdf".to_string(),
            folder_path: "/tmp".to_string(),
        };
        assert!(tx.insert_dataset(&dataset).is_err());

        let resource = tx.insert_resource(&link("https://example.org")).unwrap();
        assert!(tx.add_link(EntityRef::product(99), resource).is_err());
        assert!(tx.set_product_simulations(1, &[42]).is_err());
    }

    #[test]
    fn test_mock_delete_dataset_keeps_shared_resources() {
        let store = MockCatalogStore::new();
        let mut tx = store.begin().unwrap();

        let product_id = tx.insert_product(&product()).unwrap();
        let dataset_id = tx
            .insert_dataset(&DatasetFields {
                product_id,
                title: "levels".to_string(),
                identifier: "lv".to_string(),
                dataset_type: "zarr".to_string(),
                folder_path: "/data/lv".to_string(),
            })
            .unwrap();

        let shared = tx.insert_resource(&link("https://example.org/shared")).unwrap();
        let own = tx.insert_resource(&link("https://example.org/own")).unwrap();
        tx.add_link(EntityRef::dataset(dataset_id), shared).unwrap();
        tx.add_link(EntityRef::product(product_id), shared).unwrap();
        tx.add_link(EntityRef::dataset(dataset_id), own).unwrap();

        let released = tx.delete_dataset(dataset_id).unwrap().unwrap();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].id, own);
        assert!(tx.get_resource(shared).unwrap().is_some());
        assert!(tx.is_linked(EntityRef::product(product_id), shared).unwrap());
    }
}
