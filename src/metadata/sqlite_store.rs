//! SQLite implementation of the CatalogStore trait

use crate::metadata::config::MetadataConfig;
use crate::error::CatalogError;
use crate::metadata::{
    CatalogStore, CatalogTx, DatasetFields, DatasetId, DatasetRecord, EntityRef, EntityType,
    ProductFields, ProductId, ProductRecord, ReferenceType, ResourceFields, ResourceId,
    ResourceRecord, ResourceType, SimulationFields, SimulationId, SimulationRecord,
};
use log::{debug, info, warn};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS product (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        doi TEXT,
        north_bound REAL NOT NULL,
        south_bound REAL NOT NULL,
        east_bound REAL NOT NULL,
        west_bound REAL NOT NULL,
        horizontal_resolution TEXT,
        vertical_extent TEXT,
        vertical_resolution TEXT,
        temporal_extent TEXT,
        temporal_resolution TEXT,
        variables TEXT
    );
    CREATE TABLE IF NOT EXISTS product_version (
        product_id INTEGER PRIMARY KEY REFERENCES product(id) ON DELETE CASCADE,
        superseded_product_id INTEGER NOT NULL REFERENCES product(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS product_version_superseded
        ON product_version(superseded_product_id);
    CREATE TABLE IF NOT EXISTS dataset (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL REFERENCES product(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        identifier TEXT NOT NULL,
        type TEXT NOT NULL,
        folder_path TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS resource (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT,
        reference TEXT NOT NULL,
        reference_type TEXT NOT NULL,
        resource_type TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS product_resource (
        product_id INTEGER NOT NULL REFERENCES product(id) ON DELETE CASCADE,
        resource_id INTEGER NOT NULL REFERENCES resource(id) ON DELETE CASCADE,
        PRIMARY KEY (product_id, resource_id)
    );
    CREATE TABLE IF NOT EXISTS dataset_resource (
        dataset_id INTEGER NOT NULL REFERENCES dataset(id) ON DELETE CASCADE,
        resource_id INTEGER NOT NULL REFERENCES resource(id) ON DELETE CASCADE,
        PRIMARY KEY (dataset_id, resource_id)
    );
    CREATE TABLE IF NOT EXISTS simulation (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        folder_path TEXT NOT NULL,
        data_access_url TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS product_simulation (
        product_id INTEGER NOT NULL REFERENCES product(id) ON DELETE CASCADE,
        simulation_id INTEGER NOT NULL REFERENCES simulation(id) ON DELETE CASCADE,
        PRIMARY KEY (product_id, simulation_id)
    );
";

const PRODUCT_COLUMNS: &str = "id, title, description, doi, north_bound, south_bound, east_bound, west_bound, \
     horizontal_resolution, vertical_extent, vertical_resolution, temporal_extent, temporal_resolution, variables";

const DATASET_COLUMNS: &str = "id, product_id, title, identifier, type, folder_path";

const RESOURCE_COLUMNS: &str = "r.id, r.title, r.reference, r.reference_type, r.resource_type";

const SIMULATION_COLUMNS: &str = "id, title, folder_path, data_access_url";

impl ToSql for ReferenceType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ReferenceType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for ResourceType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ResourceType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<ProductRecord> {
    Ok(ProductRecord {
        id: row.get(0)?,
        fields: ProductFields {
            title: row.get(1)?,
            description: row.get(2)?,
            doi: row.get(3)?,
            north_bound: row.get(4)?,
            south_bound: row.get(5)?,
            east_bound: row.get(6)?,
            west_bound: row.get(7)?,
            horizontal_resolution: row.get(8)?,
            vertical_extent: row.get(9)?,
            vertical_resolution: row.get(10)?,
            temporal_extent: row.get(11)?,
            temporal_resolution: row.get(12)?,
            variables: row.get(13)?,
        },
    })
}

fn dataset_from_row(row: &Row<'_>) -> rusqlite::Result<DatasetRecord> {
    Ok(DatasetRecord {
        id: row.get(0)?,
        fields: DatasetFields {
            product_id: row.get(1)?,
            title: row.get(2)?,
            identifier: row.get(3)?,
            dataset_type: row.get(4)?,
            folder_path: row.get(5)?,
        },
    })
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceRecord> {
    Ok(ResourceRecord {
        id: row.get(0)?,
        fields: ResourceFields {
            title: row.get(1)?,
            reference: row.get(2)?,
            reference_type: row.get(3)?,
            resource_type: row.get(4)?,
        },
    })
}

fn simulation_from_row(row: &Row<'_>) -> rusqlite::Result<SimulationRecord> {
    Ok(SimulationRecord {
        id: row.get(0)?,
        fields: SimulationFields {
            title: row.get(1)?,
            folder_path: row.get(2)?,
            data_access_url: row.get(3)?,
        },
    })
}

/// Join table and owner column for an entity type
fn link_table(entity_type: EntityType) -> (&'static str, &'static str) {
    match entity_type {
        EntityType::Product => ("product_resource", "product_id"),
        EntityType::Dataset => ("dataset_resource", "dataset_id"),
    }
}

/// SQLite implementation of CatalogStore
pub struct SQLiteCatalogStore {
    conn: Mutex<Connection>,
}

impl SQLiteCatalogStore {
    /// Open (or create) the database named in the configuration
    pub fn open(config: &MetadataConfig) -> Result<Self, CatalogError> {
        let conn = if config.db_path == ":memory:" {
            info!("Opening in-memory catalog database");
            Connection::open_in_memory()?
        } else {
            let db_path = Path::new(&config.db_path);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            info!("Opening catalog database at {}", db_path.display());
            let conn = Connection::open(db_path)?;
            if config.wal_mode {
                let mode: String =
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
                debug!("SQLite journal mode: {}", mode);
            }
            conn
        };

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        Self::initialize(conn)
    }

    /// Fresh private in-memory database
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CatalogStore for SQLiteCatalogStore {
    fn begin(&self) -> Result<Box<dyn CatalogTx + '_>, CatalogError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CatalogError::Internal("catalog connection lock poisoned".to_string()))?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SQLiteCatalogTx {
            conn,
            finished: false,
        }))
    }
}

/// Transaction held on the locked connection
pub struct SQLiteCatalogTx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl SQLiteCatalogTx<'_> {
    fn query_resources(&self, sql: &str, id: i64) -> Result<Vec<ResourceRecord>, CatalogError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![id], resource_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn delete_resource_rows(&self, resources: &[ResourceRecord]) -> Result<(), CatalogError> {
        for resource in resources {
            self.conn
                .execute("DELETE FROM resource WHERE id = ?1", params![resource.id])?;
        }
        Ok(())
    }
}

impl Drop for SQLiteCatalogTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("Failed to roll back catalog transaction: {}", e);
            }
        }
    }
}

impl CatalogTx for SQLiteCatalogTx<'_> {
    fn insert_product(&mut self, fields: &ProductFields) -> Result<ProductId, CatalogError> {
        self.conn.execute(
            "INSERT INTO product (title, description, doi, north_bound, south_bound, east_bound, west_bound,
                horizontal_resolution, vertical_extent, vertical_resolution, temporal_extent, temporal_resolution, variables)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                fields.title,
                fields.description,
                fields.doi,
                fields.north_bound,
                fields.south_bound,
                fields.east_bound,
                fields.west_bound,
                fields.horizontal_resolution,
                fields.vertical_extent,
                fields.vertical_resolution,
                fields.temporal_extent,
                fields.temporal_resolution,
                fields.variables,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_product(&mut self, id: ProductId) -> Result<Option<ProductRecord>, CatalogError> {
        let sql = format!("SELECT {} FROM product WHERE id = ?1", PRODUCT_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], product_from_row)
            .optional()?)
    }

    fn list_products(&mut self) -> Result<Vec<ProductRecord>, CatalogError> {
        let sql = format!("SELECT {} FROM product ORDER BY id", PRODUCT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], product_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn update_product(&mut self, id: ProductId, fields: &ProductFields) -> Result<bool, CatalogError> {
        let changed = self.conn.execute(
            "UPDATE product SET title = ?1, description = ?2, doi = ?3, north_bound = ?4, south_bound = ?5,
                east_bound = ?6, west_bound = ?7, horizontal_resolution = ?8, vertical_extent = ?9,
                vertical_resolution = ?10, temporal_extent = ?11, temporal_resolution = ?12, variables = ?13
             WHERE id = ?14",
            params![
                fields.title,
                fields.description,
                fields.doi,
                fields.north_bound,
                fields.south_bound,
                fields.east_bound,
                fields.west_bound,
                fields.horizontal_resolution,
                fields.vertical_extent,
                fields.vertical_resolution,
                fields.temporal_extent,
                fields.temporal_resolution,
                fields.variables,
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_product(&mut self, id: ProductId) -> Result<Option<Vec<ResourceRecord>>, CatalogError> {
        if self.get_product(id)?.is_none() {
            return Ok(None);
        }

        // Resources reachable only through this product or its datasets
        let sql = format!(
            "SELECT {} FROM resource r
             WHERE r.id IN (
                 SELECT resource_id FROM product_resource WHERE product_id = ?1
                 UNION
                 SELECT dr.resource_id FROM dataset_resource dr
                 JOIN dataset d ON d.id = dr.dataset_id WHERE d.product_id = ?1
             )
             AND NOT EXISTS (
                 SELECT 1 FROM product_resource pr WHERE pr.resource_id = r.id AND pr.product_id != ?1
             )
             AND NOT EXISTS (
                 SELECT 1 FROM dataset_resource dr JOIN dataset d ON d.id = dr.dataset_id
                 WHERE dr.resource_id = r.id AND d.product_id != ?1
             )
             ORDER BY r.id",
            RESOURCE_COLUMNS
        );
        let released = self.query_resources(&sql, id)?;

        self.conn
            .execute("DELETE FROM product WHERE id = ?1", params![id])?;
        self.delete_resource_rows(&released)?;
        Ok(Some(released))
    }

    fn superseded_product(&mut self, id: ProductId) -> Result<Option<ProductId>, CatalogError> {
        Ok(self
            .conn
            .query_row(
                "SELECT superseded_product_id FROM product_version WHERE product_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn superseding_product(&mut self, id: ProductId) -> Result<Option<ProductId>, CatalogError> {
        Ok(self
            .conn
            .query_row(
                "SELECT product_id FROM product_version WHERE superseded_product_id = ?1
                 ORDER BY product_id LIMIT 1",
                params![id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn set_supersedes(&mut self, id: ProductId, superseded: Option<ProductId>) -> Result<(), CatalogError> {
        match superseded {
            Some(superseded_id) => {
                self.conn.execute(
                    "INSERT INTO product_version (product_id, superseded_product_id) VALUES (?1, ?2)
                     ON CONFLICT(product_id) DO UPDATE SET superseded_product_id = excluded.superseded_product_id",
                    params![id, superseded_id],
                )?;
            }
            None => {
                self.conn.execute(
                    "DELETE FROM product_version WHERE product_id = ?1",
                    params![id],
                )?;
            }
        }
        Ok(())
    }

    fn list_catalog_products(&mut self) -> Result<Vec<ProductRecord>, CatalogError> {
        let sql = format!(
            "SELECT {} FROM product
             WHERE id NOT IN (SELECT superseded_product_id FROM product_version)
             ORDER BY id",
            PRODUCT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], product_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn insert_dataset(&mut self, fields: &DatasetFields) -> Result<DatasetId, CatalogError> {
        self.conn.execute(
            "INSERT INTO dataset (product_id, title, identifier, type, folder_path) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                fields.product_id,
                fields.title,
                fields.identifier,
                fields.dataset_type,
                fields.folder_path,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_dataset(&mut self, id: DatasetId) -> Result<Option<DatasetRecord>, CatalogError> {
        let sql = format!("SELECT {} FROM dataset WHERE id = ?1", DATASET_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], dataset_from_row)
            .optional()?)
    }

    fn list_datasets(&mut self) -> Result<Vec<DatasetRecord>, CatalogError> {
        let sql = format!("SELECT {} FROM dataset ORDER BY id", DATASET_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], dataset_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn list_product_datasets(&mut self, product_id: ProductId) -> Result<Vec<DatasetRecord>, CatalogError> {
        let sql = format!(
            "SELECT {} FROM dataset WHERE product_id = ?1 ORDER BY id",
            DATASET_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![product_id], dataset_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn update_dataset(&mut self, id: DatasetId, fields: &DatasetFields) -> Result<bool, CatalogError> {
        let changed = self.conn.execute(
            "UPDATE dataset SET product_id = ?1, title = ?2, identifier = ?3, type = ?4, folder_path = ?5
             WHERE id = ?6",
            params![
                fields.product_id,
                fields.title,
                fields.identifier,
                fields.dataset_type,
                fields.folder_path,
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_dataset(&mut self, id: DatasetId) -> Result<Option<Vec<ResourceRecord>>, CatalogError> {
        if self.get_dataset(id)?.is_none() {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {} FROM resource r
             JOIN dataset_resource l ON l.resource_id = r.id
             WHERE l.dataset_id = ?1
             AND NOT EXISTS (SELECT 1 FROM product_resource pr WHERE pr.resource_id = r.id)
             AND NOT EXISTS (
                 SELECT 1 FROM dataset_resource dr WHERE dr.resource_id = r.id AND dr.dataset_id != ?1
             )
             ORDER BY r.id",
            RESOURCE_COLUMNS
        );
        let released = self.query_resources(&sql, id)?;

        self.conn
            .execute("DELETE FROM dataset WHERE id = ?1", params![id])?;
        self.delete_resource_rows(&released)?;
        Ok(Some(released))
    }

    fn insert_resource(&mut self, fields: &ResourceFields) -> Result<ResourceId, CatalogError> {
        self.conn.execute(
            "INSERT INTO resource (title, reference, reference_type, resource_type) VALUES (?1, ?2, ?3, ?4)",
            params![
                fields.title,
                fields.reference,
                fields.reference_type,
                fields.resource_type,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_resource(&mut self, id: ResourceId) -> Result<Option<ResourceRecord>, CatalogError> {
        let sql = format!("SELECT {} FROM resource r WHERE r.id = ?1", RESOURCE_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], resource_from_row)
            .optional()?)
    }

    fn update_resource(&mut self, id: ResourceId, fields: &ResourceFields) -> Result<bool, CatalogError> {
        let changed = self.conn.execute(
            "UPDATE resource SET title = ?1, reference = ?2, reference_type = ?3, resource_type = ?4
             WHERE id = ?5",
            params![
                fields.title,
                fields.reference,
                fields.reference_type,
                fields.resource_type,
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_resource(&mut self, id: ResourceId) -> Result<Option<ResourceRecord>, CatalogError> {
        let existing = self.get_resource(id)?;
        if existing.is_some() {
            self.conn
                .execute("DELETE FROM resource WHERE id = ?1", params![id])?;
        }
        Ok(existing)
    }

    fn add_link(&mut self, owner: EntityRef, resource_id: ResourceId) -> Result<(), CatalogError> {
        let (table, column) = link_table(owner.entity_type);
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({}, resource_id) VALUES (?1, ?2)",
            table, column
        );
        self.conn.execute(&sql, params![owner.id, resource_id])?;
        Ok(())
    }

    fn remove_link(&mut self, owner: EntityRef, resource_id: ResourceId) -> Result<bool, CatalogError> {
        let (table, column) = link_table(owner.entity_type);
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1 AND resource_id = ?2",
            table, column
        );
        let changed = self.conn.execute(&sql, params![owner.id, resource_id])?;
        Ok(changed > 0)
    }

    fn list_linked(&mut self, owner: EntityRef) -> Result<Vec<ResourceRecord>, CatalogError> {
        let (table, column) = link_table(owner.entity_type);
        let sql = format!(
            "SELECT {} FROM resource r JOIN {} l ON l.resource_id = r.id WHERE l.{} = ?1 ORDER BY r.id",
            RESOURCE_COLUMNS, table, column
        );
        self.query_resources(&sql, owner.id)
    }

    fn is_linked(&mut self, owner: EntityRef, resource_id: ResourceId) -> Result<bool, CatalogError> {
        let (table, column) = link_table(owner.entity_type);
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1 AND resource_id = ?2",
            table, column
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params![owner.id, resource_id], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn reference_in_use(&mut self, reference: &str) -> Result<bool, CatalogError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM resource WHERE reference = ?1 AND reference_type = ?2",
            params![reference, ReferenceType::Path],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn insert_simulation(&mut self, fields: &SimulationFields) -> Result<SimulationId, CatalogError> {
        self.conn.execute(
            "INSERT INTO simulation (title, folder_path, data_access_url) VALUES (?1, ?2, ?3)",
            params![fields.title, fields.folder_path, fields.data_access_url],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_simulation(&mut self, id: SimulationId) -> Result<Option<SimulationRecord>, CatalogError> {
        let sql = format!("SELECT {} FROM simulation WHERE id = ?1", SIMULATION_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], simulation_from_row)
            .optional()?)
    }

    fn list_simulations(&mut self) -> Result<Vec<SimulationRecord>, CatalogError> {
        let sql = format!("SELECT {} FROM simulation ORDER BY id", SIMULATION_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], simulation_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn update_simulation(&mut self, id: SimulationId, fields: &SimulationFields) -> Result<bool, CatalogError> {
        let changed = self.conn.execute(
            "UPDATE simulation SET title = ?1, folder_path = ?2, data_access_url = ?3 WHERE id = ?4",
            params![fields.title, fields.folder_path, fields.data_access_url, id],
        )?;
        Ok(changed > 0)
    }

    fn delete_simulation(&mut self, id: SimulationId) -> Result<bool, CatalogError> {
        let changed = self
            .conn
            .execute("DELETE FROM simulation WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn set_product_simulations(&mut self, product_id: ProductId, simulation_ids: &[SimulationId]) -> Result<(), CatalogError> {
        self.conn.execute(
            "DELETE FROM product_simulation WHERE product_id = ?1",
            params![product_id],
        )?;
        for simulation_id in simulation_ids {
            self.conn.execute(
                "INSERT OR IGNORE INTO product_simulation (product_id, simulation_id) VALUES (?1, ?2)",
                params![product_id, simulation_id],
            )?;
        }
        Ok(())
    }

    fn list_product_simulations(&mut self, product_id: ProductId) -> Result<Vec<SimulationRecord>, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.title, s.folder_path, s.data_access_url FROM simulation s
             JOIN product_simulation ps ON ps.simulation_id = s.id
             WHERE ps.product_id = ?1 ORDER BY s.id",
        )?;
        let rows = stmt.query_map(params![product_id], simulation_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn commit(mut self: Box<Self>) -> Result<(), CatalogError> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(title: &str) -> ProductFields {
        ProductFields {
            title: title.to_string(),
            description: "test product".to_string(),
            doi: None,
            north_bound: -33.0,
            south_bound: -35.0,
            east_bound: 27.0,
            west_bound: 25.0,
            horizontal_resolution: None,
            vertical_extent: None,
            vertical_resolution: None,
            temporal_extent: None,
            temporal_resolution: None,
            variables: Some("temp,salt".to_string()),
        }
    }

    fn path_resource(reference: &str) -> ResourceFields {
        ResourceFields {
            title: None,
            reference: reference.to_string(),
            reference_type: ReferenceType::Path,
            resource_type: ResourceType::Thumbnail,
        }
    }

    #[test]
    fn test_sqlite_catalog_store_basic_operations() {
        let store = SQLiteCatalogStore::open_in_memory().unwrap();

        let mut tx = store.begin().unwrap();
        let id = tx.insert_product(&product("first")).unwrap();
        tx.commit().unwrap();

        let mut tx = store.begin().unwrap();
        let fetched = tx.get_product(id).unwrap().unwrap();
        assert_eq!(fetched.fields.title, "first");
        assert_eq!(fetched.fields.variables.as_deref(), Some("temp,salt"));

        assert!(tx.update_product(id, &product("renamed")).unwrap());
        assert!(!tx.update_product(id + 100, &product("ghost")).unwrap());
        assert_eq!(tx.get_product(id).unwrap().unwrap().fields.title, "renamed");
        assert!(tx.get_product(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_uncommitted_transaction_rolls_back() {
        let store = SQLiteCatalogStore::open_in_memory().unwrap();

        {
            let mut tx = store.begin().unwrap();
            tx.insert_product(&product("discarded")).unwrap();
        }

        let mut tx = store.begin().unwrap();
        assert!(tx.list_products().unwrap().is_empty());
    }

    #[test]
    fn test_catalog_listing_excludes_superseded() {
        let store = SQLiteCatalogStore::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();

        let old = tx.insert_product(&product("v1")).unwrap();
        let new = tx.insert_product(&product("v2")).unwrap();
        let other = tx.insert_product(&product("other")).unwrap();

        tx.set_supersedes(new, Some(old)).unwrap();
        let ids: Vec<_> = tx
            .list_catalog_products()
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![new, other]);
        assert_eq!(tx.superseded_product(new).unwrap(), Some(old));
        assert_eq!(tx.superseding_product(old).unwrap(), Some(new));

        // Re-pointing the edge keeps a single row per product
        tx.set_supersedes(new, Some(other)).unwrap();
        let ids: Vec<_> = tx
            .list_catalog_products()
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![old, new]);

        tx.set_supersedes(new, None).unwrap();
        assert_eq!(tx.list_catalog_products().unwrap().len(), 3);
        assert_eq!(tx.superseded_product(new).unwrap(), None);
    }

    #[test]
    fn test_delete_product_releases_exclusive_resources_only() {
        let store = SQLiteCatalogStore::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();

        let owner = tx.insert_product(&product("owner")).unwrap();
        let neighbour = tx.insert_product(&product("neighbour")).unwrap();
        let dataset = tx
            .insert_dataset(&DatasetFields {
                product_id: owner,
                title: "surface".to_string(),
                identifier: "ds-1".to_string(),
                dataset_type: "netcdf".to_string(),
                folder_path: "/data/surface".to_string(),
            })
            .unwrap();

        let exclusive = tx.insert_resource(&path_resource("product/1/a.png")).unwrap();
        tx.add_link(EntityRef::product(owner), exclusive).unwrap();
        let shared = tx.insert_resource(&path_resource("product/1/b.png")).unwrap();
        tx.add_link(EntityRef::product(owner), shared).unwrap();
        tx.add_link(EntityRef::product(neighbour), shared).unwrap();
        let dataset_only = tx.insert_resource(&path_resource("dataset/1/c.png")).unwrap();
        tx.add_link(EntityRef::dataset(dataset), dataset_only).unwrap();

        tx.set_supersedes(neighbour, Some(owner)).unwrap();

        let released: Vec<_> = tx
            .delete_product(owner)
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(released, vec![exclusive, dataset_only]);

        assert!(tx.get_product(owner).unwrap().is_none());
        assert!(tx.get_dataset(dataset).unwrap().is_none());
        assert!(tx.get_resource(exclusive).unwrap().is_none());
        assert!(tx.get_resource(shared).unwrap().is_some());
        assert_eq!(tx.list_linked(EntityRef::product(neighbour)).unwrap().len(), 1);
        assert_eq!(tx.superseded_product(neighbour).unwrap(), None);

        assert!(tx.delete_product(owner).unwrap().is_none());
    }

    #[test]
    fn test_links_and_cascade() {
        let store = SQLiteCatalogStore::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();

        let id = tx.insert_product(&product("linked")).unwrap();
        let resource = tx.insert_resource(&path_resource("product/1/x.png")).unwrap();
        let owner = EntityRef::product(id);

        tx.add_link(owner, resource).unwrap();
        tx.add_link(owner, resource).unwrap();
        assert!(tx.is_linked(owner, resource).unwrap());
        assert_eq!(tx.list_linked(owner).unwrap().len(), 1);

        // Deleting the resource row removes the join row
        assert!(tx.delete_resource(resource).unwrap().is_some());
        assert!(!tx.is_linked(owner, resource).unwrap());
        assert!(tx.delete_resource(resource).unwrap().is_none());
        assert!(!tx.remove_link(owner, resource).unwrap());
    }

    #[test]
    fn test_product_simulations() {
        let store = SQLiteCatalogStore::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();

        let id = tx.insert_product(&product("with simulations")).unwrap();
        let sim = tx
            .insert_simulation(&SimulationFields {
                title: "hindcast".to_string(),
                folder_path: "/runs/hindcast".to_string(),
                data_access_url: "https://thredds.example.org/hindcast".to_string(),
            })
            .unwrap();

        tx.set_product_simulations(id, &[sim, sim]).unwrap();
        assert_eq!(tx.list_product_simulations(id).unwrap().len(), 1);

        assert!(tx.delete_simulation(sim).unwrap());
        assert!(tx.list_product_simulations(id).unwrap().is_empty());
        assert!(!tx.delete_simulation(sim).unwrap());
    }

    #[test]
    fn test_file_database_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let config = MetadataConfig {
            db_path: dir
                .path()
                .join("nested")
                .join("catalog.sqlite")
                .to_string_lossy()
                .into_owned(),
            ..MetadataConfig::default()
        };

        {
            let store = SQLiteCatalogStore::open(&config).unwrap();
            let mut tx = store.begin().unwrap();
            tx.insert_product(&product("durable")).unwrap();
            tx.commit().unwrap();
        }

        let store = SQLiteCatalogStore::open(&config).unwrap();
        let mut tx = store.begin().unwrap();
        assert_eq!(tx.list_products().unwrap().len(), 1);
    }
}
