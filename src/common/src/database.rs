use crate::catalog;
use crate::table::*;
use catalog::Catalog;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory database.
#[derive(Clone, Serialize, Deserialize)]
pub struct Database {
    /// Name of the database.
    pub name: String,
    /// Locks for the tables.
    #[serde(skip)]
    pub tables: Arc<RwLock<HashMap<u64, Arc<RwLock<Table>>>>>,
}

impl Database {
    /// Initialize a new database with a given name.
    ///
    /// # Arguments
    ///
    /// * `name` - Name for the new database.
    pub fn new(name: String) -> Self {
        Database {
            name,
            tables: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a table, replacing any table with the same name.
    pub fn add_table(&self, table: Table) {
        info!(
            "Adding table {} with {} rows to {}",
            table.name,
            table.rows.len(),
            self.name
        );
        let mut tables = self.tables.write().unwrap();
        tables.insert(table.id, Arc::new(RwLock::new(table)));
    }
}

impl Catalog for Database {
    /// Gets the tables from the catalog of the database.
    fn get_tables(&self) -> Arc<RwLock<HashMap<u64, Arc<RwLock<Table>>>>> {
        self.tables.clone()
    }
}
