use crate::table::*;
use crate::{FlowError, Row, TableSchema};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Functions needed to implement a catalog. It keeps track of all available tables in the database and their associated schemas.
pub trait Catalog {
    /// Get tables from catalog.
    fn get_tables(&self) -> Arc<RwLock<HashMap<u64, Arc<RwLock<Table>>>>>;

    /// Get the table pointer for the catalog.
    ///
    /// # Arguments
    ///
    /// * `table_id` - Id of table to get the pointer for.
    fn get_table_ptr(&self, table_id: u64) -> Result<Arc<RwLock<Table>>, FlowError> {
        let tables = self.get_tables();
        let tables_ref: &HashMap<u64, Arc<RwLock<Table>>> = &tables.read().unwrap();
        match tables_ref.get(&table_id) {
            Some(table_ptr) => Ok(Arc::clone(table_ptr)),
            _ => Err(FlowError::ExecutionError(String::from("Table not found"))),
        }
    }

    /// Checks if the table id is valid in the catalog.
    ///
    /// # Arguments
    ///
    /// * `table_id` - Id of table to check if it is valid.
    fn is_valid_table(&self, table_id: u64) -> bool {
        let tables = self.get_tables();
        let tables_ref: &HashMap<u64, Arc<RwLock<Table>>> = &tables.read().unwrap();
        tables_ref.contains_key(&table_id)
    }

    /// Gets the table schema from the catalog.
    ///
    /// # Arguments
    ///
    /// * `table_id` - Id of table to get the schema for.
    fn get_table_schema(&self, table_id: u64) -> Result<TableSchema, FlowError> {
        let table_ptr = self.get_table_ptr(table_id)?;
        let table = table_ptr.read().unwrap();
        Ok(table.schema.clone())
    }

    /// Gets a snapshot of the table's rows. Rows share storage, so this is cheap.
    ///
    /// # Arguments
    ///
    /// * `table_id` - Id of table to read.
    fn get_table_rows(&self, table_id: u64) -> Result<Vec<Row>, FlowError> {
        let table_ptr = self.get_table_ptr(table_id)?;
        let table = table_ptr.read().unwrap();
        Ok(table.rows.clone())
    }
}
