use crate::{Row, TableSchema};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Table implementation. Rows live in memory for the lifetime of the table.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Table id.
    pub id: u64,
    /// Table schema.
    pub schema: TableSchema,
    /// Table contents, in insertion order.
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Table {
    /// Creates a new empty table with the given name and schema.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of table.
    /// * `schema` - Schema of the table.
    pub fn new(name: String, schema: TableSchema) -> Self {
        let table_id = Table::get_table_id(&name);

        Table {
            name,
            id: table_id,
            schema,
            rows: Vec::new(),
        }
    }

    /// Creates a new table holding the given rows.
    pub fn with_rows(name: String, schema: TableSchema, rows: Vec<Row>) -> Self {
        let mut table = Table::new(name, schema);
        table.rows = rows;
        table
    }

    /// Creates table id of the table by hashing the table name.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of table to get the id for.
    pub fn get_table_id(name: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        hasher.finish()
    }
}
