extern crate csv;
#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::io;
pub mod catalog;
pub mod database;
pub mod ids;
pub mod logical_plan;
pub mod plan_graph;
pub mod rex;
pub mod row;
pub mod table;
pub mod testutil;
pub mod types;

pub use ids::TypeKey;
pub use row::Row;

/// Custom error type.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowError {
    /// IO Errors.
    IOError(String),
    /// Validation errors.
    ValidationError(String),
    /// Execution errors.
    ExecutionError(String),
    /// A blocked channel operation was aborted by the scheduler.
    Cancelled,
}

impl FlowError {
    /// Returns true if the error is a cancellation signal rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FlowError::Cancelled)
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                FlowError::ValidationError(s) => format!("Validation Error: {}", s),
                FlowError::ExecutionError(s) => format!("Execution Error: {}", s),
                FlowError::IOError(s) => s.to_string(),
                FlowError::Cancelled => String::from("Query Cancelled"),
            }
        )
    }
}

impl From<io::Error> for FlowError {
    fn from(error: io::Error) -> Self {
        FlowError::IOError(error.to_string())
    }
}

impl From<csv::Error> for FlowError {
    fn from(error: csv::Error) -> Self {
        FlowError::ValidationError(format!("CSV: {}", error))
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(error: serde_json::Error) -> Self {
        FlowError::ValidationError(format!("JSON: {}", error))
    }
}

impl Error for FlowError {}

/// Return type for a query result.
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Schema of the result rows.
    schema: TableSchema,
    /// Result rows in the order the root operator produced them.
    rows: Vec<Row>,
}

impl QueryResult {
    /// Return an empty result.
    pub fn empty() -> Self {
        Self {
            schema: TableSchema::new(Vec::new()),
            rows: Vec::new(),
        }
    }

    /// Return a result with the given schema and rows.
    ///
    /// # Arguments
    ///
    /// * `schema` - Schema of the rows.
    /// * `rows` - Rows of the result.
    pub fn new(schema: TableSchema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    /// Get the schema.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Get the rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Renders the result as a text table, one line per row.
    pub fn to_table_string(&self) -> String {
        // TODO: Size each column separately instead of using the widest header.
        let width = self
            .schema
            .attributes()
            .map(|a| a.name().len())
            .max()
            .unwrap_or(10)
            .max(8)
            + 2;
        let mut res = String::new();
        for attr in self.schema.attributes() {
            res += &format!("{:width$}", attr.name(), width = width);
        }
        res += "\n";
        for row in &self.rows {
            for f in row.field_vals() {
                res += &format!("{:width$}", f.to_string(), width = width);
            }
            res += "\n";
        }
        res
    }

    /// Renders the result as a json object with `columns` and `rows`.
    pub fn to_json(&self) -> serde_json::Value {
        let columns: Vec<&str> = self.schema.attributes().map(|a| a.name()).collect();
        serde_json::json!({ "columns": columns, "rows": self.rows })
    }
}

/// Handle schemas.
#[derive(PartialEq, Clone, Debug)]
pub struct TableSchema {
    /// Attributes of the schema.
    attributes: Vec<Attribute>,
    /// Mapping from attribute name to order in the schema.
    name_map: HashMap<String, usize>,
}

impl Serialize for TableSchema {
    /// Custom serialize to avoid serializing name_map.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.attributes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TableSchema {
    /// Custom deserialize to avoid serializing name_map.
    fn deserialize<D>(deserializer: D) -> Result<TableSchema, D::Error>
    where
        D: Deserializer<'de>,
    {
        let attrs = Vec::deserialize(deserializer)?;
        Ok(TableSchema::new(attrs))
    }
}

impl TableSchema {
    /// Create a new schema.
    ///
    /// # Arguments
    ///
    /// * `attributes` - Attributes of the schema in the order that they are in the schema.
    pub fn new(attributes: Vec<Attribute>) -> Self {
        let mut name_map = HashMap::new();
        for (i, attr) in attributes.iter().enumerate() {
            name_map.insert(attr.name().to_string(), i);
        }
        Self {
            attributes,
            name_map,
        }
    }

    /// Create a new schema with the given names and dtypes.
    ///
    /// # Arguments
    ///
    /// * `names` - Names of the new schema.
    /// * `dtypes` - Dypes of the new schema.
    pub fn from_vecs(names: Vec<&str>, dtypes: Vec<DataType>) -> Self {
        let mut attrs = Vec::new();
        for (name, dtype) in names.iter().zip(dtypes.into_iter()) {
            attrs.push(Attribute::new(name.to_string(), dtype));
        }
        TableSchema::new(attrs)
    }

    /// Get the attribute from the given index.
    ///
    /// # Arguments
    ///
    /// * `i` - Index of the attribute to look for.
    pub fn get_attribute(&self, i: usize) -> Option<&Attribute> {
        self.attributes.get(i)
    }

    /// Get the index of the attribute.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the attribute to get the index for.
    pub fn get_field_index(&self, name: &str) -> Option<&usize> {
        self.name_map.get(name)
    }

    /// Get an iterator of the attributes.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Consumes the schema and returns its attributes.
    pub fn into_attributes(self) -> Vec<Attribute> {
        self.attributes
    }

    /// Merge two schemas into one.
    ///
    /// The other schema is appended to the current schema.
    ///
    /// # Arguments
    ///
    /// * `other` - Other schema to add to current schema.
    pub fn merge(&self, other: &Self) -> Self {
        let mut attrs = self.attributes.clone();
        attrs.append(&mut other.attributes.clone());
        Self::new(attrs)
    }

    /// Returns the length of the schema.
    pub fn size(&self) -> usize {
        self.attributes.len()
    }

    /// Structural digest, e.g. `RecordType(INTEGER a, VARCHAR b)`.
    ///
    /// Placeholders print as their key, so a digest is always finite even for
    /// schemas that are still under construction.
    pub fn digest(&self) -> String {
        let fields: Vec<String> = self
            .attributes
            .iter()
            .map(|a| format!("{} {}", a.dtype().digest(), a.name()))
            .collect();
        format!("RecordType({})", fields.join(", "))
    }
}

/// Handle attributes. Pairs the name with the dtype.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Attribute dtype.
    pub dtype: DataType,
}

impl Attribute {
    /// Create a new attribute with the given name and dtype.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the attribute.
    /// * `dtype` - Dtype of the attribute.
    pub fn new(name: String, dtype: DataType) -> Self {
        Self { name, dtype }
    }

    /// Returns the name of the attribute.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the dtype of the attribute.
    pub fn dtype(&self) -> &DataType {
        &self.dtype
    }
}

/// Enumerate the supported dtypes.
#[derive(PartialEq, Serialize, Deserialize, Clone, Debug)]
pub enum DataType {
    Null,
    Int,
    Bool,
    String,
    /// Nested record type.
    Struct(TableSchema),
    /// Placeholder for a record type that is still being constructed.
    Unresolved(TypeKey),
}

impl DataType {
    /// Parses a primitive type name as used in CSV schemas and type descriptors.
    pub fn from_name(name: &str) -> Option<DataType> {
        match name.to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(DataType::Int),
            "bool" | "boolean" => Some(DataType::Bool),
            "string" | "varchar" => Some(DataType::String),
            "null" => Some(DataType::Null),
            _ => None,
        }
    }

    /// Returns true if this is a placeholder rather than a complete type.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, DataType::Unresolved(_))
    }

    pub fn digest(&self) -> String {
        match self {
            DataType::Null => String::from("NULL"),
            DataType::Int => String::from("INTEGER"),
            DataType::Bool => String::from("BOOLEAN"),
            DataType::String => String::from("VARCHAR"),
            DataType::Struct(schema) => schema.digest(),
            DataType::Unresolved(key) => format!("UNRESOLVED({})", key),
        }
    }
}

/// Field value carried by a row.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, PartialOrd, Ord, Clone, Hash)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Bool(bool),
    String(String),
    Row(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the type of the value. Nested rows get anonymous field names.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Int(_) => DataType::Int,
            Value::Bool(_) => DataType::Bool,
            Value::String(_) => DataType::String,
            Value::Row(vals) => DataType::Struct(TableSchema::new(
                vals.iter()
                    .enumerate()
                    .map(|(i, v)| Attribute::new(format!("EXPR${}", i), v.data_type()))
                    .collect(),
            )),
        }
    }

    /// Unwraps integer values.
    pub fn unwrap_int(&self) -> i64 {
        match self {
            Value::Int(i) => *i,
            _ => panic!("Expected i64"),
        }
    }

    /// Unwraps string values.
    pub fn unwrap_string(&self) -> &str {
        match self {
            Value::String(s) => &s,
            _ => panic!("Expected String"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(x) => write!(f, "{}", x),
            Value::Bool(x) => write!(f, "{}", x),
            Value::String(x) => write!(f, "{}", x),
            Value::Row(vals) => {
                let parts: Vec<String> = vals.iter().map(|v| v.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}
