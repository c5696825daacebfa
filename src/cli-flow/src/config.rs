use common::types::{TypeDescriptor, TypeFactory};
use common::{Attribute, FlowError, TableSchema};
use std::str::FromStr;

/// How the result is printed.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Table,
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Table
    }
}

impl FromStr for OutputFormat {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            other => Err(FlowError::ValidationError(format!(
                "Unknown output format {}",
                other
            ))),
        }
    }
}

/// A CSV file loaded as a table.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TableConfig {
    pub name: String,
    pub path: String,
    /// Column list in `col:type,...` form.
    pub columns: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Path of the JSON logical plan.
    pub plan: String,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub format: OutputFormat,
    /// Record types usable as column types.
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}

impl RunConfig {
    /// Builds a config from repeated `NAME=CSV_PATH` and `NAME=col:type,...` flags.
    ///
    /// # Arguments
    ///
    /// * `plan` - Path of the JSON logical plan.
    /// * `tables` - `NAME=CSV_PATH` assignments.
    /// * `schemas` - `NAME=col:type,...` assignments, one per table.
    /// * `types` - `NAME=field:type,...` record type definitions.
    /// * `format` - Output format.
    pub fn from_flags(
        plan: &str,
        tables: &[&str],
        schemas: &[&str],
        types: &[&str],
        format: OutputFormat,
    ) -> Result<Self, FlowError> {
        let schemas = schemas
            .iter()
            .map(|s| split_assignment(s))
            .collect::<Result<Vec<_>, _>>()?;
        let mut table_configs = Vec::new();
        for table in tables {
            let (name, path) = split_assignment(table)?;
            let columns = schemas
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, c)| c.to_string())
                .ok_or_else(|| {
                    FlowError::ValidationError(format!("No --schema given for table {}", name))
                })?;
            table_configs.push(TableConfig {
                name: name.to_string(),
                path: path.to_string(),
                columns,
            });
        }
        Ok(RunConfig {
            plan: plan.to_string(),
            tables: table_configs,
            format,
            types: types
                .iter()
                .map(|t| parse_type(t))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    /// Factory holding every configured record type.
    pub fn type_factory(&self) -> TypeFactory {
        let mut factory = TypeFactory::new();
        for descriptor in &self.types {
            factory.register(descriptor.clone());
        }
        factory
    }
}

/// Splits `NAME=VALUE`.
fn split_assignment(s: &str) -> Result<(&str, &str), FlowError> {
    let mut parts = s.splitn(2, '=');
    match (parts.next(), parts.next()) {
        (Some(name), Some(value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => Err(FlowError::ValidationError(format!(
            "Expected NAME=VALUE, got {}",
            s
        ))),
    }
}

/// Splits `a:x,b:y` into name and type pairs.
fn split_columns(columns: &str) -> Vec<(&str, &str)> {
    columns
        .split(',')
        .filter(|c| !c.trim().is_empty())
        .map(|column| {
            let mut parts = column.splitn(2, ':');
            let name = parts.next().unwrap_or_default().trim();
            let type_name = parts.next().unwrap_or_default().trim();
            (name, type_name)
        })
        .collect()
}

/// Parses a record type definition such as `Point=x:int,y:int`.
pub fn parse_type(definition: &str) -> Result<TypeDescriptor, FlowError> {
    let (name, fields) = split_assignment(definition)?;
    let fields = split_columns(fields);
    if fields.is_empty() {
        return Err(FlowError::ValidationError(format!(
            "Type {} has no fields",
            name
        )));
    }
    Ok(TypeDescriptor::new(name, fields))
}

/// Parses a column list such as `id:int,name:string`.
///
/// A column type is a primitive name or the name of a record type known to
/// `types`.
pub fn parse_schema(columns: &str, types: &TypeFactory) -> Result<TableSchema, FlowError> {
    let mut attrs = Vec::new();
    for (name, type_name) in split_columns(columns) {
        let dtype = types.create_type(type_name).map_err(|_| {
            FlowError::ValidationError(format!("Unknown column type {} for {}", type_name, name))
        })?;
        attrs.push(Attribute::new(name.to_string(), dtype));
    }
    if attrs.is_empty() {
        return Err(FlowError::ValidationError(String::from("Empty column list")));
    }
    Ok(TableSchema::new(attrs))
}
