use common::table::Table;
use common::{DataType, FlowError, Row, TableSchema, Value};
use std::fs::File;
use std::io::Read;

/// Loads a headerless csv file into a new table.
///
/// # Arguments
///
/// * `name` - Name of the new table.
/// * `path` - Path to the csv file.
/// * `schema` - Column types used to parse each field.
pub fn import_csv(name: &str, path: &str, schema: TableSchema) -> Result<Table, FlowError> {
    debug!("csv_utils opening {} for table {}", path, name);
    let file = File::open(path)?;
    let rows = read_rows(file, &schema)?;
    info!("Num records imported into {}: {}", name, rows.len());
    Ok(Table::with_rows(name.to_string(), schema, rows))
}

/// Parses every record of `reader` against `schema`.
pub fn read_rows<R: Read>(reader: R, schema: &TableSchema) -> Result<Vec<Row>, FlowError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader);
    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let rec = result?;
        if rec.len() != schema.size() {
            return Err(FlowError::ValidationError(format!(
                "record {} has {} fields, expected {}",
                line + 1,
                rec.len(),
                schema.size()
            )));
        }
        let mut field_vals = Vec::with_capacity(rec.len());
        for (field, attr) in rec.iter().zip(schema.attributes()) {
            field_vals.push(parse_field(field, attr.dtype()).map_err(|e| {
                FlowError::ValidationError(format!("record {}: {}", line + 1, e))
            })?);
        }
        rows.push(Row::new(field_vals));
    }
    Ok(rows)
}

/// Parses one csv field. An empty field is NULL except in string columns.
///
/// Record columns hold a JSON array with one element per field.
fn parse_field(field: &str, dtype: &DataType) -> Result<Value, String> {
    let trimmed = field.trim();
    match dtype {
        DataType::String => Ok(Value::String(field.to_string())),
        _ if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") => Ok(Value::Null),
        DataType::Int => trimmed
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("{} is not an integer", field)),
        DataType::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(Value::Bool(true)),
            "false" | "f" | "0" => Ok(Value::Bool(false)),
            _ => Err(format!("{} is not a boolean", field)),
        },
        DataType::Struct(_) => {
            let value: Value = serde_json::from_str(trimmed)
                .map_err(|e| format!("{} is not a record: {}", field, e))?;
            check_value(&value, dtype)?;
            Ok(value)
        }
        other => Err(format!("columns of type {} cannot be loaded", other.digest())),
    }
}

/// Checks that a decoded value has the shape of `dtype`.
fn check_value(value: &Value, dtype: &DataType) -> Result<(), String> {
    match (value, dtype) {
        (Value::Null, _)
        | (Value::Int(_), DataType::Int)
        | (Value::Bool(_), DataType::Bool)
        | (Value::String(_), DataType::String) => Ok(()),
        (Value::Row(vals), DataType::Struct(schema)) => {
            if vals.len() != schema.size() {
                return Err(format!(
                    "record {} has {} fields, expected {}",
                    value,
                    vals.len(),
                    schema.size()
                ));
            }
            for (val, attr) in vals.iter().zip(schema.attributes()) {
                check_value(val, attr.dtype())?;
            }
            Ok(())
        }
        (other, _) => Err(format!("{} does not fit {}", other, dtype.digest())),
    }
}
