use crate::{Attribute, DataType, Row, TableSchema, Value};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Converts an int vector to a Row.
///
/// # Argument
///
/// * `data` - Data to put into row.
pub fn int_vec_to_row(data: Vec<i64>) -> Row {
    Row::new(data.into_iter().map(Value::Int).collect())
}

/// Creates a Vec of rows containing Int values given a 2D Vec of i64's
pub fn create_row_list(row_data: Vec<Vec<i64>>) -> Vec<Row> {
    row_data.into_iter().map(int_vec_to_row).collect()
}

/// Creates a new table schema for a table with width number of Int fields.
pub fn get_int_table_schema(width: usize) -> TableSchema {
    let mut attrs = Vec::new();
    for _ in 0..width {
        attrs.push(Attribute::new(String::new(), DataType::Int))
    }
    TableSchema::new(attrs)
}

/// Row of an int followed by a string, as used by the (id, name) fixtures.
pub fn int_str_row(id: i64, name: &str) -> Row {
    Row::new(vec![Value::Int(id), Value::String(name.to_string())])
}

/// Schema matching [`int_str_row`].
pub fn int_str_schema() -> TableSchema {
    TableSchema::from_vecs(vec!["id", "name"], vec![DataType::Int, DataType::String])
}

pub fn gen_rand_string(n: usize) -> String {
    thread_rng().sample_iter(Alphanumeric).take(n).map(char::from).collect()
}

/// Random (id, name) rows with ids in `0..max_id`.
pub fn gen_random_rows(n: usize, max_id: i64) -> Vec<Row> {
    let mut rng = thread_rng();
    (0..n)
        .map(|_| int_str_row(rng.gen_range(0..max_id), &gen_rand_string(8)))
        .collect()
}

/// Compares two row lists ignoring order.
pub fn compare_unordered_rows(a: &[Row], mut b: Vec<Row>) -> bool {
    if a.len() != b.len() {
        return false;
    }
    for x in a {
        match b.iter().position(|y| y == x) {
            None => return false,
            Some(idx) => {
                b.swap_remove(idx);
            }
        }
    }
    b.is_empty()
}
