use crate::Value;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

lazy_static! {
    /// The one end-of-stream marker shared by every channel.
    static ref END_OF_STREAM: Row = Row {
        kind: RowKind::EndOfStream,
        field_vals: Arc::from(Vec::new()),
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKind {
    Data,
    EndOfStream,
}

/// Immutable row. Cloning shares the field storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row {
    kind: RowKind,
    field_vals: Arc<[Value]>,
}

impl Row {
    /// Create a new row with the given data.
    ///
    /// # Arguments
    ///
    /// * `field_vals` - Field values of the row.
    pub fn new(field_vals: Vec<Value>) -> Self {
        Self {
            kind: RowKind::Data,
            field_vals: Arc::from(field_vals),
        }
    }

    /// Returns the shared end-of-stream sentinel.
    pub fn end_of_stream() -> Self {
        END_OF_STREAM.clone()
    }

    /// True only for the sentinel. A data row of arity 0 is not the sentinel.
    pub fn is_end_of_stream(&self) -> bool {
        self.kind == RowKind::EndOfStream
    }

    /// Get the field at index.
    ///
    /// # Arguments
    ///
    /// * `i` - Index of the field.
    pub fn get_field(&self, i: usize) -> Option<&Value> {
        self.field_vals.get(i)
    }

    /// Returns an iterator over the field values.
    pub fn field_vals(&self) -> impl Iterator<Item = &Value> {
        self.field_vals.iter()
    }

    /// Return the length of the row.
    pub fn size(&self) -> usize {
        self.field_vals.len()
    }

    /// Append another row with self.
    ///
    /// # Arguments
    ///
    /// * `other` - Other row to append.
    pub fn merge(&self, other: &Self) -> Self {
        let mut fields = self.field_vals.to_vec();
        fields.extend(other.field_vals.iter().cloned());
        Self::new(fields)
    }
}

impl Serialize for Row {
    /// Rows serialize as a plain array of values.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.field_vals.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D>(deserializer: D) -> Result<Row, D::Error>
    where
        D: Deserializer<'de>,
    {
        let vals = Vec::deserialize(deserializer)?;
        Ok(Row::new(vals))
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_end_of_stream() {
            return write!(f, "<end of stream>");
        }
        let mut res = String::new();
        for field in self.field_vals.iter() {
            res.push_str(&field.to_string());
            res.push('\t');
        }
        write!(f, "{}", res)
    }
}
