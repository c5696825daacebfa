use crate::{Attribute, DataType, FlowError, TableSchema, TypeKey};
use std::collections::HashMap;

pub mod resolver;
pub use resolver::{is_bound, resolve_list, with_thread_instance, CyclicResolver};

/// A named record type, described by field names and type names.
///
/// A type name is either a primitive (`int`, `bool`, `string`) or the name of
/// another descriptor, which may be this one.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub name: String,
    pub fields: Vec<(String, String)>,
}

impl TypeDescriptor {
    pub fn new(name: &str, fields: Vec<(&str, &str)>) -> Self {
        Self {
            name: name.to_string(),
            fields: fields
                .into_iter()
                .map(|(f, t)| (f.to_string(), t.to_string()))
                .collect(),
        }
    }
}

/// Builds record types from descriptors, including self- and mutually
/// referential ones.
#[derive(Debug, Default)]
pub struct TypeFactory {
    descriptors: HashMap<String, TypeDescriptor>,
}

impl TypeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor, replacing one with the same name.
    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.descriptors.insert(descriptor.name.clone(), descriptor);
    }

    /// Returns the type for a primitive or descriptor name.
    pub fn create_type(&self, type_name: &str) -> Result<DataType, FlowError> {
        match DataType::from_name(type_name) {
            Some(dtype) => Ok(dtype),
            None => self.create_struct_type(type_name),
        }
    }

    /// Builds the record type for the named descriptor.
    ///
    /// A field that leads back to a record already under construction gets a
    /// placeholder; read fields through [`TypeFactory::field_list`] to see the
    /// real type behind it.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of a registered descriptor.
    pub fn create_struct_type(&self, name: &str) -> Result<DataType, FlowError> {
        with_thread_instance(|resolver| self.build_struct(resolver, name))
    }

    fn build_struct(&self, resolver: &CyclicResolver, name: &str) -> Result<DataType, FlowError> {
        let descriptor = self.descriptors.get(name).ok_or_else(|| {
            FlowError::ValidationError(format!("Unknown type name {}", name))
        })?;
        let key = TypeKey::named(name);

        // Already finished earlier in this scope.
        if let Some(known) = resolver.completed(key) {
            return Ok(known);
        }

        if !resolver.enter(key) {
            debug!("type {} refers back to itself", name);
            return Ok(resolver.unresolved(key));
        }
        let fields: Result<Vec<Attribute>, FlowError> = descriptor
            .fields
            .iter()
            .map(|(field_name, type_name)| {
                let dtype = match DataType::from_name(type_name) {
                    Some(primitive) => primitive,
                    None => self.build_struct(resolver, type_name)?,
                };
                Ok(Attribute::new(field_name.clone(), dtype))
            })
            .collect();
        resolver.leave(key);

        let result = DataType::Struct(TableSchema::new(fields?));
        resolver.complete(key, result.clone());
        resolver.set_resolution(key, result.clone());
        Ok(result)
    }

    /// Fields of a record type with placeholders resolved where possible.
    ///
    /// Non-record types have no fields.
    pub fn field_list(&self, dtype: &DataType) -> Vec<Attribute> {
        match dtype {
            DataType::Struct(schema) => resolve_list(schema.clone().into_attributes()),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn factory() -> TypeFactory {
        let mut factory = TypeFactory::new();
        factory.register(TypeDescriptor::new(
            "Person",
            vec![("name", "string"), ("friend", "Person")],
        ));
        factory.register(TypeDescriptor::new("Dept", vec![("head", "Emp")]));
        factory.register(TypeDescriptor::new(
            "Emp",
            vec![("id", "int"), ("dept", "Dept")],
        ));
        factory.register(TypeDescriptor::new("Point", vec![("x", "int"), ("y", "int")]));
        factory.register(TypeDescriptor::new("Broken", vec![("x", "Missing")]));
        factory.register(TypeDescriptor::new(
            "Segment",
            vec![("from", "Point"), ("to", "Point")],
        ));
        factory
    }

    #[test]
    fn test_plain_struct() {
        let f = factory();
        let point = f.create_type("Point").unwrap();
        assert_eq!(point.digest(), "RecordType(INTEGER x, INTEGER y)");
        assert!(!is_bound());
    }

    #[test]
    fn test_primitive_names() {
        let f = factory();
        assert_eq!(f.create_type("int").unwrap(), DataType::Int);
        assert_eq!(f.create_type("VARCHAR").unwrap(), DataType::String);
    }

    #[test]
    fn test_self_reference_gets_placeholder() {
        let f = factory();
        let person = f.create_type("Person").unwrap();
        let fields = f.field_list(&person);
        // Outside a resolution scope the placeholder is visible as-is.
        assert_eq!(
            fields[1].dtype,
            DataType::Unresolved(TypeKey::named("Person"))
        );
        assert!(!is_bound());
    }

    #[test]
    fn test_self_reference_resolves_in_scope() {
        let f = factory();
        with_thread_instance(|resolver| {
            let person = f.create_type("Person").unwrap();
            assert_eq!(resolver.resolution_count(), 1);
            let fields = f.field_list(&person);
            assert_eq!(fields[0].dtype, DataType::String);
            assert_eq!(fields[1].dtype, person);
            // Building it again reuses the recorded type.
            assert_eq!(f.create_type("Person").unwrap(), person);
            assert_eq!(resolver.resolution_count(), 1);
        });
    }

    #[test]
    fn test_mutual_reference() {
        let f = factory();
        with_thread_instance(|resolver| {
            let dept = f.create_type("Dept").unwrap();
            // Only Dept was re-entered, so only Dept had a placeholder.
            assert_eq!(resolver.resolution_count(), 1);
            let head = &f.field_list(&dept)[0];
            let emp_fields = f.field_list(&head.dtype);
            assert_eq!(emp_fields[0].dtype, DataType::Int);
            assert_eq!(emp_fields[1].dtype, dept);
        });
    }

    #[test]
    fn test_shared_field_type_built_once() {
        let f = factory();
        with_thread_instance(|resolver| {
            let segment = f.create_type("Segment").unwrap();
            // The second Point field reused the first build.
            assert_eq!(resolver.reuse_count(), 1);
            assert_eq!(resolver.resolution_count(), 0);
            let fields = f.field_list(&segment);
            assert_eq!(fields[0].dtype, fields[1].dtype);
            assert_eq!(fields[0].dtype.digest(), "RecordType(INTEGER x, INTEGER y)");

            // So does a later top-level request in the same scope.
            let point = f.create_type("Point").unwrap();
            assert_eq!(point, fields[0].dtype);
            assert_eq!(resolver.reuse_count(), 2);
        });
    }

    #[test]
    fn test_unknown_type_name() {
        let f = factory();
        let res = f.create_type("Broken");
        assert!(matches!(res, Err(FlowError::ValidationError(_))));
        assert!(!is_bound());
        // The failed construction left nothing active behind.
        assert!(f.create_type("Point").is_ok());
    }
}
