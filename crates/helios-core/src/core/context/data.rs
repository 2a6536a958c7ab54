use crate::core::geometry::{Int2, Int3, Int4, Vec2, Vec3, Vec4};
use std::collections::HashMap;
use std::fmt;

/// Type tag of a stored data value. Discriminants are part of the native contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DataType {
    Int = 0,
    UInt = 1,
    Float = 2,
    Double = 3,
    Vec2 = 4,
    Vec3 = 5,
    Vec4 = 6,
    Int2 = 7,
    Int3 = 8,
    Int4 = 9,
    String = 10,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int => "int",
            DataType::UInt => "uint",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Vec2 => "vec2",
            DataType::Vec3 => "vec3",
            DataType::Vec4 => "vec4",
            DataType::Int2 => "int2",
            DataType::Int3 => "int3",
            DataType::Int4 => "int4",
            DataType::String => "string",
        };
        f.write_str(name)
    }
}

/// A single typed value attached to a primitive, an object, or the context.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Int(i32),
    UInt(u32),
    Float(f32),
    Double(f64),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Int2(Int2),
    Int3(Int3),
    Int4(Int4),
    String(String),
}

impl DataValue {
    pub fn data_type(&self) -> DataType {
        match self {
            DataValue::Int(_) => DataType::Int,
            DataValue::UInt(_) => DataType::UInt,
            DataValue::Float(_) => DataType::Float,
            DataValue::Double(_) => DataType::Double,
            DataValue::Vec2(_) => DataType::Vec2,
            DataValue::Vec3(_) => DataType::Vec3,
            DataValue::Vec4(_) => DataType::Vec4,
            DataValue::Int2(_) => DataType::Int2,
            DataValue::Int3(_) => DataType::Int3,
            DataValue::Int4(_) => DataType::Int4,
            DataValue::String(_) => DataType::String,
        }
    }

    /// Numeric scalar view used by the plugin models, which accept any scalar type.
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            DataValue::Int(v) => Some(*v as f32),
            DataValue::UInt(v) => Some(*v as f32),
            DataValue::Float(v) => Some(*v),
            DataValue::Double(v) => Some(*v as f32),
            _ => None,
        }
    }
}

/// Conversion between a Rust value type and its [`DataValue`] variant.
pub trait DataKind: Sized {
    const TYPE: DataType;

    fn into_value(self) -> DataValue;

    fn from_value(value: &DataValue) -> Option<Self>;
}

macro_rules! impl_data_kind {
    ($ty:ty, $variant:ident) => {
        impl DataKind for $ty {
            const TYPE: DataType = DataType::$variant;

            fn into_value(self) -> DataValue {
                DataValue::$variant(self)
            }

            fn from_value(value: &DataValue) -> Option<Self> {
                match value {
                    DataValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_data_kind!(i32, Int);
impl_data_kind!(u32, UInt);
impl_data_kind!(f32, Float);
impl_data_kind!(f64, Double);
impl_data_kind!(Vec2, Vec2);
impl_data_kind!(Vec3, Vec3);
impl_data_kind!(Vec4, Vec4);
impl_data_kind!(Int2, Int2);
impl_data_kind!(Int3, Int3);
impl_data_kind!(Int4, Int4);
impl_data_kind!(String, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLookupError {
    Missing,
    TypeMismatch { actual: DataType },
}

/// Label-keyed storage for typed data values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataStore {
    values: HashMap<String, DataValue>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: DataKind>(&mut self, label: &str, value: T) {
        self.values.insert(label.to_string(), value.into_value());
    }

    pub fn set_value(&mut self, label: &str, value: DataValue) {
        self.values.insert(label.to_string(), value);
    }

    pub fn get<T: DataKind>(&self, label: &str) -> Result<T, DataLookupError> {
        let value = self.values.get(label).ok_or(DataLookupError::Missing)?;
        T::from_value(value).ok_or(DataLookupError::TypeMismatch {
            actual: value.data_type(),
        })
    }

    pub fn value(&self, label: &str) -> Option<&DataValue> {
        self.values.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.values.contains_key(label)
    }

    pub fn data_type(&self, label: &str) -> Option<DataType> {
        self.values.get(label).map(DataValue::data_type)
    }

    pub fn remove(&mut self, label: &str) -> Option<DataValue> {
        self.values.remove(label)
    }

    /// Labels in lexicographic order.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.values.keys().cloned().collect();
        labels.sort();
        labels
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_round_trip_for_every_variant() {
        let mut store = DataStore::new();
        store.set("i", -3i32);
        store.set("u", 7u32);
        store.set("f", 1.5f32);
        store.set("d", 2.25f64);
        store.set("v2", Vec2::new(1.0, 2.0));
        store.set("v3", Vec3::new(1.0, 2.0, 3.0));
        store.set("v4", Vec4::new(1.0, 2.0, 3.0, 4.0));
        store.set("i2", Int2::new(1, 2));
        store.set("i3", Int3::new(1, 2, 3));
        store.set("i4", Int4::new(1, 2, 3, 4));
        store.set("s", "leaf".to_string());

        assert_eq!(store.get::<i32>("i"), Ok(-3));
        assert_eq!(store.get::<u32>("u"), Ok(7));
        assert_eq!(store.get::<f32>("f"), Ok(1.5));
        assert_eq!(store.get::<f64>("d"), Ok(2.25));
        assert_eq!(store.get::<Vec2>("v2"), Ok(Vec2::new(1.0, 2.0)));
        assert_eq!(store.get::<Vec3>("v3"), Ok(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(store.get::<Vec4>("v4"), Ok(Vec4::new(1.0, 2.0, 3.0, 4.0)));
        assert_eq!(store.get::<Int2>("i2"), Ok(Int2::new(1, 2)));
        assert_eq!(store.get::<Int3>("i3"), Ok(Int3::new(1, 2, 3)));
        assert_eq!(store.get::<Int4>("i4"), Ok(Int4::new(1, 2, 3, 4)));
        assert_eq!(store.get::<String>("s"), Ok("leaf".to_string()));
        assert_eq!(store.len(), 11);
    }

    #[test]
    fn lookup_errors_distinguish_missing_from_mismatch() {
        let mut store = DataStore::new();
        store.set("temperature", 300.0f32);
        assert_eq!(store.get::<f32>("absent"), Err(DataLookupError::Missing));
        assert_eq!(
            store.get::<i32>("temperature"),
            Err(DataLookupError::TypeMismatch {
                actual: DataType::Float
            })
        );
    }

    #[test]
    fn overwriting_changes_the_stored_type() {
        let mut store = DataStore::new();
        store.set("x", 1i32);
        store.set("x", 2.0f64);
        assert_eq!(store.data_type("x"), Some(DataType::Double));
        assert_eq!(store.value("x").and_then(DataValue::as_scalar), Some(2.0));
    }

    #[test]
    fn labels_are_sorted_and_removal_works() {
        let mut store = DataStore::new();
        store.set("b", 1u32);
        store.set("a", 2u32);
        assert_eq!(store.labels(), vec!["a".to_string(), "b".to_string()]);
        assert!(store.remove("a").is_some());
        assert!(!store.contains("a"));
        assert_eq!(DataType::Int4.to_string(), "int4");
    }
}
