// NativeValue: the host's in-memory representation of a property value.
//
// The property descriptor decides how a value is interpreted: `Int` backs
// Int32/Int64/Enum-sized integers, `Float` backs Float and Double, `Array`
// backs both dynamic arrays and fixed-size (array_dim > 1) storage.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::handles::{ObjectHandle, StructHandle};
use crate::sparse::SparseTable;
use crate::text::Text;

pub type SetStorage = SparseTable<NativeValue>;
pub type MapStorage = SparseTable<(NativeValue, NativeValue)>;

#[derive(Clone, Debug, PartialEq)]
pub enum NativeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Text(Text),
    Object(ObjectHandle),
    Struct(StructValue),
    Enum(i64),
    Array(Vec<NativeValue>),
    Set(SetStorage),
    Map(MapStorage),
}

/// Field storage for one struct instance, in the struct's property order
/// (super struct fields first).
#[derive(Clone, Debug, PartialEq)]
pub struct StructValue {
    pub struct_type: StructHandle,
    pub fields: Vec<NativeValue>,
}

impl NativeValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            NativeValue::Int(i) | NativeValue::Enum(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            NativeValue::Float(f) => Some(*f),
            NativeValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::Str(s) | NativeValue::Name(s) => Some(s),
            NativeValue::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            NativeValue::Object(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            NativeValue::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<NativeValue>> {
        match self {
            NativeValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Short name of the value's storage kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NativeValue::Bool(_) => "Bool",
            NativeValue::Int(_) => "Int",
            NativeValue::Float(_) => "Float",
            NativeValue::Str(_) => "Str",
            NativeValue::Name(_) => "Name",
            NativeValue::Text(_) => "Text",
            NativeValue::Object(_) => "Object",
            NativeValue::Struct(_) => "Struct",
            NativeValue::Enum(_) => "Enum",
            NativeValue::Array(_) => "Array",
            NativeValue::Set(_) => "Set",
            NativeValue::Map(_) => "Map",
        }
    }

    /// Collect every object handle reachable through this value.
    pub fn collect_objects(&self, out: &mut Vec<ObjectHandle>) {
        match self {
            NativeValue::Object(h) if !h.is_null() => out.push(*h),
            NativeValue::Struct(s) => s.fields.iter().for_each(|f| f.collect_objects(out)),
            NativeValue::Array(items) => items.iter().for_each(|v| v.collect_objects(out)),
            NativeValue::Set(set) => set.values().for_each(|v| v.collect_objects(out)),
            NativeValue::Map(map) => map.values().for_each(|(k, v)| {
                k.collect_objects(out);
                v.collect_objects(out);
            }),
            _ => {}
        }
    }
}

// Structural hash. Floats hash by bit pattern with -0.0 folded onto 0.0 so
// values that compare equal hash equal.
impl Hash for NativeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            NativeValue::Bool(b) => b.hash(state),
            NativeValue::Int(i) | NativeValue::Enum(i) => i.hash(state),
            NativeValue::Float(f) => {
                let f = if *f == 0.0 { 0.0f64 } else { *f };
                f.to_bits().hash(state)
            }
            NativeValue::Str(s) | NativeValue::Name(s) => s.hash(state),
            NativeValue::Text(t) => t.hash(state),
            NativeValue::Object(h) => h.hash(state),
            NativeValue::Struct(s) => {
                s.struct_type.hash(state);
                s.fields.hash(state);
            }
            NativeValue::Array(items) => items.hash(state),
            NativeValue::Set(set) => set.len().hash(state),
            NativeValue::Map(map) => map.len().hash(state),
        }
    }
}

/// GetValueTypeHash equivalent: a 32-bit hash of the value.
pub fn value_type_hash(value: &NativeValue) -> u32 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    let h = hasher.finish();
    (h as u32) ^ ((h >> 32) as u32)
}
