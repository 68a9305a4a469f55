// Property descriptors (FProperty equivalent).
//
// A property is pure data: name, kind, fixed-array dimension, flags and
// metadata. Operations that need to look up struct or enum records (default
// values, text export/import) live on `Host` in `reflect.rs`.

use std::collections::BTreeMap;

use ubridge_flags::*;

use crate::handles::{ClassHandle, EnumHandle, StructHandle};
use crate::value::{value_type_hash, NativeValue};

/// Arbitrary string tags attached to types, properties and functions.
pub type Metadata = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyKind {
    Bool,
    Int32,
    Int64,
    Float,
    Double,
    Str,
    Name,
    Text,
    Object(ClassHandle),
    Interface(ClassHandle),
    Struct(StructHandle),
    Enum(EnumHandle),
    Array(Box<Property>),
    Set(Box<Property>),
    Map(Box<Property>, Box<Property>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub name: String,
    pub kind: PropertyKind,
    /// Number of elements for fixed-size storage; `1` for a plain property.
    pub array_dim: usize,
    pub flags: u64,
    pub metadata: Metadata,
}

impl Property {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Property {
            name: name.into(),
            kind,
            array_dim: 1,
            flags: CPF_NONE,
            metadata: Metadata::new(),
        }
    }

    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_array_dim(mut self, dim: usize) -> Self {
        self.array_dim = dim.max(1);
        self
    }

    #[inline]
    pub fn has_any_flags(&self, flags: u64) -> bool {
        self.flags & flags != 0
    }

    #[inline]
    pub fn has_value_hash(&self) -> bool {
        self.has_any_flags(CPF_HAS_GET_VALUE_TYPE_HASH)
    }

    #[inline]
    pub fn is_fixed_array(&self) -> bool {
        self.array_dim > 1
    }

    /// Inner element property of an array or set.
    pub fn element_property(&self) -> Option<&Property> {
        match &self.kind {
            PropertyKind::Array(inner) | PropertyKind::Set(inner) => Some(inner),
            _ => None,
        }
    }

    /// Key and value properties of a map.
    pub fn map_properties(&self) -> Option<(&Property, &Property)> {
        match &self.kind {
            PropertyKind::Map(k, v) => Some((k, v)),
            _ => None,
        }
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Structural type equality: same kind, inner kinds and dimension.
    /// Names, flags and metadata are ignored.
    pub fn same_type(&self, other: &Property) -> bool {
        self.array_dim == other.array_dim
            && match (&self.kind, &other.kind) {
                (PropertyKind::Array(a), PropertyKind::Array(b)) | (PropertyKind::Set(a), PropertyKind::Set(b)) => {
                    a.same_type(b)
                }
                (PropertyKind::Map(ak, av), PropertyKind::Map(bk, bv)) => ak.same_type(bk) && av.same_type(bv),
                (a, b) => a == b,
            }
    }

    /// Identical: element-for-element native equality.
    pub fn identical(&self, a: &NativeValue, b: &NativeValue) -> bool {
        a == b
    }

    /// GetValueTypeHash for a value of this property. Callers check
    /// `has_value_hash` first.
    pub fn value_hash(&self, value: &NativeValue) -> u32 {
        value_type_hash(value)
    }

    pub fn is_input_parameter(&self) -> bool {
        self.has_any_flags(CPF_PARM) && !self.has_any_flags(CPF_OUT_PARM | CPF_RETURN_PARM)
    }

    pub fn is_output_parameter(&self) -> bool {
        self.has_any_flags(CPF_OUT_PARM | CPF_RETURN_PARM)
    }

    /// Engine-style class name of the property (e.g. `IntProperty`).
    pub fn class_name(&self) -> &'static str {
        match self.kind {
            PropertyKind::Bool => "BoolProperty",
            PropertyKind::Int32 => "IntProperty",
            PropertyKind::Int64 => "Int64Property",
            PropertyKind::Float => "FloatProperty",
            PropertyKind::Double => "DoubleProperty",
            PropertyKind::Str => "StrProperty",
            PropertyKind::Name => "NameProperty",
            PropertyKind::Text => "TextProperty",
            PropertyKind::Object(_) => "ObjectProperty",
            PropertyKind::Interface(_) => "InterfaceProperty",
            PropertyKind::Struct(_) => "StructProperty",
            PropertyKind::Enum(_) => "EnumProperty",
            PropertyKind::Array(_) => "ArrayProperty",
            PropertyKind::Set(_) => "SetProperty",
            PropertyKind::Map(..) => "MapProperty",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_classification() {
        let input = Property::new("A", PropertyKind::Int32).with_flags(CPF_PARM);
        let out = Property::new("B", PropertyKind::Int32).with_flags(CPF_PARM | CPF_OUT_PARM);
        let ret = Property::new("ReturnValue", PropertyKind::Bool).with_flags(CPF_PARM | CPF_RETURN_PARM);
        assert!(input.is_input_parameter());
        assert!(!out.is_input_parameter() && out.is_output_parameter());
        assert!(ret.is_output_parameter());
    }

    #[test]
    fn fixed_array_dimension_is_at_least_one() {
        assert!(!Property::new("X", PropertyKind::Bool).with_array_dim(0).is_fixed_array());
        assert!(Property::new("X", PropertyKind::Bool).with_array_dim(3).is_fixed_array());
    }

    #[test]
    fn same_type_ignores_names_and_flags() {
        let a = Property::new("A", PropertyKind::Array(Box::new(Property::new("Inner", PropertyKind::Int32))));
        let b = Property::new("B", PropertyKind::Array(Box::new(Property::new("Elem", PropertyKind::Int32))))
            .with_flags(CPF_EDIT);
        let c = Property::new("C", PropertyKind::Array(Box::new(Property::new("Inner", PropertyKind::Int64))));
        assert!(a.same_type(&b));
        assert!(!a.same_type(&c));
        assert!(!a.same_type(&a.clone().with_array_dim(2)));
    }

    #[test]
    fn element_and_map_accessors() {
        let arr = Property::new("A", PropertyKind::Array(Box::new(Property::new("A", PropertyKind::Str))));
        assert_eq!(arr.element_property().map(|p| p.class_name()), Some("StrProperty"));
        let map = Property::new(
            "M",
            PropertyKind::Map(
                Box::new(Property::new("M_Key", PropertyKind::Name)),
                Box::new(Property::new("M_Value", PropertyKind::Int32)),
            ),
        );
        assert!(map.element_property().is_none());
        assert_eq!(map.map_properties().map(|(k, _)| k.name.as_str()), Some("M_Key"));
    }
}
