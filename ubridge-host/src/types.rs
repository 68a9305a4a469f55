// Reflection records for classes, script structs, enums and functions.

use std::fmt;
use std::rc::Rc;

use ubridge_flags::*;

use crate::error::HostResult;
use crate::handles::{ClassHandle, ObjectHandle, StructHandle};
use crate::host::Host;
use crate::property::{Metadata, Property};
use crate::value::NativeValue;

/// Native implementation of a function. Receives the object the function
/// was called on (null for static functions) and the parameter frame, one
/// value per parameter in declaration order; output slots are written back.
pub type FunctionThunk = Rc<dyn Fn(&Host, ObjectHandle, &mut Vec<NativeValue>) -> HostResult<()>>;

/// Called after a new instance of a class has been constructed.
pub type PostInitHook = Rc<dyn Fn(&Host, ObjectHandle)>;

/// Name, owning package, object flags and metadata shared by every type record.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeHeader {
    pub name: String,
    pub package: ObjectHandle,
    pub object_flags: u32,
    pub metadata: Metadata,
}

impl TypeHeader {
    pub fn new(name: impl Into<String>, package: ObjectHandle) -> Self {
        TypeHeader {
            name: name.into(),
            package,
            object_flags: RF_PUBLIC | RF_STANDALONE,
            metadata: Metadata::new(),
        }
    }
}

#[derive(Clone)]
pub struct FunctionDef {
    pub name: String,
    pub flags: u32,
    pub params: Vec<Property>,
    pub metadata: Metadata,
    pub thunk: Option<FunctionThunk>,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionDef {
            name: name.into(),
            flags: FUNC_NONE,
            params: Vec::new(),
            metadata: Metadata::new(),
            thunk: None,
        }
    }

    #[inline]
    pub fn has_any_flags(&self, flags: u32) -> bool {
        self.flags & flags != 0
    }

    pub fn return_property(&self) -> Option<&Property> {
        self.params.iter().find(|p| p.has_any_flags(CPF_RETURN_PARM))
    }

    pub fn input_params(&self) -> impl Iterator<Item = &Property> {
        self.params.iter().filter(|p| p.is_input_parameter())
    }

    /// Return value first, then out parameters in declaration order.
    pub fn output_params(&self) -> Vec<&Property> {
        let mut out: Vec<&Property> = self.return_property().into_iter().collect();
        out.extend(
            self.params
                .iter()
                .filter(|p| p.has_any_flags(CPF_OUT_PARM) && !p.has_any_flags(CPF_RETURN_PARM)),
        );
        out
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("flags", &format_args!("{:#x}", self.flags))
            .field("params", &self.params)
            .field("metadata", &self.metadata)
            .field("has_thunk", &self.thunk.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct ClassDef {
    pub header: TypeHeader,
    pub super_class: Option<ClassHandle>,
    /// Properties declared by this class only.
    pub properties: Vec<Property>,
    pub functions: Vec<FunctionDef>,
    pub class_flags: u32,
    pub post_init: Option<PostInitHook>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>, package: ObjectHandle, super_class: Option<ClassHandle>) -> Self {
        ClassDef {
            header: TypeHeader::new(name, package),
            super_class,
            properties: Vec::new(),
            functions: Vec::new(),
            class_flags: CLASS_NONE,
            post_init: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    #[inline]
    pub fn has_any_class_flags(&self, flags: u32) -> bool {
        self.class_flags & flags != 0
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("header", &self.header)
            .field("super_class", &self.super_class)
            .field("properties", &self.properties)
            .field("functions", &self.functions)
            .field("class_flags", &format_args!("{:#x}", self.class_flags))
            .field("has_post_init", &self.post_init.is_some())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructDef {
    pub header: TypeHeader,
    pub super_struct: Option<StructHandle>,
    /// Properties declared by this struct only.
    pub properties: Vec<Property>,
    /// Whether values of this struct support GetValueTypeHash.
    pub hashable: bool,
}

impl StructDef {
    pub fn new(name: impl Into<String>, package: ObjectHandle, super_struct: Option<StructHandle>) -> Self {
        StructDef {
            header: TypeHeader::new(name, package),
            super_struct,
            properties: Vec::new(),
            hashable: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumEntry {
    pub name: String,
    pub value: i64,
    pub metadata: Metadata,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumDef {
    pub header: TypeHeader,
    pub entries: Vec<EnumEntry>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, package: ObjectHandle) -> Self {
        EnumDef { header: TypeHeader::new(name, package), entries: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn add_entry(&mut self, name: impl Into<String>, value: i64) -> &mut EnumEntry {
        self.entries.push(EnumEntry { name: name.into(), value, metadata: Metadata::new() });
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    pub fn value_by_name(&self, name: &str) -> Option<i64> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.value)
    }

    pub fn name_by_value(&self, value: i64) -> Option<&str> {
        self.entries.iter().find(|e| e.value == value).map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyKind;

    #[test]
    fn output_params_put_return_first() {
        let mut func = FunctionDef::new("TryGet");
        func.params.push(Property::new("OutValue0", PropertyKind::Int32).with_flags(CPF_PARM | CPF_OUT_PARM));
        func.params.push(Property::new("ReturnValue", PropertyKind::Bool).with_flags(CPF_PARM | CPF_RETURN_PARM));
        func.params.push(Property::new("Key", PropertyKind::Str).with_flags(CPF_PARM));
        let names: Vec<_> = func.output_params().iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["ReturnValue", "OutValue0"]);
        assert_eq!(func.input_params().count(), 1);
    }

    #[test]
    fn enum_lookup_both_ways() {
        let mut e = EnumDef::new("Color", ObjectHandle(1));
        e.add_entry("Red", 0);
        e.add_entry("Blue", 4);
        assert_eq!(e.value_by_name("Blue"), Some(4));
        assert_eq!(e.name_by_value(0), Some("Red"));
        assert_eq!(e.name_by_value(2), None);
    }
}
