// Script-side type objects.
//
// A ScriptType is what a script author declares (name, base, body members)
// plus what the bridge attaches once the type has a native twin: the native
// type handle and the attribute descriptors instances route through.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use ubridge_host::{Property, TypeHandle};

use crate::script::value::ScriptValue;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TypeFamily {
    Object,
    Struct,
    Enum,
}

/// Attribute backed by a native property, optionally routed through
/// getter/setter functions.
#[derive(Clone, Debug)]
pub struct PropertyDescriptor {
    pub name: String,
    pub property: Property,
    pub getter: Option<String>,
    pub setter: Option<String>,
    pub doc: Option<String>,
}

/// Attribute backed by a native function.
#[derive(Clone, Debug)]
pub struct MethodDescriptor {
    pub name: String,
    pub is_static: bool,
    pub doc: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct TypeDescriptors {
    pub properties: Vec<PropertyDescriptor>,
    pub methods: Vec<MethodDescriptor>,
}

pub struct ScriptType {
    name: String,
    family: TypeFamily,
    base: RefCell<Option<Rc<ScriptType>>>,
    doc: Option<String>,
    members: RefCell<Vec<(String, ScriptValue)>>,
    native: Cell<Option<TypeHandle>>,
    descriptors: RefCell<TypeDescriptors>,
}

impl ScriptType {
    pub fn new(name: impl Into<String>, family: TypeFamily) -> Self {
        ScriptType {
            name: name.into(),
            family,
            base: RefCell::new(None),
            doc: None,
            members: RefCell::new(Vec::new()),
            native: Cell::new(None),
            descriptors: RefCell::new(TypeDescriptors::default()),
        }
    }

    /// A new type deriving from `base`, in the same family.
    pub fn subclass(name: impl Into<String>, base: &Rc<ScriptType>) -> Self {
        let ty = ScriptType::new(name, base.family);
        *ty.base.borrow_mut() = Some(base.clone());
        ty
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Append a class-body member, in declaration order.
    pub fn with_member(self, name: impl Into<String>, value: ScriptValue) -> Self {
        self.members.borrow_mut().push((name.into(), value));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> TypeFamily {
        self.family
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn base(&self) -> Option<Rc<ScriptType>> {
        self.base.borrow().clone()
    }

    pub fn set_base(&self, base: Option<Rc<ScriptType>>) {
        *self.base.borrow_mut() = base;
    }

    /// Members declared directly on this type.
    pub fn own_members(&self) -> Vec<(String, ScriptValue)> {
        self.members.borrow().clone()
    }

    pub fn set_member(&self, name: &str, value: ScriptValue) {
        let mut members = self.members.borrow_mut();
        match members.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => members.push((name.to_string(), value)),
        }
    }

    /// Member lookup through the base chain.
    pub fn find_member(&self, name: &str) -> Option<ScriptValue> {
        if let Some((_, v)) = self.members.borrow().iter().find(|(n, _)| n == name) {
            return Some(v.clone());
        }
        self.base().and_then(|b| b.find_member(name))
    }

    pub fn native(&self) -> Option<TypeHandle> {
        self.native.get()
    }

    pub fn set_native(&self, handle: Option<TypeHandle>) {
        self.native.set(handle);
    }

    pub fn descriptors(&self) -> Ref<'_, TypeDescriptors> {
        self.descriptors.borrow()
    }

    pub fn set_descriptors(&self, descriptors: TypeDescriptors) {
        *self.descriptors.borrow_mut() = descriptors;
    }

    pub fn find_property_descriptor(&self, name: &str) -> Option<PropertyDescriptor> {
        if let Some(d) = self.descriptors.borrow().properties.iter().find(|d| d.name == name) {
            return Some(d.clone());
        }
        self.base().and_then(|b| b.find_property_descriptor(name))
    }

    pub fn find_method(&self, name: &str) -> Option<MethodDescriptor> {
        if let Some(d) = self.descriptors.borrow().methods.iter().find(|d| d.name == name) {
            return Some(d.clone());
        }
        self.base().and_then(|b| b.find_method(name))
    }

    /// Property descriptors of this type and its bases, bases first.
    pub fn all_property_descriptors(&self) -> Vec<PropertyDescriptor> {
        let mut out = self.base().map(|b| b.all_property_descriptors()).unwrap_or_default();
        out.extend(self.descriptors.borrow().properties.iter().cloned());
        out
    }

    pub fn is_subtype_of(self: &Rc<Self>, other: &Rc<ScriptType>) -> bool {
        let mut current = Some(self.clone());
        while let Some(ty) = current {
            if Rc::ptr_eq(&ty, other) {
                return true;
            }
            current = ty.base();
        }
        false
    }
}

impl fmt::Debug for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptType")
            .field("name", &self.name)
            .field("family", &self.family)
            .field("native", &self.native.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ubridge_host::PropertyKind;

    #[test]
    fn lookups_walk_the_base_chain() {
        let base = Rc::new(ScriptType::new("Base", TypeFamily::Struct).with_member("x", ScriptValue::Int(1)));
        base.set_descriptors(TypeDescriptors {
            properties: vec![PropertyDescriptor {
                name: "x".into(),
                property: Property::new("x", PropertyKind::Int32),
                getter: None,
                setter: None,
                doc: None,
            }],
            methods: Vec::new(),
        });
        let derived = Rc::new(ScriptType::subclass("Derived", &base));
        assert_eq!(derived.family(), TypeFamily::Struct);
        assert!(derived.find_member("x").is_some());
        assert!(derived.find_property_descriptor("x").is_some());
        assert!(derived.find_method("x").is_none());
        assert!(derived.is_subtype_of(&base));
        assert!(!base.is_subtype_of(&derived));
    }

    #[test]
    fn set_member_replaces_existing() {
        let ty = ScriptType::new("T", TypeFamily::Object).with_member("a", ScriptValue::Int(1));
        ty.set_member("a", ScriptValue::Int(2));
        ty.set_member("b", ScriptValue::Int(3));
        let members = ty.own_members();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].1.as_int(), Some(2));
    }
}
