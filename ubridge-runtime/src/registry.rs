// Script <-> native type registry.
//
// Every native class, struct and enum a script touches gets exactly one
// ScriptType, built lazily from the host records on first use (bases
// first) or registered by the generator when the script authored it. The
// native -> script direction lives here; script -> native is the handle
// stamped on the ScriptType itself.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ubridge_host::{FunctionDef, Host, Property, TypeHandle, FUNC_STATIC};

use crate::error::BridgeResult;
use crate::script::{MethodDescriptor, PropertyDescriptor, ScriptType, TypeDescriptors, TypeFamily};

pub const GETTER_METADATA: &str = "BlueprintGetter";
pub const SETTER_METADATA: &str = "BlueprintSetter";
pub const TOOLTIP_METADATA: &str = "ToolTip";

pub struct TypeRegistry {
    by_native: RefCell<HashMap<TypeHandle, Rc<ScriptType>>>,
    object_type: Rc<ScriptType>,
    struct_base: Rc<ScriptType>,
    enum_base: Rc<ScriptType>,
}

impl TypeRegistry {
    pub fn new(host: &Host) -> Self {
        let root = TypeHandle::Class(host.root_class());
        let object_type = Rc::new(ScriptType::new("Object", TypeFamily::Object));
        object_type.set_native(Some(root));
        let mut by_native = HashMap::new();
        by_native.insert(root, object_type.clone());
        TypeRegistry {
            by_native: RefCell::new(by_native),
            object_type,
            struct_base: Rc::new(ScriptType::new("StructBase", TypeFamily::Struct)),
            enum_base: Rc::new(ScriptType::new("EnumBase", TypeFamily::Enum)),
        }
    }

    /// Script type of the root `Object` class.
    pub fn object_type(&self) -> Rc<ScriptType> {
        self.object_type.clone()
    }

    /// Script-only base of every struct type.
    pub fn struct_base(&self) -> Rc<ScriptType> {
        self.struct_base.clone()
    }

    /// Script-only base of every enum type.
    pub fn enum_base(&self) -> Rc<ScriptType> {
        self.enum_base.clone()
    }

    /// Bind `ty` to `native` in both directions.
    pub fn register(&self, native: TypeHandle, ty: &Rc<ScriptType>) {
        ty.set_native(Some(native));
        self.by_native.borrow_mut().insert(native, ty.clone());
    }

    pub fn unregister(&self, native: TypeHandle) -> Option<Rc<ScriptType>> {
        self.by_native.borrow_mut().remove(&native)
    }

    pub fn get(&self, native: TypeHandle) -> Option<Rc<ScriptType>> {
        self.by_native.borrow().get(&native).cloned()
    }

    /// Registered type whose script name is `name`.
    pub fn find_by_name(&self, name: &str) -> Option<Rc<ScriptType>> {
        self.by_native.borrow().values().find(|ty| ty.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_native.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registration except the root object type.
    pub fn clear(&self) {
        let root = self.object_type.native();
        let dropped: Vec<Rc<ScriptType>> = {
            let mut by_native = self.by_native.borrow_mut();
            let keys: Vec<TypeHandle> = by_native.keys().copied().filter(|k| Some(*k) != root).collect();
            keys.iter().filter_map(|k| by_native.remove(k)).collect()
        };
        drop(dropped);
    }

    /// The script type for `native`, building it (and its bases) from the
    /// host records if no script type is bound yet.
    pub fn script_type(&self, host: &Host, native: TypeHandle) -> BridgeResult<Rc<ScriptType>> {
        if let Some(existing) = self.get(native) {
            return Ok(existing);
        }
        let ty = match native {
            TypeHandle::Class(c) => {
                let (name, super_class, properties, functions) = {
                    let def = host.class_def(c)?;
                    (def.header.name.clone(), def.super_class, def.properties.clone(), def.functions.clone())
                };
                let base = match super_class {
                    Some(s) => self.script_type(host, TypeHandle::Class(s))?,
                    None => self.object_type.clone(),
                };
                let ty = ScriptType::subclass(name, &base);
                ty.set_descriptors(build_descriptors(&properties, &functions));
                ty
            }
            TypeHandle::Struct(s) => {
                let (name, super_struct, properties) = {
                    let def = host.struct_def(s)?;
                    (def.header.name.clone(), def.super_struct, def.properties.clone())
                };
                let base = match super_struct {
                    Some(parent) => self.script_type(host, TypeHandle::Struct(parent))?,
                    None => self.struct_base.clone(),
                };
                let ty = ScriptType::subclass(name, &base);
                ty.set_descriptors(build_descriptors(&properties, &[]));
                ty
            }
            TypeHandle::Enum(e) => ScriptType::subclass(host.enum_def(e)?.header.name.clone(), &self.enum_base),
        };
        let ty = Rc::new(ty);
        self.register(native, &ty);
        Ok(ty)
    }
}

/// Attribute descriptors for a type's own properties and functions.
///
/// A property with a getter or setter also gets a raw `_name` descriptor
/// that bypasses them. Functions used as getters or setters are hidden.
pub fn build_descriptors(properties: &[Property], functions: &[FunctionDef]) -> TypeDescriptors {
    let mut descriptors = TypeDescriptors::default();
    for prop in properties {
        let accessor = |key: &str| prop.metadata(key).filter(|name| !name.is_empty()).map(str::to_string);
        let getter = accessor(GETTER_METADATA);
        let setter = accessor(SETTER_METADATA);
        let doc = prop.metadata(TOOLTIP_METADATA).map(str::to_string);
        if getter.is_some() || setter.is_some() {
            descriptors.properties.push(PropertyDescriptor {
                name: format!("_{}", prop.name),
                property: prop.clone(),
                getter: None,
                setter: None,
                doc: doc.clone(),
            });
        }
        descriptors.properties.push(PropertyDescriptor { name: prop.name.clone(), property: prop.clone(), getter, setter, doc });
    }
    for func in functions {
        if func.metadata.contains_key(GETTER_METADATA) || func.metadata.contains_key(SETTER_METADATA) {
            continue;
        }
        descriptors.methods.push(MethodDescriptor {
            name: func.name.clone(),
            is_static: func.has_any_flags(FUNC_STATIC),
            doc: func.metadata.get(TOOLTIP_METADATA).cloned(),
        });
    }
    descriptors
}

#[cfg(test)]
mod tests {
    use super::*;
    use ubridge_host::{ClassDef, EnumDef, PropertyKind, StructDef};

    #[test]
    fn native_types_are_built_once_with_their_bases() {
        let host = Host::new();
        let registry = TypeRegistry::new(&host);
        let package = host.create_package("/Game/Types");
        let base = host.add_class(ClassDef::new("Actor", package, Some(host.root_class()))).unwrap();
        let derived = host.add_class(ClassDef::new("Pawn", package, Some(base))).unwrap();

        let pawn = registry.script_type(&host, TypeHandle::Class(derived)).unwrap();
        let actor = registry.script_type(&host, TypeHandle::Class(base)).unwrap();
        assert!(Rc::ptr_eq(&pawn.base().unwrap(), &actor));
        assert!(pawn.is_subtype_of(&registry.object_type()));
        assert!(Rc::ptr_eq(&pawn, &registry.script_type(&host, TypeHandle::Class(derived)).unwrap()));
        assert_eq!(pawn.native(), Some(TypeHandle::Class(derived)));
    }

    #[test]
    fn structs_and_enums_hang_off_script_bases() {
        let host = Host::new();
        let registry = TypeRegistry::new(&host);
        let package = host.create_package("/Game/Types");
        let s = host.add_struct(StructDef::new("Pair", package, None)).unwrap();
        let e = host.add_enum(EnumDef::new("Mode", package)).unwrap();
        let pair = registry.script_type(&host, TypeHandle::Struct(s)).unwrap();
        let mode = registry.script_type(&host, TypeHandle::Enum(e)).unwrap();
        assert!(pair.is_subtype_of(&registry.struct_base()));
        assert!(mode.is_subtype_of(&registry.enum_base()));
        assert_eq!(registry.find_by_name("Mode").map(|t| t.family()), Some(TypeFamily::Enum));
    }

    #[test]
    fn accessors_add_raw_descriptors_and_hide_functions() {
        let mut health = Property::new("Health", PropertyKind::Int32);
        health.set_metadata(GETTER_METADATA, "GetHealth");
        let mut getter = FunctionDef::new("GetHealth");
        getter.metadata.insert(GETTER_METADATA.to_string(), String::new());
        let mut heal = FunctionDef::new("Heal");
        heal.flags = FUNC_STATIC;

        let descriptors = build_descriptors(&[health], &[getter, heal]);
        let names: Vec<&str> = descriptors.properties.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["_Health", "Health"]);
        assert_eq!(descriptors.properties[1].getter.as_deref(), Some("GetHealth"));
        assert_eq!(descriptors.methods.len(), 1);
        assert!(descriptors.methods[0].is_static);
    }

    #[test]
    fn clear_keeps_the_root_type() {
        let host = Host::new();
        let registry = TypeRegistry::new(&host);
        let package = host.create_package("/Game/Types");
        let s = host.add_struct(StructDef::new("Pair", package, None)).unwrap();
        registry.script_type(&host, TypeHandle::Struct(s)).unwrap();
        assert_eq!(registry.len(), 2);
        registry.clear();
        assert_eq!(registry.len(), 1);
        assert!(registry.get(TypeHandle::Class(host.root_class())).is_some());
    }
}
