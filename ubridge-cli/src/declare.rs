// Turns manifest declarations into script types and generates their native
// twins. Enums go first, then structs, then classes, each in file order, so
// a declaration may refer to anything declared before it.

use std::collections::HashMap;
use std::rc::Rc;

use ubridge_host::{Metadata, TypeHandle};
use ubridge_runtime::{
    generate_class, generate_enum, generate_struct, Bridge, BridgeError, BridgeResult, FunctionDef, PropertyDef,
    ScriptFunction, ScriptParam, ScriptType, ScriptValue, TypeRef, ValueDef,
};

use crate::manifest::{ClassDecl, EnumDecl, FunctionDecl, MetaTable, PropertyDecl, ReturnDecl, StructDecl, TypesManifest};

/// Declared script types by name, resolved before the bridge registry.
#[derive(Default)]
struct Declared {
    types: HashMap<String, Rc<ScriptType>>,
}

impl Declared {
    fn resolve(&self, bridge: &Bridge, name: &str) -> Option<Rc<ScriptType>> {
        self.types.get(name).cloned().or_else(|| bridge.types().find_by_name(name))
    }

    fn type_ref(&self, bridge: &Bridge, text: &str, owner: &str, member: &str) -> BridgeResult<TypeRef> {
        TypeRef::parse(text, &|name| self.resolve(bridge, name))
            .ok_or_else(|| BridgeError::type_error(format!("Unknown type '{text}' for '{owner}.{member}'")))
    }
}

/// Generate everything in `manifest`. Returns the native handles in
/// generation order.
pub fn generate_manifest(bridge: &Rc<Bridge>, manifest: &TypesManifest) -> BridgeResult<Vec<TypeHandle>> {
    let mut declared = Declared::default();
    let mut handles = Vec::with_capacity(manifest.type_count());

    for decl in &manifest.enums {
        let ty = enum_type(bridge, decl)?;
        handles.push(TypeHandle::Enum(generate_enum(bridge, &ty)?));
        declared.types.insert(decl.name.clone(), ty);
    }
    for decl in &manifest.structs {
        let ty = struct_type(bridge, &declared, decl)?;
        handles.push(TypeHandle::Struct(generate_struct(bridge, &ty)?));
        declared.types.insert(decl.name.clone(), ty);
    }
    for decl in &manifest.classes {
        let ty = class_type(bridge, &declared, decl)?;
        handles.push(TypeHandle::Class(generate_class(bridge, &ty)?));
        declared.types.insert(decl.name.clone(), ty);
    }

    bridge.reinstancer().process_pending(bridge)?;
    Ok(handles)
}

fn with_doc(ty: ScriptType, doc: &Option<String>) -> ScriptType {
    match doc {
        Some(doc) => ty.with_doc(doc.clone()),
        None => ty,
    }
}

fn metadata(table: &MetaTable) -> Metadata {
    table.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn enum_type(bridge: &Bridge, decl: &EnumDecl) -> BridgeResult<Rc<ScriptType>> {
    let mut ty = with_doc(ScriptType::subclass(&decl.name, &bridge.types().enum_base()), &decl.doc);
    for value in &decl.values {
        let def = ValueDef::new(script_value(&value.value)?, metadata(&value.meta))?;
        ty = ty.with_member(&value.name, def.into());
    }
    Ok(Rc::new(ty))
}

fn struct_type(bridge: &Bridge, declared: &Declared, decl: &StructDecl) -> BridgeResult<Rc<ScriptType>> {
    let base = match &decl.base {
        Some(name) => declared
            .resolve(bridge, name)
            .ok_or_else(|| BridgeError::type_error(format!("Unknown base struct '{name}' for '{}'", decl.name)))?,
        None => bridge.types().struct_base(),
    };
    let mut ty = with_doc(ScriptType::subclass(&decl.name, &base), &decl.doc);
    for prop in &decl.properties {
        ty = ty.with_member(&prop.name, property_def(bridge, declared, &decl.name, prop)?.into());
    }
    Ok(Rc::new(ty))
}

fn class_type(bridge: &Bridge, declared: &Declared, decl: &ClassDecl) -> BridgeResult<Rc<ScriptType>> {
    let base = if decl.base == "Object" {
        bridge.types().object_type()
    } else {
        declared
            .resolve(bridge, &decl.base)
            .ok_or_else(|| BridgeError::type_error(format!("Unknown base class '{}' for '{}'", decl.base, decl.name)))?
    };
    let mut ty = with_doc(ScriptType::subclass(&decl.name, &base), &decl.doc);
    for prop in &decl.properties {
        ty = ty.with_member(&prop.name, property_def(bridge, declared, &decl.name, prop)?.into());
    }
    for func in &decl.functions {
        ty = ty.with_member(&func.name, function_def(bridge, declared, &decl.name, func)?.into());
    }
    Ok(Rc::new(ty))
}

fn property_def(bridge: &Bridge, declared: &Declared, owner: &str, decl: &PropertyDecl) -> BridgeResult<PropertyDef> {
    let mut def = PropertyDef::new(declared.type_ref(bridge, &decl.ty, owner, &decl.name)?);
    def.meta = metadata(&decl.meta);
    def.getter = decl.getter.clone();
    def.setter = decl.setter.clone();
    Ok(def)
}

/// The script body of a manifest function ignores its arguments and returns
/// the declared `result`, or `None`.
fn function_def(bridge: &Bridge, declared: &Declared, owner: &str, decl: &FunctionDecl) -> BridgeResult<FunctionDef> {
    let mut params = Vec::with_capacity(decl.params.len() + 1);
    if !decl.is_static {
        params.push(ScriptParam::new("self"));
    }
    let mut param_types = Vec::with_capacity(decl.params.len());
    for param in &decl.params {
        params.push(match &param.default {
            Some(default) => ScriptParam::with_default(&param.name, script_value(default)?),
            None => ScriptParam::new(&param.name),
        });
        param_types.push(declared.type_ref(bridge, &param.ty, owner, &decl.name)?);
    }

    let result = decl.result.as_ref().map(script_value).transpose()?.unwrap_or(ScriptValue::None);
    let mut func = ScriptFunction::new(&decl.name, params, move |_| Ok(result.clone()));
    if let Some(doc) = &decl.doc {
        func = func.with_doc(doc.clone());
    }

    let mut def = FunctionDef::new(Rc::new(func)).with_params(param_types);
    def.meta = metadata(&decl.meta);
    def = match &decl.ret {
        Some(ReturnDecl::Single(ret)) => def.returns(declared.type_ref(bridge, ret, owner, &decl.name)?),
        Some(ReturnDecl::Tuple(outs)) => def.returns_tuple(
            outs.iter()
                .map(|out| declared.type_ref(bridge, out, owner, &decl.name))
                .collect::<BridgeResult<Vec<_>>>()?,
        ),
        None => def,
    };
    def.is_override = decl.is_override;
    def.is_static = decl.is_static;
    def.pure = decl.pure;
    def.getter = decl.getter;
    def.setter = decl.setter;
    Ok(def)
}

/// Manifest literals: integers, floats, booleans, strings, and arrays as
/// tuples.
fn script_value(value: &toml::Value) -> BridgeResult<ScriptValue> {
    Ok(match value {
        toml::Value::Integer(i) => ScriptValue::Int(*i),
        toml::Value::Float(f) => ScriptValue::Float(*f),
        toml::Value::Boolean(b) => ScriptValue::Bool(*b),
        toml::Value::String(s) => ScriptValue::str(s.as_str()),
        toml::Value::Array(items) => ScriptValue::tuple(items.iter().map(script_value).collect::<BridgeResult<_>>()?),
        other => {
            return Err(BridgeError::type_error(format!("Unsupported manifest value '{other}'")));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ubridge_host::Host;
    use ubridge_runtime::{BridgeConfig, ObjectWrapper, ScriptDict};

    fn bridge() -> Rc<Bridge> {
        Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap()
    }

    const GAME: &str = r#"
        [[enum]]
        name = "Difficulty"
        values = [{ name = "Easy", value = 0 }, { name = "Hard", value = 2 }]

        [[struct]]
        name = "Loot"
        properties = [{ name = "Gold", type = "int" }, { name = "Where", type = "Vector" }]

        [[class]]
        name = "Hero"
        properties = [{ name = "Mode", type = "Difficulty" }, { name = "Bag", type = "Array(Loot)" }]

        [[class.functions]]
        name = "Score"
        params = [{ name = "bonus", type = "int", default = 5 }]
        ret = "int"
        result = 42

        [[class]]
        name = "Paladin"
        base = "Hero"
    "#;

    #[test]
    fn generates_every_declaration_in_order() {
        let bridge = bridge();
        let manifest = TypesManifest::from_toml_str(GAME).unwrap();
        let handles = generate_manifest(&bridge, &manifest).unwrap();
        assert_eq!(handles.len(), 4);
        assert!(matches!(handles[0], TypeHandle::Enum(_)));
        assert!(matches!(handles[1], TypeHandle::Struct(_)));

        let host = bridge.host();
        let (TypeHandle::Class(hero), TypeHandle::Class(paladin)) = (handles[2], handles[3]) else {
            panic!("expected two classes");
        };
        assert_eq!(host.super_class(paladin), Some(hero));
        let (_, score) = host.find_function(paladin, "Score").unwrap();
        assert_eq!(score.metadata.get("CPP_Default_bonus").map(String::as_str), Some("5"));

        let ty = bridge.types().get(TypeHandle::Class(paladin)).unwrap();
        let paladin = ObjectWrapper::construct(&bridge, &ty, None, None).unwrap();
        assert_eq!(paladin.call_method("Score", &[], &ScriptDict::new()).unwrap().as_int(), Some(42));
    }

    #[test]
    fn unknown_types_name_the_member() {
        let bridge = bridge();
        let manifest = TypesManifest::from_toml_str(
            "[[struct]]\nname = \"Broken\"\nproperties = [{ name = \"Thing\", type = \"Map(str, Nope)\" }]\n",
        )
        .unwrap();
        let err = generate_manifest(&bridge, &manifest).unwrap_err();
        assert_eq!(err.message(), "Unknown type 'Map(str, Nope)' for 'Broken.Thing'");
    }

    #[test]
    fn generation_errors_stop_the_run() {
        let bridge = bridge();
        let manifest = TypesManifest::from_toml_str(
            "[[enum]]\nname = \"Bad\"\nvalues = [{ name = \"A\", value = \"a\" }]\n",
        )
        .unwrap();
        let err = generate_manifest(&bridge, &manifest).unwrap_err();
        assert_eq!(err.message(), "Enum value 'A' must be an integer");
    }
}
