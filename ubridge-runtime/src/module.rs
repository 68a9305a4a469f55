// Module surface: the free functions a script sees on the bridge module,
// and the registry of script modules that `reload` re-runs.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use ubridge_host::{ClassHandle, ObjectHandle, TypeHandle};

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::generate;
use crate::logging::{LOG_DISPLAY, LOG_ERROR, LOG_WARNING};
use crate::script::{ScriptType, ScriptValue, TypeFamily};

/// Body of a script module: declares and generates its types.
pub type ModuleDefinition = Rc<dyn Fn(&Rc<Bridge>) -> BridgeResult<()>>;

#[derive(Default)]
pub struct ModuleRegistry {
    modules: RefCell<BTreeMap<String, ModuleDefinition>>,
}

impl ModuleRegistry {
    /// Register `definition` under `name`, replacing any earlier one.
    pub fn register(&self, name: impl Into<String>, definition: ModuleDefinition) {
        self.modules.borrow_mut().insert(name.into(), definition);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.modules.borrow().keys().cloned().collect()
    }

    /// Run the module `name` again, then reinstance whatever it regenerated.
    pub fn reload(&self, bridge: &Rc<Bridge>, name: &str) -> BridgeResult<usize> {
        let definition = self
            .modules
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::exception(format!("No module named '{name}'")))?;
        definition(bridge)?;
        let moved = bridge.reinstancer().process_pending(bridge)?;
        crate::blog!(bridge, LOG_DISPLAY, "Reloaded module '{name}'");
        Ok(moved)
    }

    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.modules.borrow_mut());
        drop(dropped);
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

pub fn log(bridge: &Bridge, message: &ScriptValue) {
    crate::blog!(bridge, LOG_DISPLAY, "{message}");
}

pub fn log_warning(bridge: &Bridge, message: &ScriptValue) {
    crate::blog!(bridge, LOG_WARNING, "{message}");
}

pub fn log_error(bridge: &Bridge, message: &ScriptValue) {
    crate::blog!(bridge, LOG_ERROR, "{message}");
}

pub fn log_flush(bridge: &Bridge) {
    bridge.host().log_sink().flush();
}

pub fn reload(bridge: &Rc<Bridge>, name: &str) -> BridgeResult<()> {
    bridge.modules().reload(bridge, name).map(|_| ())
}

// ---------------------------------------------------------------------------
// Find / load
// ---------------------------------------------------------------------------

fn object_arg(value: &ScriptValue, what: &str, expected: &str) -> BridgeResult<ObjectHandle> {
    match value {
        ScriptValue::None => Ok(ObjectHandle::NULL),
        ScriptValue::Object(o) => o.handle(),
        other => Err(BridgeError::type_error(format!(
            "Failed to convert '{what}' ({}) to '{expected}'",
            other.type_name()
        ))),
    }
}

/// The class behind the optional `type` argument; `Object` when omitted.
fn class_arg(bridge: &Bridge, ty: Option<&ScriptValue>) -> BridgeResult<ClassHandle> {
    match ty {
        None | Some(ScriptValue::None) => Ok(bridge.host().root_class()),
        Some(ScriptValue::Type(t)) => match t.native() {
            Some(TypeHandle::Class(c)) => Ok(c),
            _ => Err(BridgeError::type_error(format!("Failed to convert 'type' ({}) to 'Class'", t.name()))),
        },
        Some(other) => {
            Err(BridgeError::type_error(format!("Failed to convert 'type' ({}) to 'Class'", other.type_name())))
        }
    }
}

fn wrap(bridge: &Rc<Bridge>, found: Option<ObjectHandle>) -> BridgeResult<ScriptValue> {
    match found {
        Some(object) => Ok(ScriptValue::Object(bridge.objects().find_or_create(bridge, object)?)),
        None => Ok(ScriptValue::None),
    }
}

/// Find an object by `name` inside `outer` (or by full path when `outer` is
/// `None`) that is a `ty`. `None` when there is no such object.
pub fn find_object(
    bridge: &Rc<Bridge>,
    outer: &ScriptValue,
    name: &str,
    ty: Option<&ScriptValue>,
) -> BridgeResult<ScriptValue> {
    let outer = object_arg(outer, "outer", "Object")?;
    let class = class_arg(bridge, ty)?;
    wrap(bridge, bridge.host().find_object(Some(class), outer, name))
}

/// Like `find_object`, loading the owning package if needed.
pub fn load_object(
    bridge: &Rc<Bridge>,
    outer: &ScriptValue,
    name: &str,
    ty: Option<&ScriptValue>,
) -> BridgeResult<ScriptValue> {
    let outer = object_arg(outer, "outer", "Object")?;
    let class = class_arg(bridge, ty)?;
    wrap(bridge, bridge.host().load_object(Some(class), outer, name))
}

/// Load a class deriving from `ty`, as its script type.
pub fn load_class(
    bridge: &Rc<Bridge>,
    outer: &ScriptValue,
    name: &str,
    ty: Option<&ScriptValue>,
) -> BridgeResult<ScriptValue> {
    let outer = object_arg(outer, "outer", "Object")?;
    let base = class_arg(bridge, ty)?;
    let host = bridge.host();
    match host.load_type(outer, name) {
        Some(TypeHandle::Class(class)) if host.is_child_of(class, base) => {
            Ok(ScriptValue::Type(bridge.types().script_type(host, TypeHandle::Class(class))?))
        }
        _ => Ok(ScriptValue::None),
    }
}

pub fn find_asset(
    bridge: &Rc<Bridge>,
    outer: &ScriptValue,
    name: &str,
    ty: Option<&ScriptValue>,
) -> BridgeResult<ScriptValue> {
    find_or_load_asset(bridge, outer, name, ty, false)
}

pub fn load_asset(
    bridge: &Rc<Bridge>,
    outer: &ScriptValue,
    name: &str,
    ty: Option<&ScriptValue>,
) -> BridgeResult<ScriptValue> {
    find_or_load_asset(bridge, outer, name, ty, true)
}

/// A package resolves to its primary asset (the object named like the
/// package's last path segment). The result must be an asset and a `ty`.
fn find_or_load_asset(
    bridge: &Rc<Bridge>,
    outer: &ScriptValue,
    name: &str,
    ty: Option<&ScriptValue>,
    load: bool,
) -> BridgeResult<ScriptValue> {
    let outer = object_arg(outer, "outer", "Object")?;
    let class = class_arg(bridge, ty)?;
    let host = bridge.host();
    let lookup = |outer: ObjectHandle, name: &str| {
        if load { host.load_object(None, outer, name) } else { host.find_object(None, outer, name) }
    };
    let mut found = lookup(outer, name);
    if let Some(package) = found.filter(|h| host.is_package(*h)) {
        let path = host.path_name(package);
        let short_name = path.rsplit('/').next().unwrap_or(&path).to_string();
        found = lookup(package, &short_name);
    }
    wrap(bridge, found.filter(|h| host.is_asset(*h) && host.is_a(*h, class)))
}

pub fn find_package(bridge: &Rc<Bridge>, outer: &ScriptValue, name: &str) -> BridgeResult<ScriptValue> {
    let outer = object_arg(outer, "outer", "Package")?;
    wrap(bridge, bridge.host().find_package(outer, name))
}

pub fn load_package(bridge: &Rc<Bridge>, outer: &ScriptValue, name: &str) -> BridgeResult<ScriptValue> {
    let outer = object_arg(outer, "outer", "Package")?;
    wrap(bridge, bridge.host().load_package(outer, name))
}

// ---------------------------------------------------------------------------
// Purge
// ---------------------------------------------------------------------------

/// Null every script-visible reference to `obj`, and to the objects inside
/// it unless `include_inners` is false (default from `[gc]` config).
pub fn purge_object_references(
    bridge: &Rc<Bridge>,
    obj: &ScriptValue,
    include_inners: Option<bool>,
) -> BridgeResult<()> {
    let object = match obj {
        ScriptValue::Object(o) => o.handle()?,
        other => {
            return Err(BridgeError::type_error(format!(
                "Failed to convert 'obj' ({}) to 'Object'",
                other.type_name()
            )));
        }
    };
    let include_inners = include_inners.unwrap_or(bridge.config().gc.purge_include_inners_default);
    bridge.collector().purge_object_references(bridge.host(), &[object], include_inners);
    Ok(())
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

fn type_arg<'a>(function: &str, value: &'a ScriptValue) -> BridgeResult<&'a Rc<ScriptType>> {
    match value {
        ScriptValue::Type(ty) => Ok(ty),
        other => Err(BridgeError::type_error(format!(
            "{function}: Parameter must be a 'type' not '{}'",
            other.type_name()
        ))),
    }
}

fn derives_from(ty: &Rc<ScriptType>, base: &Rc<ScriptType>) -> bool {
    ty.is_subtype_of(base)
}

/// Generate a native class for a script type deriving from `Object`. A
/// no-op for types that already have one.
pub fn generate_class(bridge: &Rc<Bridge>, ty: &ScriptValue) -> BridgeResult<()> {
    let ty = type_arg("generate_class", ty)?;
    if ty.family() != TypeFamily::Object || !derives_from(ty, &bridge.types().object_type()) {
        return Err(BridgeError::exception(format!("Type '{}' does not derive from a native class type", ty.name())));
    }
    generate::generate_class(bridge, ty).map_err(|_| {
        BridgeError::exception(format!("Failed to generate a native class for the script type '{}'", ty.name()))
    })?;
    bridge.reinstancer().process_pending(bridge)?;
    Ok(())
}

pub fn generate_struct(bridge: &Rc<Bridge>, ty: &ScriptValue) -> BridgeResult<()> {
    let ty = type_arg("generate_struct", ty)?;
    if ty.family() != TypeFamily::Struct || !derives_from(ty, &bridge.types().struct_base()) {
        return Err(BridgeError::exception(format!("Type '{}' does not derive from a native struct type", ty.name())));
    }
    generate::generate_struct(bridge, ty).map_err(|_| {
        BridgeError::exception(format!("Failed to generate a native struct for the script type '{}'", ty.name()))
    })?;
    bridge.reinstancer().process_pending(bridge)?;
    Ok(())
}

pub fn generate_enum(bridge: &Rc<Bridge>, ty: &ScriptValue) -> BridgeResult<()> {
    let ty = type_arg("generate_enum", ty)?;
    if ty.family() != TypeFamily::Enum || !derives_from(ty, &bridge.types().enum_base()) {
        return Err(BridgeError::exception(format!("Type '{}' does not derive from the native enum type", ty.name())));
    }
    generate::generate_enum(bridge, ty).map_err(|_| {
        BridgeError::exception(format!("Failed to generate a native enum for the script type '{}'", ty.name()))
    })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Localized text
// ---------------------------------------------------------------------------

/// Text from a localization namespace and key, falling back to `source`.
pub fn localized_text(bridge: &Bridge, namespace: &str, key: &str, source: &str) -> ScriptValue {
    ScriptValue::Text(bridge.host().localized_text(namespace, key, source))
}

/// Text from a registered string table.
pub fn string_table_text(bridge: &Bridge, table_id: &str, key: &str) -> ScriptValue {
    ScriptValue::Text(bridge.host().string_table_text(table_id, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::defs::{PropertyDef, TypeRef, ValueDef};
    use crate::object_wrapper::ObjectWrapper;
    use std::cell::Cell;
    use ubridge_host::{ClassDef, Host, Metadata, MISSING_STRING_TABLE_ENTRY};

    fn bridge() -> Rc<Bridge> {
        Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap()
    }

    #[test]
    fn log_functions_use_the_bridge_category() {
        let bridge = bridge();
        log(&bridge, &ScriptValue::str("hello"));
        log_warning(&bridge, &ScriptValue::Int(3));
        log_error(&bridge, &ScriptValue::None);
        log_flush(&bridge);
        let records = bridge.host().log_sink().records();
        let tail: Vec<(u8, &str)> =
            records.iter().rev().take(3).rev().map(|r| (r.verbosity, r.message.as_str())).collect();
        assert_eq!(tail, vec![(LOG_DISPLAY, "hello"), (LOG_WARNING, "3"), (LOG_ERROR, "None")]);
        assert!(records.iter().all(|r| r.category == "LogScript"));
        assert_eq!(bridge.host().log_sink().pending(), 0);
    }

    #[test]
    fn find_object_filters_by_type() {
        let bridge = bridge();
        let host = bridge.host();
        let package = host.create_package("/Game/Level");
        let actor = host.add_class(ClassDef::new("Actor", package, Some(host.root_class()))).unwrap();
        host.new_object(actor, package, Some("Hero")).unwrap();
        let actor_type = ScriptValue::Type(bridge.types().script_type(host, TypeHandle::Class(actor)).unwrap());

        let found = find_object(&bridge, &ScriptValue::None, "/Game/Level.Hero", Some(&actor_type)).unwrap();
        let ScriptValue::Object(hero) = found else { panic!("not found") };
        assert_eq!(hero.path_name(), "/Game/Level.Hero");

        let package_type = ScriptValue::Type(
            bridge.types().script_type(host, TypeHandle::Class(host.package_class())).unwrap(),
        );
        assert!(find_object(&bridge, &ScriptValue::None, "/Game/Level.Hero", Some(&package_type)).unwrap().is_none());
        assert_eq!(
            find_object(&bridge, &ScriptValue::Int(1), "Hero", None).unwrap_err().message(),
            "Failed to convert 'outer' (int) to 'Object'"
        );
    }

    #[test]
    fn assets_resolve_through_their_package() {
        let bridge = bridge();
        let host = bridge.host();
        let package = host.create_package("/Game/Props/Crate");
        let asset = host
            .new_object_with_flags(host.root_class(), package, Some("Crate"), ubridge_host::RF_PUBLIC)
            .unwrap();
        let ScriptValue::Object(found) = find_asset(&bridge, &ScriptValue::None, "/Game/Props/Crate", None).unwrap()
        else {
            panic!("asset not found");
        };
        assert_eq!(found.handle().unwrap(), asset);
        assert!(!find_package(&bridge, &ScriptValue::None, "/Game/Props/Crate").unwrap().is_none());
        assert!(find_asset(&bridge, &ScriptValue::None, "/Game/Props/Missing", None).unwrap().is_none());
    }

    #[test]
    fn load_class_checks_the_base() {
        let bridge = bridge();
        let host = bridge.host();
        let package = host.create_package("/Script/Game");
        let actor = host.add_class(ClassDef::new("Actor", package, Some(host.root_class()))).unwrap();
        let ScriptValue::Type(ty) = load_class(&bridge, &ScriptValue::None, "/Script/Game.Actor", None).unwrap() else {
            panic!("class not loaded");
        };
        assert_eq!(ty.native(), Some(TypeHandle::Class(actor)));
        let package_type = ScriptValue::Type(
            bridge.types().script_type(host, TypeHandle::Class(host.package_class())).unwrap(),
        );
        assert!(load_class(&bridge, &ScriptValue::None, "/Script/Game.Actor", Some(&package_type)).unwrap().is_none());
    }

    #[test]
    fn generate_functions_check_the_type_family() {
        let bridge = bridge();
        let point = Rc::new(
            ScriptType::subclass("Point", &bridge.types().struct_base())
                .with_member("X", PropertyDef::new(TypeRef::Int).into()),
        );
        let err = generate_class(&bridge, &ScriptValue::Type(point.clone())).unwrap_err();
        assert_eq!(err.kind_name(), "Exception");
        assert_eq!(err.message(), "Type 'Point' does not derive from a native class type");
        generate_struct(&bridge, &ScriptValue::Type(point.clone())).unwrap();
        generate_struct(&bridge, &ScriptValue::Type(point.clone())).unwrap();
        assert!(point.native().is_some());

        let bad = Rc::new(
            ScriptType::subclass("Bad", &bridge.types().enum_base())
                .with_member("A", ValueDef::new(ScriptValue::str("a"), Metadata::new()).unwrap().into()),
        );
        assert_eq!(
            generate_enum(&bridge, &ScriptValue::Type(bad)).unwrap_err().message(),
            "Failed to generate a native enum for the script type 'Bad'"
        );
        assert_eq!(
            generate_enum(&bridge, &ScriptValue::Int(0)).unwrap_err().message(),
            "generate_enum: Parameter must be a 'type' not 'int'"
        );
    }

    #[test]
    fn reload_regenerates_and_reinstances() {
        let bridge = bridge();
        let version = Rc::new(Cell::new(1));
        let current = version.clone();
        let definition: ModuleDefinition = Rc::new(move |bridge: &Rc<Bridge>| {
            let mut ty = ScriptType::subclass("Door", &bridge.types().object_type())
                .with_member("Open", PropertyDef::new(TypeRef::Bool).into());
            if current.get() > 1 {
                ty = ty.with_member("Locked", PropertyDef::new(TypeRef::Bool).into());
            }
            generate_class(bridge, &ScriptValue::Type(Rc::new(ty)))
        });
        bridge.modules().register("doors", definition);
        reload(&bridge, "doors").unwrap();

        let door_type = bridge.types().find_by_name("Door").unwrap();
        let door = ObjectWrapper::construct(&bridge, &door_type, None, None).unwrap();
        door.set_attr("Open", &ScriptValue::Bool(true)).unwrap();

        version.set(2);
        reload(&bridge, "doors").unwrap();
        assert!(door.get_attr("Open").unwrap().truthy().unwrap());
        assert!(!door.get_attr("Locked").unwrap().truthy().unwrap());

        assert_eq!(reload(&bridge, "windows").unwrap_err().message(), "No module named 'windows'");
    }

    #[test]
    fn purge_uses_the_configured_default() {
        let bridge = bridge();
        let host = bridge.host();
        let package = host.create_package("/Game/Purge");
        let object = host.new_object(host.root_class(), package, Some("Doomed")).unwrap();
        let wrapper = bridge.objects().find_or_create(&bridge, object).unwrap();
        purge_object_references(&bridge, &ScriptValue::Object(wrapper.clone()), None).unwrap();
        assert_eq!(wrapper.handle().unwrap_err(), BridgeError::null_internal("ObjectInstance"));
        assert!(purge_object_references(&bridge, &ScriptValue::None, Some(false)).is_err());
    }

    #[test]
    fn text_constructors() {
        let bridge = bridge();
        bridge.host().register_string_table("UI", [("Play".to_string(), "Play Now".to_string())]);
        assert_eq!(localized_text(&bridge, "Menu", "Quit", "Quit Game").to_string(), "Quit Game");
        assert_eq!(string_table_text(&bridge, "UI", "Play").to_string(), "Play Now");
        assert_eq!(string_table_text(&bridge, "UI", "Nope").to_string(), MISSING_STRING_TABLE_ENTRY);
    }
}
