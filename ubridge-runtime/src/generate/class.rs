// Class generation. Script functions become native functions whose thunk
// calls back into script; `_post_init` runs after native construction.

use std::rc::{Rc, Weak};

use ubridge_host::{
    ClassDef, ClassHandle, FunctionDef as NativeFunction, FunctionThunk, Host, HostError, NativeValue, ObjectHandle,
    PostInitHook, Property, PropertyKind, TypeHandle, CLASS_NATIVE, CLASS_NEWER_VERSION_EXISTS, CPF_OUT_PARM, CPF_PARM,
    CPF_RETURN_PARM, FUNC_BLUEPRINT_CALLABLE, FUNC_BLUEPRINT_EVENT, FUNC_BLUEPRINT_PURE, FUNC_EVENT, FUNC_HAS_DEFAULTS,
    FUNC_HAS_OUT_PARMS, FUNC_NATIVE, FUNC_PUBLIC, FUNC_STATIC,
};

use super::{base_collision, declared_property, generation_error, install, logged, BLUEPRINT_TYPE_METADATA};
use crate::bridge::Bridge;
use crate::defs::{FunctionDef, MemberDef, PropertyDef, ReturnType};
use crate::error::{BridgeError, BridgeResult};
use crate::guard::host_boundary;
use crate::logging::{LOG_DISPLAY, LOG_ERROR};
use crate::registry::{build_descriptors, GETTER_METADATA, SETTER_METADATA, TOOLTIP_METADATA};
use crate::script::{ScriptFunction, ScriptType, ScriptValue, TypeDescriptors, TypeFamily};

/// Member called on every new instance of a generated class.
pub const POST_INIT_FUNCTION: &str = "_post_init";

/// Generate a native class for `ty`. A no-op returning the bound class when
/// `ty` already has one.
pub fn generate_class(bridge: &Rc<Bridge>, ty: &Rc<ScriptType>) -> BridgeResult<ClassHandle> {
    if let Some(TypeHandle::Class(existing)) = ty.native() {
        return Ok(existing);
    }
    logged(bridge, ty, build_class(bridge, ty))
}

fn build_class(bridge: &Rc<Bridge>, ty: &Rc<ScriptType>) -> BridgeResult<ClassHandle> {
    if ty.family() != TypeFamily::Object {
        return Err(BridgeError::type_error(format!("Type '{}' does not derive from a native class type", ty.name())));
    }
    let Some(TypeHandle::Class(super_class)) = ty.base().and_then(|base| base.native()) else {
        return Err(generation_error("No super class could be found for this script type"));
    };

    let mut def = ClassDef::new(ty.name(), bridge.type_container(), Some(super_class));
    def.header.metadata.insert(BLUEPRINT_TYPE_METADATA.to_string(), "true".to_string());
    if let Some(doc) = ty.doc() {
        def.header.metadata.insert(TOOLTIP_METADATA.to_string(), doc.to_string());
    }
    let mut script_functions = Vec::new();
    for (field, member) in ty.own_members() {
        let ScriptValue::Def(member) = member else {
            continue;
        };
        match &*member {
            MemberDef::Value(_) => return Err(generation_error("Classes do not support values")),
            MemberDef::Property(prop) => def.properties.push(class_property(bridge.host(), super_class, &field, prop)?),
            MemberDef::Function(func) => {
                def.functions.push(class_function(bridge, super_class, &field, func)?);
                script_functions.push((field, func.func.clone()));
            }
        }
    }
    def.post_init = Some(post_init_hook(bridge.weak()));

    let descriptors = build_descriptors(&def.properties, &def.functions);
    let (class, superseded) = install(bridge, ty.name(), |host| host.add_class(def))?;
    finalize(bridge, ty, class, descriptors);
    for (field, func) in script_functions {
        ty.set_member(&field, ScriptValue::Function(func));
    }

    if let Some(TypeHandle::Class(old)) = superseded {
        bridge.reinstancer().add_pending_class(old, class);
        reparent_derived_classes(bridge, old, class)?;
    }
    Ok(class)
}

/// Bind the installed class and its script type in both directions.
fn finalize(bridge: &Bridge, ty: &Rc<ScriptType>, class: ClassHandle, descriptors: TypeDescriptors) {
    bridge.types().register(TypeHandle::Class(class), ty);
    ty.set_descriptors(descriptors);
    crate::blog!(bridge, LOG_DISPLAY, "Generated class '{}'", bridge.host().type_path(TypeHandle::Class(class)));
}

fn class_property(host: &Host, super_class: ClassHandle, field: &str, def: &PropertyDef) -> BridgeResult<Property> {
    if host.find_class_property(super_class, field).is_some() {
        return Err(base_collision(field, def));
    }
    let mut prop = declared_property(host, field, def)?;
    if let Some(getter) = &def.getter {
        prop.set_metadata(GETTER_METADATA, getter.clone());
    }
    if let Some(setter) = &def.setter {
        prop.set_metadata(SETTER_METADATA, setter.clone());
    }
    Ok(prop)
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

fn class_function(
    bridge: &Rc<Bridge>,
    super_class: ClassHandle,
    field: &str,
    def: &FunctionDef,
) -> BridgeResult<NativeFunction> {
    def.validate(field)?;
    let host = bridge.host();
    let super_func = host.find_function(super_class, field).map(|(_, f)| f);
    if super_func.is_some() && !def.is_override {
        return Err(generation_error(format!(
            "Method '{field}' cannot override a method from the base type (did you forget to specify 'override=True'?)"
        )));
    }
    if def.is_override {
        match &super_func {
            None => {
                return Err(generation_error(format!(
                    "Method '{field}' was set to 'override', but no method was found to override"
                )));
            }
            Some(f) if !f.has_any_flags(FUNC_BLUEPRINT_EVENT) => {
                return Err(generation_error(format!(
                    "Method '{field}' was set to 'override', but the method found to override was not a blueprint event"
                )));
            }
            Some(_) => {}
        }
    }

    let mut func = match &super_func {
        Some(overridden) => NativeFunction { thunk: None, ..overridden.clone() },
        None => {
            let mut func = NativeFunction::new(field);
            func.flags |= FUNC_PUBLIC;
            func
        }
    };
    if def.is_static {
        func.flags |= FUNC_STATIC;
    }
    match def.pure {
        Some(true) => func.flags |= FUNC_BLUEPRINT_PURE,
        Some(false) => func.flags &= !FUNC_BLUEPRINT_PURE,
        None => {}
    }
    if def.getter {
        func.metadata.insert(GETTER_METADATA.to_string(), String::new());
    }
    if def.setter {
        func.metadata.insert(SETTER_METADATA.to_string(), String::new());
    }
    func.flags |= FUNC_NATIVE | FUNC_EVENT | FUNC_BLUEPRINT_EVENT | FUNC_BLUEPRINT_CALLABLE;
    for (key, value) in &def.meta {
        func.metadata.insert(key.clone(), value.clone());
    }

    let mut args = def.func.params().to_vec();
    if !func.has_any_flags(FUNC_STATIC) && !args.is_empty() {
        // self
        args.remove(0);
    }

    if super_func.is_none() {
        let types = def.params.clone().unwrap_or_default();
        if types.len() != args.len() {
            return Err(generation_error(format!(
                "Incorrect number of arguments specified for '{field}' (expected {}, got {})",
                types.len(),
                args.len()
            )));
        }
        match &def.ret {
            None => {}
            Some(ReturnType::Value(ret)) => {
                let prop = ret.to_property("ReturnValue").ok_or_else(|| {
                    generation_error(format!(
                        "Failed to create return property ({}) for function '{field}'",
                        ret.friendly_name()
                    ))
                })?;
                func.params.push(prop.with_flags(CPF_PARM | CPF_RETURN_PARM));
            }
            Some(ReturnType::Tuple(outs)) => {
                func.params
                    .push(Property::new("ReturnValue", PropertyKind::Bool).with_flags(CPF_PARM | CPF_RETURN_PARM));
                for (index, out) in outs.iter().enumerate() {
                    let prop = out.to_property(&format!("OutValue{index}")).ok_or_else(|| {
                        generation_error(format!(
                            "Failed to create output property ({}) for function '{field}' at index {index}",
                            out.friendly_name()
                        ))
                    })?;
                    func.params.push(prop.with_flags(CPF_PARM | CPF_OUT_PARM));
                    func.flags |= FUNC_HAS_OUT_PARMS;
                }
            }
        }
        for (arg, ty) in args.iter().zip(&types) {
            let prop = ty.to_property(&arg.name).ok_or_else(|| {
                generation_error(format!(
                    "Failed to create property ({}) for function '{field}' argument '{}'",
                    ty.friendly_name(),
                    arg.name
                ))
            })?;
            func.params.push(prop.with_flags(CPF_PARM));
        }
    }
    for param in &mut func.params {
        host.link_property(param);
    }

    // Script defaults become exported text, like a native default argument.
    let inputs: Vec<Property> = func.input_params().cloned().collect();
    if inputs.len() != args.len() {
        return Err(generation_error(format!(
            "Incorrect number of arguments specified for '{field}' (expected {}, got {})",
            inputs.len(),
            args.len()
        )));
    }
    for (param, arg) in inputs.iter().zip(&args) {
        let Some(default) = &arg.default else {
            continue;
        };
        let native = bridge.to_native(default, param).map_err(|_| {
            generation_error(format!(
                "Failed to convert default value for function '{field}' argument '{}' ({})",
                arg.name,
                param.class_name()
            ))
        })?;
        func.metadata.insert(format!("CPP_Default_{}", param.name), host.export_complete_text(param, &native));
        func.flags |= FUNC_HAS_DEFAULTS;
    }
    if let Some(doc) = def.func.doc().filter(|doc| !doc.is_empty()) {
        func.metadata.insert(TOOLTIP_METADATA.to_string(), doc.to_string());
    }

    func.thunk = Some(script_thunk(
        bridge.weak(),
        def.func.clone(),
        func.params.clone(),
        func.has_any_flags(FUNC_STATIC),
    ));
    Ok(func)
}

/// Native implementation of a generated function: convert the inputs,
/// call the script function, write its result back into the frame.
fn script_thunk(bridge: Weak<Bridge>, func: Rc<ScriptFunction>, params: Vec<Property>, is_static: bool) -> FunctionThunk {
    Rc::new(move |host: &Host, object: ObjectHandle, frame: &mut Vec<NativeValue>| {
        let panicked = Err(HostError::FunctionFailed(format!("'{}' panicked", func.name())));
        host_boundary(host, panicked, || {
            let bridge = bridge
                .upgrade()
                .ok_or_else(|| HostError::FunctionFailed(format!("no script bridge to call '{}'", func.name())))?;
            call_script_function(&bridge, &func, &params, is_static, object, frame).map_err(|err| {
                crate::blog!(bridge, LOG_ERROR, "{err}");
                HostError::FunctionFailed(err.message())
            })
        })
    })
}

fn call_script_function(
    bridge: &Rc<Bridge>,
    func: &ScriptFunction,
    params: &[Property],
    is_static: bool,
    object: ObjectHandle,
    frame: &mut [NativeValue],
) -> BridgeResult<()> {
    let host = bridge.host();
    let owner = if is_static { "None".to_string() } else { host.path_name(object) };
    let context = format!("function '{}' on '{owner}'", func.name());

    let mut args = Vec::with_capacity(params.len() + 1);
    if !is_static {
        args.push(ScriptValue::Object(bridge.objects().find_or_create(bridge, object)?));
    }
    for (param, value) in params.iter().zip(frame.iter()) {
        if !param.is_input_parameter() {
            continue;
        }
        let arg = bridge.to_script(param, value).map_err(|_| {
            BridgeError::type_error(format!(
                "Failed to convert argument at pos '{}' when calling {context}",
                args.len() + usize::from(is_static)
            ))
        })?;
        args.push(arg);
    }
    let result = func.call(&args)?;

    let mut outputs: Vec<usize> = params.iter().position(|p| p.has_any_flags(CPF_RETURN_PARM)).into_iter().collect();
    outputs.extend(
        params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.has_any_flags(CPF_OUT_PARM) && !p.has_any_flags(CPF_RETURN_PARM))
            .map(|(i, _)| i),
    );
    unpack_return_values(bridge, &result, params, &outputs, frame, &context)
}

/// Write a script result into the output slots (return value first).
///
/// With several outputs and a bool return value, `None` means false and
/// leaves the out values at their defaults; anything else means true and
/// holds the out values, packed in a tuple if there are several.
fn unpack_return_values(
    bridge: &Rc<Bridge>,
    result: &ScriptValue,
    params: &[Property],
    outputs: &[usize],
    frame: &mut [NativeValue],
    context: &str,
) -> BridgeResult<()> {
    let Some(&first) = outputs.first() else {
        return Ok(());
    };
    let mut rest = outputs;
    if outputs.len() > 1 && params[first].kind == PropertyKind::Bool {
        frame[first] = NativeValue::Bool(!result.is_none());
        if result.is_none() {
            return Ok(());
        }
        rest = &outputs[1..];
    }
    let convert = |value: &ScriptValue, index: usize| {
        let prop = &params[index];
        bridge.to_native(value, prop).map_err(|err| match err {
            BridgeError::TypeError(_) => BridgeError::type_error(format!(
                "Failed to convert return property '{}' ({}) when calling {context}",
                prop.name,
                prop.class_name()
            )),
            other => other,
        })
    };
    if let [only] = rest {
        frame[*only] = convert(result, *only)?;
        return Ok(());
    }
    let ScriptValue::Tuple(items) = result else {
        return Err(BridgeError::type_error(format!(
            "Expected a 'tuple' return type, but got '{}' when calling {context}",
            result.type_name()
        )));
    };
    if items.len() != rest.len() {
        return Err(BridgeError::type_error(format!(
            "Expected a 'tuple' return type containing '{}' items but got one containing '{}' items when calling {context}",
            rest.len(),
            items.len()
        )));
    }
    for (value, &index) in items.iter().zip(rest) {
        frame[index] = convert(value, index)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Post-init
// ---------------------------------------------------------------------------

fn post_init_hook(bridge: Weak<Bridge>) -> PostInitHook {
    Rc::new(move |host: &Host, object: ObjectHandle| {
        host_boundary(host, (), || {
            let Some(bridge) = bridge.upgrade() else {
                return;
            };
            if let Err(err) = run_post_init(&bridge, object) {
                crate::blog!(bridge, LOG_ERROR, "{err}");
            }
        })
    })
}

fn run_post_init(bridge: &Rc<Bridge>, object: ObjectHandle) -> BridgeResult<()> {
    let wrapper = bridge.objects().find_or_create(bridge, object)?;
    if let Some(ScriptValue::Function(post_init)) = wrapper.script_type().find_member(POST_INIT_FUNCTION) {
        post_init.call(&[ScriptValue::Object(wrapper)])?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reparenting
// ---------------------------------------------------------------------------

/// Regenerate every generated class directly derived from `old_parent` so
/// it derives from `new_parent` instead, copying its members over.
fn reparent_derived_classes(bridge: &Rc<Bridge>, old_parent: ClassHandle, new_parent: ClassHandle) -> BridgeResult<()> {
    let host = bridge.host();
    for derived in host.derived_classes(old_parent) {
        if host.class_def(derived)?.has_any_class_flags(CLASS_NATIVE | CLASS_NEWER_VERSION_EXISTS) {
            continue;
        }
        let Some(ty) = bridge.types().get(TypeHandle::Class(derived)) else {
            continue;
        };
        reparent_class(bridge, &ty, derived, new_parent)?;
    }
    Ok(())
}

fn reparent_class(
    bridge: &Rc<Bridge>,
    ty: &Rc<ScriptType>,
    old_class: ClassHandle,
    new_parent: ClassHandle,
) -> BridgeResult<ClassHandle> {
    let mut def = host_class_copy(bridge.host(), old_class)?;
    def.super_class = Some(new_parent);
    let name = def.header.name.clone();
    let descriptors = build_descriptors(&def.properties, &def.functions);
    let (class, _) = install(bridge, &name, |host| host.add_class(def))?;
    if let Some(parent) = bridge.types().get(TypeHandle::Class(new_parent)) {
        ty.set_base(Some(parent));
    }
    finalize(bridge, ty, class, descriptors);
    bridge.reinstancer().add_pending_class(old_class, class);
    reparent_derived_classes(bridge, old_class, class)?;
    Ok(class)
}

fn host_class_copy(host: &Host, class: ClassHandle) -> BridgeResult<ClassDef> {
    Ok(host.class_def(class)?.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::defs::TypeRef;
    use crate::object_wrapper::ObjectWrapper;
    use crate::script::{ScriptDict, ScriptParam};
    use std::cell::Cell;

    fn bridge() -> Rc<Bridge> {
        Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap()
    }

    fn script_fn(
        name: &str,
        params: &[&str],
        body: impl Fn(&[ScriptValue]) -> BridgeResult<ScriptValue> + 'static,
    ) -> Rc<ScriptFunction> {
        Rc::new(ScriptFunction::new(name, params.iter().map(|p| ScriptParam::new(*p)).collect(), body))
    }

    /// `Hero(Object)` with `Health: int` and `Heal(self, amount=5) -> int`.
    fn hero_type(bridge: &Rc<Bridge>) -> Rc<ScriptType> {
        let heal = Rc::new(
            ScriptFunction::new(
                "Heal",
                vec![ScriptParam::new("self"), ScriptParam::with_default("amount", ScriptValue::Int(5))],
                |args| {
                    let ScriptValue::Object(this) = &args[0] else {
                        return Err(BridgeError::type_error("expected self"));
                    };
                    let health = this.get_attr("Health")?.as_int().unwrap_or(0) + args[1].as_int().unwrap_or(0);
                    this.set_attr("Health", &ScriptValue::Int(health))?;
                    Ok(ScriptValue::Int(health))
                },
            )
            .with_doc("Restore some health."),
        );
        Rc::new(
            ScriptType::subclass("Hero", &bridge.types().object_type())
                .with_member("Health", PropertyDef::new(TypeRef::Int).with_meta("ToolTip", "Hit points").into())
                .with_member(
                    "Heal",
                    FunctionDef::new(heal).returns(TypeRef::Int).with_params(vec![TypeRef::Int]).into(),
                ),
        )
    }

    #[test]
    fn generated_classes_expose_properties_and_functions() {
        let bridge = bridge();
        let ty = hero_type(&bridge);
        let class = generate_class(&bridge, &ty).unwrap();
        let host = bridge.host();
        assert_eq!(host.type_path(TypeHandle::Class(class)), "/Engine/ScriptTypes.Hero");
        assert_eq!(ty.native(), Some(TypeHandle::Class(class)));

        let (_, heal) = host.find_function(class, "Heal").unwrap();
        assert!(heal.has_any_flags(FUNC_PUBLIC | FUNC_NATIVE));
        assert!(heal.has_any_flags(FUNC_HAS_DEFAULTS));
        assert_eq!(heal.metadata.get("CPP_Default_amount").map(String::as_str), Some("5"));
        assert_eq!(heal.metadata.get(TOOLTIP_METADATA).map(String::as_str), Some("Restore some health."));

        let hero = ObjectWrapper::construct(&bridge, &ty, None, None).unwrap();
        hero.set_attr("Health", &ScriptValue::Int(10)).unwrap();
        assert_eq!(hero.call_method("Heal", &[], &ScriptDict::new()).unwrap().as_int(), Some(15));
        assert_eq!(hero.call_method("Heal", &[ScriptValue::Int(1)], &ScriptDict::new()).unwrap().as_int(), Some(16));
        assert_eq!(hero.get_attr("Health").unwrap().as_int(), Some(16));
    }

    #[test]
    fn generation_is_idempotent() {
        let bridge = bridge();
        let ty = hero_type(&bridge);
        let first = generate_class(&bridge, &ty).unwrap();
        assert_eq!(generate_class(&bridge, &ty).unwrap(), first);
        assert_eq!(bridge.host().find_class_in(bridge.type_container(), "Hero_REINST"), None);
    }

    #[test]
    fn tuple_returns_become_out_values() {
        let bridge = bridge();
        let lookup = script_fn("TryFind", &["self", "key"], |args| {
            Ok(match args[1].as_int() {
                Some(0) => ScriptValue::None,
                Some(k) => ScriptValue::tuple(vec![ScriptValue::Int(k * 10), ScriptValue::str("found")]),
                None => ScriptValue::None,
            })
        });
        let ty = Rc::new(ScriptType::subclass("Finder", &bridge.types().object_type()).with_member(
            "TryFind",
            FunctionDef::new(lookup).returns_tuple(vec![TypeRef::Int, TypeRef::Str]).with_params(vec![TypeRef::Int]).into(),
        ));
        let class = generate_class(&bridge, &ty).unwrap();
        let (_, func) = bridge.host().find_function(class, "TryFind").unwrap();
        assert!(func.has_any_flags(FUNC_HAS_OUT_PARMS));
        let names: Vec<&str> = func.output_params().into_iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["ReturnValue", "OutValue0", "OutValue1"]);

        let finder = ObjectWrapper::construct(&bridge, &ty, None, None).unwrap();
        let found = finder.call_method("TryFind", &[ScriptValue::Int(4)], &ScriptDict::new()).unwrap();
        assert_eq!(found.repr(), "(True, 40, 'found')");
        let missing = finder.call_method("TryFind", &[ScriptValue::Int(0)], &ScriptDict::new()).unwrap();
        assert_eq!(missing.repr(), "(False, 0, '')");
    }

    #[test]
    fn post_init_runs_on_construction() {
        let bridge = bridge();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let post_init = script_fn(POST_INIT_FUNCTION, &["self"], move |_| {
            seen.set(seen.get() + 1);
            Ok(ScriptValue::None)
        });
        let ty = Rc::new(
            ScriptType::subclass("Spawned", &bridge.types().object_type())
                .with_member(POST_INIT_FUNCTION, ScriptValue::Function(post_init)),
        );
        generate_class(&bridge, &ty).unwrap();
        ObjectWrapper::construct(&bridge, &ty, None, None).unwrap();
        ObjectWrapper::construct(&bridge, &ty, None, None).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn invalid_declarations_abort_generation() {
        let bridge = bridge();
        let object = bridge.types().object_type();
        let noop = || script_fn("f", &["self"], |_| Ok(ScriptValue::None));

        let values = Rc::new(ScriptType::subclass("WithValue", &object).with_member(
            "A",
            crate::defs::ValueDef::new(ScriptValue::Int(1), Default::default()).unwrap().into(),
        ));
        assert_eq!(generate_class(&bridge, &values).unwrap_err().message(), "Classes do not support values");

        let arity = Rc::new(
            ScriptType::subclass("BadArity", &object)
                .with_member("Go", FunctionDef::new(noop()).with_params(vec![TypeRef::Int]).into()),
        );
        assert_eq!(
            generate_class(&bridge, &arity).unwrap_err().message(),
            "Incorrect number of arguments specified for 'Go' (expected 1, got 0)"
        );

        let no_override = Rc::new(ScriptType::subclass("NoOverride", &object).with_member(
            "Missing",
            FunctionDef::new(noop()).overriding().into(),
        ));
        assert_eq!(
            generate_class(&bridge, &no_override).unwrap_err().message(),
            "Method 'Missing' was set to 'override', but no method was found to override"
        );

        let orphan = Rc::new(ScriptType::new("Orphan", TypeFamily::Object));
        assert_eq!(
            generate_class(&bridge, &orphan).unwrap_err().message(),
            "No super class could be found for this script type"
        );
        // Nothing was installed and every failure was logged.
        assert_eq!(bridge.host().find_class_in(bridge.type_container(), "WithValue"), None);
        let errors = bridge.host().log_sink().records().iter().filter(|r| r.verbosity == LOG_ERROR).count();
        assert_eq!(errors, 4);
    }

    #[test]
    fn base_properties_cannot_be_redeclared() {
        let bridge = bridge();
        let base = hero_type(&bridge);
        generate_class(&bridge, &base).unwrap();
        let derived = Rc::new(
            ScriptType::subclass("Paladin", &base).with_member("Health", PropertyDef::new(TypeRef::Float).into()),
        );
        assert_eq!(
            generate_class(&bridge, &derived).unwrap_err().message(),
            "Property 'Health' (float) cannot override a property from the base type"
        );
    }

    #[test]
    fn regenerating_supersedes_and_reparents() {
        let bridge = bridge();
        let base_v1 = hero_type(&bridge);
        let old_base = generate_class(&bridge, &base_v1).unwrap();
        let derived = Rc::new(
            ScriptType::subclass("Paladin", &base_v1).with_member("Faith", PropertyDef::new(TypeRef::Int).into()),
        );
        let old_derived = generate_class(&bridge, &derived).unwrap();

        let base_v2 = hero_type(&bridge);
        let new_base = generate_class(&bridge, &base_v2).unwrap();
        let host = bridge.host();
        assert_ne!(old_base, new_base);
        assert_eq!(host.type_name(TypeHandle::Class(old_base)), "Hero_REINST");
        assert!(host.class_def(old_base).unwrap().has_any_class_flags(CLASS_NEWER_VERSION_EXISTS));

        let Some(TypeHandle::Class(new_derived)) = derived.native() else { panic!("derived type lost its class") };
        assert_ne!(new_derived, old_derived);
        assert_eq!(host.super_class(new_derived), Some(new_base));
        assert!(Rc::ptr_eq(&derived.base().unwrap(), &base_v2));
        assert!(host.find_class_property(new_derived, "Faith").is_some());
    }

    #[test]
    fn getters_are_hidden_and_routed() {
        let bridge = bridge();
        let getter = script_fn("GetLevel", &["self"], |_| Ok(ScriptValue::Int(7)));
        let ty = Rc::new(
            ScriptType::subclass("Leveled", &bridge.types().object_type())
                .with_member("Level", PropertyDef::new(TypeRef::Int).with_getter("GetLevel").into())
                .with_member("GetLevel", FunctionDef::new(getter).returns(TypeRef::Int).getter().pure(true).into()),
        );
        generate_class(&bridge, &ty).unwrap();
        assert!(ty.find_method("GetLevel").is_none());
        let leveled = ObjectWrapper::construct(&bridge, &ty, None, None).unwrap();
        assert_eq!(leveled.get_attr("Level").unwrap().as_int(), Some(7));
        assert_eq!(leveled.get_attr("_Level").unwrap().as_int(), Some(0));
    }
}
