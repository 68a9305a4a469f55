// Object wrapper: the script-side proxy of a host object.
//
// An object wrapper holds one strong reference to its object (reported to
// the GC through the collector) and resolves attributes through its script
// type: property descriptors read and write the object's fields, method
// descriptors become bound functions that call through the host's function
// table, anything else falls back to the type's members.

use std::any::Any;
use std::fmt;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use ubridge_host::{
    value_type_hash, ClassHandle, NativeValue, ObjectHandle, ReferenceCollector, TypeHandle, CLASS_ABSTRACT,
    CPF_SCRIPT_READ_ONLY,
};

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::policy::OwnerContext;
use crate::property_access::{missing_property, no_attribute, read_property, write_property};
use crate::script::{ScriptDict, ScriptFunction, ScriptParam, ScriptType, ScriptValue};
use crate::storage::NativeRef;
use crate::wrapper::{equality_compare, CompareOp, WrappedInstance, WrapperBase, WrapperKind, WrapperTypeRegistration};

/// Outer used when a script constructs an object without naming one.
pub const TRANSIENT_PACKAGE: &str = "/Engine/Transient";

pub struct ObjectWrapper {
    base: WrapperBase,
    handle: Cell<ObjectHandle>,
    ty: RefCell<Rc<ScriptType>>,
    this: Weak<ObjectWrapper>,
}

impl ObjectWrapper {
    /// Wrap `object`. Use `ObjectWrapperFactory::find_or_create` instead so
    /// each object has at most one wrapper.
    pub(crate) fn new(bridge: &Rc<Bridge>, object: ObjectHandle, ty: &Rc<ScriptType>) -> Rc<Self> {
        Rc::new_cyclic(|this| ObjectWrapper {
            base: WrapperBase::new(bridge, this),
            handle: Cell::new(object),
            ty: RefCell::new(ty.clone()),
            this: this.clone(),
        })
    }

    /// Construct a new instance of `ty` inside `outer` (the transient
    /// package when `None`), optionally with a fixed `name`.
    pub fn construct(
        bridge: &Rc<Bridge>,
        ty: &Rc<ScriptType>,
        outer: Option<&ScriptValue>,
        name: Option<&ScriptValue>,
    ) -> BridgeResult<Rc<ObjectWrapper>> {
        let Some(TypeHandle::Class(class)) = ty.native() else {
            return Err(BridgeError::null_internal("Class"));
        };
        let host = bridge.host();
        let outer = match outer {
            None | Some(ScriptValue::None) => host.create_package(TRANSIENT_PACKAGE),
            Some(ScriptValue::Object(o)) => o.handle()?,
            Some(other) => {
                return Err(BridgeError::TypeError(format!(
                    "Failed to convert 'outer' ({}) to 'Object'",
                    other.type_name()
                )));
            }
        };
        let name = match name {
            None | Some(ScriptValue::None) => None,
            Some(ScriptValue::Str(s) | ScriptValue::Name(s)) => Some(s.clone()),
            Some(other) => {
                return Err(BridgeError::TypeError(format!("Failed to convert 'name' ({}) to 'Name'", other.type_name())));
            }
        };
        if host.class_def(class)?.has_any_class_flags(CLASS_ABSTRACT) {
            return Err(BridgeError::Exception(format!("Class '{}' is abstract", ty.name())));
        }
        let object = host.new_object(class, outer, name.as_deref())?;
        bridge.objects().find_or_create(bridge, object)
    }

    /// `value` as an instance of `ty`, if it is an object of that class.
    pub fn cast(value: &ScriptValue, ty: &Rc<ScriptType>) -> BridgeResult<Rc<ObjectWrapper>> {
        let cast_error = || BridgeError::TypeError(format!("Cannot cast type '{}' to '{}'", value.type_name(), ty.name()));
        let (ScriptValue::Object(wrapper), Some(TypeHandle::Class(class))) = (value, ty.native()) else {
            return Err(cast_error());
        };
        let object = wrapper.handle()?;
        if wrapper.base.host().is_a(object, class) { Ok(wrapper.clone()) } else { Err(cast_error()) }
    }

    /// The wrapped object, validated.
    pub fn handle(&self) -> BridgeResult<ObjectHandle> {
        let h = self.handle.get();
        if h.is_null() {
            return Err(BridgeError::null_internal("ObjectInstance"));
        }
        if !self.base.host().is_valid(h) {
            return Err(BridgeError::ObjectDestroyed);
        }
        Ok(h)
    }

    pub(crate) fn raw_handle(&self) -> ObjectHandle {
        self.handle.get()
    }

    pub fn script_type(&self) -> Rc<ScriptType> {
        self.ty.borrow().clone()
    }

    pub(crate) fn set_script_type(&self, ty: &Rc<ScriptType>) {
        *self.ty.borrow_mut() = ty.clone();
    }

    pub fn type_name(&self) -> String {
        self.ty.borrow().name().to_string()
    }

    pub fn path_name(&self) -> String {
        self.base.host().path_name(self.handle.get())
    }

    pub fn to_display_string(&self) -> String {
        format!("<Object '{}' ({})>", self.path_name(), self.type_name())
    }

    pub fn hash(&self) -> BridgeResult<u32> {
        Ok(value_type_hash(&NativeValue::Object(self.handle()?)))
    }

    pub fn compare(&self, op: CompareOp, other: &ScriptValue) -> BridgeResult<Option<bool>> {
        let equal = match other {
            ScriptValue::Object(o) => Some(self.handle.get() == o.handle.get()),
            _ => None,
        };
        equality_compare(op, equal, &self.type_name())
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    pub fn get_attr(&self, name: &str) -> BridgeResult<ScriptValue> {
        let ty = self.script_type();
        if let Some(desc) = ty.find_property_descriptor(name) {
            if let Some(getter) = &desc.getter {
                return self.call_method(getter, &[], &ScriptDict::new());
            }
            let object = self.handle()?;
            let bridge = self.base.bridge();
            let class = bridge.host().class_of(object)?;
            let (index, prop) = bridge
                .host()
                .find_class_property(class, &desc.property.name)
                .ok_or_else(|| missing_property(&desc.property.name, name, ty.name()))?;
            let owner: Weak<dyn WrappedInstance> = self.this.clone();
            let context = OwnerContext::new(owner, prop.name.clone());
            return read_property(bridge, ty.name(), &prop, name, &NativeRef::object_field(object, index), context);
        }
        if let Some(method) = ty.find_method(name) {
            return Ok(ScriptValue::Function(Rc::new(self.bound_method(&method.name)?)));
        }
        ty.find_member(name).ok_or_else(|| no_attribute(ty.name(), name))
    }

    pub fn set_attr(&self, name: &str, value: &ScriptValue) -> BridgeResult<()> {
        let ty = self.script_type();
        if let Some(desc) = ty.find_property_descriptor(name) {
            if let Some(setter) = &desc.setter {
                self.call_method(setter, std::slice::from_ref(value), &ScriptDict::new())?;
                return Ok(());
            }
            let object = self.handle()?;
            let bridge = self.base.bridge();
            let class = bridge.host().class_of(object)?;
            let (index, prop) = bridge
                .host()
                .find_class_property(class, &desc.property.name)
                .ok_or_else(|| missing_property(&desc.property.name, name, ty.name()))?;
            let storage = NativeRef::object_field(object, index);
            write_property(bridge, ty.name(), &prop, name, value, &storage, CPF_SCRIPT_READ_ONLY)?;
            bridge.host().notify_property_changed(object, &prop.name);
            return Ok(());
        }
        if ty.find_method(name).is_some() || ty.find_member(name).is_some() {
            return Err(BridgeError::AttributeError(format!(
                "'{}' object attribute '{name}' is read-only",
                ty.name()
            )));
        }
        Err(no_attribute(ty.name(), name))
    }

    // -----------------------------------------------------------------------
    // Methods
    // -----------------------------------------------------------------------

    /// Call the native function `name` on this object.
    pub fn call_method(&self, name: &str, args: &[ScriptValue], kwargs: &ScriptDict) -> BridgeResult<ScriptValue> {
        let object = self.handle()?;
        let class = self.base.host().class_of(object)?;
        call_native_function(self.base.bridge(), object, class, &self.to_display_string(), name, args, kwargs)
    }

    /// Call the static function `name` of the class behind `ty`.
    pub fn call_class_method(
        bridge: &Rc<Bridge>,
        ty: &Rc<ScriptType>,
        name: &str,
        args: &[ScriptValue],
        kwargs: &ScriptDict,
    ) -> BridgeResult<ScriptValue> {
        let Some(TypeHandle::Class(class)) = ty.native() else {
            return Err(BridgeError::null_internal("Class"));
        };
        call_native_function(bridge, ObjectHandle::NULL, class, ty.name(), name, args, kwargs)
    }

    /// A script function bound to this object that calls the native
    /// function `name`. Parameters with native defaults get script defaults.
    fn bound_method(&self, name: &str) -> BridgeResult<ScriptFunction> {
        let object = self.handle()?;
        let bridge = self.base.bridge();
        let host = bridge.host();
        let class = host.class_of(object)?;
        let (_, func) = host.find_function(class, name).ok_or_else(|| no_attribute(&self.type_name(), name))?;
        let mut params = Vec::new();
        for param in func.input_params() {
            let default = func
                .metadata
                .get(&format!("CPP_Default_{}", param.name))
                .and_then(|text| host.import_text(param, text))
                .map(|native| bridge.to_script(param, &native))
                .transpose()?;
            params.push(match default {
                Some(value) => ScriptParam::with_default(param.name.clone(), value),
                None => ScriptParam::new(param.name.clone()),
            });
        }
        let this = self.this.upgrade().ok_or_else(|| BridgeError::null_internal("ObjectInstance"))?;
        let function = name.to_string();
        let body = move |args: &[ScriptValue]| this.call_method(&function, args, &ScriptDict::new());
        let mut bound = ScriptFunction::new(name, params, body);
        if let Some(doc) = func.metadata.get(crate::registry::TOOLTIP_METADATA) {
            bound = bound.with_doc(doc.clone());
        }
        Ok(bound)
    }
}

/// Bind script arguments to the input parameters of a native function, call
/// it, and convert its outputs: nothing becomes `None`, a single output is
/// returned as is, several come back as a tuple (return value first).
pub(crate) fn call_native_function(
    bridge: &Rc<Bridge>,
    object: ObjectHandle,
    class: ClassHandle,
    owner: &str,
    name: &str,
    args: &[ScriptValue],
    kwargs: &ScriptDict,
) -> BridgeResult<ScriptValue> {
    let host = bridge.host();
    let (_, func) = host
        .find_function(class, name)
        .ok_or_else(|| BridgeError::Exception(format!("Failed to find function '{name}' on '{owner}'")))?;
    let inputs: Vec<_> = func.input_params().cloned().collect();
    if args.len() > inputs.len() {
        return Err(BridgeError::TypeError(format!(
            "{name}() takes {} positional arguments but {} were given",
            inputs.len(),
            args.len()
        )));
    }
    for (key, _) in kwargs.items() {
        let known = key.as_str().is_some_and(|k| inputs.iter().any(|p| p.name == k));
        if !known {
            return Err(BridgeError::TypeError(format!(
                "{name}() got an unexpected keyword argument {}",
                key.repr()
            )));
        }
    }

    let mut natives = Vec::with_capacity(inputs.len());
    for (i, param) in inputs.iter().enumerate() {
        let keyword = kwargs.get_str(&param.name);
        let value = match (args.get(i), keyword) {
            (Some(_), Some(_)) => {
                return Err(BridgeError::TypeError(format!(
                    "{name}() got multiple values for argument '{}'",
                    param.name
                )));
            }
            (Some(v), None) => Some(v.clone()),
            (None, keyword) => keyword,
        };
        let native = match value {
            Some(v) => bridge.to_native(&v, param).map_err(|err| match err {
                BridgeError::TypeError(_) => BridgeError::TypeError(format!(
                    "Failed to convert parameter '{}' when calling function '{name}' on '{owner}'",
                    param.name
                )),
                other => other,
            })?,
            None => match func.metadata.get(&format!("CPP_Default_{}", param.name)) {
                Some(text) => host.import_text(param, text).ok_or_else(|| {
                    BridgeError::Exception(format!(
                        "Failed to import default value '{text}' for parameter '{}' of '{name}'",
                        param.name
                    ))
                })?,
                None => host.default_complete_value(param)?,
            },
        };
        natives.push(native);
    }

    let outputs = host.call_function(object, class, name, natives)?;
    let mut results = func
        .output_params()
        .into_iter()
        .zip(&outputs)
        .map(|(prop, value)| bridge.to_script(prop, value))
        .collect::<BridgeResult<Vec<_>>>()?;
    Ok(match results.len() {
        0 => ScriptValue::None,
        1 => results.pop().unwrap_or(ScriptValue::None),
        _ => ScriptValue::tuple(results),
    })
}

impl fmt::Debug for ObjectWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectWrapper")
            .field("handle", &self.handle.get())
            .field("type", &self.type_name())
            .field("owner", &self.owner_context())
            .finish_non_exhaustive()
    }
}

impl WrappedInstance for ObjectWrapper {
    fn wrapper_kind(&self) -> WrapperKind {
        WrapperKind::Object
    }

    fn owner_context(&self) -> OwnerContext {
        OwnerContext::none()
    }

    fn on_child_changed(&self, property: Option<&str>) {
        if let Ok(object) = self.handle() {
            self.base.host().notify_property_changed(object, property.unwrap_or("None"));
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn report_object_references(instance: &dyn WrappedInstance, collector: &mut dyn ReferenceCollector) {
    let Some(wrapper) = instance.as_any().downcast_ref::<ObjectWrapper>() else {
        return;
    };
    let mut object = wrapper.handle.get();
    if !object.is_null() {
        collector.add_referenced_object(&mut object);
        wrapper.handle.set(object);
    }
}

inventory::submit! {
    WrapperTypeRegistration {
        kind: WrapperKind::Object,
        name: "Object",
        add_referenced_objects: report_object_references,
    }
}
