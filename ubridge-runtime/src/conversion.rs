// Value conversion between script values and native property values.
//
// Native -> script: plain values convert directly; struct and container
// values come back as wrappers. Standalone values are copied into storage the
// wrapper owns; values addressed through a NativeRef can instead be wrapped
// by reference with an owner context.
//
// Script -> native: plain values are range- and kind-checked against the
// target property; struct and container targets go through the wrapper
// `cast` of the target kind, so sequences, mappings and compatible wrappers
// are all accepted wherever a struct or container is expected.

use std::rc::Rc;

use ubridge_host::{NativeValue, ObjectHandle, Property, PropertyKind, Text, TypeHandle};

use crate::array::ArrayWrapper;
use crate::bridge::Bridge;
use crate::enum_value::EnumValue;
use crate::error::{BridgeError, BridgeResult};
use crate::fixed_array::FixedArrayWrapper;
use crate::map::MapWrapper;
use crate::policy::{ConversionMethod, OwnerContext};
use crate::script::ScriptValue;
use crate::set::SetWrapper;
use crate::storage::NativeRef;
use crate::struct_wrapper::StructWrapper;

impl Bridge {
    /// Convert the complete value of `prop` (fixed-size storage included).
    /// Struct and container values are copied into wrapper-owned storage.
    pub fn to_script(self: &Rc<Self>, prop: &Property, value: &NativeValue) -> BridgeResult<ScriptValue> {
        if prop.is_fixed_array() {
            let source = NativeRef::owned(self.host().allocate(value.clone()));
            let wrapper = FixedArrayWrapper::wrap(self, OwnerContext::none(), prop, &source, ConversionMethod::Copy)?;
            return Ok(ScriptValue::FixedArray(wrapper));
        }
        self.to_script_element(prop, value)
    }

    /// Convert one element of `prop`.
    pub fn to_script_element(self: &Rc<Self>, prop: &Property, value: &NativeValue) -> BridgeResult<ScriptValue> {
        let host = self.host();
        Ok(match (&prop.kind, value) {
            (PropertyKind::Bool, NativeValue::Bool(b)) => ScriptValue::Bool(*b),
            (PropertyKind::Int32 | PropertyKind::Int64, NativeValue::Int(i)) => ScriptValue::Int(*i),
            (PropertyKind::Float | PropertyKind::Double, NativeValue::Float(f)) => ScriptValue::Float(*f),
            (PropertyKind::Str, NativeValue::Str(s)) => ScriptValue::Str(s.clone()),
            (PropertyKind::Name, NativeValue::Name(s)) => ScriptValue::Name(s.clone()),
            (PropertyKind::Text, NativeValue::Text(t)) => ScriptValue::Text(t.clone()),
            (PropertyKind::Object(_) | PropertyKind::Interface(_), NativeValue::Object(h)) => {
                if h.is_null() || !host.is_valid(*h) {
                    ScriptValue::None
                } else {
                    ScriptValue::Object(self.objects().find_or_create(self, *h)?)
                }
            }
            (PropertyKind::Enum(e), NativeValue::Enum(v)) => {
                let ty = self.types().script_type(host, TypeHandle::Enum(*e))?;
                let name = host.enum_def(*e)?.name_by_value(*v).map_or_else(|| v.to_string(), str::to_string);
                ScriptValue::Enum(EnumValue::new(ty, name, *v))
            }
            (PropertyKind::Struct(_), NativeValue::Struct(_))
            | (PropertyKind::Array(_), NativeValue::Array(_))
            | (PropertyKind::Set(_), NativeValue::Set(_))
            | (PropertyKind::Map(..), NativeValue::Map(_)) => {
                let source = NativeRef::owned(host.allocate(value.clone()));
                self.wrap_complex(prop, &source, OwnerContext::none(), ConversionMethod::Copy)?
            }
            (_, other) => {
                return Err(BridgeError::Internal(format!(
                    "Native value of kind '{}' does not match property '{}' ({})",
                    other.kind_name(),
                    prop.name,
                    prop.class_name()
                )));
            }
        })
    }

    /// Convert the value stored at `storage`. Struct and container values
    /// are wrapped by reference under `owner`, so edits write through; plain
    /// values are snapshotted.
    pub(crate) fn to_script_ref(
        self: &Rc<Self>,
        prop: &Property,
        storage: &NativeRef,
        owner: OwnerContext,
    ) -> BridgeResult<ScriptValue> {
        if prop.is_fixed_array() {
            let wrapper = FixedArrayWrapper::wrap(self, owner, prop, storage, ConversionMethod::Reference)?;
            return Ok(ScriptValue::FixedArray(wrapper));
        }
        match prop.kind {
            PropertyKind::Struct(_) | PropertyKind::Array(_) | PropertyKind::Set(_) | PropertyKind::Map(..) => {
                self.wrap_complex(prop, storage, owner, ConversionMethod::Reference)
            }
            _ => {
                let value = storage.snapshot(self.host(), &prop.name)?;
                self.to_script_element(prop, &value)
            }
        }
    }

    fn wrap_complex(
        self: &Rc<Self>,
        prop: &Property,
        source: &NativeRef,
        owner: OwnerContext,
        method: ConversionMethod,
    ) -> BridgeResult<ScriptValue> {
        Ok(match &prop.kind {
            PropertyKind::Struct(s) => {
                let ty = self.types().script_type(self.host(), TypeHandle::Struct(*s))?;
                ScriptValue::Struct(StructWrapper::wrap(self, &ty, owner, prop, source, method)?)
            }
            PropertyKind::Array(_) => ScriptValue::Array(ArrayWrapper::wrap(self, owner, prop, source, method)?),
            PropertyKind::Set(_) => ScriptValue::Set(SetWrapper::wrap(self, owner, prop, source, method)?),
            PropertyKind::Map(..) => ScriptValue::Map(MapWrapper::wrap(self, owner, prop, source, method)?),
            _ => return Err(BridgeError::Internal(format!("'{}' is not a struct or container property", prop.name))),
        })
    }

    /// Convert a script value to the complete value of `prop`.
    pub fn to_native(self: &Rc<Self>, value: &ScriptValue, prop: &Property) -> BridgeResult<NativeValue> {
        if prop.is_fixed_array() {
            return FixedArrayWrapper::cast(self, value, prop)
                .and_then(|wrapper| wrapper.native_value())
                .map_err(|err| self.conversion_error(err, value, prop));
        }
        self.to_native_element(value, prop)
    }

    /// Convert a script value to one element of `prop`.
    pub fn to_native_element(self: &Rc<Self>, value: &ScriptValue, prop: &Property) -> BridgeResult<NativeValue> {
        let host = self.host();
        let fail = || self.conversion_failure(value, prop);
        match &prop.kind {
            PropertyKind::Bool => match value {
                ScriptValue::Bool(b) => Ok(NativeValue::Bool(*b)),
                _ => Err(fail()),
            },
            PropertyKind::Int32 | PropertyKind::Int64 => {
                let i = match value {
                    ScriptValue::Int(i) => *i,
                    ScriptValue::Bool(b) => i64::from(*b),
                    ScriptValue::Enum(e) => e.value(),
                    _ => return Err(fail()),
                };
                if prop.kind == PropertyKind::Int32 && i32::try_from(i).is_err() {
                    return Err(fail());
                }
                Ok(NativeValue::Int(i))
            }
            PropertyKind::Float | PropertyKind::Double => value.as_float().map(NativeValue::Float).ok_or_else(fail),
            PropertyKind::Str => match value {
                ScriptValue::Str(s) | ScriptValue::Name(s) => Ok(NativeValue::Str(s.clone())),
                ScriptValue::Text(t) => Ok(NativeValue::Str(t.as_str().to_string())),
                _ => Err(fail()),
            },
            PropertyKind::Name => match value {
                ScriptValue::Str(s) | ScriptValue::Name(s) => Ok(NativeValue::Name(s.clone())),
                _ => Err(fail()),
            },
            PropertyKind::Text => match value {
                ScriptValue::Text(t) => Ok(NativeValue::Text(t.clone())),
                ScriptValue::Str(s) => Ok(NativeValue::Text(Text::from_string(s.clone()))),
                _ => Err(fail()),
            },
            PropertyKind::Object(class) | PropertyKind::Interface(class) => match value {
                ScriptValue::None => Ok(NativeValue::Object(ObjectHandle::NULL)),
                ScriptValue::Object(wrapper) => {
                    let h = wrapper.handle()?;
                    if host.is_a(h, *class) { Ok(NativeValue::Object(h)) } else { Err(fail()) }
                }
                _ => Err(fail()),
            },
            PropertyKind::Enum(e) => {
                let def = host.enum_def(*e)?;
                let v = match value {
                    ScriptValue::Enum(ev) if ev.script_type().native() == Some(TypeHandle::Enum(*e)) => Some(ev.value()),
                    ScriptValue::Int(i) => def.name_by_value(*i).map(|_| *i),
                    ScriptValue::Str(s) | ScriptValue::Name(s) => def.value_by_name(s),
                    _ => None,
                };
                v.map(NativeValue::Enum).ok_or_else(fail)
            }
            PropertyKind::Struct(s) => {
                let ty = self.types().script_type(host, TypeHandle::Struct(*s))?;
                StructWrapper::cast(self, value, &ty)
                    .and_then(|wrapper| wrapper.native_value())
                    .map_err(|err| self.conversion_error(err, value, prop))
            }
            PropertyKind::Array(inner) => ArrayWrapper::cast(self, value, inner)
                .and_then(|wrapper| wrapper.native_value())
                .map_err(|err| self.conversion_error(err, value, prop)),
            PropertyKind::Set(inner) => SetWrapper::cast(self, value, inner)
                .and_then(|wrapper| wrapper.native_value())
                .map_err(|err| self.conversion_error(err, value, prop)),
            PropertyKind::Map(key, val) => MapWrapper::cast(self, value, key, val)
                .and_then(|wrapper| wrapper.native_value())
                .map_err(|err| self.conversion_error(err, value, prop)),
        }
    }

    fn conversion_failure(&self, value: &ScriptValue, prop: &Property) -> BridgeError {
        BridgeError::TypeError(format!(
            "Failed to convert '{}' to '{}' ({})",
            value.type_name(),
            self.host().property_type_name(prop),
            prop.class_name()
        ))
    }

    /// Cast failures surface as the conversion error; anything else (a
    /// destroyed object, busy storage) keeps its own kind.
    fn conversion_error(&self, err: BridgeError, value: &ScriptValue, prop: &Property) -> BridgeError {
        match err {
            BridgeError::TypeError(_) => self.conversion_failure(value, prop),
            other => other,
        }
    }
}
