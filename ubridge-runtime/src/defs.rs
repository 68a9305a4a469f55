// Member definitions a script places in a type body to declare native
// members: values (enum entries), properties and functions. The generator
// dispatches on `MemberDef` and turns each one into a native member.

use std::rc::Rc;

use ubridge_host::{Metadata, Property, PropertyKind, TypeHandle};

use crate::error::{BridgeError, BridgeResult};
use crate::script::{ScriptFunction, ScriptType, ScriptValue, TypeFamily};

/// The type of a declared property, parameter or return value.
#[derive(Clone)]
pub enum TypeRef {
    Bool,
    Int,
    Int64,
    Float,
    Double,
    Str,
    Name,
    Text,
    /// A class, struct or enum, by its script type.
    Type(Rc<ScriptType>),
    Array(Box<TypeRef>),
    Set(Box<TypeRef>),
    Map(Box<TypeRef>, Box<TypeRef>),
}

impl TypeRef {
    /// Script-facing name, used in generation errors.
    pub fn friendly_name(&self) -> String {
        match self {
            TypeRef::Bool => "bool".to_string(),
            TypeRef::Int => "int".to_string(),
            TypeRef::Int64 => "int64".to_string(),
            TypeRef::Float => "float".to_string(),
            TypeRef::Double => "double".to_string(),
            TypeRef::Str => "str".to_string(),
            TypeRef::Name => "Name".to_string(),
            TypeRef::Text => "Text".to_string(),
            TypeRef::Type(ty) => ty.name().to_string(),
            TypeRef::Array(inner) => format!("Array({})", inner.friendly_name()),
            TypeRef::Set(inner) => format!("Set({})", inner.friendly_name()),
            TypeRef::Map(k, v) => format!("Map({}, {})", k.friendly_name(), v.friendly_name()),
        }
    }

    /// A native property named `name` of this type. `None` when a referenced
    /// script type has no native twin yet.
    pub fn to_property(&self, name: &str) -> Option<Property> {
        let kind = match self {
            TypeRef::Bool => PropertyKind::Bool,
            TypeRef::Int => PropertyKind::Int32,
            TypeRef::Int64 => PropertyKind::Int64,
            TypeRef::Float => PropertyKind::Float,
            TypeRef::Double => PropertyKind::Double,
            TypeRef::Str => PropertyKind::Str,
            TypeRef::Name => PropertyKind::Name,
            TypeRef::Text => PropertyKind::Text,
            TypeRef::Type(ty) => match (ty.family(), ty.native()?) {
                (TypeFamily::Object, TypeHandle::Class(c)) => PropertyKind::Object(c),
                (TypeFamily::Struct, TypeHandle::Struct(s)) => PropertyKind::Struct(s),
                (TypeFamily::Enum, TypeHandle::Enum(e)) => PropertyKind::Enum(e),
                _ => return None,
            },
            TypeRef::Array(inner) => PropertyKind::Array(Box::new(inner.to_property(name)?)),
            TypeRef::Set(inner) => PropertyKind::Set(Box::new(inner.to_property(name)?)),
            TypeRef::Map(k, v) => PropertyKind::Map(Box::new(k.to_property(name)?), Box::new(v.to_property(name)?)),
        };
        Some(Property::new(name, kind))
    }

    /// Parse `int`, `Array(str)`, `Map(Name, Vector)` and friends. Type
    /// names that are not built in go through `resolve`.
    pub fn parse(text: &str, resolve: &dyn Fn(&str) -> Option<Rc<ScriptType>>) -> Option<TypeRef> {
        let text = text.trim();
        if let Some(args) = strip_call(text, "Array") {
            return Some(TypeRef::Array(Box::new(TypeRef::parse(args, resolve)?)));
        }
        if let Some(args) = strip_call(text, "Set") {
            return Some(TypeRef::Set(Box::new(TypeRef::parse(args, resolve)?)));
        }
        if let Some(args) = strip_call(text, "Map") {
            let (key, value) = split_top_level_comma(args)?;
            return Some(TypeRef::Map(
                Box::new(TypeRef::parse(key, resolve)?),
                Box::new(TypeRef::parse(value, resolve)?),
            ));
        }
        Some(match text {
            "bool" => TypeRef::Bool,
            "int" => TypeRef::Int,
            "int64" => TypeRef::Int64,
            "float" => TypeRef::Float,
            "double" => TypeRef::Double,
            "str" => TypeRef::Str,
            "Name" => TypeRef::Name,
            "Text" => TypeRef::Text,
            other => TypeRef::Type(resolve(other)?),
        })
    }
}

fn strip_call<'a>(text: &'a str, head: &str) -> Option<&'a str> {
    text.strip_prefix(head)?.trim_start().strip_prefix('(')?.strip_suffix(')')
}

fn split_top_level_comma(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => return Some((&text[..i], &text[i + 1..])),
            _ => {}
        }
    }
    None
}

/// A constant value; becomes an enum entry.
#[derive(Clone)]
pub struct ValueDef {
    pub value: ScriptValue,
    pub meta: Metadata,
}

impl ValueDef {
    pub fn new(value: ScriptValue, meta: Metadata) -> BridgeResult<Self> {
        if value.is_none() {
            return Err(BridgeError::Exception("'val' cannot be 'None'".to_string()));
        }
        Ok(ValueDef { value, meta })
    }
}

/// A property, optionally routed through getter/setter functions of the
/// same type.
#[derive(Clone)]
pub struct PropertyDef {
    pub ty: TypeRef,
    pub meta: Metadata,
    pub getter: Option<String>,
    pub setter: Option<String>,
}

impl PropertyDef {
    pub fn new(ty: TypeRef) -> Self {
        PropertyDef { ty, meta: Metadata::new(), getter: None, setter: None }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn with_getter(mut self, getter: impl Into<String>) -> Self {
        self.getter = Some(getter.into());
        self
    }

    pub fn with_setter(mut self, setter: impl Into<String>) -> Self {
        self.setter = Some(setter.into());
        self
    }
}

/// Return declaration of a generated function. A tuple return becomes a
/// bool return value plus one `OutValue{n}` out parameter per element.
#[derive(Clone)]
pub enum ReturnType {
    Value(TypeRef),
    Tuple(Vec<TypeRef>),
}

/// A function implemented by a script function.
#[derive(Clone)]
pub struct FunctionDef {
    pub func: Rc<ScriptFunction>,
    pub meta: Metadata,
    pub ret: Option<ReturnType>,
    pub params: Option<Vec<TypeRef>>,
    pub is_override: bool,
    pub is_static: bool,
    /// `Some(true)` pure, `Some(false)` explicitly impure, `None` unspecified.
    pub pure: Option<bool>,
    pub getter: bool,
    pub setter: bool,
}

impl FunctionDef {
    pub fn new(func: Rc<ScriptFunction>) -> Self {
        FunctionDef {
            func,
            meta: Metadata::new(),
            ret: None,
            params: None,
            is_override: false,
            is_static: false,
            pure: None,
            getter: false,
            setter: false,
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn returns(mut self, ret: TypeRef) -> Self {
        self.ret = Some(ReturnType::Value(ret));
        self
    }

    pub fn returns_tuple(mut self, outs: Vec<TypeRef>) -> Self {
        self.ret = Some(ReturnType::Tuple(outs));
        self
    }

    pub fn with_params(mut self, params: Vec<TypeRef>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn overriding(mut self) -> Self {
        self.is_override = true;
        self
    }

    pub fn static_fn(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn pure(mut self, pure: bool) -> Self {
        self.pure = Some(pure);
        self
    }

    pub fn getter(mut self) -> Self {
        self.getter = true;
        self
    }

    pub fn setter(mut self) -> Self {
        self.setter = true;
        self
    }

    /// Reject flag combinations that cannot describe one native function.
    pub fn validate(&self, field: &str) -> BridgeResult<()> {
        let fail = |msg: String| Err(BridgeError::Generation(msg));
        if self.is_override {
            if self.is_static || self.getter || self.setter {
                return fail(format!(
                    "Method '{field}' specified as 'override' cannot also specify 'static', 'getter', or 'setter'"
                ));
            }
            if self.ret.is_some() || self.params.is_some() {
                return fail(format!("Method '{field}' specified as 'override' cannot also specify 'ret' or 'params'"));
            }
        }
        if self.is_static && (self.getter || self.setter) {
            return fail(format!("Method '{field}' specified as 'static' cannot also specify 'getter' or 'setter'"));
        }
        if self.getter {
            if self.setter {
                return fail(format!("Method '{field}' specified as 'getter' cannot also specify 'setter'"));
            }
            if self.pure == Some(false) {
                return fail(format!("Method '{field}' specified as 'getter' must also specify 'pure=True'"));
            }
        }
        Ok(())
    }
}

/// One member of a script type body.
#[derive(Clone)]
pub enum MemberDef {
    Value(ValueDef),
    Property(PropertyDef),
    Function(FunctionDef),
}

impl MemberDef {
    pub fn kind_name(&self) -> &'static str {
        match self {
            MemberDef::Value(_) => "ValueDef",
            MemberDef::Property(_) => "PropertyDef",
            MemberDef::Function(_) => "FunctionDef",
        }
    }

    pub fn meta(&self) -> &Metadata {
        match self {
            MemberDef::Value(d) => &d.meta,
            MemberDef::Property(d) => &d.meta,
            MemberDef::Function(d) => &d.meta,
        }
    }
}

impl From<ValueDef> for ScriptValue {
    fn from(def: ValueDef) -> Self {
        ScriptValue::Def(Rc::new(MemberDef::Value(def)))
    }
}

impl From<PropertyDef> for ScriptValue {
    fn from(def: PropertyDef) -> Self {
        ScriptValue::Def(Rc::new(MemberDef::Property(def)))
    }
}

impl From<FunctionDef> for ScriptValue {
    fn from(def: FunctionDef) -> Self {
        ScriptValue::Def(Rc::new(MemberDef::Function(def)))
    }
}
