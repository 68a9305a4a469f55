// ScriptValue: the dynamically typed value model of the embedded scripting
// runtime. Plain values (numbers, strings, lists, dicts) are held directly;
// everything backed by native storage is a reference-counted wrapper.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use ubridge_host::Text;

use crate::array::ArrayWrapper;
use crate::defs::MemberDef;
use crate::enum_value::EnumValue;
use crate::error::{BridgeError, BridgeResult};
use crate::fixed_array::FixedArrayWrapper;
use crate::map::{MapView, MapWrapper};
use crate::object_wrapper::ObjectWrapper;
use crate::script::dict::ScriptDict;
use crate::script::function::ScriptFunction;
use crate::script::types::ScriptType;
use crate::set::SetWrapper;
use crate::struct_wrapper::StructWrapper;

#[derive(Clone)]
pub enum ScriptValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Text(Text),
    List(Rc<RefCell<Vec<ScriptValue>>>),
    Tuple(Rc<Vec<ScriptValue>>),
    Dict(Rc<RefCell<ScriptDict>>),
    Object(Rc<ObjectWrapper>),
    Struct(Rc<StructWrapper>),
    Enum(EnumValue),
    Array(Rc<ArrayWrapper>),
    FixedArray(Rc<FixedArrayWrapper>),
    Set(Rc<SetWrapper>),
    Map(Rc<MapWrapper>),
    MapView(MapView),
    Type(Rc<ScriptType>),
    Function(Rc<ScriptFunction>),
    Def(Rc<MemberDef>),
}

impl ScriptValue {
    pub fn str(s: impl Into<String>) -> Self {
        ScriptValue::Str(s.into())
    }

    pub fn list(items: Vec<ScriptValue>) -> Self {
        ScriptValue::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<ScriptValue>) -> Self {
        ScriptValue::Tuple(Rc::new(items))
    }

    pub fn dict(dict: ScriptDict) -> Self {
        ScriptValue::Dict(Rc::new(RefCell::new(dict)))
    }

    /// Dict with string keys.
    pub fn str_dict<'a>(pairs: impl IntoIterator<Item = (&'a str, ScriptValue)>) -> Self {
        ScriptValue::dict(ScriptDict::from_str_pairs(pairs))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ScriptValue::None)
    }

    /// Friendly type name used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            ScriptValue::None => "NoneType".to_string(),
            ScriptValue::Bool(_) => "bool".to_string(),
            ScriptValue::Int(_) => "int".to_string(),
            ScriptValue::Float(_) => "float".to_string(),
            ScriptValue::Str(_) => "str".to_string(),
            ScriptValue::Name(_) => "Name".to_string(),
            ScriptValue::Text(_) => "Text".to_string(),
            ScriptValue::List(_) => "list".to_string(),
            ScriptValue::Tuple(_) => "tuple".to_string(),
            ScriptValue::Dict(_) => "dict".to_string(),
            ScriptValue::Object(o) => o.type_name(),
            ScriptValue::Struct(s) => s.type_name(),
            ScriptValue::Enum(e) => e.type_name(),
            ScriptValue::Array(_) => "Array".to_string(),
            ScriptValue::FixedArray(_) => "FixedArray".to_string(),
            ScriptValue::Set(_) => "Set".to_string(),
            ScriptValue::Map(_) => "Map".to_string(),
            ScriptValue::MapView(v) => v.type_name().to_string(),
            ScriptValue::Type(_) => "type".to_string(),
            ScriptValue::Function(_) => "function".to_string(),
            ScriptValue::Def(d) => d.kind_name().to_string(),
        }
    }

    /// Mappings expose keys; sequences never do.
    pub fn is_mapping(&self) -> bool {
        matches!(self, ScriptValue::Dict(_) | ScriptValue::Map(_))
    }

    /// Contents of an iterable value (dict and map iterate their keys), or
    /// `None` if the value is not iterable.
    pub fn iter_values(&self) -> BridgeResult<Option<Vec<ScriptValue>>> {
        Ok(Some(match self {
            ScriptValue::Str(s) => s.chars().map(|c| ScriptValue::Str(c.to_string())).collect(),
            ScriptValue::List(items) => items.borrow().clone(),
            ScriptValue::Tuple(items) => items.as_ref().clone(),
            ScriptValue::Dict(d) => d.borrow().keys(),
            ScriptValue::Array(a) => a.values()?,
            ScriptValue::FixedArray(a) => a.values()?,
            ScriptValue::Set(s) => s.values()?,
            ScriptValue::Map(m) => m.key_values()?,
            ScriptValue::MapView(v) => v.values()?,
            _ => return Ok(None),
        }))
    }

    /// Number of elements of a sized value.
    pub fn length(&self) -> BridgeResult<Option<usize>> {
        Ok(Some(match self {
            ScriptValue::Str(s) => s.chars().count(),
            ScriptValue::List(items) => items.borrow().len(),
            ScriptValue::Tuple(items) => items.len(),
            ScriptValue::Dict(d) => d.borrow().len(),
            ScriptValue::Array(a) => a.len()?,
            ScriptValue::FixedArray(a) => a.len()?,
            ScriptValue::Set(s) => s.len()?,
            ScriptValue::Map(m) => m.len()?,
            ScriptValue::MapView(v) => v.len()?,
            _ => return Ok(None),
        }))
    }

    pub fn truthy(&self) -> BridgeResult<bool> {
        Ok(match self {
            ScriptValue::None => false,
            ScriptValue::Bool(b) => *b,
            ScriptValue::Int(i) => *i != 0,
            ScriptValue::Float(f) => *f != 0.0,
            ScriptValue::Enum(e) => e.value() != 0,
            other => match other.length()? {
                Some(len) => len != 0,
                None => true,
            },
        })
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScriptValue::Int(i) => Some(*i),
            ScriptValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ScriptValue::Float(f) => Some(*f),
            ScriptValue::Int(i) => Some(*i as f64),
            ScriptValue::Bool(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::Str(s) | ScriptValue::Name(s) => Some(s),
            _ => None,
        }
    }

    /// `repr()`: strings quoted, containers in literal form.
    pub fn repr(&self) -> String {
        match self {
            ScriptValue::None => "None".to_string(),
            ScriptValue::Bool(true) => "True".to_string(),
            ScriptValue::Bool(false) => "False".to_string(),
            ScriptValue::Int(i) => i.to_string(),
            ScriptValue::Float(f) => format_float(*f),
            ScriptValue::Str(s) | ScriptValue::Name(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            ScriptValue::Text(t) => format!("'{}'", t.as_str()),
            ScriptValue::List(items) => format!("[{}]", join_repr(&items.borrow())),
            ScriptValue::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            ScriptValue::Tuple(items) => format!("({})", join_repr(items)),
            ScriptValue::Dict(d) => {
                let parts: Vec<String> =
                    d.borrow().items().iter().map(|(k, v)| format!("{}: {}", k.repr(), v.repr())).collect();
                format!("{{{}}}", parts.join(", "))
            }
            ScriptValue::Object(o) => o.to_display_string(),
            ScriptValue::Struct(s) => display_or_error(s.to_display_string()),
            ScriptValue::Enum(e) => e.to_string(),
            ScriptValue::Array(a) => display_or_error(a.to_display_string()),
            ScriptValue::FixedArray(a) => display_or_error(a.to_display_string()),
            ScriptValue::Set(s) => display_or_error(s.to_display_string()),
            ScriptValue::Map(m) => display_or_error(m.to_display_string()),
            ScriptValue::MapView(v) => display_or_error(v.to_display_string()),
            ScriptValue::Type(t) => format!("<class '{}'>", t.name()),
            ScriptValue::Function(f) => format!("<function {}>", f.name()),
            ScriptValue::Def(d) => format!("<{}>", d.kind_name()),
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

fn join_repr(items: &[ScriptValue]) -> String {
    items.iter().map(ScriptValue::repr).collect::<Vec<_>>().join(", ")
}

fn display_or_error(result: BridgeResult<String>) -> String {
    result.unwrap_or_else(|e| format!("<{}>", e.message()))
}

/// `str()`: like `repr()` except strings print raw.
impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Str(s) | ScriptValue::Name(s) => f.write_str(s),
            ScriptValue::Text(t) => f.write_str(t.as_str()),
            other => f.write_str(&other.repr()),
        }
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Bool(b)
    }
}

impl From<i64> for ScriptValue {
    fn from(i: i64) -> Self {
        ScriptValue::Int(i)
    }
}

impl From<f64> for ScriptValue {
    fn from(f: f64) -> Self {
        ScriptValue::Float(f)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::Str(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// `a == b` with the scripting runtime's semantics. Wrappers compare through
/// their own rich-compare; incomparable values are unequal.
pub fn script_eq(a: &ScriptValue, b: &ScriptValue) -> BridgeResult<bool> {
    use ScriptValue as V;
    Ok(match (a, b) {
        (V::None, V::None) => true,
        (V::Int(x), V::Int(y)) => x == y,
        (V::Bool(x), V::Bool(y)) => x == y,
        (V::Int(_) | V::Bool(_) | V::Float(_), V::Int(_) | V::Bool(_) | V::Float(_)) => a.as_float() == b.as_float(),
        (V::Str(x) | V::Name(x), V::Str(y) | V::Name(y)) => x == y,
        (V::Text(x), V::Text(y)) => x.as_str() == y.as_str(),
        (V::List(x), V::List(y)) => seq_eq(&x.borrow(), &y.borrow())?,
        (V::Tuple(x), V::Tuple(y)) => seq_eq(x, y)?,
        (V::Dict(x), V::Dict(y)) => x.borrow().equals(&y.borrow())?,
        (V::Enum(x), V::Enum(y)) => x == y,
        (V::Enum(x), V::Int(y)) | (V::Int(y), V::Enum(x)) => x.value() == *y,
        (V::Object(x), V::Object(y)) => x.handle() == y.handle(),
        (V::Struct(s), other) | (other, V::Struct(s)) => s.equals(other)?.unwrap_or(false),
        (V::Array(arr), other) | (other, V::Array(arr)) => arr.equals(other)?.unwrap_or(false),
        (V::FixedArray(arr), other) | (other, V::FixedArray(arr)) => arr.equals(other)?.unwrap_or(false),
        (V::Set(s), other) | (other, V::Set(s)) => s.equals(other)?.unwrap_or(false),
        (V::Map(m), other) | (other, V::Map(m)) => m.equals(other)?.unwrap_or(false),
        (V::Type(x), V::Type(y)) => Rc::ptr_eq(x, y),
        (V::Function(x), V::Function(y)) => Rc::ptr_eq(x, y),
        (V::Def(x), V::Def(y)) => Rc::ptr_eq(x, y),
        _ => false,
    })
}

fn seq_eq(a: &[ScriptValue], b: &[ScriptValue]) -> BridgeResult<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b) {
        if !script_eq(x, y)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// `a < b` ordering. Numbers, strings, enums and sequences of those are
/// ordered; anything else is a TypeError.
pub fn script_cmp(a: &ScriptValue, b: &ScriptValue) -> BridgeResult<Ordering> {
    use ScriptValue as V;
    let unorderable = || {
        BridgeError::TypeError(format!(
            "'<' not supported between instances of '{}' and '{}'",
            a.type_name(),
            b.type_name()
        ))
    };
    match (a, b) {
        (V::Int(x), V::Int(y)) => Ok(x.cmp(y)),
        (V::Int(_) | V::Bool(_) | V::Float(_), V::Int(_) | V::Bool(_) | V::Float(_)) => {
            let (x, y) = (a.as_float().unwrap_or(0.0), b.as_float().unwrap_or(0.0));
            x.partial_cmp(&y).ok_or_else(unorderable)
        }
        (V::Str(x) | V::Name(x), V::Str(y) | V::Name(y)) => Ok(x.cmp(y)),
        (V::Text(x), V::Text(y)) => Ok(x.as_str().cmp(y.as_str())),
        (V::Enum(x), V::Enum(y)) => Ok(x.value().cmp(&y.value())),
        (V::List(x), V::List(y)) => seq_cmp(&x.borrow(), &y.borrow()),
        (V::Tuple(x), V::Tuple(y)) => seq_cmp(x, y),
        _ => Err(unorderable()),
    }
}

fn seq_cmp(a: &[ScriptValue], b: &[ScriptValue]) -> BridgeResult<Ordering> {
    for (x, y) in a.iter().zip(b) {
        if !script_eq(x, y)? {
            return script_cmp(x, y);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_across_kinds() {
        assert!(script_eq(&ScriptValue::Int(1), &ScriptValue::Float(1.0)).unwrap());
        assert!(script_eq(&ScriptValue::Bool(true), &ScriptValue::Int(1)).unwrap());
        assert!(!script_eq(&ScriptValue::Int(1), &ScriptValue::str("1")).unwrap());
        assert_eq!(script_cmp(&ScriptValue::Int(2), &ScriptValue::Float(2.5)).unwrap(), Ordering::Less);
    }

    #[test]
    fn sequences_compare_lexicographically() {
        let a = ScriptValue::tuple(vec![ScriptValue::Int(1), ScriptValue::Int(2)]);
        let b = ScriptValue::tuple(vec![ScriptValue::Int(1), ScriptValue::Int(3)]);
        let c = ScriptValue::tuple(vec![ScriptValue::Int(1)]);
        assert_eq!(script_cmp(&a, &b).unwrap(), Ordering::Less);
        assert_eq!(script_cmp(&c, &a).unwrap(), Ordering::Less);
        assert!(script_eq(&a, &a.clone()).unwrap());
    }

    #[test]
    fn unorderable_values_are_type_errors() {
        let err = script_cmp(&ScriptValue::Int(1), &ScriptValue::None).unwrap_err();
        assert_eq!(err, BridgeError::TypeError("'<' not supported between instances of 'int' and 'NoneType'".into()));
    }

    #[test]
    fn repr_and_str() {
        let v = ScriptValue::list(vec![ScriptValue::str("a"), ScriptValue::Float(2.0), ScriptValue::None]);
        assert_eq!(v.repr(), "['a', 2.0, None]");
        assert_eq!(ScriptValue::str("a").to_string(), "a");
        assert_eq!(ScriptValue::tuple(vec![ScriptValue::Int(1)]).repr(), "(1,)");
        let d = ScriptValue::str_dict([("x", ScriptValue::Int(1))]);
        assert_eq!(d.repr(), "{'x': 1}");
    }

    #[test]
    fn strings_iterate_by_character() {
        let items = ScriptValue::str("ab").iter_values().unwrap().unwrap();
        assert_eq!(items.len(), 2);
        assert!(ScriptValue::Int(3).iter_values().unwrap().is_none());
        assert!(!ScriptValue::list(vec![]).truthy().unwrap());
    }
}
