// Enum values: an entry of a native enum as seen from script.

use std::fmt;
use std::rc::Rc;

use crate::script::ScriptType;

#[derive(Clone)]
pub struct EnumValue {
    ty: Rc<ScriptType>,
    name: String,
    value: i64,
}

impl EnumValue {
    pub fn new(ty: Rc<ScriptType>, name: impl Into<String>, value: i64) -> Self {
        EnumValue { ty, name: name.into(), value }
    }

    pub fn script_type(&self) -> &Rc<ScriptType> {
        &self.ty
    }

    pub fn type_name(&self) -> String {
        self.ty.name().to_string()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.ty, &other.ty) && self.value == other.value
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.ty.name(), self.name)
    }
}

impl fmt::Debug for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}.{}: {}>", self.ty.name(), self.name, self.value)
    }
}
