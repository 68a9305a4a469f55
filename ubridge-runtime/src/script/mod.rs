// Value model of the embedded scripting runtime as the bridge sees it.

pub mod dict;
pub mod function;
pub mod types;
pub mod value;

pub use dict::ScriptDict;
pub use function::{ScriptBody, ScriptFunction, ScriptParam};
pub use types::{MethodDescriptor, PropertyDescriptor, ScriptType, TypeDescriptors, TypeFamily};
pub use value::{script_cmp, script_eq, ScriptValue};
