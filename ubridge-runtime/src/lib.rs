// ubridge-runtime: the bridge between an embedded scripting runtime and the
// ubridge host object model. Wrapper lifetimes, reference collection,
// container and struct proxies, and native type generation from script types.

pub mod logging;
pub mod error;
pub mod guard;
pub mod config;
pub mod script;
pub mod policy;
pub mod storage;
pub mod wrapper;
pub mod collector;
pub mod bridge;
pub mod registry;
pub mod conversion;
pub mod property_access;
pub mod enum_value;
pub mod object_wrapper;
pub mod factory;
pub mod struct_wrapper;
pub mod array;
pub mod fixed_array;
pub mod map;
pub mod set;
pub mod defs;
pub mod generate;
pub mod reinstancer;
pub mod module;
pub mod math;

// Re-export the primary public API surface.
pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use logging::{LOG_DISPLAY, LOG_ERROR, LOG_WARNING};
pub use guard::host_boundary;
pub use policy::{ConversionMethod, OwnerContext};
pub use wrapper::{CompareOp, WrappedInstance, WrapperKind};
pub use collector::WrapperReferenceCollector;
pub use registry::TypeRegistry;
pub use enum_value::EnumValue;
pub use object_wrapper::ObjectWrapper;
pub use struct_wrapper::StructWrapper;
pub use array::ArrayWrapper;
pub use fixed_array::FixedArrayWrapper;
pub use map::{MapView, MapViewKind, MapWrapper};
pub use set::SetWrapper;
pub use defs::{FunctionDef, MemberDef, PropertyDef, ReturnType, TypeRef, ValueDef};
pub use generate::{generate_class, generate_enum, generate_struct, generate_type};
pub use reinstancer::Reinstancer;
pub use module::{ModuleDefinition, ModuleRegistry};
pub use math::StructVectorExt;
pub use script::{ScriptDict, ScriptFunction, ScriptParam, ScriptType, ScriptValue, TypeFamily};

// Host types that appear in the bridge API.
pub use ubridge_host::{ClassHandle, EnumHandle, Host, NativeValue, ObjectHandle, StructHandle, TypeHandle};
