// Prelude: one-import access to the most commonly used ubridge types.
//
// Usage: `use ubridge::prelude::*;`

// Bridge and errors
pub use ubridge_runtime::{
    Bridge, BridgeConfig, BridgeError, BridgeResult,
    LOG_DISPLAY, LOG_WARNING, LOG_ERROR,
};

// Script model
pub use ubridge_runtime::{ScriptDict, ScriptFunction, ScriptParam, ScriptType, ScriptValue, TypeFamily};

// Wrappers
pub use ubridge_runtime::{
    ObjectWrapper, StructWrapper, EnumValue,
    ArrayWrapper, FixedArrayWrapper, MapWrapper, SetWrapper,
};

// Type declarations and generation
pub use ubridge_runtime::{
    FunctionDef, PropertyDef, ReturnType, TypeRef, ValueDef,
    generate_class, generate_struct, generate_enum, generate_type,
};

// Host handles (useful when talking to the host directly)
pub use ubridge_host::{Host, ObjectHandle, ClassHandle, StructHandle, EnumHandle, TypeHandle};

// glam re-exports for the math structs
pub use glam::{DVec2, DVec3};
pub use ubridge_runtime::StructVectorExt;
