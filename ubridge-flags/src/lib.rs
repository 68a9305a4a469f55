// Reflection flag constants.
//
// Mirrors the subset of EPropertyFlags, EFunctionFlags, EClassFlags and
// EObjectFlags that the host object model and the script bridge act on.
// Bit values match the engine headers so exported metadata stays comparable.

// ---------------------------------------------------------------------------
// EPropertyFlags (CPF_*): uint64
// ---------------------------------------------------------------------------

/// No flags.
pub const CPF_NONE: u64 = 0x0000_0000_0000_0000;
/// Editable.
pub const CPF_EDIT: u64 = 0x0000_0000_0000_0001;
/// Exposed to script reads.
pub const CPF_BLUEPRINT_VISIBLE: u64 = 0x0000_0000_0000_0004;
/// Script may read but not write.
pub const CPF_BLUEPRINT_READ_ONLY: u64 = 0x0000_0000_0000_0010;
/// Parameter of a function.
pub const CPF_PARM: u64 = 0x0000_0000_0000_0080;
/// Out parameter, written back after the call.
pub const CPF_OUT_PARM: u64 = 0x0000_0000_0000_0100;
/// The function's return value.
pub const CPF_RETURN_PARM: u64 = 0x0000_0000_0000_0400;
/// Property is transient: shouldn't be saved or loaded.
pub const CPF_TRANSIENT: u64 = 0x0000_0000_0000_2000;
/// Visible but not editable.
pub const CPF_EDIT_CONST: u64 = 0x0000_0000_0002_0000;
/// Property type supports GetValueTypeHash, so it can key a set or map.
pub const CPF_HAS_GET_VALUE_TYPE_HASH: u64 = 0x0008_0000_0000_0000;

/// Flags that make a property read-only from script.
pub const CPF_SCRIPT_READ_ONLY: u64 = CPF_BLUEPRINT_READ_ONLY | CPF_EDIT_CONST;

// ---------------------------------------------------------------------------
// EFunctionFlags (FUNC_*): uint32
// ---------------------------------------------------------------------------

/// No flags.
pub const FUNC_NONE: u32 = 0x0000_0000;
/// Cannot be overridden.
pub const FUNC_FINAL: u32 = 0x0000_0001;
/// Implemented natively, or by a generated thunk.
pub const FUNC_NATIVE: u32 = 0x0000_0400;
pub const FUNC_EVENT: u32 = 0x0000_0800;
pub const FUNC_STATIC: u32 = 0x0000_2000;
pub const FUNC_PUBLIC: u32 = 0x0002_0000;
/// At least one parameter carries CPF_OUT_PARM.
pub const FUNC_HAS_OUT_PARMS: u32 = 0x0040_0000;
/// Function has default parameter values recorded as metadata.
pub const FUNC_HAS_DEFAULTS: u32 = 0x0080_0000;
/// Callable from script.
pub const FUNC_BLUEPRINT_CALLABLE: u32 = 0x0400_0000;
/// Script may override it.
pub const FUNC_BLUEPRINT_EVENT: u32 = 0x0800_0000;
/// Function fulfills a contract of producing no side effects.
pub const FUNC_BLUEPRINT_PURE: u32 = 0x1000_0000;

// ---------------------------------------------------------------------------
// EClassFlags (CLASS_*): uint32
// ---------------------------------------------------------------------------

/// No flags.
pub const CLASS_NONE: u32 = 0x0000_0000;
/// Cannot be instantiated.
pub const CLASS_ABSTRACT: u32 = 0x0000_0001;
pub const CLASS_NATIVE: u32 = 0x0000_0080;
/// Class has been superseded by a newer version.
pub const CLASS_NEWER_VERSION_EXISTS: u32 = 0x8000_0000;

// ---------------------------------------------------------------------------
// EObjectFlags (RF_*): uint32
// ---------------------------------------------------------------------------

/// No flags.
pub const RF_NO_FLAGS: u32 = 0x0000_0000;
/// Object is visible outside its package.
pub const RF_PUBLIC: u32 = 0x0000_0001;
/// Keep object around for editing even if unreferenced.
pub const RF_STANDALONE: u32 = 0x0000_0002;
/// This object is a class default object.
pub const RF_CLASS_DEFAULT_OBJECT: u32 = 0x0000_0010;
/// Don't save object.
pub const RF_TRANSIENT: u32 = 0x0000_0040;
/// Object has been superseded by a newer version of its type.
pub const RF_NEWER_VERSION_EXISTS: u32 = 0x1000_0000;
