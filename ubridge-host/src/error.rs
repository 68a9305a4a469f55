// Error types for the host object model.

use std::fmt;

use crate::handles::{ClassHandle, EnumHandle, ObjectHandle, StructHandle};

/// Errors reported by host object model operations.
#[derive(Debug, Clone, PartialEq)]
pub enum HostError {
    ObjectDestroyed(ObjectHandle),
    InvalidClass(ClassHandle),
    InvalidStruct(StructHandle),
    InvalidEnum(EnumHandle),
    PropertyNotFound(String),
    FunctionNotFound(String),
    TypeMismatch(String),
    NameCollision(String),
    FunctionFailed(String),
    /// A host table was already borrowed by a caller further up the stack.
    Busy(&'static str),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::ObjectDestroyed(h) => write!(f, "object {} has been destroyed", h.0),
            HostError::InvalidClass(h) => write!(f, "invalid class handle {}", h.0),
            HostError::InvalidStruct(h) => write!(f, "invalid struct handle {}", h.0),
            HostError::InvalidEnum(h) => write!(f, "invalid enum handle {}", h.0),
            HostError::PropertyNotFound(name) => write!(f, "property not found: {name}"),
            HostError::FunctionNotFound(name) => write!(f, "function not found: {name}"),
            HostError::TypeMismatch(msg) => write!(f, "type mismatch: {msg}"),
            HostError::NameCollision(name) => write!(f, "name already in use: {name}"),
            HostError::FunctionFailed(msg) => write!(f, "function call failed: {msg}"),
            HostError::Busy(what) => write!(f, "{what} is busy"),
        }
    }
}

impl std::error::Error for HostError {}

/// Convenience alias used throughout the host.
pub type HostResult<T> = Result<T, HostError>;
