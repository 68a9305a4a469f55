// Error types for the bridge.
//
// Variants follow the script-side exception kinds so callers can dispatch on
// the kind (type / index / key / value) rather than parse messages.

use std::fmt;

use ubridge_host::HostError;

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Wrong script value type for a conversion or operation.
    TypeError(String),
    IndexError(String),
    KeyError(String),
    ValueError(String),
    AttributeError(String),
    /// Generic script exception.
    Exception(String),
    /// Wrapper state that should be unreachable in correct use.
    Internal(String),
    /// Malformed or conflicting declarations during type generation.
    Generation(String),
    ObjectDestroyed,
    Host(HostError),
}

impl BridgeError {
    /// `Internal Error - {what} is null!`
    pub fn null_internal(what: &str) -> Self {
        BridgeError::Internal(format!("Internal Error - {what} is null!"))
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        BridgeError::TypeError(msg.into())
    }

    pub fn value_error(msg: impl Into<String>) -> Self {
        BridgeError::ValueError(msg.into())
    }

    pub fn exception(msg: impl Into<String>) -> Self {
        BridgeError::Exception(msg.into())
    }

    /// Script-side exception class name.
    pub fn kind_name(&self) -> &'static str {
        match self {
            BridgeError::TypeError(_) => "TypeError",
            BridgeError::IndexError(_) => "IndexError",
            BridgeError::KeyError(_) => "KeyError",
            BridgeError::ValueError(_) => "ValueError",
            BridgeError::AttributeError(_) => "AttributeError",
            BridgeError::Exception(_) | BridgeError::Internal(_) => "Exception",
            BridgeError::Generation(_) => "GenerationError",
            BridgeError::ObjectDestroyed => "ReferenceError",
            BridgeError::Host(_) => "HostError",
        }
    }

    /// Message without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            BridgeError::TypeError(m)
            | BridgeError::IndexError(m)
            | BridgeError::KeyError(m)
            | BridgeError::ValueError(m)
            | BridgeError::AttributeError(m)
            | BridgeError::Exception(m)
            | BridgeError::Internal(m)
            | BridgeError::Generation(m) => m.clone(),
            BridgeError::ObjectDestroyed => "object has been destroyed".to_string(),
            BridgeError::Host(e) => e.to_string(),
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind_name(), self.message())
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Host(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HostError> for BridgeError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::ObjectDestroyed(_) => BridgeError::ObjectDestroyed,
            other => BridgeError::Host(other),
        }
    }
}

/// Convenience alias used throughout the bridge.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ubridge_host::ObjectHandle;

    #[test]
    fn null_internal_message() {
        let err = BridgeError::null_internal("ArrayInstance");
        assert_eq!(err.message(), "Internal Error - ArrayInstance is null!");
        assert_eq!(err.kind_name(), "Exception");
    }

    #[test]
    fn display_prefixes_kind() {
        let err = BridgeError::IndexError("Index 3 is out-of-bounds".into());
        assert_eq!(err.to_string(), "IndexError: Index 3 is out-of-bounds");
    }

    #[test]
    fn host_errors_convert() {
        let err: BridgeError = HostError::ObjectDestroyed(ObjectHandle(2)).into();
        assert_eq!(err, BridgeError::ObjectDestroyed);
        let err: BridgeError = HostError::PropertyNotFound("X".into()).into();
        assert!(matches!(err, BridgeError::Host(HostError::PropertyNotFound(_))));
    }
}
