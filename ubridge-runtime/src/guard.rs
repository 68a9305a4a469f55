// Host boundary guard: wraps bridge callbacks the host invokes (GC
// referencers, generated function thunks, post-init hooks) so a panic in
// bridge code is logged and turned into a default instead of unwinding
// through the host's tables.

use std::panic::{catch_unwind, AssertUnwindSafe};

use ubridge_host::Host;

use crate::logging::LOG_ERROR;

const GUARD_CATEGORY: &str = "LogScript";

/// Execute `f` and catch any panic, returning `default` on failure.
///
/// The panic message is logged at error level on the host sink.
pub fn host_boundary<F, R>(host: &Host, default: R, f: F) -> R
where
    F: FnOnce() -> R,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            host.log(GUARD_CATEGORY, LOG_ERROR, panic_message(&payload));
            default
        }
    }
}

/// Extract a human-readable message from a panic payload.
fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("[ubridge] panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("[ubridge] panic: {s}")
    } else {
        "[ubridge] panic (unknown payload)".to_string()
    }
}
