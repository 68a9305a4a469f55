// Logging bridge to the host log sink.

pub use ubridge_host::log::{LOG_DISPLAY, LOG_ERROR, LOG_WARNING};

/// Log a message through the bridge's host log sink, under the category
/// configured in `[bridge] log_category`.
///
/// Usage:
/// ```ignore
/// blog!(bridge, LOG_DISPLAY, "Generated {} types", count);
/// blog!(bridge, LOG_WARNING, "something suspicious");
/// blog!(bridge, LOG_ERROR, "fatal: {err}");
/// ```
///
/// Level constants: `LOG_DISPLAY` (0), `LOG_WARNING` (1), `LOG_ERROR` (2).
#[macro_export]
macro_rules! blog {
    ($bridge:expr, $level:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $bridge.log($level, msg);
    }};
}
