// ubridge-host: the in-process object model the script bridge drives.
// Reflection records, the object table, packages, GC and localization.

pub mod handles;
pub mod error;
pub mod log;
pub mod text;
pub mod sparse;
pub mod value;
pub mod property;
pub mod types;
pub mod buffer;
pub mod gc;
pub mod host;
mod reflect;

pub use handles::*;
pub use error::*;
pub use text::{Text, TextSource, MISSING_STRING_TABLE_ENTRY};
pub use sparse::SparseTable;
pub use value::{value_type_hash, MapStorage, NativeValue, SetStorage, StructValue};
pub use property::{Metadata, Property, PropertyKind};
pub use types::*;
pub use buffer::NativeBuffer;
pub use gc::{GcObject, GcReport, ReferenceCollector};
pub use host::{Host, ObjectRecord, PackageLoader, PropertyChange, CORE_PACKAGE};
pub use reflect::{quote, unquote};
pub use ubridge_flags::*;
