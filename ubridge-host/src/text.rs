// Localized text values (FText equivalent).
//
// A `Text` remembers where it came from (culture invariant, namespace/key, or
// string table) and carries the display string resolved when it was created.

use std::fmt;

/// Display string used when a string table lookup fails.
pub const MISSING_STRING_TABLE_ENTRY: &str = "<MISSING STRING TABLE ENTRY>";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextSource {
    Invariant,
    Localized { namespace: String, key: String, source: String },
    StringTable { table_id: String, key: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Text {
    source: TextSource,
    display: String,
}

impl Text {
    /// Culture-invariant text.
    pub fn from_string(s: impl Into<String>) -> Self {
        Text { source: TextSource::Invariant, display: s.into() }
    }

    pub fn empty() -> Self {
        Text::from_string(String::new())
    }

    /// Text identified by namespace and key, displaying `display`.
    pub fn localized(namespace: &str, key: &str, source: &str, display: impl Into<String>) -> Self {
        Text {
            source: TextSource::Localized {
                namespace: namespace.to_string(),
                key: key.to_string(),
                source: source.to_string(),
            },
            display: display.into(),
        }
    }

    /// Text referencing a string table entry, displaying `display`.
    pub fn string_table(table_id: &str, key: &str, display: impl Into<String>) -> Self {
        Text {
            source: TextSource::StringTable { table_id: table_id.to_string(), key: key.to_string() },
            display: display.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }

    pub fn source(&self) -> &TextSource {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}
