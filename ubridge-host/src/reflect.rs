// Property-driven operations that need the type tables: default values,
// hash linking, type names and text export/import.
//
// Text format follows the engine's ExportText conventions: `True`/`False`,
// quoted strings, `(A=1,B=2)` structs, `(a,b)` containers and `((k,v))` maps.

use ubridge_flags::CPF_HAS_GET_VALUE_TYPE_HASH;

use crate::error::{HostError, HostResult};
use crate::handles::{ObjectHandle, StructHandle};
use crate::host::Host;
use crate::property::{Property, PropertyKind};
use crate::text::{Text, TextSource};
use crate::value::{MapStorage, NativeValue, SetStorage, StructValue};

impl Host {
    /// Set or clear `CPF_HAS_GET_VALUE_TYPE_HASH` on `prop` (and its inner
    /// properties) according to what its kind supports.
    pub fn link_property(&self, prop: &mut Property) {
        let hashable = match &mut prop.kind {
            PropertyKind::Bool
            | PropertyKind::Int32
            | PropertyKind::Int64
            | PropertyKind::Float
            | PropertyKind::Double
            | PropertyKind::Str
            | PropertyKind::Name
            | PropertyKind::Object(_)
            | PropertyKind::Interface(_)
            | PropertyKind::Enum(_) => true,
            PropertyKind::Text => false,
            PropertyKind::Struct(s) => self.struct_def(*s).is_ok_and(|d| d.hashable),
            PropertyKind::Array(inner) | PropertyKind::Set(inner) => {
                self.link_property(inner);
                false
            }
            PropertyKind::Map(key, value) => {
                self.link_property(key);
                self.link_property(value);
                false
            }
        };
        if hashable {
            prop.flags |= CPF_HAS_GET_VALUE_TYPE_HASH;
        } else {
            prop.flags &= !CPF_HAS_GET_VALUE_TYPE_HASH;
        }
    }

    /// Default value of one element of `prop`.
    pub fn default_value(&self, prop: &Property) -> HostResult<NativeValue> {
        Ok(match &prop.kind {
            PropertyKind::Bool => NativeValue::Bool(false),
            PropertyKind::Int32 | PropertyKind::Int64 => NativeValue::Int(0),
            PropertyKind::Float | PropertyKind::Double => NativeValue::Float(0.0),
            PropertyKind::Str => NativeValue::Str(String::new()),
            PropertyKind::Name => NativeValue::Name("None".to_string()),
            PropertyKind::Text => NativeValue::Text(Text::empty()),
            PropertyKind::Object(_) | PropertyKind::Interface(_) => NativeValue::Object(ObjectHandle::NULL),
            PropertyKind::Struct(s) => NativeValue::Struct(self.struct_default(*s)?),
            PropertyKind::Enum(e) => {
                NativeValue::Enum(self.enum_def(*e)?.entries.first().map_or(0, |entry| entry.value))
            }
            PropertyKind::Array(_) => NativeValue::Array(Vec::new()),
            PropertyKind::Set(_) => NativeValue::Set(SetStorage::new()),
            PropertyKind::Map(..) => NativeValue::Map(MapStorage::new()),
        })
    }

    /// Default value of the whole property: an `Array` of `array_dim`
    /// elements for fixed-size storage, else a single element.
    pub fn default_complete_value(&self, prop: &Property) -> HostResult<NativeValue> {
        let single = self.default_value(prop)?;
        if prop.is_fixed_array() {
            Ok(NativeValue::Array(vec![single; prop.array_dim]))
        } else {
            Ok(single)
        }
    }

    pub fn struct_default(&self, s: StructHandle) -> HostResult<StructValue> {
        let fields = self
            .struct_properties(s)?
            .iter()
            .map(|p| self.default_complete_value(p))
            .collect::<HostResult<Vec<_>>>()?;
        Ok(StructValue { struct_type: s, fields })
    }

    /// Script-facing name of the property's type.
    pub fn property_type_name(&self, prop: &Property) -> String {
        match &prop.kind {
            PropertyKind::Bool => "bool".to_string(),
            PropertyKind::Int32 | PropertyKind::Int64 => "int".to_string(),
            PropertyKind::Float | PropertyKind::Double => "float".to_string(),
            PropertyKind::Str => "str".to_string(),
            PropertyKind::Name => "Name".to_string(),
            PropertyKind::Text => "Text".to_string(),
            PropertyKind::Object(c) | PropertyKind::Interface(c) => {
                self.class_def(*c).map(|d| d.header.name.clone()).unwrap_or_else(|_| "Object".to_string())
            }
            PropertyKind::Struct(s) => {
                self.struct_def(*s).map(|d| d.header.name.clone()).unwrap_or_else(|_| "Struct".to_string())
            }
            PropertyKind::Enum(e) => {
                self.enum_def(*e).map(|d| d.header.name.clone()).unwrap_or_else(|_| "Enum".to_string())
            }
            PropertyKind::Array(inner) => format!("Array({})", self.property_type_name(inner)),
            PropertyKind::Set(inner) => format!("Set({})", self.property_type_name(inner)),
            PropertyKind::Map(k, v) => {
                format!("Map({}, {})", self.property_type_name(k), self.property_type_name(v))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Export
    // -----------------------------------------------------------------------

    /// ExportText for one element of `prop`.
    pub fn export_text(&self, prop: &Property, value: &NativeValue) -> String {
        match (&prop.kind, value) {
            (PropertyKind::Bool, NativeValue::Bool(b)) => (if *b { "True" } else { "False" }).to_string(),
            (PropertyKind::Int32 | PropertyKind::Int64, NativeValue::Int(i)) => i.to_string(),
            (PropertyKind::Float | PropertyKind::Double, NativeValue::Float(f)) => format!("{f:.6}"),
            (PropertyKind::Str, NativeValue::Str(s)) => quote(s),
            (PropertyKind::Name, NativeValue::Name(s)) => s.clone(),
            (PropertyKind::Text, NativeValue::Text(t)) => export_text_value(t),
            (PropertyKind::Object(_) | PropertyKind::Interface(_), NativeValue::Object(h)) => self.path_name(*h),
            (PropertyKind::Enum(e), NativeValue::Enum(v)) => self
                .enum_def(*e)
                .ok()
                .and_then(|d| d.name_by_value(*v).map(str::to_string))
                .unwrap_or_else(|| v.to_string()),
            (PropertyKind::Struct(s), NativeValue::Struct(sv)) => {
                let props = self.struct_properties(*s).unwrap_or_default();
                let parts: Vec<String> = props
                    .iter()
                    .zip(&sv.fields)
                    .map(|(p, v)| format!("{}={}", p.name, self.export_complete_text(p, v)))
                    .collect();
                format!("({})", parts.join(","))
            }
            (PropertyKind::Array(inner), NativeValue::Array(items)) => {
                let parts: Vec<String> = items.iter().map(|v| self.export_text(inner, v)).collect();
                format!("({})", parts.join(","))
            }
            (PropertyKind::Set(inner), NativeValue::Set(set)) => {
                let parts: Vec<String> = set.values().map(|v| self.export_text(inner, v)).collect();
                format!("({})", parts.join(","))
            }
            (PropertyKind::Map(kp, vp), NativeValue::Map(map)) => {
                let parts: Vec<String> = map
                    .values()
                    .map(|(k, v)| format!("({},{})", self.export_text(kp, k), self.export_text(vp, v)))
                    .collect();
                format!("({})", parts.join(","))
            }
            (_, other) => format!("<{}>", other.kind_name()),
        }
    }

    /// ExportText for the whole property, including fixed-size storage.
    pub fn export_complete_text(&self, prop: &Property, value: &NativeValue) -> String {
        match value {
            NativeValue::Array(items) if prop.is_fixed_array() => {
                let parts: Vec<String> = items.iter().map(|v| self.export_text(prop, v)).collect();
                format!("({})", parts.join(","))
            }
            _ => self.export_text(prop, value),
        }
    }

    // -----------------------------------------------------------------------
    // Import
    // -----------------------------------------------------------------------

    /// ImportText for one element of `prop`. `None` if the text does not parse.
    pub fn import_text(&self, prop: &Property, text: &str) -> Option<NativeValue> {
        let text = text.trim();
        match &prop.kind {
            PropertyKind::Bool => match text {
                "True" | "true" | "1" => Some(NativeValue::Bool(true)),
                "False" | "false" | "0" => Some(NativeValue::Bool(false)),
                _ => None,
            },
            PropertyKind::Int32 => {
                text.parse::<i32>().ok().map(|i| NativeValue::Int(i64::from(i)))
            }
            PropertyKind::Int64 => text.parse::<i64>().ok().map(NativeValue::Int),
            PropertyKind::Float => text.parse::<f32>().ok().map(|f| NativeValue::Float(f64::from(f))),
            PropertyKind::Double => text.parse::<f64>().ok().map(NativeValue::Float),
            PropertyKind::Str => Some(NativeValue::Str(unquote(text))),
            PropertyKind::Name => Some(NativeValue::Name(unquote(text))),
            PropertyKind::Text => Some(NativeValue::Text(self.import_text_value(text)?)),
            PropertyKind::Object(class) | PropertyKind::Interface(class) => {
                let path = unquote(text);
                if path == "None" || path.is_empty() {
                    return Some(NativeValue::Object(ObjectHandle::NULL));
                }
                self.find_object(Some(*class), ObjectHandle::NULL, &path).map(NativeValue::Object)
            }
            PropertyKind::Enum(e) => {
                let def = self.enum_def(*e).ok()?;
                let name = text.rsplit("::").next().unwrap_or(text);
                def.value_by_name(name).or_else(|| text.parse().ok()).map(NativeValue::Enum)
            }
            PropertyKind::Struct(s) => {
                let mut value = self.struct_default(*s).ok()?;
                let props = self.struct_properties(*s).ok()?;
                for item in split_list(text)? {
                    let (name, field_text) = item.split_once('=')?;
                    let index = props.iter().position(|p| p.name == name.trim())?;
                    value.fields[index] = self.import_complete_text(&props[index], field_text)?;
                }
                Some(NativeValue::Struct(value))
            }
            PropertyKind::Array(inner) => split_list(text)?
                .into_iter()
                .map(|item| self.import_text(inner, item))
                .collect::<Option<Vec<_>>>()
                .map(NativeValue::Array),
            PropertyKind::Set(inner) => {
                let mut set = SetStorage::new();
                for item in split_list(text)? {
                    let value = self.import_text(inner, item)?;
                    let hash = inner.value_hash(&value);
                    if set.find_by(hash, |v| *v == value).is_none() {
                        set.add(value, hash);
                    }
                }
                Some(NativeValue::Set(set))
            }
            PropertyKind::Map(kp, vp) => {
                let mut map = MapStorage::new();
                for pair in split_list(text)? {
                    let parts = split_list(pair)?;
                    let [k, v] = parts.as_slice() else { return None };
                    let key = self.import_text(kp, k)?;
                    let value = self.import_text(vp, v)?;
                    let hash = kp.value_hash(&key);
                    match map.find_by(hash, |(existing, _)| *existing == key) {
                        Some(index) => {
                            if let Some(slot) = map.get_mut(index) {
                                slot.1 = value;
                            }
                        }
                        None => {
                            map.add((key, value), hash);
                        }
                    }
                }
                Some(NativeValue::Map(map))
            }
        }
    }

    /// ImportText for the whole property, including fixed-size storage.
    pub fn import_complete_text(&self, prop: &Property, text: &str) -> Option<NativeValue> {
        if !prop.is_fixed_array() {
            return self.import_text(prop, text);
        }
        let mut items = match self.default_complete_value(prop).ok()? {
            NativeValue::Array(items) => items,
            _ => return None,
        };
        for (slot, item) in items.iter_mut().zip(split_list(text)?) {
            *slot = self.import_text(prop, item)?;
        }
        Some(NativeValue::Array(items))
    }

    fn import_text_value(&self, text: &str) -> Option<Text> {
        if let Some(args) = macro_args(text, "NSLOCTEXT") {
            let [ns, key, source] = args.as_slice() else { return None };
            return Some(self.localized_text(ns, key, source));
        }
        if let Some(args) = macro_args(text, "LOCTABLE") {
            let [table, key] = args.as_slice() else { return None };
            return Some(self.string_table_text(table, key));
        }
        if let Some(args) = macro_args(text, "INVTEXT") {
            let [s] = args.as_slice() else { return None };
            return Some(Text::from_string(s.clone()));
        }
        Some(Text::from_string(unquote(text)))
    }

    /// Validate that `value` has the storage shape `prop` expects.
    pub fn check_value(&self, prop: &Property, value: &NativeValue) -> HostResult<()> {
        let ok = matches!(
            (&prop.kind, value),
            (PropertyKind::Bool, NativeValue::Bool(_))
                | (PropertyKind::Int32 | PropertyKind::Int64, NativeValue::Int(_))
                | (PropertyKind::Float | PropertyKind::Double, NativeValue::Float(_))
                | (PropertyKind::Str, NativeValue::Str(_))
                | (PropertyKind::Name, NativeValue::Name(_))
                | (PropertyKind::Text, NativeValue::Text(_))
                | (PropertyKind::Object(_) | PropertyKind::Interface(_), NativeValue::Object(_))
                | (PropertyKind::Struct(_), NativeValue::Struct(_))
                | (PropertyKind::Enum(_), NativeValue::Enum(_))
                | (PropertyKind::Array(_), NativeValue::Array(_))
                | (PropertyKind::Set(_), NativeValue::Set(_))
                | (PropertyKind::Map(..), NativeValue::Map(_))
        );
        if ok {
            Ok(())
        } else {
            Err(HostError::TypeMismatch(format!(
                "'{}' expects {} but got {}",
                prop.name,
                self.property_type_name(prop),
                value.kind_name()
            )))
        }
    }
}

fn export_text_value(text: &Text) -> String {
    match text.source() {
        TextSource::Invariant => format!("INVTEXT({})", quote(text.as_str())),
        TextSource::Localized { namespace, key, source } => {
            format!("NSLOCTEXT({}, {}, {})", quote(namespace), quote(key), quote(source))
        }
        TextSource::StringTable { table_id, key } => format!("LOCTABLE({}, {})", quote(table_id), quote(key)),
    }
}

/// Quote and escape a string for export.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Strip surrounding quotes and unescape; unquoted input is returned as-is.
pub fn unquote(s: &str) -> String {
    let s = s.trim();
    let Some(inner) = s.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return s.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Split `(a,b,(c,d))` into its top-level items, honoring quotes and nesting.
fn split_list(text: &str) -> Option<Vec<&str>> {
    let inner = text.trim().strip_prefix('(')?.strip_suffix(')')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        if in_quote {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quote = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_quote = true,
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                items.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 || in_quote {
        return None;
    }
    items.push(inner[start..].trim());
    Some(items)
}

fn macro_args(text: &str, name: &str) -> Option<Vec<String>> {
    let rest = text.strip_prefix(name)?;
    let items = split_list(rest)?;
    Some(items.into_iter().map(unquote).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnumDef, StructDef};

    fn vector_struct(host: &Host) -> StructHandle {
        let mut def = StructDef::new("Vector", host.core_package(), None);
        def.properties = vec![
            Property::new("X", PropertyKind::Double),
            Property::new("Y", PropertyKind::Double),
            Property::new("Z", PropertyKind::Double),
        ];
        def.hashable = true;
        host.add_struct(def).unwrap()
    }

    #[test]
    fn link_marks_hashable_kinds() {
        let host = Host::new();
        let vector = vector_struct(&host);
        let mut p = Property::new("V", PropertyKind::Struct(vector));
        host.link_property(&mut p);
        assert!(p.has_value_hash());

        let mut t = Property::new("T", PropertyKind::Text);
        host.link_property(&mut t);
        assert!(!t.has_value_hash());

        let mut a = Property::new("A", PropertyKind::Array(Box::new(Property::new("Inner", PropertyKind::Int32))));
        host.link_property(&mut a);
        assert!(!a.has_value_hash());
        assert!(a.element_property().unwrap().has_value_hash());
    }

    #[test]
    fn struct_export_import() {
        let host = Host::new();
        let vector = vector_struct(&host);
        let prop = Property::new("V", PropertyKind::Struct(vector));
        let value = NativeValue::Struct(StructValue {
            struct_type: vector,
            fields: vec![NativeValue::Float(1.0), NativeValue::Float(2.5), NativeValue::Float(0.0)],
        });
        let text = host.export_text(&prop, &value);
        assert_eq!(text, "(X=1.000000,Y=2.500000,Z=0.000000)");
        assert_eq!(host.import_text(&prop, &text), Some(value));
        assert!(host.import_text(&prop, "(W=1)").is_none());
    }

    #[test]
    fn string_export_escapes_quotes() {
        let host = Host::new();
        let prop = Property::new("S", PropertyKind::Str);
        let value = NativeValue::Str("say \"hi\"".into());
        let text = host.export_text(&prop, &value);
        assert_eq!(text, "\"say \\\"hi\\\"\"");
        assert_eq!(host.import_text(&prop, &text), Some(value));
    }

    #[test]
    fn map_import_handles_nesting() {
        let host = Host::new();
        let prop = Property::new(
            "M",
            PropertyKind::Map(
                Box::new(Property::new("K", PropertyKind::Str)),
                Box::new(Property::new("V", PropertyKind::Int32)),
            ),
        );
        let value = host.import_text(&prop, "((\"a,b\",1),(\"c\",2))").unwrap();
        let NativeValue::Map(map) = &value else { panic!("not a map") };
        assert_eq!(map.len(), 2);
        assert_eq!(host.export_text(&prop, &value), "((\"a,b\",1),(\"c\",2))");
    }

    #[test]
    fn enum_text_uses_entry_names() {
        let host = Host::new();
        let mut def = EnumDef::new("Color", host.core_package());
        def.add_entry("Red", 0);
        def.add_entry("Green", 5);
        let e = host.add_enum(def).unwrap();
        let prop = Property::new("C", PropertyKind::Enum(e));
        assert_eq!(host.export_text(&prop, &NativeValue::Enum(5)), "Green");
        assert_eq!(host.import_text(&prop, "Color::Green"), Some(NativeValue::Enum(5)));
        assert_eq!(host.default_value(&prop).unwrap(), NativeValue::Enum(0));
    }

    #[test]
    fn text_macros_round_through_localization() {
        let host = Host::new();
        host.add_translation("Game", "Hi", "Salut");
        host.register_string_table("/Game/Strings", [("Bye".to_string(), "Au revoir".to_string())]);
        let prop = Property::new("T", PropertyKind::Text);

        let Some(NativeValue::Text(t)) = host.import_text(&prop, "NSLOCTEXT(\"Game\", \"Hi\", \"Hello\")") else {
            panic!("expected text")
        };
        assert_eq!(t.as_str(), "Salut");
        assert_eq!(host.export_text(&prop, &NativeValue::Text(t)), "NSLOCTEXT(\"Game\", \"Hi\", \"Hello\")");

        let Some(NativeValue::Text(t)) = host.import_text(&prop, "LOCTABLE(\"/Game/Strings\", \"Bye\")") else {
            panic!("expected text")
        };
        assert_eq!(t.as_str(), "Au revoir");
    }

    #[test]
    fn fixed_array_defaults_and_export() {
        let host = Host::new();
        let prop = Property::new("F", PropertyKind::Int32).with_array_dim(3);
        let value = host.default_complete_value(&prop).unwrap();
        assert_eq!(value, NativeValue::Array(vec![NativeValue::Int(0); 3]));
        assert_eq!(host.export_complete_text(&prop, &value), "(0,0,0)");
        assert_eq!(
            host.import_complete_text(&prop, "(1,2,3)"),
            Some(NativeValue::Array(vec![NativeValue::Int(1), NativeValue::Int(2), NativeValue::Int(3)]))
        );
    }
}
