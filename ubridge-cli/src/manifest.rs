// Types manifest: ubridge.types.toml declares enums, structs and classes
// the way a script module would, so they can be generated without a script
// runtime.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

pub type MetaTable = BTreeMap<String, String>;

#[derive(Deserialize, Debug, Default)]
pub struct TypesManifest {
    #[serde(default, rename = "enum")]
    pub enums: Vec<EnumDecl>,
    #[serde(default, rename = "struct")]
    pub structs: Vec<StructDecl>,
    #[serde(default, rename = "class")]
    pub classes: Vec<ClassDecl>,
}

#[derive(Deserialize, Debug)]
pub struct EnumDecl {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub values: Vec<ValueDecl>,
}

#[derive(Deserialize, Debug)]
pub struct ValueDecl {
    pub name: String,
    pub value: toml::Value,
    #[serde(default)]
    pub meta: MetaTable,
}

#[derive(Deserialize, Debug)]
pub struct StructDecl {
    pub name: String,
    /// Another manifest or core struct. Absent for a root struct.
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDecl>,
}

#[derive(Deserialize, Debug)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default = "default_class_base")]
    pub base: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDecl>,
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
}

#[derive(Deserialize, Debug)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub getter: Option<String>,
    #[serde(default)]
    pub setter: Option<String>,
    #[serde(default)]
    pub meta: MetaTable,
}

#[derive(Deserialize, Debug)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default)]
    pub ret: Option<ReturnDecl>,
    /// Constant the generated function returns when called.
    #[serde(default)]
    pub result: Option<toml::Value>,
    #[serde(default, rename = "override")]
    pub is_override: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub pure: Option<bool>,
    #[serde(default)]
    pub getter: bool,
    #[serde(default)]
    pub setter: bool,
    #[serde(default)]
    pub meta: MetaTable,
}

#[derive(Deserialize, Debug)]
pub struct ParamDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub default: Option<toml::Value>,
}

/// `ret = "int"` or `ret = ["int", "str"]`.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum ReturnDecl {
    Single(String),
    Tuple(Vec<String>),
}

fn default_class_base() -> String {
    "Object".to_string()
}

impl TypesManifest {
    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("invalid types manifest: {e}"))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        Self::from_toml_str(&text)
    }

    pub fn type_count(&self) -> usize {
        self.enums.len() + self.structs.len() + self.classes.len()
    }
}
