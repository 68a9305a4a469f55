// Insertion-ordered dict used for script mappings, keyword arguments and
// metadata dictionaries. Keys compare with script equality, so lookups are
// linear; the dicts the bridge builds are small.

use crate::error::BridgeResult;
use crate::script::value::{script_eq, ScriptValue};

#[derive(Clone, Default)]
pub struct ScriptDict {
    entries: Vec<(ScriptValue, ScriptValue)>,
}

impl ScriptDict {
    pub fn new() -> Self {
        ScriptDict::default()
    }

    pub fn from_str_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, ScriptValue)>) -> Self {
        ScriptDict {
            entries: pairs.into_iter().map(|(k, v)| (ScriptValue::str(k), v)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &ScriptValue) -> BridgeResult<Option<usize>> {
        for (i, (k, _)) in self.entries.iter().enumerate() {
            if script_eq(k, key)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    pub fn get(&self, key: &ScriptValue) -> BridgeResult<Option<ScriptValue>> {
        Ok(self.position(key)?.map(|i| self.entries[i].1.clone()))
    }

    /// Lookup by string key; never fails.
    pub fn get_str(&self, key: &str) -> Option<ScriptValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v.clone())
    }

    pub fn contains_key(&self, key: &ScriptValue) -> BridgeResult<bool> {
        Ok(self.position(key)?.is_some())
    }

    /// Insert or overwrite; new keys go to the end.
    pub fn insert(&mut self, key: ScriptValue, value: ScriptValue) -> BridgeResult<()> {
        match self.position(&key)? {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
        Ok(())
    }

    pub fn insert_str(&mut self, key: &str, value: ScriptValue) {
        match self.entries.iter().position(|(k, _)| k.as_str() == Some(key)) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((ScriptValue::str(key), value)),
        }
    }

    pub fn remove(&mut self, key: &ScriptValue) -> BridgeResult<Option<ScriptValue>> {
        Ok(self.position(key)?.map(|i| self.entries.remove(i).1))
    }

    pub fn keys(&self) -> Vec<ScriptValue> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<ScriptValue> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn items(&self) -> &[(ScriptValue, ScriptValue)] {
        &self.entries
    }

    /// Order-insensitive equality.
    pub fn equals(&self, other: &ScriptDict) -> BridgeResult<bool> {
        if self.len() != other.len() {
            return Ok(false);
        }
        for (k, v) in &self.entries {
            match other.get(k)? {
                Some(ov) if script_eq(v, &ov)? => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}
