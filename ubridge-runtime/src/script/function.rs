// Script callables: a named native closure with a declared parameter list,
// so the generator can introspect arity, names and defaults the way it would
// inspect a script function's signature.

use std::fmt;
use std::rc::Rc;

use crate::error::{BridgeError, BridgeResult};
use crate::script::dict::ScriptDict;
use crate::script::value::ScriptValue;

pub type ScriptBody = Rc<dyn Fn(&[ScriptValue]) -> BridgeResult<ScriptValue>>;

#[derive(Clone, Debug)]
pub struct ScriptParam {
    pub name: String,
    pub default: Option<ScriptValue>,
}

impl ScriptParam {
    pub fn new(name: impl Into<String>) -> Self {
        ScriptParam { name: name.into(), default: None }
    }

    pub fn with_default(name: impl Into<String>, default: ScriptValue) -> Self {
        ScriptParam { name: name.into(), default: Some(default) }
    }
}

pub struct ScriptFunction {
    name: String,
    params: Vec<ScriptParam>,
    doc: Option<String>,
    body: ScriptBody,
}

impl ScriptFunction {
    pub fn new(
        name: impl Into<String>,
        params: Vec<ScriptParam>,
        body: impl Fn(&[ScriptValue]) -> BridgeResult<ScriptValue> + 'static,
    ) -> Self {
        ScriptFunction { name: name.into(), params, doc: None, body: Rc::new(body) }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ScriptParam] {
        &self.params
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Call with positional arguments only.
    pub fn call(&self, args: &[ScriptValue]) -> BridgeResult<ScriptValue> {
        let bound = self.bind_args(args, &ScriptDict::new())?;
        (self.body)(&bound)
    }

    pub fn call_kw(&self, args: &[ScriptValue], kwargs: &ScriptDict) -> BridgeResult<ScriptValue> {
        let bound = self.bind_args(args, kwargs)?;
        (self.body)(&bound)
    }

    /// Resolve positional and keyword arguments against the parameter list,
    /// filling defaults. The result has exactly one value per parameter.
    pub fn bind_args(&self, args: &[ScriptValue], kwargs: &ScriptDict) -> BridgeResult<Vec<ScriptValue>> {
        if args.len() > self.params.len() {
            return Err(BridgeError::TypeError(format!(
                "{}() takes {} positional arguments but {} were given",
                self.name,
                self.params.len(),
                args.len()
            )));
        }
        for (key, _) in kwargs.items() {
            let known = key.as_str().is_some_and(|k| self.params.iter().any(|p| p.name == k));
            if !known {
                return Err(BridgeError::TypeError(format!(
                    "{}() got an unexpected keyword argument {}",
                    self.name,
                    key.repr()
                )));
            }
        }

        let mut bound = Vec::with_capacity(self.params.len());
        for (i, param) in self.params.iter().enumerate() {
            let keyword = kwargs.get_str(&param.name);
            let value = match (args.get(i), keyword) {
                (Some(_), Some(_)) => {
                    return Err(BridgeError::TypeError(format!(
                        "{}() got multiple values for argument '{}'",
                        self.name, param.name
                    )));
                }
                (Some(v), None) => v.clone(),
                (None, Some(v)) => v,
                (None, None) => param.default.clone().ok_or_else(|| {
                    BridgeError::TypeError(format!("{}() missing required argument '{}'", self.name, param.name))
                })?,
            };
            bound.push(value);
        }
        Ok(bound)
    }
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add() -> ScriptFunction {
        ScriptFunction::new(
            "add",
            vec![ScriptParam::new("a"), ScriptParam::with_default("b", ScriptValue::Int(10))],
            |args| Ok(ScriptValue::Int(args[0].as_int().unwrap_or(0) + args[1].as_int().unwrap_or(0))),
        )
    }

    #[test]
    fn defaults_fill_missing_arguments() {
        let f = add();
        assert_eq!(f.call(&[ScriptValue::Int(1)]).unwrap().as_int(), Some(11));
        assert_eq!(f.call(&[ScriptValue::Int(1), ScriptValue::Int(2)]).unwrap().as_int(), Some(3));
    }

    #[test]
    fn keywords_bind_by_name() {
        let f = add();
        let kwargs = ScriptDict::from_str_pairs([("b", ScriptValue::Int(5))]);
        assert_eq!(f.call_kw(&[ScriptValue::Int(1)], &kwargs).unwrap().as_int(), Some(6));
    }

    #[test]
    fn arity_errors_name_the_function() {
        let f = add();
        let err = f.call(&[]).unwrap_err();
        assert_eq!(err.message(), "add() missing required argument 'a'");
        let err = f.call(&[ScriptValue::Int(1), ScriptValue::Int(2), ScriptValue::Int(3)]).unwrap_err();
        assert_eq!(err.message(), "add() takes 2 positional arguments but 3 were given");
    }
}
