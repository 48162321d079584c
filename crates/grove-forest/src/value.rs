//! Node values and their shape.
//!
//! A [`Value`] is either a scalar or a compound container. Compound values
//! (`Array`, `Map`, `Object`) are the only ones that can absorb children in a
//! node's net value; everything else is returned as-is.
//!
//! Shape detection runs through two ordered rule tables, [`FORM_RULES`] and
//! [`TYPE_RULES`]. The first matching rule wins; a value matching no rule is
//! a `Scalar` form and an `Any` type.

use chrono::{DateTime, Utc};
use grove_kernel::Tick;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// Integral floats below this magnitude serialize as integers.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Most `Null` slots an integer key may pad onto the end of an array.
pub const MAX_ARRAY_GAP: usize = 4096;

/// Key of a compound value: an array position, a map key or an object field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<Tick> for Key {
    fn from(value: Tick) -> Self {
        Key::Int(i64::try_from(value.get()).unwrap_or(i64::MAX))
    }
}

/// A named, opaque callable stored as a value.
#[derive(Clone)]
pub struct ValueFn {
    name: String,
    body: Rc<dyn Fn(&[Value]) -> Value>,
}

impl ValueFn {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Self {
            name: name.into(),
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.body)(args)
    }
}

impl fmt::Debug for ValueFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}", self.name)
    }
}

impl PartialEq for ValueFn {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Rc::ptr_eq(&self.body, &other.body)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Symbol(String),
    Array(Vec<Value>),
    Map(BTreeMap<Key, Value>),
    Object(BTreeMap<String, Value>),
    Function(ValueFn),
}

/// Structural shape of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Form {
    Scalar,
    Array,
    Map,
    Object,
    Function,
}

impl Form {
    /// Whether values of this form can hold children.
    pub fn is_compound(self) -> bool {
        matches!(self, Form::Array | Form::Map | Form::Object)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Form::Scalar => "scalar",
            Form::Array => "array",
            Form::Map => "map",
            Form::Object => "object",
            Form::Function => "function",
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finer type of a scalar value. Compound and function values are `Any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    String,
    Number,
    Boolean,
    Date,
    Symbol,
    Null,
    Any,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
            TypeTag::Date => "date",
            TypeTag::Symbol => "symbol",
            TypeTag::Null => "null",
            TypeTag::Any => "any",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type ShapeTest = fn(&Value) -> bool;

/// Form classifiers in priority order.
pub const FORM_RULES: &[(Form, ShapeTest)] = &[
    (Form::Map, is_map),
    (Form::Object, is_object),
    (Form::Array, is_array),
    (Form::Function, is_function),
];

/// Type classifiers in priority order.
pub const TYPE_RULES: &[(TypeTag, ShapeTest)] = &[
    (TypeTag::String, is_string),
    (TypeTag::Number, is_number),
    (TypeTag::Boolean, is_bool),
    (TypeTag::Date, is_date),
    (TypeTag::Symbol, is_symbol),
    (TypeTag::Null, is_null),
];

fn is_map(value: &Value) -> bool {
    matches!(value, Value::Map(_))
}

fn is_object(value: &Value) -> bool {
    matches!(value, Value::Object(_))
}

fn is_array(value: &Value) -> bool {
    matches!(value, Value::Array(_))
}

fn is_function(value: &Value) -> bool {
    matches!(value, Value::Function(_))
}

fn is_string(value: &Value) -> bool {
    matches!(value, Value::String(_))
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Number(_))
}

fn is_bool(value: &Value) -> bool {
    matches!(value, Value::Bool(_))
}

fn is_date(value: &Value) -> bool {
    matches!(value, Value::Date(_))
}

fn is_symbol(value: &Value) -> bool {
    matches!(value, Value::Symbol(_))
}

fn is_null(value: &Value) -> bool {
    matches!(value, Value::Null)
}

pub fn detect_form(value: &Value) -> Form {
    FORM_RULES
        .iter()
        .find(|(_, test)| test(value))
        .map_or(Form::Scalar, |(form, _)| *form)
}

pub fn detect_type(value: &Value) -> TypeTag {
    TYPE_RULES
        .iter()
        .find(|(_, test)| test(value))
        .map_or(TypeTag::Any, |(tag, _)| *tag)
}

impl Value {
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn object<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Value::Symbol(name.into())
    }

    pub fn form(&self) -> Form {
        detect_form(self)
    }

    pub fn type_tag(&self) -> TypeTag {
        detect_type(self)
    }

    pub fn is_compound(&self) -> bool {
        self.form().is_compound()
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Child stored at `key`, if this is a compound value holding one.
    pub fn get(&self, key: &Key) -> Option<&Value> {
        match (self, key) {
            (Value::Map(entries), _) => entries.get(key),
            (Value::Object(fields), _) => fields.get(&key.to_string()),
            (Value::Array(items), Key::Int(index)) => {
                usize::try_from(*index).ok().and_then(|i| items.get(i))
            }
            _ => None,
        }
    }

    /// Key/value pairs of a compound value, in key order. Scalars have none.
    pub fn entries(&self) -> Vec<(Key, &Value)> {
        match self {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (Key::Int(i64::try_from(i).unwrap_or(i64::MAX)), item))
                .collect(),
            Value::Map(entries) => entries.iter().map(|(k, v)| (k.clone(), v)).collect(),
            Value::Object(fields) => fields
                .iter()
                .map(|(k, v)| (Key::Str(k.clone()), v))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A copy of this value with `child` stored at `key`, read as `form`.
    pub fn set_key(&self, key: &Key, child: Value, form: Form) -> Value {
        let mut out = self.clone();
        out.insert_key(key, child, form);
        out
    }

    /// In-place variant of [`Value::set_key`].
    ///
    /// Arrays are padded with `Null` up to `key`, by at most
    /// [`MAX_ARRAY_GAP`] slots. A key further out, a string key on an array,
    /// or any key on a non-compound value is logged and ignored.
    pub fn insert_key(&mut self, key: &Key, child: Value, form: Form) {
        match (form, self) {
            (Form::Map, Value::Map(entries)) => {
                entries.insert(key.clone(), child);
            }
            (Form::Object, Value::Object(fields)) => {
                fields.insert(key.to_string(), child);
            }
            (Form::Array, Value::Array(items)) => {
                let index = match key {
                    Key::Int(index) => usize::try_from(*index).ok(),
                    Key::Str(_) => None,
                };
                match index {
                    Some(index) if index < items.len() => items[index] = child,
                    Some(index) if index - items.len() <= MAX_ARRAY_GAP => {
                        items.resize(index, Value::Null);
                        items.push(child);
                    }
                    Some(_) => {
                        warn!(%key, len = items.len(), "array key too far past the end; skipped");
                    }
                    None => warn!(%key, "illegal key for array value; skipped"),
                }
            }
            (form, target) => {
                warn!(%key, %form, found = %target.form(), "cannot set key on value");
            }
        }
    }

    /// Append to an array value. Other forms are left unchanged.
    pub fn push(&mut self, child: Value) {
        match self {
            Value::Array(items) => items.push(child),
            other => warn!(found = %other.form(), "cannot append to non-array value"),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<BTreeMap<Key, Value>> for Value {
    fn from(value: BTreeMap<Key, Value>) -> Self {
        Value::Map(value)
    }
}

impl From<serde_json::Value> for Value {
    /// JSON objects become `Map` values keyed by string.
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (Key::Str(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// JSON text for a map key. An integer key whose digits are also present
/// as a string key gets `#` prefixes until it is unique, so both entries
/// survive.
fn json_key(entries: &BTreeMap<Key, Value>, key: &Key) -> String {
    let mut text = key.to_string();
    if let Key::Int(_) = key {
        while entries.contains_key(&Key::Str(text.clone())) {
            text.insert(0, '#');
        }
    }
    text
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) | Value::Symbol(s) => serializer.serialize_str(s),
            Value::Date(at) => serializer.serialize_str(&at.to_rfc3339()),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&json_key(entries, key), value)?;
                }
                map.end()
            }
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Function(f) => serializer.serialize_str(&format!("fn {}", f.name())),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forms_follow_rule_order() {
        assert_eq!(detect_form(&Value::map([("a", 1)])), Form::Map);
        assert_eq!(detect_form(&Value::object([("a", 1)])), Form::Object);
        assert_eq!(detect_form(&Value::Array(vec![])), Form::Array);
        assert_eq!(detect_form(&Value::from("foo")), Form::Scalar);
        assert_eq!(
            detect_form(&Value::Function(ValueFn::new("noop", |_| Value::Null))),
            Form::Function
        );
        assert!(!Form::Function.is_compound());
    }

    #[test]
    fn types_of_scalars() {
        assert_eq!(detect_type(&Value::from("foo")), TypeTag::String);
        assert_eq!(detect_type(&Value::from(3)), TypeTag::Number);
        assert_eq!(detect_type(&Value::from(true)), TypeTag::Boolean);
        assert_eq!(detect_type(&Value::Null), TypeTag::Null);
        assert_eq!(detect_type(&Value::symbol("s")), TypeTag::Symbol);
        assert_eq!(detect_type(&Value::Date(Utc::now())), TypeTag::Date);
        assert_eq!(detect_type(&Value::map([("a", 1)])), TypeTag::Any);
    }

    #[test]
    fn set_key_leaves_input_untouched() {
        let base = Value::map([("alpha", 1)]);
        let out = base.set_key(&Key::from("beta"), Value::from(2), Form::Map);
        assert_eq!(base, Value::map([("alpha", 1)]));
        assert_eq!(out, Value::map([("alpha", 1), ("beta", 2)]));
    }

    #[test]
    fn array_keys_pad_with_null() {
        let base = Value::Array(vec![Value::from(1)]);
        let out = base.set_key(&Key::Int(3), Value::from(4), Form::Array);
        assert_eq!(
            out,
            Value::Array(vec![Value::from(1), Value::Null, Value::Null, Value::from(4)])
        );
    }

    #[test]
    fn distant_array_keys_are_skipped() {
        let base = Value::Array(vec![Value::from(1)]);
        let out = base.set_key(&Key::Int(i64::MAX), Value::from(2), Form::Array);
        assert_eq!(out, base);

        let edge = i64::try_from(1 + MAX_ARRAY_GAP).expect("fits");
        let out = base.set_key(&Key::Int(edge), Value::from(2), Form::Array);
        assert_eq!(out.entries().len(), MAX_ARRAY_GAP + 2);
        assert_eq!(out.get(&Key::Int(edge)), Some(&Value::from(2)));
    }

    #[test]
    fn colliding_map_keys_both_serialize() {
        let value = Value::map([(Key::Int(1), "unnamed"), (Key::from("1"), "named")]);
        assert_eq!(
            value.to_json(),
            serde_json::json!({"1": "named", "#1": "unnamed"})
        );
    }

    #[test]
    fn string_key_on_array_is_skipped() {
        let base = Value::Array(vec![Value::from(1)]);
        let out = base.set_key(&Key::from("name"), Value::from(2), Form::Array);
        assert_eq!(out, base);
    }

    #[test]
    fn object_keys_are_stringified() {
        let base = Value::object([("a", 1)]);
        let out = base.set_key(&Key::Int(7), Value::from("x"), Form::Object);
        assert_eq!(out.get(&Key::from("7")), Some(&Value::from("x")));
    }

    #[test]
    fn entries_enumerate_arrays() {
        let value = Value::Array(vec![Value::from("a"), Value::from("b")]);
        let keys: Vec<Key> = value.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Key::Int(0), Key::Int(1)]);
        assert!(Value::from(1).entries().is_empty());
    }

    #[test]
    fn json_objects_become_maps() {
        let value: Value = serde_json::from_str(r#"{"alpha": 1, "list": [true, null]}"#)
            .expect("valid json");
        assert_eq!(value.form(), Form::Map);
        assert_eq!(
            value.get(&Key::from("list")),
            Some(&Value::Array(vec![Value::Bool(true), Value::Null]))
        );
    }

    #[test]
    fn integral_numbers_serialize_as_integers() {
        let value = Value::map([("alpha", 1.0), ("half", 0.5)]);
        insta::assert_json_snapshot!(value, @r###"
        {
          "alpha": 1,
          "half": 0.5
        }
        "###);
    }
}
