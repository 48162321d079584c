//! Graph vertices.
//!
//! A node record is immutable after creation: its current value and config
//! are the latest active change records naming it (see
//! [`crate::change`]), and its children and parents are derived from the
//! branch log.

use crate::error::{ForestError, ValidationKind};
use crate::schema::Check;
use crate::value::{Form, Key, TypeTag, Value};
use grove_kernel::{Clock, Lifecycle, Record, Tick};
use serde::Deserialize;

/// Expected form of a node's value.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormRule {
    Any,
    /// The form the node had when it was created.
    Locked,
    Is(Form),
    #[serde(skip)]
    Custom(Check),
}

impl FormRule {
    pub fn check(&self, value: &Value, initial: Form) -> Result<(), ValidationKind> {
        let expected = match self {
            FormRule::Any => return Ok(()),
            FormRule::Custom(check) => return run_check(check, value),
            FormRule::Locked => initial,
            FormRule::Is(form) => *form,
        };
        let found = value.form();
        if found != expected {
            return Err(ValidationKind::Form { expected, found });
        }
        Ok(())
    }
}

/// Expected type of a node's value.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRule {
    Any,
    /// The type the node had when it was created.
    Locked,
    Is(TypeTag),
    #[serde(skip)]
    Custom(Check),
}

impl TypeRule {
    pub fn check(&self, value: &Value, initial: TypeTag) -> Result<(), ValidationKind> {
        let expected = match self {
            TypeRule::Any | TypeRule::Is(TypeTag::Any) => return Ok(()),
            TypeRule::Custom(check) => return run_check(check, value),
            TypeRule::Locked => initial,
            TypeRule::Is(tag) => *tag,
        };
        let found = value.type_tag();
        if found != expected {
            return Err(ValidationKind::Type { expected, found });
        }
        Ok(())
    }
}

fn run_check(check: &Check, value: &Value) -> Result<(), ValidationKind> {
    check.run(value).map_err(|message| ValidationKind::Test {
        check: check.name().to_string(),
        message,
    })
}

/// Validation rules for one node.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub form: Option<FormRule>,
    #[serde(rename = "type")]
    pub type_rule: Option<TypeRule>,
    #[serde(skip)]
    pub test: Option<Check>,
}

impl NodeConfig {
    /// No form or type rule is set.
    pub fn is_unconstrained(&self) -> bool {
        self.form.is_none() && self.type_rule.is_none()
    }

    /// Check `value` against every rule, in form, type, test order.
    pub fn check(&self, value: &Value, form: Form, type_tag: TypeTag) -> Result<(), ValidationKind> {
        if let Some(rule) = &self.form {
            rule.check(value, form)?;
        }
        if let Some(rule) = &self.type_rule {
            rule.check(value, type_tag)?;
        }
        if let Some(test) = &self.test {
            run_check(test, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeInit {
    pub name: Option<Key>,
    pub value: Value,
    pub config: NodeConfig,
}

impl NodeInit {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<Key>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_form(mut self, rule: FormRule) -> Self {
        self.config.form = Some(rule);
        self
    }

    pub fn with_type(mut self, rule: TypeRule) -> Self {
        self.config.type_rule = Some(rule);
        self
    }

    pub fn with_test(mut self, check: Check) -> Self {
        self.config.test = Some(check);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    tick: Tick,
    lifecycle: Lifecycle,
    name: Option<Key>,
    value: Value,
    form: Form,
    type_tag: TypeTag,
    config: NodeConfig,
}

impl Node {
    /// Key under which this node lands in a parent's net value.
    pub fn name(&self) -> Option<&Key> {
        self.name.as_ref()
    }

    /// Value the node was created with.
    pub fn initial_value(&self) -> &Value {
        &self.value
    }

    pub fn initial_config(&self) -> &NodeConfig {
        &self.config
    }

    /// Form at creation, the target of [`FormRule::Locked`].
    pub fn form(&self) -> Form {
        self.form
    }

    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }
}

impl Record for Node {
    type Init = NodeInit;
    type Error = ForestError;

    fn build(clock: &Clock, init: NodeInit) -> Result<Self, ForestError> {
        Ok(Self {
            tick: clock.next(),
            lifecycle: Lifecycle::new(),
            form: init.value.form(),
            type_tag: init.value.type_tag(),
            name: init.name,
            value: init.value,
            config: init.config,
        })
    }

    fn tick(&self) -> Tick {
        self.tick
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_form_compares_against_creation() {
        let rule = FormRule::Locked;
        assert!(rule.check(&Value::from("bar"), Form::Scalar).is_ok());
        let err = rule
            .check(&Value::Array(vec![Value::from("philistine")]), Form::Scalar)
            .expect_err("array is not scalar");
        assert_eq!(
            err,
            ValidationKind::Form {
                expected: Form::Scalar,
                found: Form::Array
            }
        );
    }

    #[test]
    fn type_rule_any_accepts_everything() {
        assert!(TypeRule::Any.check(&Value::from(1), TypeTag::String).is_ok());
        assert!(
            TypeRule::Is(TypeTag::Any)
                .check(&Value::Null, TypeTag::String)
                .is_ok()
        );
        assert!(
            TypeRule::Is(TypeTag::Number)
                .check(&Value::from("1"), TypeTag::String)
                .is_err()
        );
    }

    #[test]
    fn config_runs_custom_test_last() {
        let config = NodeConfig {
            form: Some(FormRule::Any),
            type_rule: None,
            test: Some(Check::new("short", |value| match value.as_str() {
                Some(s) if s.len() > 3 => Err(format!("`{s}` is too long")),
                _ => Ok(()),
            })),
        };
        assert!(config.check(&Value::from("abc"), Form::Scalar, TypeTag::String).is_ok());
        let err = config
            .check(&Value::from("abcd"), Form::Scalar, TypeTag::String)
            .expect_err("too long");
        assert!(matches!(err, ValidationKind::Test { ref check, .. } if check == "short"));
    }

    #[test]
    fn config_deserializes_rules() {
        let config: NodeConfig =
            serde_json::from_str(r#"{"form": {"is": "map"}, "type": "any"}"#).expect("config");
        assert!(matches!(config.form, Some(FormRule::Is(Form::Map))));
        assert!(matches!(config.type_rule, Some(TypeRule::Any)));
        assert!(config.test.is_none());
    }
}
