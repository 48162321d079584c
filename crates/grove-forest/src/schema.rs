//! Value checks attached to branches, trees and node configs.

use crate::value::{Form, TypeTag, Value, detect_form, detect_type};
use serde::Deserialize;
use std::fmt;
use std::rc::Rc;

/// A named user test. `Err` carries the failure message.
#[derive(Clone)]
pub struct Check {
    name: String,
    test: Rc<dyn Fn(&Value) -> Result<(), String>>,
}

impl Check {
    pub fn new<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + 'static,
    {
        Self {
            name: name.into(),
            test: Rc::new(test),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run(&self, value: &Value) -> Result<(), String> {
        (self.test)(value)
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Check({})", self.name)
    }
}

/// Constraint on a value's shape.
///
/// Deserializes from `{"form": "map"}`, `{"type": "number"}` or
/// `{"any_of": [...]}`. `Custom` schemas are code-only.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    Form(Form),
    Type(TypeTag),
    /// Satisfied when any member is. An empty list accepts everything.
    AnyOf(Vec<Schema>),
    #[serde(skip)]
    Custom(Check),
}

impl Schema {
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self {
            Schema::Form(Form::Scalar) => {
                if detect_form(value).is_compound() {
                    return Err(must_be("scalar"));
                }
                Ok(())
            }
            Schema::Form(form) => {
                if detect_form(value) != *form {
                    return Err(must_be(form.as_str()));
                }
                Ok(())
            }
            Schema::Type(TypeTag::Any) => Ok(()),
            Schema::Type(tag) => {
                if detect_type(value) != *tag {
                    return Err(must_be(tag.as_str()));
                }
                Ok(())
            }
            Schema::AnyOf(members) => match members.as_slice() {
                [] => Ok(()),
                [only] => only.validate(value),
                _ => {
                    if members.iter().any(|member| member.validate(value).is_ok()) {
                        Ok(())
                    } else {
                        Err("did not satisfy any of the schema".to_string())
                    }
                }
            },
            Schema::Custom(check) => check.run(value),
        }
    }
}

fn must_be(name: &str) -> String {
    format!("must be a {name}")
}
