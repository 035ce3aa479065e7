use std::fmt;

use glam::DVec2;
use serde::Deserialize;

use crate::extensions::array::ArrayValue;

/// A value flowing through block inputs, parameters and reporters.
///
/// Only the literal variants can appear in `project.json`; the others are
/// produced at runtime by reporters and extensions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Integer(i64),
  Float(f64),
  String(String),
  Bool(bool),
  #[serde(skip)]
  Array(ArrayValue),
  #[serde(skip)]
  Vector(DVec2),
  #[serde(skip)]
  Branch(BranchDescriptor),
}

/// Value bound to a command parameter: the entry of a branch supplied by the
/// call site. `entry == None` means there is nothing to run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BranchDescriptor {
  pub entry: Option<String>,
  pub caller_id: Option<String>,
}

impl BranchDescriptor {
  pub fn new(caller_id: impl Into<String>, entry: impl Into<String>) -> Self {
    Self {
      entry: Some(entry.into()),
      caller_id: Some(caller_id.into()),
    }
  }

  pub fn empty() -> Self {
    Self::default()
  }
}

impl Default for Value {
  fn default() -> Self {
    Value::Integer(0)
  }
}

impl Value {
  pub fn to_f64(&self) -> f64 {
    match self {
      Value::Integer(integer) => *integer as f64,
      Value::Float(float) if float.is_nan() => 0.,
      Value::Float(float) => *float,
      Value::String(string) => {
        let trimmed = string.trim();
        if trimmed.is_empty() {
          return 0.;
        }
        match trimmed.parse::<f64>() {
          Ok(float) if !float.is_nan() => float,
          _ => 0.,
        }
      }
      Value::Bool(true) => 1.,
      Value::Bool(false) => 0.,
      Value::Array(_) | Value::Vector(_) | Value::Branch(_) => 0.,
    }
  }

  pub fn to_bool(&self) -> bool {
    match self {
      Value::Bool(bool) => *bool,
      Value::Integer(integer) => *integer != 0,
      Value::Float(float) => *float != 0. && !float.is_nan(),
      Value::String(string) => {
        !(string.is_empty() || string == "0" || string.eq_ignore_ascii_case("false"))
      }
      Value::Array(_) | Value::Vector(_) | Value::Branch(_) => true,
    }
  }

  pub fn as_branch(&self) -> Option<&BranchDescriptor> {
    match self {
      Value::Branch(branch) => Some(branch),
      _ => None,
    }
  }

  pub fn as_vector(&self) -> Option<DVec2> {
    match self {
      Value::Vector(vector) => Some(*vector),
      _ => None,
    }
  }

  /// JSON form used when an array is stringified.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Value::Integer(integer) => serde_json::Value::from(*integer),
      Value::Float(float) => serde_json::Number::from_f64(*float)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null),
      Value::String(string) => serde_json::Value::String(string.clone()),
      Value::Bool(bool) => serde_json::Value::Bool(*bool),
      Value::Array(array) => {
        serde_json::Value::Array(array.items().iter().map(Value::to_json).collect())
      }
      Value::Vector(vector) => serde_json::json!({ "x": vector.x, "y": vector.y }),
      Value::Branch(branch) => serde_json::json!({
        "entry": branch.entry,
        "callerId": branch.caller_id,
      }),
    }
  }
}

pub fn format_number(float: f64) -> String {
  if float.is_nan() {
    format!("NaN")
  } else if float.is_infinite() {
    if float > 0. {
      format!("Infinity")
    } else {
      format!("-Infinity")
    }
  } else {
    format!("{float}")
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Integer(integer) => write!(f, "{integer}"),
      Value::Float(float) => f.write_str(&format_number(*float)),
      Value::String(string) => f.write_str(string),
      Value::Bool(bool) => write!(f, "{bool}"),
      Value::Array(array) => write!(f, "{array}"),
      Value::Vector(vector) => write!(
        f,
        "{}, {}",
        format_number(vector.x),
        format_number(vector.y)
      ),
      Value::Branch(_) => f.write_str("[object Object]"),
    }
  }
}

impl From<f64> for Value {
  fn from(float: f64) -> Self {
    Value::Float(float)
  }
}

impl From<i64> for Value {
  fn from(integer: i64) -> Self {
    Value::Integer(integer)
  }
}

impl From<i32> for Value {
  fn from(integer: i32) -> Self {
    Value::Integer(integer.into())
  }
}

impl From<&str> for Value {
  fn from(string: &str) -> Self {
    Value::String(string.to_string())
  }
}

impl From<String> for Value {
  fn from(string: String) -> Self {
    Value::String(string)
  }
}

impl From<bool> for Value {
  fn from(bool: bool) -> Self {
    Value::Bool(bool)
  }
}

impl From<BranchDescriptor> for Value {
  fn from(branch: BranchDescriptor) -> Self {
    Value::Branch(branch)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use rstest::rstest;

  #[rstest]
  #[case(Value::from("  12.5 "), 12.5)]
  #[case(Value::from(""), 0.)]
  #[case(Value::from("abc"), 0.)]
  #[case(Value::from(true), 1.)]
  #[case(Value::Float(f64::NAN), 0.)]
  #[case(Value::Integer(-3), -3.)]
  fn casts_to_number_like_scratch(#[case] value: Value, #[case] expected: f64) {
    assert_eq!(value.to_f64(), expected);
  }

  #[rstest]
  #[case(Value::from("false"), false)]
  #[case(Value::from("FALSE"), false)]
  #[case(Value::from("0"), false)]
  #[case(Value::from(""), false)]
  #[case(Value::from("no"), true)]
  #[case(Value::Float(0.5), true)]
  fn casts_to_boolean_like_scratch(#[case] value: Value, #[case] expected: bool) {
    assert_eq!(value.to_bool(), expected);
  }

  #[test]
  fn literals_deserialize_untagged() {
    let values: Vec<Value> = serde_json::from_str(r#"[5, 1.5, "x", true]"#).unwrap();
    assert_eq!(
      values,
      vec![
        Value::Integer(5),
        Value::Float(1.5),
        Value::from("x"),
        Value::Bool(true)
      ]
    );
  }

  #[test]
  fn floats_print_like_javascript() {
    assert_eq!(Value::Float(5.).to_string(), "5");
    assert_eq!(Value::Float(0.25).to_string(), "0.25");
    assert_eq!(Value::Float(f64::INFINITY).to_string(), "Infinity");
  }
}
