use serde::de::{Error, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fmt::Formatter;

use crate::value::Value;

/// One entry of a block's `inputs` map.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
  Block(String),
  Value(Value),
  Broadcast(NamedInput),
  Variable(NamedInput),
  List(NamedInput),
  Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedInput {
  pub name: String,
  pub id: String,
}

impl Input {
  /// Id of the block plugged into this input, if any.
  pub fn block_id(&self) -> Option<&str> {
    match self {
      Input::Block(id) => Some(id.as_str()),
      _ => None,
    }
  }
}

/* [shadow, "blockId" | [kind, ...] | null, obscured shadow?] */
impl<'de> Deserialize<'de> for Input {
  fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
    struct SeqVisitor;
    impl<'de> Visitor<'de> for SeqVisitor {
      type Value = Input;
      fn expecting(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Input")
      }
      fn visit_seq<A: SeqAccess<'de>>(
        self,
        mut seq: A,
      ) -> Result<Self::Value, A::Error> {
        #[derive(Debug, Deserialize)]
        #[serde(untagged)]
        enum T {
          String(String),
          Values(Vec<Value>),
        }
        let _shadow = seq.next_element::<i32>()?;
        let input = match seq.next_element::<Option<T>>()? {
          Some(Some(T::String(string))) => Input::Block(string),
          Some(Some(T::Values(values))) => primitive(values).map_err(A::Error::custom)?,
          Some(None) | None => Input::Empty,
        };
        while seq.next_element::<serde_json::Value>()?.is_some() {}
        Ok(input)
      }
    }
    de.deserialize_seq(SeqVisitor)
  }
}

fn primitive(mut values: Vec<Value>) -> Result<Input, String> {
  if values.len() < 2 {
    return Err(format!("primitive input needs a kind and a value"));
  }
  let kind = match values[0] {
    Value::Integer(kind) => kind,
    _ => return Err(format!("primitive kind must be an integer")),
  };
  match kind {
    4..=10 => Ok(Input::Value(values.remove(1))),
    11 | 12 | 13 => {
      if values.len() < 3 {
        return Err(format!("reference input {kind} needs a name and an id"));
      }
      let named = NamedInput {
        name: values.remove(1).to_string(),
        id: values.remove(1).to_string(),
      };
      Ok(match kind {
        11 => Input::Broadcast(named),
        12 => Input::Variable(named),
        _ => Input::List(named),
      })
    }
    _ => Err(format!("unknown primitive kind {kind}")),
  }
}
