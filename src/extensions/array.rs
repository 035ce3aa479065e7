use std::fmt;

use crate::block::BlockArgs;
use crate::error::{Error, Result};
use crate::utility::BlockUtility;
use crate::value::{format_number, Value};

use super::{BlockInfo, BlockItem, BlockShape, BlockType, Extension, ExtensionInfo};

const EXTENSION_ID: &str = "jwArray";
const SUMMARY_ITEMS: usize = 50;

/// Runtime array produced by the `jwArray` blocks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArrayValue {
  array: Vec<Value>,
}

impl ArrayValue {
  pub fn new(array: Vec<Value>) -> Self {
    Self { array }
  }

  pub fn items(&self) -> &[Value] {
    &self.array
  }

  pub fn len(&self) -> usize {
    self.array.len()
  }

  pub fn is_empty(&self) -> bool {
    self.array.is_empty()
  }

  /// Text shown on the reporter bubble.
  pub fn handler(&self) -> String {
    format!("Array[{}]", self.array.len())
  }

  /// Reporter bubble contents: the first 50 items, then the length.
  pub fn summary(&self) -> String {
    let items: Vec<String> = self
      .array
      .iter()
      .take(SUMMARY_ITEMS)
      .map(display)
      .collect();
    format!("[{}]\nLength: {}", items.join(", "), self.array.len())
  }
}

impl fmt::Display for ArrayValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let json = serde_json::Value::Array(self.array.iter().map(Value::to_json).collect());
    write!(f, "{json}")
  }
}

/// How a single item is shown inside an array.
pub fn display(value: &Value) -> String {
  match value {
    Value::Array(array) => array.handler(),
    Value::Integer(integer) => display_number(*integer as f64),
    Value::Float(float) => display_number(*float),
    Value::String(_) | Value::Bool(_) => value.to_string(),
    Value::Vector(_) | Value::Branch(_) => format!("Object"),
  }
}

fn display_number(number: f64) -> String {
  if !number.is_finite() {
    return format_number(number);
  }
  if number >= 1e6 {
    /* 1234567 => 1.2346e+6 */
    let exponential = format!("{number:.4e}");
    return match exponential.split_once('e') {
      Some((mantissa, exponent)) if !exponent.starts_with('-') => {
        format!("{mantissa}e+{exponent}")
      }
      _ => exponential,
    };
  }
  let floored = (number * 1000.).floor() / 1000.;
  let decimals = floored
    .to_string()
    .split_once('.')
    .map_or(0, |(_, fraction)| fraction.len())
    .min(3);
  format!("{floored:.decimals$}")
}

#[derive(Debug, Default)]
pub struct Arrays;

impl Extension for Arrays {
  fn info(&self) -> ExtensionInfo {
    let reporter = |opcode: &str, text: &str| {
      let mut block = BlockInfo::new(opcode, text, BlockType::Reporter);
      block.block_shape = Some(BlockShape::Square);
      block.force_output_type = Some(format!("Array"));
      block.disable_monitor = true;
      BlockItem::Block(block)
    };
    ExtensionInfo {
      id: EXTENSION_ID.to_string(),
      name: format!("Arrays"),
      color1: Some(format!("#ff513d")),
      blocks: vec![reporter("blank", "blank array"), reporter("test", "test array")],
      menus: Default::default(),
    }
  }

  fn execute(
    &mut self,
    opcode: &str,
    _args: &BlockArgs,
    _util: &mut dyn BlockUtility,
  ) -> Result<Option<Value>> {
    let array = match opcode {
      "blank" => ArrayValue::default(),
      "test" => ArrayValue::new((1..=20i64).map(Value::from).collect()),
      _ => {
        return Err(Error::UnknownOpcode {
          extension: EXTENSION_ID.to_string(),
          opcode: opcode.to_string(),
        })
      }
    };
    Ok(Some(Value::Array(array)))
  }
}
