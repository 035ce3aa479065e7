use std::collections::BTreeMap;

use derivative::Derivative;
use log::debug;
use serde::Serialize;

use crate::block::BlockArgs;
use crate::error::{Error, Result};
use crate::utility::BlockUtility;
use crate::value::Value;

pub mod array;
pub mod psychic;

/// A block package loaded next to the built-in primitives.
pub trait Extension {
  fn info(&self) -> ExtensionInfo;

  fn execute(
    &mut self,
    opcode: &str,
    args: &BlockArgs,
    util: &mut dyn BlockUtility,
  ) -> Result<Option<Value>>;

  /// Runs when the green flag starts the project.
  fn on_project_start(&mut self) {}
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionInfo {
  pub id: String,
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub color1: Option<String>,
  pub blocks: Vec<BlockItem>,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub menus: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BlockItem {
  Block(BlockInfo),
  /// Rendered as `"---"`.
  Separator(&'static str),
}

impl BlockItem {
  pub const SEPARATOR: BlockItem = BlockItem::Separator("---");
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
  pub opcode: String,
  pub text: String,
  pub block_type: BlockType,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub block_shape: Option<BlockShape>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub force_output_type: Option<String>,
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  pub disable_monitor: bool,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub arguments: BTreeMap<String, ArgumentInfo>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub filter: Vec<TargetType>,
}

impl BlockInfo {
  pub fn new(opcode: &str, text: &str, block_type: BlockType) -> Self {
    Self {
      opcode: opcode.to_string(),
      text: text.to_string(),
      block_type,
      block_shape: None,
      force_output_type: None,
      disable_monitor: false,
      arguments: BTreeMap::new(),
      filter: Vec::new(),
    }
  }

  pub fn argument(mut self, name: &str, argument: ArgumentInfo) -> Self {
    self.arguments.insert(name.to_string(), argument);
    self
  }

  pub fn sprite_only(mut self) -> Self {
    self.filter = vec![TargetType::Sprite];
    self
  }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentInfo {
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub kind: Option<ArgumentType>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub menu: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub default_value: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub shape: Option<BlockShape>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub check: Vec<String>,
}

impl ArgumentInfo {
  pub fn menu(menu: &str) -> Self {
    Self {
      kind: Some(ArgumentType::String),
      menu: Some(menu.to_string()),
      ..Default::default()
    }
  }

  pub fn angle(default_value: f64) -> Self {
    Self {
      kind: Some(ArgumentType::Angle),
      default_value: Some(default_value.into()),
      ..Default::default()
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
  Command,
  Reporter,
  Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockShape {
  Round,
  Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentType {
  String,
  Number,
  Angle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
  Sprite,
  Stage,
}

/// Loaded extensions, addressed by their id.
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct ExtensionManager {
  #[derivative(Debug = "ignore")]
  extensions: Vec<(String, Box<dyn Extension>)>,
}

impl ExtensionManager {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn load(&mut self, extension: Box<dyn Extension>) {
    let id = extension.info().id;
    debug!("loaded extension {id}");
    self.extensions.retain(|(loaded, _)| *loaded != id);
    self.extensions.push((id, extension));
  }

  pub fn infos(&self) -> Vec<ExtensionInfo> {
    self
      .extensions
      .iter()
      .map(|(_, extension)| extension.info())
      .collect()
  }

  pub fn project_start(&mut self) {
    for (_, extension) in &mut self.extensions {
      extension.on_project_start();
    }
  }

  pub fn execute(
    &mut self,
    id: &str,
    opcode: &str,
    args: &BlockArgs,
    util: &mut dyn BlockUtility,
  ) -> Result<Option<Value>> {
    let Some((_, extension)) = self.extensions.iter_mut().find(|(loaded, _)| loaded == id) else {
      return Err(Error::UnknownOpcode {
        extension: id.to_string(),
        opcode: opcode.to_string(),
      });
    };
    extension.execute(opcode, args, util)
  }

  /// Runs a block by its project opcode, e.g. `jwArray_blank`.
  pub fn execute_block(
    &mut self,
    opcode: &str,
    args: &BlockArgs,
    util: &mut dyn BlockUtility,
  ) -> Result<Option<Value>> {
    match opcode.split_once('_') {
      Some((id, block)) => self.execute(id, block, args, util),
      None => Err(Error::UnknownOpcode {
        extension: String::new(),
        opcode: opcode.to_string(),
      }),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::extensions::array::{ArrayValue, Arrays};
  use crate::extensions::psychic::Psychic;
  use crate::project::{Config, Project};
  use crate::thread::Thread;

  #[test]
  fn serializes_block_metadata_like_get_info() {
    let info = Psychic::new().info();
    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["id"], "jwPsychic");
    assert_eq!(json["blocks"][1], "---");
    assert_eq!(json["blocks"][2]["arguments"]["OPTION"]["menu"], "boundariesOption");
    assert_eq!(json["menus"]["enablePhysicsOption"][2], "circle");
  }

  #[test]
  fn manager_routes_by_extension_id() {
    let mut manager = ExtensionManager::new();
    manager.load(Box::new(Arrays));
    manager.load(Box::new(Psychic::new()));
    manager.load(Box::new(Arrays));
    let ids: Vec<String> = manager.infos().into_iter().map(|info| info.id).collect();
    assert_eq!(ids, vec!["jwPsychic".to_string(), "jwArray".to_string()]);

    let mut project = Project::new(Config::default());
    let mut thread = Thread::new("Stage", None);
    let mut util = project.utility(&mut thread);
    let args = BlockArgs::new();
    let blank = manager.execute_block("jwArray_blank", &args, &mut util).unwrap();
    assert_eq!(blank, Some(Value::Array(ArrayValue::default())));
    assert!(manager.execute("jwVector", "new", &args, &mut util).is_err());
    assert!(manager.execute_block("looks_say", &args, &mut util).is_err());
    assert!(manager.execute_block("blank", &args, &mut util).is_err());
  }

  #[test]
  fn project_start_resets_every_extension() {
    let mut manager = ExtensionManager::new();
    manager.load(Box::new(Psychic::new()));
    let mut project = Project::new(Config::default());
    let mut thread = Thread::new("Stage", None);
    let mut util = project.utility(&mut thread);
    let args = BlockArgs::new().with("VECTOR", Value::Vector(glam::DVec2::new(3., 0.)));
    manager.execute_block("jwPsychic_setGravity", &args, &mut util).unwrap();
    manager.project_start();
    let gravity = manager
      .execute_block("jwPsychic_getGravity", &BlockArgs::new(), &mut util)
      .unwrap();
    assert_eq!(gravity, Some(Value::Vector(glam::DVec2::new(0., -1.))));
  }
}
