use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::rc::Rc;
use std::thread::panicking;
use std::{fmt, fs::remove_dir_all};

use derivative::Derivative;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::frame::Params;
use crate::json;
use crate::target::Target;
use crate::thread::Thread;
use crate::utility::{BlockUtility, ThreadUtility};
use crate::value::Value;

const UNPACK_DIR: &str = "tmp";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  pub stage_width: u32,
  pub stage_height: u32,
  pub frame_rate: u32,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      stage_width: 480,
      stage_height: 360,
      frame_rate: 30,
    }
  }
}

pub type AddonCallback = dyn Fn(&Params, &mut dyn BlockUtility) -> Option<Value>;

/// Host-side interception of a procedure code. When registered, calls to the
/// procedure run the callback instead of the custom block's body.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct AddonBlock {
  pub name: String,
  #[derivative(Debug = "ignore")]
  pub callback: Box<AddonCallback>,
}

impl AddonBlock {
  pub fn new(
    name: impl Into<String>,
    callback: impl Fn(&Params, &mut dyn BlockUtility) -> Option<Value> + 'static,
  ) -> Self {
    Self {
      name: name.into(),
      callback: Box::new(callback),
    }
  }
}

#[derive(Debug, Default)]
pub struct Project {
  pub config: Config,
  pub targets: Vec<Target>,
  target_id_to_target_index: HashMap<String, usize>,
  addon_blocks: HashMap<String, Rc<AddonBlock>>,
}

impl Project {
  pub fn new(config: Config) -> Self {
    Self {
      config,
      ..Default::default()
    }
  }

  /// Loads a `project.json`, or an `.sb3` archive containing one.
  pub fn load(path: &str, config: Config) -> Result<Project> {
    if Path::new(path)
      .extension()
      .map_or(false, |extension| extension == "sb3")
    {
      let unpacked = Unpacked::new(path)?;
      return json::load(&unpacked.project_json(), config);
    }
    json::load(path, config)
  }

  pub fn add_target(&mut self, target: Target) {
    let index = self.targets.len();
    self
      .target_id_to_target_index
      .insert(target.data.id.clone(), index);
    self.targets.push(target);
  }

  pub fn target(&self, id: &str) -> Option<&Target> {
    self
      .target_id_to_target_index
      .get(id)
      .map(|index| &self.targets[*index])
  }

  pub fn target_mut(&mut self, id: &str) -> Option<&mut Target> {
    let index = *self.target_id_to_target_index.get(id)?;
    self.targets.get_mut(index)
  }

  pub fn register_addon_block(&mut self, proccode: impl Into<String>, block: AddonBlock) {
    self.addon_blocks.insert(proccode.into(), Rc::new(block));
  }

  pub fn addon_block(&self, proccode: &str) -> Option<Rc<AddonBlock>> {
    self.addon_blocks.get(proccode).cloned()
  }

  /// Utility handle for primitives running on `thread`.
  pub fn utility<'a>(&'a mut self, thread: &'a mut Thread) -> ThreadUtility<'a> {
    ThreadUtility::new(self, thread)
  }
}

/* sb3 archives are unpacked next to the working directory and cleaned up afterwards */
struct Unpacked;

impl Unpacked {
  fn new(path: &str) -> Result<Self> {
    debug!("unpacking {path} into {UNPACK_DIR}");
    let status = Command::new("unzip")
      .arg("-o")
      .arg(path)
      .arg("-d")
      .arg(UNPACK_DIR)
      .status()?;
    if !status.success() {
      return Err(Error::Unpack(status, path.to_string()));
    }
    Ok(Unpacked)
  }

  fn project_json(&self) -> String {
    format!("{UNPACK_DIR}/project.json")
  }
}

impl Drop for Unpacked {
  fn drop(&mut self) {
    if panicking() {
      return;
    }
    if let Err(error) = remove_dir_all(UNPACK_DIR) {
      warn!("could not remove {UNPACK_DIR}: {error}");
    }
  }
}

impl fmt::Display for Config {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}x{} @ {} fps",
      self.stage_width, self.stage_height, self.frame_rate
    )
  }
}
