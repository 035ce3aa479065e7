use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

use glam::DVec2;
use log::debug;
use serde::Deserialize;

use crate::block::{Block, BlockContainer};
use crate::error::Result;
use crate::project::{Config, Project};
use crate::target::{self, TargetState};

#[derive(Deserialize)]
struct ProjectJson {
  targets: Vec<Target>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Target {
  #[serde(default)]
  id: Option<String>,
  is_stage: bool,
  name: String,
  #[serde(default)]
  blocks: HashMap<String, BlockEntry>,
  #[serde(default)]
  current_costume: usize,
  #[serde(default)]
  costumes: Vec<Costume>,
  #[serde(default)]
  x: f64,
  #[serde(default)]
  y: f64,
  #[serde(default = "default_size")]
  size: f64,
  #[serde(default = "default_direction")]
  direction: f64,
}

/* top-level variable and list reporters are stored as bare arrays */
#[derive(Deserialize)]
#[serde(untagged)]
enum BlockEntry {
  Block(Block),
  Primitive(Vec<serde_json::Value>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Costume {
  #[serde(default = "default_bitmap_resolution")]
  bitmap_resolution: f64,
  #[serde(default)]
  rotation_center_x: f64,
  #[serde(default)]
  rotation_center_y: f64,
}

fn default_size() -> f64 {
  100.
}

fn default_direction() -> f64 {
  90.
}

fn default_bitmap_resolution() -> f64 {
  1.
}

pub fn load(path: &str, config: Config) -> Result<Project> {
  let json_project: ProjectJson = serde_json::from_reader(BufReader::new(File::open(path)?))?;
  Ok(build(json_project, config))
}

pub fn from_str(json: &str, config: Config) -> Result<Project> {
  let json_project: ProjectJson = serde_json::from_str(json)?;
  Ok(build(json_project, config))
}

fn build(json_project: ProjectJson, config: Config) -> Project {
  let mut project = Project::new(config);
  for json_target in json_project.targets {
    let blocks: HashMap<String, Block> = json_target
      .blocks
      .into_iter()
      .filter_map(|(id, entry)| match entry {
        BlockEntry::Block(block) => Some((id, block)),
        BlockEntry::Primitive(_) => None,
      })
      .collect();
    let costumes = json_target
      .costumes
      .iter()
      .map(|costume| target::Costume {
        size: DVec2::new(costume.rotation_center_x, costume.rotation_center_y) * 2.
          / costume.bitmap_resolution.max(1.),
      })
      .collect();
    let id = json_target
      .id
      .unwrap_or_else(|| json_target.name.clone());
    debug!("loaded {} with {} blocks", json_target.name, blocks.len());
    project.add_target(target::Target {
      data: target::TargetData {
        id,
        name: json_target.name,
        is_stage: json_target.is_stage,
        blocks: BlockContainer::new(blocks),
        costumes,
      },
      state: TargetState {
        x: json_target.x,
        y: json_target.y,
        size: json_target.size,
        direction: json_target.direction,
        current_costume: json_target.current_costume,
        ..Default::default()
      },
    });
  }
  project
}
