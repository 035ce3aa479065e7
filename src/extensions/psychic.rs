use std::collections::BTreeMap;
use std::f64::consts::PI;

use glam::DVec2;
use log::{debug, trace};

use crate::block::BlockArgs;
use crate::error::{Error, Result};
use crate::utility::BlockUtility;
use crate::value::Value;

use super::{
  ArgumentInfo, BlockInfo, BlockItem, BlockShape, BlockType, Extension, ExtensionInfo,
};

const EXTENSION_ID: &str = "jwPsychic";
const GRAVITY_SCALE: f64 = 0.001;
const FRICTION_AIR: f64 = 0.01;
/* wall thickness, effectively infinite */
const WALL: f64 = 4_503_599_627_370_495.;

/// Physics runs in a y-down space: `(x, -y)` of stage coordinates.
fn vector_to_world(vector: DVec2) -> DVec2 {
  DVec2::new(vector.x, -vector.y)
}

fn world_to_vector(vector: DVec2) -> DVec2 {
  DVec2::new(vector.x, -vector.y)
}

fn direction_to_angle(direction: f64) -> f64 {
  (direction - 90.) * PI / 180.
}

fn angle_to_direction(angle: f64) -> f64 {
  angle * 180. / PI + 90.
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
  Box(DVec2),
  Circle(f64),
}

impl Shape {
  fn half_extents(&self) -> DVec2 {
    match self {
      Shape::Box(size) => *size / 2.,
      Shape::Circle(radius) => DVec2::splat(*radius),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
  pub shape: Shape,
  pub position: DVec2,
  /// Displacement per step.
  pub velocity: DVec2,
  pub angle: f64,
  pub angular_velocity: f64,
}

impl Body {
  fn new(shape: Shape, position: DVec2) -> Self {
    Self {
      shape,
      position,
      velocity: DVec2::ZERO,
      angle: 0.,
      angular_velocity: 0.,
    }
  }
}

/// Static rectangle the bodies collide with.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Wall {
  center: DVec2,
  half: DVec2,
}

impl Wall {
  fn new(center: DVec2, size: DVec2) -> Self {
    Self {
      center,
      half: size / 2.,
    }
  }
}

#[derive(Debug, Clone)]
pub struct Psychic {
  gravity: DVec2,
  bodies: BTreeMap<String, Body>,
  walls: Vec<Wall>,
}

impl Default for Psychic {
  fn default() -> Self {
    Self {
      gravity: DVec2::new(0., 1.),
      bodies: BTreeMap::new(),
      walls: Vec::new(),
    }
  }
}

impl Psychic {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn body(&self, target: &str) -> Option<&Body> {
    self.bodies.get(target)
  }

  fn set_bounds(&mut self, option: &str, width: f64, height: f64) {
    let floor = Wall::new(DVec2::new(0., height), DVec2::new(WALL, height));
    self.walls = match option {
      "all" => vec![
        Wall::new(DVec2::new(-width, 0.), DVec2::new(width, WALL)),
        Wall::new(DVec2::new(width, 0.), DVec2::new(width, WALL)),
        Wall::new(DVec2::new(0., -height), DVec2::new(WALL, height)),
        floor,
      ],
      "floor" => vec![floor],
      _ => Vec::new(),
    };
    debug!("boundaries set to {option:?}");
  }

  /// Copies sprite state into its body, dropping bodies whose target is gone.
  fn correct_body(&mut self, util: &dyn BlockUtility, id: &str) {
    let Some(target) = util.target(id) else {
      debug!("removing body of deleted target {id}");
      self.bodies.remove(id);
      return;
    };
    if let Some(body) = self.bodies.get_mut(id) {
      body.position = vector_to_world(DVec2::new(target.state.x, target.state.y));
      body.angle = direction_to_angle(target.state.direction);
    }
  }

  fn correct_target(&self, util: &mut dyn BlockUtility, id: &str) {
    let Some(body) = self.bodies.get(id) else {
      return;
    };
    let Some(target) = util.target_mut(id) else {
      return;
    };
    let position = world_to_vector(body.position);
    target.state.set_xy(position.x, position.y);
    target.state.set_direction(angle_to_direction(body.angle));
  }

  fn step(&mut self, delta: f64) {
    let acceleration = self.gravity * GRAVITY_SCALE * delta * delta;
    for body in self.bodies.values_mut() {
      body.velocity = body.velocity * (1. - FRICTION_AIR) + acceleration;
      body.position += body.velocity;
      body.angular_velocity *= 1. - FRICTION_AIR;
      body.angle += body.angular_velocity;
      for wall in &self.walls {
        push_out(body, wall);
      }
    }
  }

  fn tick(&mut self, util: &mut dyn BlockUtility) {
    let frame_rate = match util.config().frame_rate {
      0 => 60,
      frame_rate => frame_rate,
    };
    let ids: Vec<String> = self.bodies.keys().cloned().collect();
    for id in &ids {
      self.correct_body(util, id);
    }
    self.step(1000. / frame_rate as f64);
    for id in &ids {
      self.correct_target(util, id);
    }
    trace!("stepped {} bodies", self.bodies.len());
  }

  fn enable_physics(&mut self, option: &str, util: &mut dyn BlockUtility) -> Result<()> {
    let id = util.current_target_id();
    let Some(target) = util.target(&id) else {
      return Ok(());
    };
    let size = target.scaled_costume_size();
    let shape = match option {
      "box" => Shape::Box(size),
      "circle" => Shape::Circle(size.x.max(size.y) / 2.),
      "precise" => {
        return Err(Error::InvalidArgument {
          opcode: format!("enablePhysics"),
          reason: format!("precise bodies are not supported"),
        })
      }
      other => {
        return Err(Error::InvalidArgument {
          opcode: format!("enablePhysics"),
          reason: format!("unknown body type {other:?}"),
        })
      }
    };
    let position = vector_to_world(DVec2::new(target.state.x, target.state.y));
    self.bodies.insert(id.clone(), Body::new(shape, position));
    self.correct_body(util, &id);
    Ok(())
  }

  fn current_body(&mut self, util: &dyn BlockUtility) -> Option<&mut Body> {
    self.bodies.get_mut(util.thread().current_target())
  }
}

/* resolve along the axis of least overlap, without bounce */
fn push_out(body: &mut Body, wall: &Wall) {
  let half = body.shape.half_extents();
  let offset = body.position - wall.center;
  let overlap = half + wall.half - offset.abs();
  if overlap.x <= 0. || overlap.y <= 0. {
    return;
  }
  if overlap.x < overlap.y {
    body.position.x += overlap.x.copysign(offset.x);
    body.velocity.x = 0.;
  } else {
    body.position.y += overlap.y.copysign(offset.y);
    body.velocity.y = 0.;
  }
}

fn vector_argument() -> ArgumentInfo {
  ArgumentInfo {
    shape: Some(BlockShape::Square),
    check: vec![format!("Vector")],
    ..Default::default()
  }
}

fn vector_reporter(opcode: &str, text: &str) -> BlockItem {
  let mut block = BlockInfo::new(opcode, text, BlockType::Reporter).sprite_only();
  block.block_shape = Some(BlockShape::Square);
  block.force_output_type = Some(format!("Vector"));
  BlockItem::Block(block)
}

fn command(opcode: &str, text: &str) -> BlockInfo {
  BlockInfo::new(opcode, text, BlockType::Command).sprite_only()
}

fn vector_arg(args: &BlockArgs, name: &str) -> DVec2 {
  args
    .get(name)
    .and_then(Value::as_vector)
    .unwrap_or(DVec2::ZERO)
}

fn number_arg(args: &BlockArgs, name: &str) -> f64 {
  args.get(name).map_or(0., Value::to_f64)
}

fn text_arg(args: &BlockArgs, name: &str) -> String {
  args.get(name).map(Value::to_string).unwrap_or_default()
}

impl Extension for Psychic {
  fn info(&self) -> ExtensionInfo {
    let tick = BlockInfo::new("tick", "tick", BlockType::Command);
    let boundaries = BlockInfo::new("boundaries", "set boundaries to [OPTION]", BlockType::Command)
      .argument("OPTION", ArgumentInfo::menu("boundariesOption"));
    let set_gravity = BlockInfo::new("setGravity", "set gravity to [VECTOR]", BlockType::Command)
      .argument("VECTOR", vector_argument());
    let mut get_gravity = BlockInfo::new("getGravity", "gravity", BlockType::Reporter);
    get_gravity.block_shape = Some(BlockShape::Square);
    get_gravity.force_output_type = Some(format!("Vector"));

    let mut menus = BTreeMap::new();
    menus.insert(
      format!("boundariesOption"),
      vec![format!("all"), format!("floor"), format!("none")],
    );
    menus.insert(
      format!("enablePhysicsOption"),
      vec![format!("precise"), format!("box"), format!("circle")],
    );

    ExtensionInfo {
      id: EXTENSION_ID.to_string(),
      name: format!("Psychic"),
      color1: Some(format!("#b16bed")),
      blocks: vec![
        BlockItem::Block(tick),
        BlockItem::SEPARATOR,
        BlockItem::Block(boundaries),
        BlockItem::Block(set_gravity),
        BlockItem::Block(get_gravity),
        BlockItem::SEPARATOR,
        BlockItem::Block(
          command("enablePhysics", "enable physics as [OPTION]")
            .argument("OPTION", ArgumentInfo::menu("enablePhysicsOption")),
        ),
        BlockItem::Block(command("disablePhysics", "disable physics")),
        BlockItem::SEPARATOR,
        BlockItem::Block(
          command("setPos", "set position to [VECTOR]").argument("VECTOR", vector_argument()),
        ),
        vector_reporter("getPos", "position"),
        BlockItem::Block(
          command("setVel", "set velocity to [VECTOR]").argument("VECTOR", vector_argument()),
        ),
        vector_reporter("getVel", "velocity"),
        BlockItem::Block(
          command("setRot", "set rotation to [ANGLE]").argument("ANGLE", ArgumentInfo::angle(90.)),
        ),
        BlockItem::Block(
          BlockInfo::new("getRot", "rotation", BlockType::Reporter).sprite_only(),
        ),
        BlockItem::Block(
          command("setAngVel", "set angular velocity to [ANGLE]")
            .argument("ANGLE", ArgumentInfo::angle(0.)),
        ),
        BlockItem::Block(
          BlockInfo::new("getAngVel", "angular velocity", BlockType::Reporter).sprite_only(),
        ),
      ],
      menus,
    }
  }

  fn execute(
    &mut self,
    opcode: &str,
    args: &BlockArgs,
    util: &mut dyn BlockUtility,
  ) -> Result<Option<Value>> {
    match opcode {
      "tick" => self.tick(util),
      "boundaries" => {
        let config = util.config();
        let (width, height) = (config.stage_width as f64, config.stage_height as f64);
        self.set_bounds(&text_arg(args, "OPTION"), width, height);
      }
      "setGravity" => self.gravity = vector_to_world(vector_arg(args, "VECTOR")),
      "getGravity" => return Ok(Some(Value::Vector(world_to_vector(self.gravity)))),
      "enablePhysics" => self.enable_physics(&text_arg(args, "OPTION"), util)?,
      "disablePhysics" => {
        let id = util.current_target_id();
        self.bodies.remove(&id);
      }
      "setPos" => {
        let position = vector_arg(args, "VECTOR");
        let id = util.current_target_id();
        if let Some(target) = util.target_mut(&id) {
          target.state.set_xy(position.x, position.y);
        }
      }
      "getPos" => {
        let position = match self.current_body(util) {
          Some(body) => world_to_vector(body.position),
          None => {
            let id = util.current_target_id();
            util
              .target(&id)
              .map_or(DVec2::ZERO, |target| DVec2::new(target.state.x, target.state.y))
          }
        };
        return Ok(Some(Value::Vector(position)));
      }
      "setVel" => {
        let velocity = vector_to_world(vector_arg(args, "VECTOR"));
        if let Some(body) = self.current_body(util) {
          body.velocity = velocity;
        }
      }
      "getVel" => {
        let velocity = self
          .current_body(util)
          .map_or(DVec2::ZERO, |body| world_to_vector(body.velocity));
        return Ok(Some(Value::Vector(velocity)));
      }
      "setRot" => {
        let direction = number_arg(args, "ANGLE");
        let id = util.current_target_id();
        if let Some(target) = util.target_mut(&id) {
          target.state.set_direction(direction);
        }
      }
      "getRot" => {
        let direction = match self.current_body(util) {
          Some(body) => angle_to_direction(body.angle),
          None => {
            let id = util.current_target_id();
            util.target(&id).map_or(0., |target| target.state.direction)
          }
        };
        return Ok(Some(Value::Float(direction)));
      }
      "setAngVel" => {
        let angular_velocity = number_arg(args, "ANGLE");
        if let Some(body) = self.current_body(util) {
          body.angular_velocity = angular_velocity;
        }
      }
      "getAngVel" => {
        let angular_velocity = self
          .current_body(util)
          .map_or(0., |body| body.angular_velocity);
        return Ok(Some(Value::Float(angular_velocity)));
      }
      _ => {
        return Err(Error::UnknownOpcode {
          extension: EXTENSION_ID.to_string(),
          opcode: opcode.to_string(),
        })
      }
    }
    Ok(None)
  }

  fn on_project_start(&mut self) {
    debug!("resetting physics world");
    *self = Self::new();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::json;
  use crate::project::{Config, Project};
  use crate::thread::Thread;
  use pretty_assertions::assert_eq;

  const PROJECT: &str = r#"{
    "targets": [
      { "isStage": true, "name": "Stage" },
      {
        "isStage": false, "name": "Cat", "x": 0, "y": -150,
        "costumes": [{ "name": "cat", "rotationCenterX": 20, "rotationCenterY": 10 }]
      }
    ]
  }"#;

  fn project() -> Project {
    json::from_str(PROJECT, Config::default()).unwrap()
  }

  fn run(
    psychic: &mut Psychic,
    project: &mut Project,
    opcode: &str,
    args: BlockArgs,
  ) -> Result<Option<Value>> {
    let mut thread = Thread::new("Cat", None);
    let mut util = project.utility(&mut thread);
    psychic.execute(opcode, &args, &mut util)
  }

  fn option(option: &str) -> BlockArgs {
    BlockArgs::new().with("OPTION", option)
  }

  fn vector(x: f64, y: f64) -> BlockArgs {
    BlockArgs::new().with("VECTOR", Value::Vector(DVec2::new(x, y)))
  }

  #[test]
  fn bodies_fall_under_default_gravity() {
    let mut project = project();
    let mut psychic = Psychic::new();
    run(&mut psychic, &mut project, "enablePhysics", option("box")).unwrap();
    assert_eq!(
      psychic.body("Cat").unwrap().shape,
      Shape::Box(DVec2::new(40., 20.))
    );
    for _ in 0..5 {
      run(&mut psychic, &mut project, "tick", BlockArgs::new()).unwrap();
    }
    let cat = project.target("Cat").unwrap();
    assert!(cat.state.y < -150.);
    assert_eq!(cat.state.x, 0.);
    assert_eq!(cat.state.direction, 90.);
    let velocity = run(&mut psychic, &mut project, "getVel", BlockArgs::new()).unwrap();
    assert!(velocity.unwrap().as_vector().unwrap().y < 0.);
  }

  #[test]
  fn floor_stops_bodies() {
    let mut project = project();
    let mut psychic = Psychic::new();
    run(&mut psychic, &mut project, "boundaries", option("floor")).unwrap();
    run(&mut psychic, &mut project, "enablePhysics", option("box")).unwrap();
    for _ in 0..120 {
      run(&mut psychic, &mut project, "tick", BlockArgs::new()).unwrap();
    }
    assert_eq!(project.target("Cat").unwrap().state.y, -170.);
  }

  #[test]
  fn no_boundaries_lets_bodies_fall_forever() {
    let mut project = project();
    let mut psychic = Psychic::new();
    run(&mut psychic, &mut project, "boundaries", option("none")).unwrap();
    run(&mut psychic, &mut project, "enablePhysics", option("circle")).unwrap();
    assert_eq!(psychic.body("Cat").unwrap().shape, Shape::Circle(20.));
    for _ in 0..120 {
      run(&mut psychic, &mut project, "tick", BlockArgs::new()).unwrap();
    }
    assert!(project.target("Cat").unwrap().state.y < -180.);
  }

  #[test]
  fn gravity_is_reported_in_stage_coordinates() {
    let mut project = project();
    let mut psychic = Psychic::new();
    let gravity = run(&mut psychic, &mut project, "getGravity", BlockArgs::new()).unwrap();
    assert_eq!(gravity, Some(Value::Vector(DVec2::new(0., -1.))));
    run(&mut psychic, &mut project, "setGravity", vector(2., 3.)).unwrap();
    assert_eq!(psychic.gravity, DVec2::new(2., -3.));
    let gravity = run(&mut psychic, &mut project, "getGravity", BlockArgs::new()).unwrap();
    assert_eq!(gravity, Some(Value::Vector(DVec2::new(2., 3.))));
  }

  #[test]
  fn velocity_round_trips_through_the_body() {
    let mut project = project();
    let mut psychic = Psychic::new();
    run(&mut psychic, &mut project, "setVel", vector(1., 1.)).unwrap();
    let velocity = run(&mut psychic, &mut project, "getVel", BlockArgs::new()).unwrap();
    assert_eq!(velocity, Some(Value::Vector(DVec2::ZERO)));

    run(&mut psychic, &mut project, "enablePhysics", option("box")).unwrap();
    run(&mut psychic, &mut project, "setVel", vector(3., 4.)).unwrap();
    assert_eq!(psychic.body("Cat").unwrap().velocity, DVec2::new(3., -4.));
    let velocity = run(&mut psychic, &mut project, "getVel", BlockArgs::new()).unwrap();
    assert_eq!(velocity, Some(Value::Vector(DVec2::new(3., 4.))));
  }

  #[test]
  fn position_and_rotation_fall_back_to_the_sprite() {
    let mut project = project();
    let mut psychic = Psychic::new();
    run(&mut psychic, &mut project, "setPos", vector(12., 34.)).unwrap();
    run(&mut psychic, &mut project, "setRot", BlockArgs::new().with("ANGLE", 180)).unwrap();
    let position = run(&mut psychic, &mut project, "getPos", BlockArgs::new()).unwrap();
    assert_eq!(position, Some(Value::Vector(DVec2::new(12., 34.))));
    let rotation = run(&mut psychic, &mut project, "getRot", BlockArgs::new()).unwrap();
    assert_eq!(rotation, Some(Value::Float(180.)));
    let spin = run(&mut psychic, &mut project, "getAngVel", BlockArgs::new()).unwrap();
    assert_eq!(spin, Some(Value::Float(0.)));
  }

  #[test]
  fn body_state_follows_the_sprite() {
    let mut project = project();
    let mut psychic = Psychic::new();
    run(&mut psychic, &mut project, "enablePhysics", option("box")).unwrap();
    run(&mut psychic, &mut project, "setPos", vector(50., 60.)).unwrap();
    run(&mut psychic, &mut project, "setRot", BlockArgs::new().with("ANGLE", 180)).unwrap();
    psychic.correct_body(&project.utility(&mut Thread::new("Cat", None)), "Cat");
    let body = psychic.body("Cat").unwrap();
    assert_eq!(body.position, DVec2::new(50., -60.));
    assert!((body.angle - PI / 2.).abs() < 1e-12);
  }

  #[test]
  fn angular_velocity_turns_the_sprite() {
    let mut project = project();
    let mut psychic = Psychic::new();
    run(&mut psychic, &mut project, "enablePhysics", option("box")).unwrap();
    run(&mut psychic, &mut project, "setAngVel", BlockArgs::new().with("ANGLE", 0.1)).unwrap();
    run(&mut psychic, &mut project, "tick", BlockArgs::new()).unwrap();
    assert!(project.target("Cat").unwrap().state.direction > 90.);
  }

  #[test]
  fn disable_physics_removes_the_body() {
    let mut project = project();
    let mut psychic = Psychic::new();
    run(&mut psychic, &mut project, "enablePhysics", option("box")).unwrap();
    run(&mut psychic, &mut project, "disablePhysics", BlockArgs::new()).unwrap();
    assert!(psychic.body("Cat").is_none());
  }

  #[test]
  fn bodies_of_missing_targets_are_dropped() {
    let mut project = project();
    let mut psychic = Psychic::new();
    psychic.bodies.insert(
      format!("Ghost"),
      Body::new(Shape::Circle(1.), DVec2::ZERO),
    );
    run(&mut psychic, &mut project, "tick", BlockArgs::new()).unwrap();
    assert!(psychic.body("Ghost").is_none());
  }

  #[test]
  fn rejects_unsupported_bodies() {
    let mut project = project();
    let mut psychic = Psychic::new();
    assert!(run(&mut psychic, &mut project, "enablePhysics", option("precise")).is_err());
    assert!(run(&mut psychic, &mut project, "enablePhysics", option("blob")).is_err());
    assert!(run(&mut psychic, &mut project, "explode", BlockArgs::new()).is_err());
    assert!(psychic.body("Cat").is_none());
  }

  #[test]
  fn project_start_resets_the_world() {
    let mut project = project();
    let mut psychic = Psychic::new();
    run(&mut psychic, &mut project, "boundaries", option("all")).unwrap();
    run(&mut psychic, &mut project, "setGravity", vector(1., 0.)).unwrap();
    run(&mut psychic, &mut project, "enablePhysics", option("box")).unwrap();
    psychic.on_project_start();
    assert!(psychic.body("Cat").is_none());
    assert!(psychic.walls.is_empty());
    assert_eq!(psychic.gravity, DVec2::new(0., 1.));
  }
}
