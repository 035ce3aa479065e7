use glam::DVec2;

use crate::block::BlockContainer;

#[derive(Debug, Clone)]
pub struct Target {
  pub data: TargetData,
  pub state: TargetState,
}

#[derive(Debug, Clone)]
pub struct TargetData {
  pub id: String,
  pub name: String,
  pub is_stage: bool,
  pub blocks: BlockContainer,
  pub costumes: Vec<Costume>,
}

/// Stage-pixel size of a costume at 100% scale.
#[derive(Debug, Clone)]
pub struct Costume {
  pub size: DVec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetState {
  pub x: f64,
  pub y: f64,
  pub size: f64,
  pub direction: f64,
  pub current_costume: usize,
  /// Horizontal and vertical stretch in percent.
  pub stretch: DVec2,
}

impl Default for TargetState {
  fn default() -> Self {
    Self {
      x: 0.,
      y: 0.,
      size: 100.,
      direction: 90.,
      current_costume: 0,
      stretch: DVec2::new(100., 100.),
    }
  }
}

impl TargetState {
  pub fn set_xy(&mut self, x: f64, y: f64) {
    if x.is_finite() {
      self.x = x;
    }
    if y.is_finite() {
      self.y = y;
    }
  }

  /// Directions are kept in (-180, 180].
  pub fn set_direction(&mut self, direction: f64) {
    if !direction.is_finite() {
      return;
    }
    let wrapped = (direction + 180.).rem_euclid(360.) - 180.;
    self.direction = if wrapped == -180. { 180. } else { wrapped };
  }
}

impl Target {
  pub fn id(&self) -> &str {
    &self.data.id
  }

  /// Current costume size scaled by the sprite's size and stretch.
  pub fn scaled_costume_size(&self) -> DVec2 {
    let costume = self
      .data
      .costumes
      .get(self.state.current_costume)
      .map(|costume| costume.size)
      .unwrap_or(DVec2::ZERO);
    costume * (self.state.size / 100.) * (self.state.stretch / 100.)
  }
}
