use std::collections::HashMap;

use crate::value::Value;

/// Parameters bound by one procedure call, keyed by display name.
pub type Params = HashMap<String, Value>;

/// Per-block execution state kept parallel to a thread's block stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackFrame {
  /// Set once a call block has dispatched, so resuming the thread does not
  /// dispatch it again.
  pub executed: bool,
  /// `None` until a procedure call binds parameters on this frame.
  pub params: Option<Params>,
  pub warp_mode: bool,
  /// Block currently being evaluated on this frame (interpreted mode only).
  pub op: Option<String>,
  /// Target this entry executes against when it differs from the thread's.
  pub target: Option<String>,
}

impl StackFrame {
  pub fn new(warp_mode: bool) -> Self {
    Self {
      warp_mode,
      ..Default::default()
    }
  }

  /// Prepares the frame for the next block of the same sequence, which keeps
  /// running against the same target.
  pub fn reuse(&mut self, warp_mode: bool) {
    self.executed = false;
    self.params = None;
    self.warp_mode = warp_mode;
    self.op = None;
  }

  pub fn init_params(&mut self) {
    self.params = Some(Params::new());
  }

  pub fn push_param(&mut self, name: impl Into<String>, value: Value) {
    self
      .params
      .get_or_insert_with(Params::new)
      .insert(name.into(), value);
  }
}
