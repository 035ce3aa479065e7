use crate::block::BlockContainer;
use crate::frame::{Params, StackFrame};
use crate::value::Value;

/// How many enclosing stack entries are examined for a recursive call.
const RECURSION_WINDOW: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadStatus {
  #[default]
  Running,
  /// Parked until an asynchronous result arrives.
  PromiseWait,
  Yield,
  YieldTick,
  Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
  #[default]
  Interpreted,
  Compiled,
}

impl ExecutionMode {
  pub fn locator(self) -> &'static dyn ActiveBlockLocator {
    match self {
      ExecutionMode::Interpreted => &InterpretedLocator,
      ExecutionMode::Compiled => &CompiledLocator,
    }
  }
}

/// Finds the block a thread is executing right now.
pub trait ActiveBlockLocator {
  fn active_block<'t>(&self, thread: &'t Thread) -> Option<&'t str>;
}

/// The interpreter records the op it is evaluating on the top frame.
pub struct InterpretedLocator;

impl ActiveBlockLocator for InterpretedLocator {
  fn active_block<'t>(&self, thread: &'t Thread) -> Option<&'t str> {
    thread.peek_stack_frame()?.op.as_deref()
  }
}

/// Compiled scripts only keep the block id on the stack.
pub struct CompiledLocator;

impl ActiveBlockLocator for CompiledLocator {
  fn active_block<'t>(&self, thread: &'t Thread) -> Option<&'t str> {
    thread.peek_stack()
  }
}

/// A script in progress: a stack of block ids with one frame per entry.
/// `None` entries are null markers that simply advance the thread.
#[derive(Debug, Clone)]
pub struct Thread {
  pub target: String,
  pub top_block: Option<String>,
  pub status: ThreadStatus,
  pub mode: ExecutionMode,
  stack: Vec<Option<String>>,
  stack_frames: Vec<StackFrame>,
}

impl Thread {
  pub fn new(target: impl Into<String>, top_block: Option<String>) -> Self {
    let mut thread = Self {
      target: target.into(),
      top_block: top_block.clone(),
      status: ThreadStatus::Running,
      mode: ExecutionMode::Interpreted,
      stack: Vec::new(),
      stack_frames: Vec::new(),
    };
    thread.push_stack(top_block);
    thread
  }

  pub fn compiled(mut self) -> Self {
    self.mode = ExecutionMode::Compiled;
    self
  }

  pub fn push_stack(&mut self, block: Option<String>) {
    let warp_mode = self
      .stack_frames
      .last()
      .map(|frame| frame.warp_mode)
      .unwrap_or(false);
    self.stack.push(block);
    self.stack_frames.push(StackFrame::new(warp_mode));
  }

  /// Pushes a branch that runs against `target`'s blocks.
  pub fn push_stack_with_target(&mut self, block: String, target: String) {
    let switches = target != self.current_target();
    self.push_stack(Some(block));
    if switches {
      if let Some(frame) = self.stack_frames.last_mut() {
        frame.target = Some(target);
      }
    }
  }

  /// Target whose blocks the top of the stack belongs to.
  pub fn current_target(&self) -> &str {
    self
      .stack_frames
      .iter()
      .rev()
      .find_map(|frame| frame.target.as_deref())
      .unwrap_or(&self.target)
  }

  /// Pops a block and drops its frame together with any params it owns.
  pub fn pop_stack(&mut self) -> Option<Option<String>> {
    self.stack_frames.pop();
    self.stack.pop()
  }

  pub fn reuse_stack_for_next_block(&mut self, block: Option<String>) {
    let Some(top) = self.stack.last_mut() else {
      return self.push_stack(block);
    };
    *top = block;
    let len = self.stack_frames.len();
    let warp_mode = match len {
      0 | 1 => false,
      _ => self.stack_frames[len - 2].warp_mode,
    };
    if let Some(frame) = self.stack_frames.last_mut() {
      frame.reuse(warp_mode);
    }
  }

  pub fn peek_stack(&self) -> Option<&str> {
    self.stack.last()?.as_deref()
  }

  pub fn stack(&self) -> &[Option<String>] {
    &self.stack
  }

  pub fn peek_stack_frame(&self) -> Option<&StackFrame> {
    self.stack_frames.last()
  }

  pub fn peek_stack_frame_mut(&mut self) -> Option<&mut StackFrame> {
    self.stack_frames.last_mut()
  }

  pub fn stack_frames(&self) -> &[StackFrame] {
    &self.stack_frames
  }

  pub fn stack_frames_mut(&mut self) -> &mut [StackFrame] {
    &mut self.stack_frames
  }

  pub fn active_block(&self) -> Option<&str> {
    self.mode.locator().active_block(self)
  }

  /// Frame that currently scopes parameter lookups: the nearest one that owns
  /// a params mapping.
  fn scope(&self) -> Option<&Params> {
    self
      .stack_frames
      .iter()
      .rev()
      .find_map(|frame| frame.params.as_ref())
  }

  /// Looks `name` up in the nearest call's params only; an outer call binding
  /// the same name is never consulted.
  pub fn get_param(&self, name: &str) -> Option<&Value> {
    self.scope()?.get(name)
  }

  pub fn all_params(&self) -> Params {
    self.scope().cloned().unwrap_or_default()
  }

  /// Whether `proccode` is already being called within the last few
  /// enclosing stack entries (the top entry is the call itself).
  pub fn is_recursive_call(&self, proccode: &str, blocks: &BlockContainer) -> bool {
    self
      .stack
      .iter()
      .rev()
      .skip(1)
      .take(RECURSION_WINDOW)
      .flatten()
      .filter_map(|id| blocks.get_block(id))
      .any(|block| {
        block.opcode == "procedures_call"
          && block
            .mutation
            .as_ref()
            .and_then(|mutation| mutation.proccode.as_deref())
            == Some(proccode)
      })
  }
}
