use std::rc::Rc;

use log::debug;

use crate::block::{Block, ProcedureSignature};
use crate::frame::{Params, StackFrame};
use crate::project::{AddonBlock, Config, Project};
use crate::target::Target;
use crate::thread::{Thread, ThreadStatus};
use crate::value::Value;

/// Everything a primitive may ask of the host while it runs on a thread.
pub trait BlockUtility {
  fn thread(&self) -> &Thread;
  fn thread_mut(&mut self) -> &mut Thread;
  fn config(&self) -> &Config;

  /// Block from the container of the target the thread is running against.
  fn get_block(&self, id: &str) -> Option<&Block>;
  fn procedure_signature(&self, proccode: &str) -> Option<ProcedureSignature>;
  fn addon_block(&self, proccode: &str) -> Option<Rc<AddonBlock>>;
  /// Pushes the body of `proccode` onto the thread, if it can be found.
  fn start_procedure(&mut self, proccode: &str);
  /// Resolves the branch plugged into `entry` of `caller_id` to its first
  /// block and the id of the target owning it.
  fn branch_and_target(&self, caller_id: &str, entry: &str) -> Option<(String, String)>;

  fn target(&self, id: &str) -> Option<&Target>;
  fn target_mut(&mut self, id: &str) -> Option<&mut Target>;

  fn stack_frame(&mut self) -> Option<&mut StackFrame> {
    self.thread_mut().peek_stack_frame_mut()
  }

  fn init_params(&mut self) {
    if let Some(frame) = self.stack_frame() {
      frame.init_params();
    }
  }

  fn push_param(&mut self, name: &str, value: Value) {
    if let Some(frame) = self.stack_frame() {
      frame.push_param(name, value);
    }
  }

  fn get_param(&self, name: &str) -> Option<&Value> {
    self.thread().get_param(name)
  }

  fn all_params(&self) -> Params {
    self.thread().all_params()
  }

  fn thread_status(&self) -> ThreadStatus {
    self.thread().status
  }

  /// Pushes a resolved branch, or the null marker when there is none.
  fn push_branch(&mut self, branch: Option<(String, String)>) {
    match branch {
      Some((block, target)) => self.thread_mut().push_stack_with_target(block, target),
      None => self.thread_mut().push_stack(None),
    }
  }

  fn current_target_id(&self) -> String {
    self.thread().current_target().to_string()
  }
}

/// [`BlockUtility`] backed by a loaded [`Project`].
#[derive(Debug)]
pub struct ThreadUtility<'a> {
  project: &'a mut Project,
  thread: &'a mut Thread,
}

impl<'a> ThreadUtility<'a> {
  pub fn new(project: &'a mut Project, thread: &'a mut Thread) -> Self {
    Self { project, thread }
  }

  fn current_target(&self) -> Option<&Target> {
    self.project.target(self.thread.current_target())
  }
}

impl<'a> BlockUtility for ThreadUtility<'a> {
  fn thread(&self) -> &Thread {
    &*self.thread
  }

  fn thread_mut(&mut self) -> &mut Thread {
    &mut *self.thread
  }

  fn config(&self) -> &Config {
    &self.project.config
  }

  fn get_block(&self, id: &str) -> Option<&Block> {
    self.current_target()?.data.blocks.get_block(id)
  }

  fn procedure_signature(&self, proccode: &str) -> Option<ProcedureSignature> {
    self
      .current_target()?
      .data
      .blocks
      .procedure_signature(proccode)
      .cloned()
  }

  fn addon_block(&self, proccode: &str) -> Option<Rc<AddonBlock>> {
    self.project.addon_block(proccode)
  }

  fn start_procedure(&mut self, proccode: &str) {
    let Some(target) = self.project.target(self.thread.current_target()) else {
      return;
    };
    let blocks = &target.data.blocks;
    let Some(definition) = blocks.procedure_definition(proccode) else {
      debug!("no definition for {proccode:?} in {}", target.data.name);
      return;
    };
    let warp = blocks
      .procedure_signature(proccode)
      .map_or(false, |signature| signature.warp);
    let recursive = self.thread.is_recursive_call(proccode, blocks);
    self.thread.push_stack(Some(definition.to_string()));
    if warp {
      if let Some(frame) = self.thread.peek_stack_frame_mut() {
        frame.warp_mode = true;
      }
    } else if recursive {
      self.thread.status = ThreadStatus::Yield;
    }
  }

  fn branch_and_target(&self, caller_id: &str, entry: &str) -> Option<(String, String)> {
    let own = self.thread.current_target();
    let ordered = self
      .project
      .target(own)
      .into_iter()
      .chain(self.project.targets.iter().filter(|target| target.id() != own));
    for target in ordered {
      if let Some(branch) = target.data.blocks.get_branch(caller_id, entry) {
        return Some((branch.to_string(), target.id().to_string()));
      }
    }
    None
  }

  fn target(&self, id: &str) -> Option<&Target> {
    self.project.target(id)
  }

  fn target_mut(&mut self, id: &str) -> Option<&mut Target> {
    self.project.target_mut(id)
  }
}
