//! Custom block primitives: definition, call, parameter set, and the three
//! argument reporters.
//!
//! Parameters are bound on the stack frame of the call block itself. The body
//! runs in frames pushed above it, which own no params, so a lookup walks down
//! to the nearest frame that does and stops there. Re-entrant calls therefore
//! each see only their own bindings.

use std::collections::HashMap;
use std::str::FromStr;

use log::{debug, trace};

use crate::block::BlockArgs;
use crate::thread::ThreadStatus;
use crate::utility::BlockUtility;
use crate::value::Value;

pub type Primitive = fn(&BlockArgs, &mut dyn BlockUtility) -> Option<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
  Definition,
  Call,
  Set,
  ArgumentReporterStringNumber,
  ArgumentReporterBoolean,
  ArgumentReporterCommand,
}

impl Opcode {
  pub const ALL: [Opcode; 6] = [
    Opcode::Definition,
    Opcode::Call,
    Opcode::Set,
    Opcode::ArgumentReporterStringNumber,
    Opcode::ArgumentReporterBoolean,
    Opcode::ArgumentReporterCommand,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Opcode::Definition => "procedures_definition",
      Opcode::Call => "procedures_call",
      Opcode::Set => "procedures_set",
      Opcode::ArgumentReporterStringNumber => "argument_reporter_string_number",
      Opcode::ArgumentReporterBoolean => "argument_reporter_boolean",
      Opcode::ArgumentReporterCommand => "argument_reporter_command",
    }
  }

  pub fn primitive(self) -> Primitive {
    match self {
      Opcode::Definition => definition,
      Opcode::Call => call,
      Opcode::Set => set,
      Opcode::ArgumentReporterStringNumber => argument_reporter_string_number,
      Opcode::ArgumentReporterBoolean => argument_reporter_boolean,
      Opcode::ArgumentReporterCommand => argument_reporter_command,
    }
  }
}

impl FromStr for Opcode {
  type Err = ();

  fn from_str(opcode: &str) -> Result<Self, Self::Err> {
    Opcode::ALL
      .into_iter()
      .find(|candidate| candidate.as_str() == opcode)
      .ok_or(())
  }
}

/// Opcode to primitive table handed to the scheduler at startup.
pub fn primitives() -> HashMap<&'static str, Primitive> {
  Opcode::ALL
    .into_iter()
    .map(|opcode| (opcode.as_str(), opcode.primitive()))
    .collect()
}

/// Hat of a custom block body. Execution jumps past it into the body.
pub fn definition(_args: &BlockArgs, _util: &mut dyn BlockUtility) -> Option<Value> {
  None
}

pub fn call(args: &BlockArgs, util: &mut dyn BlockUtility) -> Option<Value> {
  if util.stack_frame().map_or(true, |frame| frame.executed) {
    return None;
  }
  let proccode = args.proccode()?;
  let Some(signature) = util.procedure_signature(proccode) else {
    /* custom block dragged to a sprite without its definition: do nothing */
    debug!("call to unknown procedure {proccode:?} ignored");
    return None;
  };

  // Always start from an empty mapping so lookups never reach an enclosing call.
  util.init_params();
  for ((name, id), default) in signature
    .names
    .iter()
    .zip(&signature.ids)
    .zip(&signature.defaults)
  {
    let value = args.get(id).cloned().unwrap_or_else(|| default.clone());
    trace!("{proccode:?}: {name} = {value:?}");
    util.push_param(name, value);
  }

  if let Some(addon) = util.addon_block(proccode) {
    let params = util.all_params();
    let result = (addon.callback)(&params, util);
    if util.thread_status() == ThreadStatus::PromiseWait {
      if let Some(frame) = util.stack_frame() {
        frame.executed = true;
      }
    }
    return result;
  }

  if let Some(frame) = util.stack_frame() {
    frame.executed = true;
  }
  debug!("starting procedure {proccode:?}");
  util.start_procedure(proccode);
  None
}

/// Overwrites a parameter of the running call.
///
/// The value is written to the thread's outermost frame, not to the frame
/// that bound the parameter.
pub fn set(args: &BlockArgs, util: &mut dyn BlockUtility) -> Option<Value> {
  let name = {
    let active = util.thread().active_block()?;
    let block = util.get_block(active)?;
    let param = util.get_block(block.inputs.get("PARAM")?.block_id()?)?;
    param.fields.get("VALUE")?.value.to_string()
  };
  let value = args.get("VALUE").cloned().unwrap_or_default();
  let outermost = util.thread_mut().stack_frames_mut().first_mut()?;
  trace!("set {name} = {value:?}");
  outermost.push_param(name, value);
  None
}

fn read_param(args: &BlockArgs, util: &dyn BlockUtility) -> Value {
  args
    .get("VALUE")
    .and_then(|name| util.get_param(&name.to_string()))
    .cloned()
    .unwrap_or(Value::Integer(0))
}

pub fn argument_reporter_string_number(
  args: &BlockArgs,
  util: &mut dyn BlockUtility,
) -> Option<Value> {
  Some(read_param(args, util))
}

pub fn argument_reporter_boolean(args: &BlockArgs, util: &mut dyn BlockUtility) -> Option<Value> {
  Some(read_param(args, util))
}

/// Runs the branch bound to a command parameter.
pub fn argument_reporter_command(args: &BlockArgs, util: &mut dyn BlockUtility) -> Option<Value> {
  let name = args.get("VALUE")?.to_string();
  let value = util.get_param(&name)?.clone();
  let resolved = match value.as_branch() {
    Some(branch) => {
      let entry = branch.entry.as_deref()?;
      branch
        .caller_id
        .as_deref()
        .and_then(|caller_id| util.branch_and_target(caller_id, entry))
    }
    /* a plain value has no entry to resolve */
    None => None,
  };
  util.push_branch(resolved);
  None
}
