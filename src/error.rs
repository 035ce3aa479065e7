use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("could not read project: {0}")]
  Io(#[from] io::Error),
  #[error("could not decode project.json: {0}")]
  Json(#[from] serde_json::Error),
  #[error("`unzip` exited with {0} while unpacking {1}")]
  Unpack(std::process::ExitStatus, String),
  #[error("malformed mutation on block {block}: {reason}")]
  Mutation { block: String, reason: String },
  #[error("extension {extension} has no block {opcode}")]
  UnknownOpcode { extension: String, opcode: String },
  #[error("invalid argument for {opcode}: {reason}")]
  InvalidArgument { opcode: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
