use std::collections::HashMap;

use log::{trace, warn};
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::input::Input;
use crate::value::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
  pub opcode: String,
  #[serde(default)]
  pub next: Option<String>,
  #[serde(default)]
  pub parent: Option<String>,
  #[serde(default)]
  pub inputs: HashMap<String, Input>,
  #[serde(default)]
  pub fields: HashMap<String, Field>,
  #[serde(default)]
  pub mutation: Option<Mutation>,
  #[serde(default)]
  pub shadow: bool,
  #[serde(default)]
  pub top_level: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
  pub value: Value,
  pub id: Option<String>,
}

/* ["value"] or ["value", "id" | null] */
impl<'de> Deserialize<'de> for Field {
  fn deserialize<D: Deserializer<'de>>(de: D) -> std::result::Result<Self, D::Error> {
    let mut parts: Vec<Option<Value>> = Deserialize::deserialize(de)?;
    let id = parts.get_mut(1).and_then(Option::take).map(|id| id.to_string());
    let value = parts.into_iter().next().flatten().unwrap_or_default();
    Ok(Self { value, id })
  }
}

/// The `mutation` record carried by procedure prototypes and call sites.
/// Argument lists are JSON arrays encoded as strings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Mutation {
  #[serde(default)]
  pub proccode: Option<String>,
  #[serde(default)]
  pub argumentids: Option<String>,
  #[serde(default)]
  pub argumentnames: Option<String>,
  #[serde(default)]
  pub argumentdefaults: Option<String>,
  #[serde(default)]
  pub warp: Option<Value>,
}

/// Parameters of a custom block, positionally aligned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcedureSignature {
  pub names: Vec<String>,
  pub ids: Vec<String>,
  pub defaults: Vec<Value>,
  pub warp: bool,
}

impl ProcedureSignature {
  pub fn from_mutation(block_id: &str, mutation: &Mutation) -> Result<Self> {
    let names: Vec<String> = decode_list(block_id, "argumentnames", &mutation.argumentnames)?;
    let ids: Vec<String> = decode_list(block_id, "argumentids", &mutation.argumentids)?;
    let mut defaults: Vec<Value> =
      decode_list(block_id, "argumentdefaults", &mutation.argumentdefaults)?;
    if names.len() != ids.len() {
      return Err(Error::Mutation {
        block: block_id.to_string(),
        reason: format!("{} argument names for {} argument ids", names.len(), ids.len()),
      });
    }
    if defaults.len() > ids.len() {
      return Err(Error::Mutation {
        block: block_id.to_string(),
        reason: format!("{} defaults for {} arguments", defaults.len(), ids.len()),
      });
    }
    defaults.resize(ids.len(), Value::String(String::new()));
    Ok(Self {
      names,
      ids,
      defaults,
      warp: mutation.warp.as_ref().map(Value::to_bool).unwrap_or(false),
    })
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }
}

fn decode_list<T: for<'de> Deserialize<'de>>(
  block_id: &str,
  name: &str,
  encoded: &Option<String>,
) -> Result<Vec<T>> {
  let Some(encoded) = encoded else {
    return Ok(Vec::new());
  };
  serde_json::from_str(encoded).map_err(|error| Error::Mutation {
    block: block_id.to_string(),
    reason: format!("{name}: {error}"),
  })
}

/// Evaluated arguments handed to a primitive: inputs and fields by name, plus
/// the block's mutation when it has one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockArgs {
  values: HashMap<String, Value>,
  pub mutation: Option<Mutation>,
}

impl BlockArgs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.values.insert(name.into(), value.into());
    self
  }

  pub fn with_mutation(mut self, mutation: Mutation) -> Self {
    self.mutation = Some(mutation);
    self
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.values.get(name)
  }

  pub fn proccode(&self) -> Option<&str> {
    self.mutation.as_ref()?.proccode.as_deref()
  }
}

#[derive(Debug, Clone)]
struct Procedure {
  signature: ProcedureSignature,
  definition: Option<String>,
}

/// All blocks of one target, indexed for procedure lookups.
#[derive(Debug, Clone, Default)]
pub struct BlockContainer {
  blocks: HashMap<String, Block>,
  procedures: HashMap<String, Procedure>,
}

impl BlockContainer {
  pub fn new(blocks: HashMap<String, Block>) -> Self {
    let mut ids: Vec<&String> = blocks.keys().collect();
    ids.sort_unstable();
    let mut procedures: HashMap<String, Procedure> = HashMap::new();
    for id in &ids {
      let block = &blocks[*id];
      if block.opcode != "procedures_prototype" {
        continue;
      }
      let Some(mutation) = &block.mutation else {
        warn!("prototype {id} has no mutation, skipping");
        continue;
      };
      let Some(proccode) = &mutation.proccode else {
        warn!("prototype {id} has no proccode, skipping");
        continue;
      };
      if procedures.contains_key(proccode) {
        warn!("prototype {id} redefines {proccode:?}, keeping the first");
        continue;
      }
      match ProcedureSignature::from_mutation(id, mutation) {
        Ok(signature) => {
          trace!("indexed procedure {proccode:?} with {} params", signature.len());
          procedures.insert(
            proccode.clone(),
            Procedure {
              signature,
              definition: None,
            },
          );
        }
        Err(error) => warn!("{error}, skipping"),
      }
    }
    for id in &ids {
      let block = &blocks[*id];
      if block.opcode != "procedures_definition" {
        continue;
      }
      let proccode = block
        .inputs
        .get("custom_block")
        .and_then(Input::block_id)
        .and_then(|prototype| blocks.get(prototype))
        .and_then(|prototype| prototype.mutation.as_ref())
        .and_then(|mutation| mutation.proccode.as_ref());
      let Some(procedure) = proccode.and_then(|proccode| procedures.get_mut(proccode)) else {
        continue;
      };
      if procedure.definition.is_none() {
        procedure.definition = Some(id.to_string());
      }
    }
    Self { blocks, procedures }
  }

  pub fn get_block(&self, id: &str) -> Option<&Block> {
    self.blocks.get(id)
  }

  pub fn len(&self) -> usize {
    self.blocks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  /// Resolves a procedure code to its parameter names, ids and defaults.
  pub fn procedure_signature(&self, proccode: &str) -> Option<&ProcedureSignature> {
    self.procedures.get(proccode).map(|procedure| &procedure.signature)
  }

  /// Id of the `procedures_definition` hat whose prototype carries `proccode`.
  pub fn procedure_definition(&self, proccode: &str) -> Option<&str> {
    self
      .procedures
      .get(proccode)
      .and_then(|procedure| procedure.definition.as_deref())
  }

  /// Ids of the top-level blocks with `opcode`, in id order.
  pub fn hats(&self, opcode: &str) -> Vec<&str> {
    let mut hats: Vec<&str> = self
      .blocks
      .iter()
      .filter(|(_, block)| block.top_level && block.opcode == opcode)
      .map(|(id, _)| id.as_str())
      .collect();
    hats.sort_unstable();
    hats
  }

  pub fn procedure_codes(&self) -> impl Iterator<Item = &str> {
    self.procedures.keys().map(String::as_str)
  }

  /// First block of the branch plugged into input `entry` of block `caller_id`.
  pub fn get_branch(&self, caller_id: &str, entry: &str) -> Option<&str> {
    self.blocks.get(caller_id)?.inputs.get(entry)?.block_id()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn container(json: &str) -> BlockContainer {
    BlockContainer::new(serde_json::from_str(json).unwrap())
  }

  const FOO: &str = r#"{
    "def": {
      "opcode": "procedures_definition", "next": "body", "parent": null,
      "inputs": { "custom_block": [1, "proto"] }, "fields": {},
      "shadow": false, "topLevel": true
    },
    "proto": {
      "opcode": "procedures_prototype", "next": null, "parent": "def",
      "inputs": {}, "fields": {}, "shadow": true, "topLevel": false,
      "mutation": {
        "tagName": "mutation", "children": [], "proccode": "foo %n %b",
        "argumentids": "[\"p1\",\"p2\"]",
        "argumentnames": "[\"x\",\"flag\"]",
        "argumentdefaults": "[\"0\",\"false\"]",
        "warp": "true"
      }
    },
    "body": {
      "opcode": "control_if", "next": null, "parent": "def",
      "inputs": { "SUBSTACK": [2, "inner"] }, "fields": {},
      "shadow": false, "topLevel": false
    }
  }"#;

  #[test]
  fn indexes_prototype_signature_and_definition() {
    let blocks = container(FOO);
    assert_eq!(
      blocks.procedure_signature("foo %n %b"),
      Some(&ProcedureSignature {
        names: vec!["x".to_string(), "flag".to_string()],
        ids: vec!["p1".to_string(), "p2".to_string()],
        defaults: vec![Value::from("0"), Value::from("false")],
        warp: true,
      })
    );
    assert_eq!(blocks.procedure_definition("foo %n %b"), Some("def"));
    assert_eq!(blocks.procedure_signature("bar"), None);
  }

  #[test]
  fn duplicate_prototypes_keep_the_first_by_id() {
    let blocks = container(
      r#"{
        "b-def": { "opcode": "procedures_definition", "topLevel": true,
          "inputs": { "custom_block": [1, "b-proto"] } },
        "b-proto": { "opcode": "procedures_prototype",
          "mutation": { "proccode": "dup %s", "argumentids": "[\"b\"]",
            "argumentnames": "[\"second\"]" } },
        "a-def": { "opcode": "procedures_definition", "topLevel": true,
          "inputs": { "custom_block": [1, "a-proto"] } },
        "a-proto": { "opcode": "procedures_prototype",
          "mutation": { "proccode": "dup %s", "argumentids": "[\"a\"]",
            "argumentnames": "[\"first\"]" } }
      }"#,
    );
    let signature = blocks.procedure_signature("dup %s").unwrap();
    assert_eq!(signature.names, vec!["first".to_string()]);
    assert_eq!(blocks.procedure_definition("dup %s"), Some("a-def"));
  }

  #[test]
  fn lists_top_level_hats() {
    let blocks = container(FOO);
    assert_eq!(blocks.hats("procedures_definition"), vec!["def"]);
    assert!(blocks.hats("control_if").is_empty());
  }

  #[test]
  fn resolves_branch_through_caller_input() {
    let blocks = container(FOO);
    assert_eq!(blocks.get_branch("body", "SUBSTACK"), Some("inner"));
    assert_eq!(blocks.get_branch("body", "SUBSTACK2"), None);
    assert_eq!(blocks.get_branch("missing", "SUBSTACK"), None);
  }

  #[test]
  fn skips_prototypes_with_mismatched_argument_lists() {
    let blocks = container(
      r#"{
        "proto": {
          "opcode": "procedures_prototype", "inputs": {}, "fields": {},
          "mutation": {
            "proccode": "broken %s",
            "argumentids": "[\"a\",\"b\"]",
            "argumentnames": "[\"only\"]"
          }
        }
      }"#,
    );
    assert_eq!(blocks.procedure_signature("broken %s"), None);
  }

  #[test]
  fn pads_missing_defaults() {
    let mutation = Mutation {
      proccode: Some("p %s".to_string()),
      argumentids: Some(r#"["a"]"#.to_string()),
      argumentnames: Some(r#"["s"]"#.to_string()),
      ..Default::default()
    };
    let signature = ProcedureSignature::from_mutation("proto", &mutation).unwrap();
    assert_eq!(signature.defaults, vec![Value::from("")]);
    assert!(!signature.warp);
  }

  #[test]
  fn reads_fields_with_and_without_ids() {
    let fields: HashMap<String, Field> =
      serde_json::from_str(r#"{ "VALUE": ["x", null], "VARIABLE": ["score", "v1"] }"#).unwrap();
    assert_eq!(fields["VALUE"].value, Value::from("x"));
    assert_eq!(fields["VALUE"].id, None);
    assert_eq!(fields["VARIABLE"].id, Some("v1".to_string()));
  }
}
