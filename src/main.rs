use std::env;
use std::process::ExitCode;

use log::{error, info};
use procphorus::error::Result;
use procphorus::extensions::array::Arrays;
use procphorus::extensions::psychic::Psychic;
use procphorus::extensions::ExtensionManager;
use procphorus::project::{Config, Project};
use procphorus::thread::Thread;

fn load_extensions() -> ExtensionManager {
  let mut extensions = ExtensionManager::new();
  extensions.load(Box::new(Arrays));
  extensions.load(Box::new(Psychic::new()));
  extensions
}

fn start_scripts(project: &Project) -> Vec<Thread> {
  let mut threads = Vec::new();
  for target in &project.targets {
    for hat in target.data.blocks.hats("event_whenflagclicked") {
      threads.push(Thread::new(target.id(), Some(hat.to_string())));
    }
  }
  threads
}

fn list_procedures(project: &Project) {
  for target in &project.targets {
    let blocks = &target.data.blocks;
    let mut codes: Vec<&str> = blocks.procedure_codes().collect();
    codes.sort_unstable();
    info!(
      "{}: {} blocks, {} procedures",
      target.data.name,
      blocks.len(),
      codes.len()
    );
    for code in codes {
      let Some(signature) = blocks.procedure_signature(code) else {
        continue;
      };
      let warp = if signature.warp { " (warp)" } else { "" };
      println!(
        "{}\t{code}\t[{}]{warp}",
        target.data.name,
        signature.names.join(", ")
      );
    }
  }
}

fn run() -> Result<()> {
  let path = env::args().nth(1).unwrap_or_else(|| format!("project.json"));
  let config = Config::default();
  info!("loading {path} at {config}");
  let project = Project::load(&path, config)?;
  let mut extensions = load_extensions();
  extensions.project_start();
  list_procedures(&project);
  let threads = start_scripts(&project);
  info!("{} green flag scripts", threads.len());
  for thread in &threads {
    info!("  {} starts at {:?}", thread.target, thread.top_block);
  }
  println!("{}", serde_json::to_string_pretty(&extensions.infos())?);
  Ok(())
}

fn main() -> ExitCode {
  pretty_env_logger::init();
  match run() {
    Ok(()) => ExitCode::SUCCESS,
    Err(error) => {
      error!("{error}");
      ExitCode::FAILURE
    }
  }
}
