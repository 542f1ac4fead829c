use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use doseguard_core::{Config, Database, DoseEngine, Session};

use crate::platform::{ConsolePlatform, FileEvidence};

pub mod alert;
pub mod config;
pub mod dose;
pub mod proof;
pub mod token;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Args)]
pub struct SessionArgs {
    /// Patient social security number identifying the session
    #[arg(long)]
    pub nss: String,
}

impl SessionArgs {
    pub fn session(&self) -> Session {
        Session::new(self.nss.trim())
    }
}

/// Engine over the on-disk database and configured backend.
pub fn open_engine(photo: Option<PathBuf>) -> Result<DoseEngine, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Arc::new(Database::open()?);
    let engine = DoseEngine::new(
        &config,
        db,
        Arc::new(ConsolePlatform),
        Arc::new(FileEvidence::new(photo)),
    )?;
    Ok(engine)
}
