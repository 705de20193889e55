use clap::Parser;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::{WorkerConfig, DEFAULT_CONFIG_PATH};

/// Materializes upcoming instances of recurring kanban tasks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[clap(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    /// Run a single generation pass and exit
    #[clap(long)]
    pub once: bool,
    /// Board to generate for; replaces the configured boards when given
    #[clap(short, long = "board")]
    pub boards: Vec<Uuid>,
    /// Database file; overrides the configured path
    #[clap(long)]
    pub database: Option<String>,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut WorkerConfig) {
        if !self.boards.is_empty() {
            config.boards = self.boards.clone();
        }
        if let Some(path) = &self.database {
            config.database_path = path.clone();
        }
    }
}
