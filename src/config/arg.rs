use clap::Parser;
use clap::Subcommand;

use crate::error::Error;
use crate::error::Result;

/// `litesync`: continuously shadow a SQLite database's WAL to one or more
/// replicas, or restore a database from a replica.
#[derive(Parser, Debug)]
#[command(author = "litesync", version, about = "Sync sqlite database", long_about = None)]
pub struct Arg {
    #[command(subcommand)]
    pub command: ArgCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ArgCommand {
    /// Continuously replicate every database named in the config file.
    #[command(about = "Replicate sqlite database")]
    Replicate(ReplicateOptions),
    /// Reconstruct a primary database from a replica.
    #[command(about = "Restore sqlite database from a replica")]
    Restore(RestoreOptions),
}

#[derive(Parser, Debug, Clone)]
pub struct ReplicateOptions {
    #[arg(short, long, default_value = "/etc/litesync.toml")]
    pub config: String,
}

#[derive(Parser, Debug, Clone)]
pub struct RestoreOptions {
    #[arg(short, long, default_value = "/etc/litesync.toml")]
    pub config: String,

    /// Name of the `[[database]]` entry to restore (its `db` path as
    /// written in the config file).
    #[arg(long)]
    pub db: String,

    /// Path to write the restored database to. Defaults to `db`.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Overwrite `output` if it already exists.
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Restore a specific generation instead of the latest one.
    #[arg(long)]
    pub generation: Option<String>,

    /// Name of the replica target to restore from, matching a
    /// `[[database.replicate]]` entry's `name`. Defaults to the first
    /// configured target.
    #[arg(long)]
    pub replica: Option<String>,
}

impl RestoreOptions {
    pub fn output_path(&self) -> String {
        self.output.clone().unwrap_or_else(|| self.db.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.db.is_empty() {
            return Err(Error::InvalidArg("--db must not be empty".into()));
        }
        Ok(())
    }
}
