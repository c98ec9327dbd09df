use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "liore")]
#[command(about = "Manage Liore Verse story owners from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to the local cache database
    #[arg(long, global = true, value_name = "PATH")]
    pub cache_path: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all owners
    #[command(alias = "ls")]
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a new owner
    #[command(alias = "new")]
    Add {
        /// Owner display name
        name: Vec<String>,
        /// Extra field as KEY=VALUE (VALUE is parsed as JSON when possible)
        #[arg(short, long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Update fields of an existing owner
    Update {
        /// Owner ID or unique ID prefix
        id: String,
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// Field to set as KEY=VALUE
        #[arg(short, long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Delete an owner
    #[command(alias = "rm")]
    Delete {
        /// Owner ID or unique ID prefix
        id: String,
    },
    /// Export all owners as a JSON backup
    Export {
        /// Output file or directory (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Replace all owners with the contents of a JSON backup
    Import {
        /// Backup file to import
        path: PathBuf,
    },
    /// Follow live changes until interrupted
    Watch {
        /// Print each snapshot as one JSON line
        #[arg(long)]
        json: bool,
    },
    /// Check the connection to the remote store
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every owner locally and remotely
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Firebase project ID
        #[arg(long, value_name = "ID")]
        project_id: Option<String>,
        /// Firebase web API key
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
        /// Firestore database ID
        #[arg(long, value_name = "ID")]
        database_id: Option<String>,
        /// Firestore REST endpoint override (e.g. a local emulator)
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
        /// Firestore collection holding the owners
        #[arg(long, value_name = "NAME")]
        collection: Option<String>,
    },
    /// Print the effective configuration with credentials redacted
    Show,
}
