use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] liore_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Owner name cannot be empty")]
    EmptyOwnerName,
    #[error("Owner ID cannot be empty")]
    EmptyOwnerId,
    #[error("Nothing to update: pass --name or --field")]
    NothingToUpdate,
    #[error("Invalid field '{0}': expected KEY=VALUE")]
    InvalidField(String),
    #[error("Owner not found for id/prefix: {0}")]
    OwnerNotFound(String),
    #[error("{0}")]
    AmbiguousOwnerId(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Refusing to clear all owners without --yes")]
    ConfirmationRequired,
    #[error("The {0} was saved locally only; the remote store did not confirm it")]
    NotSynced(&'static str),
}
