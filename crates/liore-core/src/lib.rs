//! liore-core - Core library for Liore Sync
//!
//! This crate contains the story-owner model, the local-first sync policy
//! (`SyncStore`), and the remote-store and local-cache backends it
//! coordinates. The CLI (and any other front end) only composes these pieces.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod notify;
pub mod remote;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Owner, OwnerDraft, OwnerId};
pub use sync::{ConnectionStatus, Subscription, SyncStore};
