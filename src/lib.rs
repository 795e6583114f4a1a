//! Dirvana - per-directory shell environments
//!
//! Dirvana loads aliases, functions and environment variables from
//! `.dirvana.yml` files as you move through a directory tree, and unloads
//! them again when you leave.
//!
//! ## Pipeline
//!
//! Every prompt runs `dirvana export`, which:
//!
//! 1. Resolves the **active chain**: ancestor-or-self directories that own a
//!    config file and were explicitly authorized.
//! 2. Computes which directories left the chain since the previous prompt
//!    and unsets the names they defined.
//! 3. Serves the merged definitions from the cache if the hash of every file
//!    in the chain is unchanged, otherwise loads and merges them.
//! 4. Runs `sh` env commands only after the exact command set was approved.

pub mod auth;
pub mod cache;
pub mod chain;
pub mod cleanup;
pub mod condition;
pub mod config;
pub mod error;
pub mod export;
pub mod fsutil;
pub mod paths;
pub mod render;
pub mod shell;

pub use auth::{AuthEntry, AuthStore};
pub use cache::{Cache, CacheEntry};
pub use chain::{ActiveChain, active_chain};
pub use cleanup::calculate_cleanup;
pub use config::{AliasSpec, ConfigDocument, EnvSpec, Loader, MergedConfig};
pub use error::{Error, Result};
pub use export::{Engine, Export, ExportRequest};
pub use render::Shell;
