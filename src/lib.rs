//! mpas bootstrap library
//!
//! Installs versioned bootstrap components from a component archive into a
//! GitOps management repository and the cluster synced from it.
//!
//! The pipeline for one component, see [`installer::Installation`]:
//!
//! 1. [`resolver`] picks the first listed version matching a constraint
//! 2. [`extract`] classifies and decompresses the version's resources
//! 3. [`manifest`] rewrites image references and renders the manifests
//! 4. [`git`] commits and pushes them to the management repository
//! 5. [`cluster`] applies them when needed and waits for health
//!
//! [`bootstrap::Bootstrap`] runs it for every configured component.

pub mod bootstrap;
pub mod cancel;
pub mod cli;
pub mod cluster;
pub mod command;
pub mod commands;
pub mod component;
pub mod config;
pub mod error;
pub mod extract;
pub mod git;
pub mod installer;
pub mod manifest;
pub mod progress;
pub mod resolver;
pub mod sync;
pub mod temp;

pub use error::{BootstrapError, Result};
