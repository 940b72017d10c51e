//! Bootstrap command implementation

use crate::bootstrap::{Bootstrap, ProfileRegistry};
use crate::cancel::CancelToken;
use crate::cli::BootstrapArgs;
use crate::config::BootstrapConfig;
use crate::error::Result;

/// Run bootstrap command
pub fn run(args: BootstrapArgs, cancel: &CancelToken) -> Result<()> {
    let mut config = BootstrapConfig::load(&args.config)?;
    if let Some(token) = args.token.filter(|t| !t.is_empty()) {
        config.repository.token = Some(token);
    }
    if let Some(registry) = args.registry {
        config.registry = registry;
    }

    Bootstrap::new(config, ProfileRegistry::with_defaults()).run(cancel)?;
    Ok(())
}
