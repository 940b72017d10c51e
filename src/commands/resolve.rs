//! Resolve command implementation

use crate::cli::ResolveArgs;
use crate::component::ArchiveRepository;
use crate::error::Result;
use crate::resolver::resolve;

/// Run resolve command
pub fn run(args: ResolveArgs) -> Result<()> {
    let repository = ArchiveRepository::new(args.registry);
    let resolved = resolve(&repository, &args.component, &args.constraint)?;
    println!("{}", resolved.version);
    Ok(())
}
